//! HTTP API handlers
//!
//! All responses are JSON; errors serialize as `{"error": "<message>"}`
//! with the status mapped from the error taxonomy. The `filters` query
//! parameter is a URL-encoded JSON blob deserialized into
//! [`GraphFilter`].

use crate::core::error::Error;
use crate::query::{GraphFilter, QueryEngine, DEFAULT_SPINE_DEPTH};
use crate::store::types::{EntrypointFilter, EntrypointType};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
}

/// Error wrapper implementing the taxonomy -> status mapping
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Error::Unsupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
            // A local dev tool: 500s carry the underlying message.
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError(Error::invalid_input(format!("malformed id: {}", raw))))
}

fn parse_filters(raw: Option<&str>) -> Result<GraphFilter, ApiError> {
    match raw {
        None | Some("") => Ok(GraphFilter::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError(Error::invalid_input(format!("invalid filters: {}", e)))),
    }
}

// =============================================================================
// PARAMS
// =============================================================================

#[derive(Deserialize)]
pub struct EntrypointsParams {
    #[serde(rename = "type")]
    pub ep_type: Option<String>,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct GraphParams {
    pub depth: Option<u32>,
    pub filters: Option<String>,
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn api_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn api_stats(State(state): State<AppState>) -> ApiResult<crate::store::Stats> {
    Ok(Json(state.engine.store().get_stats()?))
}

pub async fn api_entrypoints(
    State(state): State<AppState>,
    Query(params): Query<EntrypointsParams>,
) -> ApiResult<Vec<crate::store::EntrypointWithSymbol>> {
    let ep_type = match params.ep_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(EntrypointType::from_str(raw).ok_or_else(|| {
            ApiError(Error::invalid_input(format!("unknown entrypoint type: {}", raw)))
        })?),
    };
    let filter = EntrypointFilter {
        ep_type,
        query: params.query,
        limit: params.limit,
    };
    Ok(Json(state.engine.store().get_entrypoints(&filter)?))
}

pub async fn api_entrypoint_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<crate::store::EntrypointWithSymbol> {
    let id = parse_id(&id)?;
    let ep = state
        .engine
        .store()
        .get_entrypoint_by_id(id)?
        .ok_or_else(|| ApiError(Error::not_found(format!("entrypoint {}", id))))?;
    Ok(Json(ep))
}

pub async fn api_symbol(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<crate::query::SymbolDetail> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.symbol_detail(id)?))
}

pub async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<crate::store::SymbolRow>> {
    let query = params
        .query
        .ok_or_else(|| ApiError(Error::invalid_input("missing query parameter")))?;
    let limit = params.limit.unwrap_or(50);
    Ok(Json(state.engine.store().search_symbols(&query, limit)?))
}

pub async fn api_graph_root(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GraphParams>,
) -> ApiResult<crate::query::GraphResponse> {
    let id = parse_id(&id)?;
    let filter = parse_filters(params.filters.as_deref())?;
    let depth = params.depth.unwrap_or(filter.max_depth);
    Ok(Json(state.engine.graph_root(id, depth, &filter)?))
}

pub async fn api_graph_expand(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GraphParams>,
) -> ApiResult<crate::query::GraphResponse> {
    let id = parse_id(&id)?;
    let filter = parse_filters(params.filters.as_deref())?;
    let depth = params.depth.unwrap_or(1);
    Ok(Json(state.engine.graph_expand(id, depth, &filter)?))
}

pub async fn api_spine(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GraphParams>,
) -> ApiResult<crate::query::SpineResponse> {
    let id = parse_id(&id)?;
    let filter = parse_filters(params.filters.as_deref())?;
    let depth = params.depth.unwrap_or(DEFAULT_SPINE_DEPTH);
    Ok(Json(state.engine.spine(id, depth, &filter)?))
}

pub async fn api_cfg(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<crate::query::CfgResponse> {
    let id = parse_id(&id)?;
    // SSA rebuilding parses source; keep it off the async workers.
    let engine = state.engine.clone();
    let cfg = tokio::task::spawn_blocking(move || engine.cfg(id))
        .await
        .map_err(|e| ApiError(Error::analysis(format!("cfg task failed: {}", e))))??;
    Ok(Json(cfg))
}
