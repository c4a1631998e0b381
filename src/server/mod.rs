//! HTTP server for the FlowLens UI
//!
//! Serves the query engine over a local axum server with allow-all CORS
//! and a per-request timeout. Ctrl-C stops the listener and drains
//! in-flight requests for up to ten seconds before the store closes.

pub mod handlers;

use crate::core::error::{Error, Result};

use crate::query::QueryEngine;
use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use handlers::AppState;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

/// Per-request read/write timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Shutdown drain window.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the API router.
pub fn router(engine: QueryEngine) -> Router {
    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(handlers::api_health))
        .route("/api/stats", get(handlers::api_stats))
        .route("/api/entrypoints", get(handlers::api_entrypoints))
        .route("/api/entrypoints/:id", get(handlers::api_entrypoint_by_id))
        .route("/api/symbol/:id", get(handlers::api_symbol))
        .route("/api/search", get(handlers::api_search))
        .route("/api/graph/root/:id", get(handlers::api_graph_root))
        .route("/api/graph/expand/:id", get(handlers::api_graph_expand))
        .route("/api/spine/:id", get(handlers::api_spine))
        .route("/api/cfg/:id", get(handlers::api_cfg))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(state)
}

/// Run the server until Ctrl-C.
pub async fn run(engine: QueryEngine, port: u16, open_browser: bool) -> Result<()> {
    let app = router(engine);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    eprintln!();
    eprintln!(
        "\x1b[36m>\x1b[0m flowlens ui running at \x1b[36mhttp://{}\x1b[0m",
        addr
    );
    eprintln!("\x1b[90m  Press Ctrl+C to stop\x1b[0m");

    if open_browser {
        let url = format!("http://{}", addr);
        let _ = open::that(&url);
    }

    // Stop accepting on Ctrl-C, then drain in-flight requests with a cap.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    eprintln!("\nshutting down ...");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
        Ok(joined) => {
            joined
                .map_err(|e| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("server task failed: {}", e),
                    ))
                })?
                .map_err(Error::Io)?;
        }
        Err(_) => warn!("drain window elapsed, closing with requests in flight"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::project::Project;
    use crate::store::types::{NewSymbol, SymbolKind};
    use crate::store::Store;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router() -> (TempDir, Router) {
        let temp = TempDir::new().unwrap();
        let project = Project::from_path(temp.path()).unwrap();
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_symbol(&NewSymbol {
                pkg_path: "m/app".to_string(),
                name: "Run".to_string(),
                kind: SymbolKind::Func,
                recv_type: String::new(),
                file: "a.go".to_string(),
                line: 1,
                sig: None,
            })
            .unwrap();
        let engine = QueryEngine::new(store, project, Config::default());
        (temp, router(engine))
    }

    async fn get_status(router: &Router, uri: &str) -> StatusCode {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let (_t, app) = test_router();
        assert_eq!(get_status(&app, "/api/health").await, StatusCode::OK);
        assert_eq!(get_status(&app, "/api/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (_t, app) = test_router();
        // unknown id
        assert_eq!(
            get_status(&app, "/api/symbol/999").await,
            StatusCode::NOT_FOUND
        );
        // malformed id
        assert_eq!(
            get_status(&app, "/api/symbol/abc").await,
            StatusCode::BAD_REQUEST
        );
        // missing required query parameter
        assert_eq!(
            get_status(&app, "/api/search").await,
            StatusCode::BAD_REQUEST
        );
        // bad filters JSON
        assert_eq!(
            get_status(&app, "/api/graph/root/1?filters=%7Bnope").await,
            StatusCode::BAD_REQUEST
        );
        // unknown entrypoint type
        assert_eq!(
            get_status(&app, "/api/entrypoints?type=bogus").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_graph_root_roundtrip() {
        let (_t, app) = test_router();
        assert_eq!(
            get_status(&app, "/api/graph/root/1?depth=2").await,
            StatusCode::OK
        );
        assert_eq!(
            get_status(&app, "/api/spine/1").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let (_t, app) = test_router();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
