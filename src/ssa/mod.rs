//! SSA-form representation
//!
//! Lowers loaded packages into a basic-block instruction form for every
//! function body (functions, methods; call sites inside `func` literals
//! are attributed to the enclosing declaration). The instruction set is a
//! fixed tagged union dispatched over by the call-graph extractor and the
//! per-function CFG query.

pub mod lower;

use crate::loader::{LoadedPackage, Loader};
use std::collections::HashMap;
use tracing::debug;

/// Normalized instruction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Call,
    Defer,
    Go,
    If,
    Jump,
    Return,
    Panic,
    Alloc,
    Store,
    /// Reserved for consumers that expect phi nodes; the lowering never
    /// synthesizes them.
    Phi,
    Expr,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Call => "call",
            Op::Defer => "defer",
            Op::Go => "go",
            Op::If => "if",
            Op::Jump => "jump",
            Op::Return => "return",
            Op::Panic => "panic",
            Op::Alloc => "alloc",
            Op::Store => "store",
            Op::Phi => "phi",
            Op::Expr => "expr",
        }
    }
}

/// Syntactic shape of a call's callee expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalleeExpr {
    /// `F(...)`: bare identifier.
    Ident(String),
    /// `x.M(...)`: receiver expression text plus method name.
    Selector { recv: String, method: String },
    /// Computed callee (immediately-invoked literal, indexed value, ...).
    Other(String),
}

/// One instruction inside a basic block
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Op,
    /// Single-line source snippet for display.
    pub text: String,
    /// 1-based source line; 0 when the instruction is synthetic.
    pub line: u32,
    /// Callee shape for Call/Defer/Go instructions.
    pub callee: Option<CalleeExpr>,
    /// Pretty-printed branch condition for If instructions.
    pub branch_cond: Option<String>,
}

/// One basic block with ordered instructions and successor indices
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub index: usize,
    pub instructions: Vec<Instruction>,
    pub successors: Vec<usize>,
}

/// What a local variable is known to hold, for callee resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Direct function reference: `h := pkg.F` or `h := F`.
    FuncRef(CalleeExpr),
    /// Concrete local value: `s := Foo{}`, `s := &Foo{}`, `var s pkg.Foo`.
    TypeRef {
        /// Import alias when the type is package-qualified.
        pkg_alias: Option<String>,
        type_name: String,
        pointer: bool,
    },
}

/// One function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_text: String,
}

/// One lowered function
#[derive(Debug, Clone)]
pub struct SsaFunction {
    pub pkg_path: String,
    pub name: String,
    /// Normalized receiver type; empty for non-methods.
    pub recv_type: String,
    /// Receiver variable name for methods (`s` in `func (s *Server) ...`).
    pub recv_name: Option<String>,
    pub sig: String,
    pub file: String,
    pub line: u32,
    pub params: Vec<Param>,
    /// Result type texts, flattened.
    pub results: Vec<String>,
    pub blocks: Vec<BasicBlock>,
    /// Local name -> traced binding, collected during lowering.
    pub bindings: HashMap<String, Binding>,
}

impl SsaFunction {
    /// Iterate all instructions across blocks in order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    /// Blocks with no successors.
    pub fn exit_blocks(&self) -> Vec<usize> {
        self.blocks
            .iter()
            .filter(|b| b.successors.is_empty())
            .map(|b| b.index)
            .collect()
    }
}

/// All lowered functions of a load
#[derive(Debug, Default)]
pub struct SsaProgram {
    pub functions: Vec<SsaFunction>,
}

impl SsaProgram {
    /// Lower every package of a load.
    pub fn build(loader: &Loader) -> Self {
        let mut functions = Vec::new();
        for pkg in loader.packages() {
            functions.extend(build_package(pkg));
        }
        debug!(functions = functions.len(), "lowered to SSA form");
        Self { functions }
    }

    /// Find a function by its symbol key.
    pub fn find(&self, pkg_path: &str, name: &str, recv_type: &str) -> Option<&SsaFunction> {
        self.functions
            .iter()
            .find(|f| f.pkg_path == pkg_path && f.name == name && f.recv_type == recv_type)
    }
}

/// Lower one package's files.
pub fn build_package(pkg: &LoadedPackage) -> Vec<SsaFunction> {
    let mut functions = Vec::new();
    for file in &pkg.files {
        functions.extend(lower::lower_file(&pkg.pkg_path, file));
    }
    functions
}
