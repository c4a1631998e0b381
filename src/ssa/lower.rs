//! AST to SSA lowering
//!
//! Structured statements lower to basic blocks with explicit successor
//! wiring: `if` produces then/else/join blocks, loops produce
//! header/body/exit blocks with a back edge, `switch` produces one block
//! per case. `break`/`continue`/`goto` lower to plain `Jump` instructions
//! without target tracking.

use crate::loader::{gosrc, LoadedFile};
use crate::ssa::{BasicBlock, Binding, CalleeExpr, Instruction, Op, Param, SsaFunction};
use crate::symbols::receiver_type;
use std::collections::HashMap;
use tree_sitter::Node;

const SNIPPET_MAX: usize = 120;

/// Lower every function and method declaration of a file.
pub fn lower_file(pkg_path: &str, file: &LoadedFile) -> Vec<SsaFunction> {
    let mut out = Vec::new();
    let root = file.tree.root_node();
    let mut cursor = root.walk();
    for decl in root.children(&mut cursor) {
        match decl.kind() {
            "function_declaration" | "method_declaration" => {
                if let Some(f) = lower_function(pkg_path, file, decl) {
                    out.push(f);
                }
            }
            _ => {}
        }
    }
    out
}

fn lower_function(pkg_path: &str, file: &LoadedFile, decl: Node) -> Option<SsaFunction> {
    let source = &file.source;
    let name = gosrc::text(decl.child_by_field_name("name")?, source).to_string();
    let body = decl.child_by_field_name("body")?;

    let (recv_type, recv_name) = match decl.child_by_field_name("receiver") {
        Some(recv) => (
            receiver_type(recv, source).unwrap_or_default(),
            receiver_name(recv, source),
        ),
        None => (String::new(), None),
    };

    let params = decl
        .child_by_field_name("parameters")
        .map(|p| parse_params(p, source))
        .unwrap_or_default();
    let results = decl
        .child_by_field_name("result")
        .map(|r| parse_results(r, source))
        .unwrap_or_default();

    let sig_end = body.start_byte();
    let sig = source[decl.start_byte()..sig_end].trim().to_string();

    let mut lowerer = Lowerer::new(source);
    lowerer.lower_stmts(body);

    Some(SsaFunction {
        pkg_path: pkg_path.to_string(),
        name,
        recv_type,
        recv_name,
        sig,
        file: file.rel_path.clone(),
        line: gosrc::line(decl),
        params,
        results,
        blocks: lowerer.blocks,
        bindings: lowerer.bindings,
    })
}

fn receiver_name(receiver: Node, source: &str) -> Option<String> {
    let mut cursor = receiver.walk();
    for child in receiver.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            let name = child.child_by_field_name("name")?;
            return Some(gosrc::text(name, source).to_string());
        }
    }
    None
}

pub(crate) fn parse_params(list: Node, source: &str) -> Vec<Param> {
    let mut params = Vec::new();
    let mut cursor = list.walk();
    for child in list.children(&mut cursor) {
        match child.kind() {
            "parameter_declaration" | "variadic_parameter_declaration" => {
                let type_text = child
                    .child_by_field_name("type")
                    .map(|t| gosrc::text(t, source).to_string())
                    .unwrap_or_default();
                let mut names = Vec::new();
                let mut inner = child.walk();
                for part in child.children(&mut inner) {
                    if part.kind() == "identifier" {
                        names.push(gosrc::text(part, source).to_string());
                    }
                }
                if names.is_empty() {
                    params.push(Param {
                        name: String::new(),
                        type_text: type_text.clone(),
                    });
                } else {
                    for name in names {
                        params.push(Param {
                            name,
                            type_text: type_text.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    params
}

pub(crate) fn parse_results(result: Node, source: &str) -> Vec<String> {
    if result.kind() == "parameter_list" {
        let mut types = Vec::new();
        let mut cursor = result.walk();
        for child in result.children(&mut cursor) {
            if child.kind() == "parameter_declaration" {
                if let Some(t) = child.child_by_field_name("type") {
                    types.push(gosrc::text(t, source).to_string());
                }
            }
        }
        types
    } else {
        vec![gosrc::text(result, source).to_string()]
    }
}

// =============================================================================
// LOWERER
// =============================================================================

struct Lowerer<'s> {
    source: &'s str,
    blocks: Vec<BasicBlock>,
    current: usize,
    bindings: HashMap<String, Binding>,
}

impl<'s> Lowerer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            blocks: vec![BasicBlock {
                index: 0,
                ..Default::default()
            }],
            current: 0,
            bindings: HashMap::new(),
        }
    }

    fn new_block(&mut self) -> usize {
        let index = self.blocks.len();
        self.blocks.push(BasicBlock {
            index,
            ..Default::default()
        });
        index
    }

    fn add_succ(&mut self, from: usize, to: usize) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
        }
    }

    fn push(&mut self, instr: Instruction) {
        self.blocks[self.current].instructions.push(instr);
    }

    /// Whether the current block ends in an instruction that never falls
    /// through.
    fn terminated(&self) -> bool {
        matches!(
            self.blocks[self.current].instructions.last().map(|i| i.op),
            Some(Op::Return) | Some(Op::Panic)
        )
    }

    fn snippet(&self, node: Node) -> String {
        let text = gosrc::text(node, self.source);
        let mut line = text
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if text.lines().count() > 1 {
            line.push_str(" ...");
        }
        if line.len() > SNIPPET_MAX {
            line.truncate(SNIPPET_MAX);
            line.push_str("...");
        }
        line
    }

    // -------------------------------------------------------------------------
    // STATEMENTS
    // -------------------------------------------------------------------------

    fn lower_stmts(&mut self, block: Node<'s>) {
        let mut cursor = block.walk();
        for stmt in block.named_children(&mut cursor) {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: Node<'s>) {
        if self.terminated() {
            // Dead statements after return/panic still get a block so
            // their call sites are observed.
            let next = self.new_block();
            self.current = next;
        }

        match stmt.kind() {
            "expression_statement" => {
                if let Some(expr) = stmt.named_child(0) {
                    let emitted = self.emit_calls(expr);
                    if emitted == 0 {
                        self.push(Instruction {
                            op: Op::Expr,
                            text: self.snippet(expr),
                            line: gosrc::line(expr),
                            callee: None,
                            branch_cond: None,
                        });
                    }
                }
            }
            "short_var_declaration" => self.lower_assign(stmt, Op::Alloc),
            "assignment_statement" => self.lower_assign(stmt, Op::Store),
            "var_declaration" => self.lower_var_decl(stmt),
            "const_declaration" => {}
            "return_statement" => {
                let mut cursor = stmt.walk();
                for child in stmt.named_children(&mut cursor) {
                    self.emit_calls(child);
                }
                self.push(Instruction {
                    op: Op::Return,
                    text: self.snippet(stmt),
                    line: gosrc::line(stmt),
                    callee: None,
                    branch_cond: None,
                });
            }
            "go_statement" => self.lower_go_defer(stmt, Op::Go),
            "defer_statement" => self.lower_go_defer(stmt, Op::Defer),
            "if_statement" => self.lower_if(stmt),
            "for_statement" => self.lower_for(stmt),
            "expression_switch_statement" | "type_switch_statement" | "select_statement" => {
                self.lower_switch(stmt)
            }
            "block" => self.lower_stmts(stmt),
            "labeled_statement" => {
                if let Some(inner) = stmt.named_child(stmt.named_child_count().saturating_sub(1)) {
                    if inner.kind() != "label_name" {
                        self.lower_stmt(inner);
                    }
                }
            }
            "break_statement" | "continue_statement" | "goto_statement" => {
                self.push(Instruction {
                    op: Op::Jump,
                    text: self.snippet(stmt),
                    line: gosrc::line(stmt),
                    callee: None,
                    branch_cond: None,
                });
            }
            "inc_statement" | "dec_statement" => {
                self.push(Instruction {
                    op: Op::Store,
                    text: self.snippet(stmt),
                    line: gosrc::line(stmt),
                    callee: None,
                    branch_cond: None,
                });
            }
            "send_statement" => {
                self.emit_calls(stmt);
                self.push(Instruction {
                    op: Op::Store,
                    text: self.snippet(stmt),
                    line: gosrc::line(stmt),
                    callee: None,
                    branch_cond: None,
                });
            }
            _ => {
                self.emit_calls(stmt);
            }
        }
    }

    fn lower_assign(&mut self, stmt: Node<'s>, base_op: Op) {
        let left = stmt.child_by_field_name("left");
        let right = stmt.child_by_field_name("right");

        if let Some(right) = right {
            self.emit_calls(right);
        }
        if let (Some(left), Some(right)) = (left, right) {
            self.record_bindings(left, right);
        }

        let has_alloc = right.map(|r| contains_composite(r)).unwrap_or(false);
        self.push(Instruction {
            op: if has_alloc { Op::Alloc } else { base_op },
            text: self.snippet(stmt),
            line: gosrc::line(stmt),
            callee: None,
            branch_cond: None,
        });
    }

    fn lower_var_decl(&mut self, stmt: Node<'s>) {
        let mut cursor = stmt.walk();
        for spec in stmt.children(&mut cursor) {
            if spec.kind() != "var_spec" {
                continue;
            }
            if let Some(value) = spec.child_by_field_name("value") {
                self.emit_calls(value);
            }
            // `var x Foo` / `var x *pkg.Foo` pins the local's type.
            if let (Some(name), Some(ty)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) {
                if let Some(binding) = type_binding(ty, self.source) {
                    self.bindings
                        .insert(gosrc::text(name, self.source).to_string(), binding);
                }
            }
            self.push(Instruction {
                op: Op::Alloc,
                text: self.snippet(spec),
                line: gosrc::line(spec),
                callee: None,
                branch_cond: None,
            });
        }
    }

    fn lower_go_defer(&mut self, stmt: Node<'s>, op: Op) {
        let call = match find_child(stmt, "call_expression") {
            Some(c) => c,
            None => return,
        };
        // Argument expressions evaluate at the statement site; their calls
        // are ordinary call instructions.
        if let Some(args) = call.child_by_field_name("arguments") {
            self.emit_calls(args);
        }
        let callee = call
            .child_by_field_name("function")
            .map(|f| classify_callee(f, self.source));
        if let Some(CalleeExpr::Other(_)) = callee {
            // go func() { ... }(): the literal's body is still scanned
            // for call sites attributed to the enclosing function.
            if let Some(f) = call.child_by_field_name("function") {
                self.emit_calls(f);
            }
        }
        self.push(Instruction {
            op,
            text: self.snippet(stmt),
            line: gosrc::line(call),
            callee,
            branch_cond: None,
        });
    }

    fn lower_if(&mut self, stmt: Node<'s>) {
        if let Some(init) = stmt.child_by_field_name("initializer") {
            self.lower_stmt(init);
        }

        let cond = stmt.child_by_field_name("condition");
        if let Some(cond) = cond {
            self.emit_calls(cond);
        }
        let cond_text = cond.map(|c| self.snippet(c)).unwrap_or_default();
        self.push(Instruction {
            op: Op::If,
            text: format!("if {}", cond_text),
            line: gosrc::line(stmt),
            callee: None,
            branch_cond: Some(cond_text),
        });

        let cond_idx = self.current;

        let then_idx = self.new_block();
        self.add_succ(cond_idx, then_idx);
        self.current = then_idx;
        if let Some(consequence) = stmt.child_by_field_name("consequence") {
            self.lower_stmts(consequence);
        }
        let then_end = self.current;
        let then_terminated = self.terminated();

        let else_result = stmt.child_by_field_name("alternative").map(|alt| {
            let else_idx = self.new_block();
            self.add_succ(cond_idx, else_idx);
            self.current = else_idx;
            if alt.kind() == "if_statement" {
                self.lower_if(alt);
            } else {
                self.lower_stmts(alt);
            }
            (self.current, self.terminated())
        });

        let join = self.new_block();
        if !then_terminated {
            self.add_succ(then_end, join);
        }
        match else_result {
            Some((else_end, else_terminated)) => {
                if !else_terminated {
                    self.add_succ(else_end, join);
                }
            }
            None => self.add_succ(cond_idx, join),
        }
        self.current = join;
    }

    fn lower_for(&mut self, stmt: Node<'s>) {
        // Three syntactic forms: `for init; cond; update` (for_clause),
        // `for x := range xs` (range_clause), `for cond` (bare expression).
        let for_clause = find_child(stmt, "for_clause");
        let range_clause = find_child(stmt, "range_clause");
        let bare_cond = if for_clause.is_none() && range_clause.is_none() {
            let mut cursor = stmt.walk();
            let found = stmt
                .named_children(&mut cursor)
                .find(|c| c.kind() != "block");
            found
        } else {
            None
        };

        if let Some(init) = for_clause.and_then(|c| c.child_by_field_name("initializer")) {
            self.lower_stmt(init);
        }

        let header = self.new_block();
        self.add_succ(self.current, header);
        self.current = header;

        let cond = for_clause
            .and_then(|c| c.child_by_field_name("condition"))
            .or(bare_cond);
        let conditional = cond.is_some() || range_clause.is_some();

        if let Some(cond) = cond {
            self.emit_calls(cond);
            let text = self.snippet(cond);
            self.push(Instruction {
                op: Op::If,
                text: format!("for {}", text),
                line: gosrc::line(stmt),
                callee: None,
                branch_cond: Some(text),
            });
        } else if let Some(range) = range_clause {
            if let Some(right) = range.child_by_field_name("right") {
                self.emit_calls(right);
            }
            let text = self.snippet(range);
            self.push(Instruction {
                op: Op::If,
                text: format!("for {}", text),
                line: gosrc::line(stmt),
                callee: None,
                branch_cond: Some(text),
            });
        } else {
            self.push(Instruction {
                op: Op::Jump,
                text: "for".to_string(),
                line: gosrc::line(stmt),
                callee: None,
                branch_cond: None,
            });
        }

        let body_idx = self.new_block();
        self.add_succ(header, body_idx);
        self.current = body_idx;
        if let Some(body) = stmt.child_by_field_name("body") {
            self.lower_stmts(body);
        }
        if let Some(update) = for_clause.and_then(|c| c.child_by_field_name("update")) {
            self.lower_stmt(update);
        }
        if !self.terminated() {
            let end = self.current;
            self.add_succ(end, header);
        }

        let exit = self.new_block();
        if conditional {
            self.add_succ(header, exit);
        }
        self.current = exit;
    }

    fn lower_switch(&mut self, stmt: Node<'s>) {
        if let Some(init) = stmt.child_by_field_name("initializer") {
            self.lower_stmt(init);
        }
        if let Some(value) = stmt.child_by_field_name("value") {
            self.emit_calls(value);
        }

        let subject = stmt
            .child_by_field_name("value")
            .map(|v| self.snippet(v))
            .unwrap_or_default();
        self.push(Instruction {
            op: Op::If,
            text: if subject.is_empty() {
                "switch".to_string()
            } else {
                format!("switch {}", subject)
            },
            line: gosrc::line(stmt),
            callee: None,
            branch_cond: (!subject.is_empty()).then(|| subject.clone()),
        });

        let switch_idx = self.current;
        let mut case_ends = Vec::new();
        let mut has_default = false;

        let mut cursor = stmt.walk();
        let cases: Vec<Node> = stmt
            .named_children(&mut cursor)
            .filter(|c| {
                matches!(
                    c.kind(),
                    "expression_case" | "default_case" | "type_case" | "communication_case"
                )
            })
            .collect();

        for case in cases {
            if case.kind() == "default_case" {
                has_default = true;
            }
            let case_idx = self.new_block();
            self.add_succ(switch_idx, case_idx);
            self.current = case_idx;

            let mut inner = case.walk();
            for child in case.named_children(&mut inner) {
                match child.kind() {
                    "expression_list" | "type_list" => {
                        self.emit_calls(child);
                    }
                    _ => self.lower_stmt(child),
                }
            }
            case_ends.push((self.current, self.terminated()));
        }

        let join = self.new_block();
        for (end, terminated) in case_ends {
            if !terminated {
                self.add_succ(end, join);
            }
        }
        if !has_default {
            self.add_succ(switch_idx, join);
        }
        self.current = join;
    }

    // -------------------------------------------------------------------------
    // CALLS AND BINDINGS
    // -------------------------------------------------------------------------

    /// Emit a Call (or Panic) instruction for every call expression in a
    /// subtree, preorder. Returns the number of instructions emitted.
    fn emit_calls(&mut self, node: Node<'s>) -> usize {
        let mut calls = Vec::new();
        collect_calls(node, &mut calls);

        let emitted = calls.len();
        for call in calls {
            let callee = call
                .child_by_field_name("function")
                .map(|f| classify_callee(f, self.source));

            if let Some(CalleeExpr::Ident(name)) = &callee {
                if name == "panic" {
                    self.push(Instruction {
                        op: Op::Panic,
                        text: self.snippet(call),
                        line: gosrc::line(call),
                        callee: None,
                        branch_cond: None,
                    });
                    continue;
                }
            }

            self.push(Instruction {
                op: Op::Call,
                text: self.snippet(call),
                line: gosrc::line(call),
                callee,
                branch_cond: None,
            });
        }
        emitted
    }

    fn record_bindings(&mut self, left: Node<'s>, right: Node<'s>) {
        let mut lcursor = left.walk();
        let names: Vec<Node> = left
            .named_children(&mut lcursor)
            .filter(|n| n.kind() == "identifier")
            .collect();
        let mut rcursor = right.walk();
        let values: Vec<Node> = right.named_children(&mut rcursor).collect();

        if names.len() != values.len() {
            return;
        }
        for (name, value) in names.iter().zip(values.iter()) {
            let name_text = gosrc::text(*name, self.source).to_string();
            if name_text == "_" {
                continue;
            }
            if let Some(binding) = value_binding(*value, self.source) {
                self.bindings.insert(name_text, binding);
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn collect_calls<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "call_expression" {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, out);
    }
}

fn contains_composite(node: Node) -> bool {
    if node.kind() == "composite_literal" {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        // Nested literals inside call arguments do not make the statement
        // an allocation of the assigned variable.
        if child.kind() == "call_expression" {
            continue;
        }
        if contains_composite(child) {
            return true;
        }
    }
    false
}

/// Classify the callee expression of a call.
pub fn classify_callee(func: Node, source: &str) -> CalleeExpr {
    match func.kind() {
        "identifier" => CalleeExpr::Ident(gosrc::text(func, source).to_string()),
        "selector_expression" => {
            let recv = func
                .child_by_field_name("operand")
                .map(|o| gosrc::text(o, source).to_string())
                .unwrap_or_default();
            let method = func
                .child_by_field_name("field")
                .map(|f| gosrc::text(f, source).to_string())
                .unwrap_or_default();
            CalleeExpr::Selector { recv, method }
        }
        "parenthesized_expression" | "index_expression" => match func.named_child(0) {
            Some(inner) => classify_callee(inner, source),
            None => CalleeExpr::Other(gosrc::text(func, source).to_string()),
        },
        _ => CalleeExpr::Other(gosrc::text(func, source).to_string()),
    }
}

/// Binding for the right-hand side of an assignment, when traceable.
fn value_binding(value: Node, source: &str) -> Option<Binding> {
    match value.kind() {
        "identifier" => Some(Binding::FuncRef(CalleeExpr::Ident(
            gosrc::text(value, source).to_string(),
        ))),
        "selector_expression" => {
            let recv = value
                .child_by_field_name("operand")
                .map(|o| gosrc::text(o, source).to_string())?;
            let method = value
                .child_by_field_name("field")
                .map(|f| gosrc::text(f, source).to_string())?;
            Some(Binding::FuncRef(CalleeExpr::Selector { recv, method }))
        }
        "composite_literal" => {
            let ty = value.child_by_field_name("type")?;
            type_binding(ty, source)
        }
        "unary_expression" => {
            let op = value.child_by_field_name("operator")?;
            if gosrc::text(op, source) != "&" {
                return None;
            }
            let operand = value.child_by_field_name("operand")?;
            if operand.kind() != "composite_literal" {
                return None;
            }
            let ty = operand.child_by_field_name("type")?;
            match type_binding(ty, source)? {
                Binding::TypeRef {
                    pkg_alias,
                    type_name,
                    ..
                } => Some(Binding::TypeRef {
                    pkg_alias,
                    type_name,
                    pointer: true,
                }),
                other => Some(other),
            }
        }
        _ => None,
    }
}

/// Binding for an explicit type node (`Foo`, `*Foo`, `pkg.Foo`, `*pkg.Foo`).
fn type_binding(ty: Node, source: &str) -> Option<Binding> {
    match ty.kind() {
        "type_identifier" => Some(Binding::TypeRef {
            pkg_alias: None,
            type_name: gosrc::text(ty, source).to_string(),
            pointer: false,
        }),
        "qualified_type" => {
            let pkg = ty
                .child_by_field_name("package")
                .map(|p| gosrc::text(p, source).to_string())?;
            let name = ty
                .child_by_field_name("name")
                .map(|n| gosrc::text(n, source).to_string())?;
            Some(Binding::TypeRef {
                pkg_alias: Some(pkg),
                type_name: name,
                pointer: false,
            })
        }
        "pointer_type" => {
            let inner = ty.named_child(0)?;
            match type_binding(inner, source)? {
                Binding::TypeRef {
                    pkg_alias,
                    type_name,
                    ..
                } => Some(Binding::TypeRef {
                    pkg_alias,
                    type_name,
                    pointer: true,
                }),
                other => Some(other),
            }
        }
        "generic_type" => {
            let name = ty.child_by_field_name("type")?;
            type_binding(name, source)
        }
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::gosrc::parse;
    use crate::loader::LoadedFile;

    fn lower_source(source: &str) -> Vec<SsaFunction> {
        let tree = parse(source).unwrap();
        let file = LoadedFile {
            file_id: 0,
            rel_path: "test.go".to_string(),
            source: source.to_string(),
            tree,
            package_name: "test".to_string(),
            imports: vec![],
        };
        lower_file("example.com/test", &file)
    }

    fn calls_of(f: &SsaFunction) -> Vec<&CalleeExpr> {
        f.instructions()
            .filter(|i| matches!(i.op, Op::Call | Op::Defer | Op::Go))
            .filter_map(|i| i.callee.as_ref())
            .collect()
    }

    #[test]
    fn test_straight_line_calls() {
        let fns = lower_source(
            r#"package test

func Run() {
    setup()
    log.Print("x")
}
"#,
        );
        assert_eq!(fns.len(), 1);
        let calls = calls_of(&fns[0]);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], &CalleeExpr::Ident("setup".to_string()));
        assert_eq!(
            calls[1],
            &CalleeExpr::Selector {
                recv: "log".to_string(),
                method: "Print".to_string()
            }
        );
    }

    #[test]
    fn test_if_produces_branch_blocks() {
        let fns = lower_source(
            r#"package test

func Check(err error) {
    if err != nil {
        handle(err)
    }
    done()
}
"#,
        );
        let f = &fns[0];
        // entry (If), then, join
        assert_eq!(f.blocks.len(), 3);
        assert_eq!(f.blocks[0].successors, vec![1, 2]);
        assert_eq!(f.blocks[1].successors, vec![2]);

        let if_instr = f.blocks[0]
            .instructions
            .iter()
            .find(|i| i.op == Op::If)
            .unwrap();
        assert_eq!(if_instr.branch_cond.as_deref(), Some("err != nil"));
    }

    #[test]
    fn test_if_else_wiring() {
        let fns = lower_source(
            r#"package test

func Pick(ok bool) {
    if ok {
        a()
    } else {
        b()
    }
    c()
}
"#,
        );
        let f = &fns[0];
        // entry, then, else, join
        assert_eq!(f.blocks.len(), 4);
        assert_eq!(f.blocks[0].successors, vec![1, 2]);
        assert_eq!(f.blocks[1].successors, vec![3]);
        assert_eq!(f.blocks[2].successors, vec![3]);
    }

    #[test]
    fn test_for_has_back_edge_and_exit() {
        let fns = lower_source(
            r#"package test

func Loop(n int) {
    for i := 0; i < n; i++ {
        work(i)
    }
    done()
}
"#,
        );
        let f = &fns[0];
        // entry, header, body, exit
        assert_eq!(f.blocks.len(), 4);
        let header = &f.blocks[1];
        assert!(header.successors.contains(&2));
        assert!(header.successors.contains(&3));
        let body = &f.blocks[2];
        assert!(body.successors.contains(&1), "missing back edge");
    }

    #[test]
    fn test_return_terminates_block() {
        let fns = lower_source(
            r#"package test

func Get(ok bool) int {
    if ok {
        return 1
    }
    return 0
}
"#,
        );
        let f = &fns[0];
        let then_block = &f.blocks[1];
        assert!(then_block.successors.is_empty());
        assert_eq!(
            then_block.instructions.last().map(|i| i.op),
            Some(Op::Return)
        );
        // Two exit blocks: the then-return and the fallthrough return.
        assert_eq!(f.exit_blocks().len(), 2);
    }

    #[test]
    fn test_defer_and_go_kinds() {
        let fns = lower_source(
            r#"package test

func Serve() {
    defer cleanup()
    go worker()
}
"#,
        );
        let f = &fns[0];
        let ops: Vec<Op> = f
            .instructions()
            .filter(|i| i.callee.is_some())
            .map(|i| i.op)
            .collect();
        assert_eq!(ops, vec![Op::Defer, Op::Go]);
    }

    #[test]
    fn test_panic_lowered_as_panic() {
        let fns = lower_source(
            r#"package test

func Die() {
    panic("boom")
}
"#,
        );
        let f = &fns[0];
        assert!(f.instructions().any(|i| i.op == Op::Panic));
        assert!(f.blocks[0].successors.is_empty());
    }

    #[test]
    fn test_bindings_from_composite_literal() {
        let fns = lower_source(
            r#"package test

func Make() {
    s := &Server{}
    c := Config{}
    h := handleUsers
    s.Start()
}
"#,
        );
        let f = &fns[0];
        assert_eq!(
            f.bindings.get("s"),
            Some(&Binding::TypeRef {
                pkg_alias: None,
                type_name: "Server".to_string(),
                pointer: true
            })
        );
        assert_eq!(
            f.bindings.get("c"),
            Some(&Binding::TypeRef {
                pkg_alias: None,
                type_name: "Config".to_string(),
                pointer: false
            })
        );
        assert_eq!(
            f.bindings.get("h"),
            Some(&Binding::FuncRef(CalleeExpr::Ident(
                "handleUsers".to_string()
            )))
        );
    }

    #[test]
    fn test_method_metadata() {
        let fns = lower_source(
            r#"package test

func (s *Server) Start(ctx context.Context) error {
    return s.run(ctx)
}
"#,
        );
        let f = &fns[0];
        assert_eq!(f.name, "Start");
        assert_eq!(f.recv_type, "*Server");
        assert_eq!(f.recv_name.as_deref(), Some("s"));
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].type_text, "context.Context");
        assert_eq!(f.results, vec!["error".to_string()]);
    }

    #[test]
    fn test_switch_creates_case_blocks() {
        let fns = lower_source(
            r#"package test

func Route(kind string) {
    switch kind {
    case "a":
        a()
    case "b":
        b()
    default:
        c()
    }
    done()
}
"#,
        );
        let f = &fns[0];
        // entry + 3 cases + join
        assert_eq!(f.blocks.len(), 5);
        assert_eq!(f.blocks[0].successors, vec![1, 2, 3]);
        for case in 1..=3 {
            assert_eq!(f.blocks[case].successors, vec![4]);
        }
    }

    #[test]
    fn test_calls_inside_anonymous_functions_are_attributed() {
        let fns = lower_source(
            r#"package test

func Spawn() {
    go func() {
        inner()
    }()
}
"#,
        );
        let f = &fns[0];
        let has_inner = f.instructions().any(|i| {
            matches!(&i.callee, Some(CalleeExpr::Ident(n)) if n == "inner")
        });
        assert!(has_inner);
    }
}
