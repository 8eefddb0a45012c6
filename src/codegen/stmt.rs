//! Statement printing.
//!
//! Simple statements that index global buffers read each element into a
//! temporary first and, for writable buffers, store it back afterwards:
//!
//! ```text
//! var data_1 = Data[i];
//! data_1 += 1;
//! Data[i] = data_1;
//! ```

use super::{BufferTemp, Printer};
use crate::go::ast::{AssignOp, Block, BranchTok, CaseClause, DeclKind, Expr, GenDecl, Spec, Stmt, StmtKind};
use crate::go::Type;
use crate::state::Var;

impl<'a> Printer<'a> {
    /// Prints the statements of a block whose opening line is already out,
    /// followed by the writebacks of its `GetVar` locals. The caller closes
    /// the brace.
    pub(super) fn block_body(&mut self, stmts: &'a [Stmt], end_line: u32) {
        self.indent += 1;
        self.scopes.push();
        self.get_vars.push(Vec::new());
        for s in stmts {
            self.stmt(s);
        }
        self.flush_comments(end_line);
        let temps = self.get_vars.pop().unwrap_or_default();
        let returns = matches!(stmts.last(), Some(Stmt { kind: StmtKind::Return(_), .. }));
        if !returns {
            for t in temps.iter().filter(|t| !t.read_only) {
                self.emit(t.writeback());
            }
        }
        self.scopes.pop();
        self.indent -= 1;
        self.last_line = end_line;
    }

    pub(super) fn stmt(&mut self, s: &'a Stmt) {
        if self.in_nowgsl(s.line) {
            self.skip_comments(s.line, s.end_line);
            return;
        }
        self.flush_comments(s.line);
        self.gap(s.line);
        self.line = s.line;
        match &s.kind {
            StmtKind::Empty => {}
            StmtKind::Decl(gd) => self.decl_stmt(gd),
            StmtKind::Expr(_) | StmtKind::IncDec { .. } | StmtKind::Assign { .. } => self.simple_stmt(s),
            StmtKind::Return(results) => self.return_stmt(results),
            StmtKind::Branch { tok, label } => self.branch_stmt(*tok, label.as_deref()),
            StmtKind::Block(b) => {
                self.emit("{");
                self.block_body(&b.stmts, b.end_line);
                self.emit("}");
            }
            StmtKind::If { .. } => self.if_stmt(s, false),
            StmtKind::Switch { init, tag, clauses } => {
                self.switch_stmt(init.as_deref(), tag.as_ref(), clauses)
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                let header = match (init, cond, post) {
                    (None, None, None) => "loop {".to_string(),
                    (None, Some(cond), None) => format!("while ({}) {{", self.cond_text(cond)),
                    _ => {
                        self.scopes.push();
                        let init = match init {
                            Some(s) => self.inline_stmt(s),
                            None => String::new(),
                        };
                        let cond = match cond {
                            Some(c) => self.expr(c),
                            None => String::new(),
                        };
                        let post = match post {
                            Some(s) => self.inline_stmt(s),
                            None => String::new(),
                        };
                        format!("for ({}; {}; {}) {{", init, cond, post)
                    }
                };
                self.emit(header);
                self.block_body(&body.stmts, body.end_line);
                self.emit("}");
                if init.is_some() || post.is_some() {
                    self.scopes.pop();
                }
            }
            StmtKind::Range {
                key,
                value,
                define,
                expr,
                body,
            } => self.range_stmt(key.as_ref(), value.is_some(), *define, expr, body),
            StmtKind::Labeled { label, stmt } => {
                self.error(format!("labels are not supported: {}", label));
                self.stmt(stmt);
            }
        }
        self.trailing_comment(s.end_line);
        self.last_line = s.end_line;
    }

    // ------------------------------------------------------------------
    // Buffer temporaries

    /// Indexed accesses into global buffers within `e`, innermost first.
    pub(super) fn collect_accesses(&self, e: &'a Expr, out: &mut Vec<&'a Expr>) {
        match e {
            Expr::Index { expr, index } => {
                self.collect_accesses(index, out);
                match expr.as_ref() {
                    Expr::Ident(name) => {
                        if self.buffer_var(name).is_some_and(|v| !v.tensor) {
                            out.push(e);
                        }
                    }
                    other => self.collect_accesses(other, out),
                }
            }
            Expr::Call { func, args, .. } => {
                // atomics and tensor methods address the buffer directly
                if self.is_atomic_call(func) || self.is_tensor_call(func) {
                    return;
                }
                self.collect_accesses(func, out);
                for a in args {
                    self.collect_accesses(a, out);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.collect_accesses(lhs, out);
                self.collect_accesses(rhs, out);
            }
            Expr::Unary { expr, .. }
            | Expr::Star(expr)
            | Expr::Paren(expr)
            | Expr::Selector { expr, .. } => self.collect_accesses(expr, out),
            Expr::Composite { elts, .. } => {
                for elt in elts {
                    self.collect_accesses(elt, out);
                }
            }
            Expr::KeyValue { value, .. } => self.collect_accesses(value, out),
            _ => {}
        }
    }

    fn has_accesses(&self, e: &'a Expr) -> bool {
        let mut out = Vec::new();
        self.collect_accesses(e, &mut out);
        !out.is_empty()
    }

    fn stmt_accesses(&self, s: &'a Stmt, out: &mut Vec<&'a Expr>) {
        match &s.kind {
            StmtKind::Expr(e) | StmtKind::IncDec { expr: e, .. } => self.collect_accesses(e, out),
            StmtKind::Assign { lhs, rhs, op } => {
                if *op != AssignOp::Define {
                    for e in lhs {
                        self.collect_accesses(e, out);
                    }
                }
                for e in rhs {
                    self.collect_accesses(e, out);
                }
            }
            _ => {}
        }
    }

    /// Reads each accessed element into a temporary, in order. Repeated
    /// accesses to the same element share one temporary.
    fn hoist(&mut self, accesses: &[&'a Expr]) -> Vec<BufferTemp> {
        let mut temps: Vec<BufferTemp> = Vec::new();
        for &e in accesses {
            let Expr::Index { expr, index } = e else { continue };
            let Some(name) = expr.as_ident() else { continue };
            let Some(read_only) = self.buffer_var(name).map(|v| v.read_only) else {
                continue;
            };
            let index = self.expr(index);
            if let Some(t) = temps.iter().find(|t| t.var == name && t.index == index) {
                self.hoisted.insert(e as *const Expr, t.tmp.clone());
                continue;
            }
            self.tmp_count += 1;
            let tmp = format!("{}_{}", name.to_lowercase(), self.tmp_count);
            self.emit(format!("var {} = {}[{}];", tmp, name, index));
            self.hoisted.insert(e as *const Expr, tmp.clone());
            temps.push(BufferTemp {
                var: name.to_string(),
                read_only,
                tmp,
                index,
            });
        }
        temps
    }

    fn writebacks(&mut self, temps: &[BufferTemp]) {
        for t in temps.iter().rev().filter(|t| !t.read_only) {
            self.emit(t.writeback());
        }
    }

    /// Reports assignments whose target lives in a read-only buffer.
    fn check_read_only(&mut self, s: &Stmt) {
        let targets: Vec<&Expr> = match &s.kind {
            StmtKind::Assign { lhs, op, .. } if *op != AssignOp::Define => lhs.iter().collect(),
            StmtKind::IncDec { expr, .. } => vec![expr],
            _ => Vec::new(),
        };
        for target in targets {
            if let Some(var) = self.written_buffer(target) {
                if var.read_only {
                    self.error(format!("cannot assign to read-only variable {}", var.name));
                }
            }
        }
    }

    fn written_buffer(&self, e: &Expr) -> Option<Var> {
        match e.unparen() {
            Expr::Index { expr, .. } => match expr.as_ref() {
                Expr::Ident(name) => self.buffer_var(name),
                other => self.written_buffer(other),
            },
            Expr::Selector { expr, .. } => self.written_buffer(expr),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Simple statements

    fn simple_stmt(&mut self, s: &'a Stmt) {
        if self.get_var_stmt(s) {
            return;
        }
        self.check_read_only(s);
        let mut accesses = Vec::new();
        self.stmt_accesses(s, &mut accesses);
        let temps = self.hoist(&accesses);
        for text in self.simple_text(s) {
            self.emit(format!("{};", text));
        }
        self.trailing_comment(s.end_line);
        self.writebacks(&temps);
        self.hoisted.clear();
    }

    /// `x := GetVar(idx)` binds a local copy of the buffer element.
    fn get_var_stmt(&mut self, s: &Stmt) -> bool {
        let StmtKind::Assign {
            lhs,
            op: AssignOp::Define,
            rhs,
        } = &s.kind
        else {
            return false;
        };
        let ([Expr::Ident(name)], [Expr::Call { func, args, .. }]) = (lhs.as_slice(), rhs.as_slice()) else {
            return false;
        };
        let Some(func) = func.as_ident() else {
            return false;
        };
        if self.scopes.lookup(func).is_some() {
            return false;
        }
        let Some(var) = self.state.get_func_var(func).cloned() else {
            return false;
        };
        let Some(idx) = args.first() else {
            self.error(format!("{} requires an index argument", func));
            return true;
        };
        let index = self.expr(idx);
        self.emit(format!("var {} = {}[{}];", name, var.name, index));
        self.scopes.define(name, Type::Named(var.go_elem_type().to_string()));
        if let Some(top) = self.get_vars.last_mut() {
            top.push(BufferTemp {
                var: var.name.clone(),
                read_only: var.read_only,
                tmp: name.clone(),
                index,
            });
        }
        true
    }

    /// Text of an expression, increment or assignment statement, one entry
    /// per resulting WGSL statement.
    fn simple_text(&mut self, s: &Stmt) -> Vec<String> {
        match &s.kind {
            StmtKind::Expr(e) => vec![self.expr(e)],
            StmtKind::IncDec { expr, inc } => {
                let x = self.expr(expr);
                vec![format!("{}{}", x, if *inc { "++" } else { "--" })]
            }
            StmtKind::Assign { lhs, op, rhs } => {
                if lhs.len() != rhs.len() {
                    self.error("multiple return values are not supported");
                    return Vec::new();
                }
                if lhs.len() > 1 && *op != AssignOp::Define {
                    self.error("parallel assignment is not supported; assigning in order");
                }
                let mut out = Vec::new();
                for (l, r) in lhs.iter().zip(rhs) {
                    out.push(self.assign_text(l, *op, r));
                }
                out
            }
            _ => Vec::new(),
        }
    }

    fn assign_text(&mut self, lhs: &Expr, op: AssignOp, rhs: &Expr) -> String {
        match op {
            AssignOp::Define => {
                let Some(name) = lhs.as_ident() else {
                    self.error("left side of := must be an identifier");
                    return String::new();
                };
                let typ = self.env.type_of(&self.scopes, rhs);
                let value = self.expr(rhs);
                if name == "_" {
                    return format!("_ = {}", value);
                }
                let keyword = if typ.is_pointer() { "let" } else { "var" };
                self.scopes.define(name, typ);
                format!("{} {} = {}", keyword, name, value)
            }
            AssignOp::Assign => {
                let typ = self.env.type_of(&self.scopes, lhs);
                let target = self.expr(lhs);
                let value = self.cast_literal(rhs, &typ);
                format!("{} = {}", target, value)
            }
            AssignOp::AndNot => {
                let target = self.expr(lhs);
                let value = self.unary_operand(rhs);
                format!("{} &= ~{}", target, value)
            }
            op => {
                let target = self.expr(lhs);
                let value = self.expr(rhs);
                format!("{} {} {}", target, op.as_str(), value)
            }
        }
    }

    /// A simple statement inside a `for` clause; buffers are read directly.
    fn inline_stmt(&mut self, s: &Stmt) -> String {
        let texts = self.simple_text(s);
        if texts.len() > 1 {
            self.error("only one assignment is allowed in a for clause");
        }
        texts.into_iter().next().unwrap_or_default()
    }

    fn decl_stmt(&mut self, gd: &'a GenDecl) {
        match gd.kind {
            DeclKind::Var => {
                for spec in &gd.specs {
                    let Spec::Value(vs) = spec else { continue };
                    let mut accesses = Vec::new();
                    for v in &vs.values {
                        self.collect_accesses(v, &mut accesses);
                    }
                    let temps = self.hoist(&accesses);
                    self.var_spec(vs, "var");
                    self.writebacks(&temps);
                    self.hoisted.clear();
                }
            }
            DeclKind::Const => self.const_specs(&gd.specs),
            DeclKind::Type => self.error("local type declarations are not supported"),
        }
    }

    // ------------------------------------------------------------------
    // Control flow

    fn return_stmt(&mut self, results: &'a [Expr]) {
        if results.len() > 1 {
            self.error("multiple return values are not supported");
        }
        let mut accesses = Vec::new();
        for r in results {
            self.collect_accesses(r, &mut accesses);
        }
        let temps = self.hoist(&accesses);
        let value = match (results.first(), self.results.first().cloned()) {
            (Some(r), Some(t)) => Some(self.cast_literal(r, &t)),
            (Some(r), None) => Some(self.expr(r)),
            (None, _) => None,
        };
        self.hoisted.clear();

        let mut pending: Vec<String> = temps
            .iter()
            .rev()
            .filter(|t| !t.read_only)
            .map(BufferTemp::writeback)
            .collect();
        pending.extend(
            self.get_vars
                .iter()
                .rev()
                .flat_map(|level| level.iter())
                .filter(|t| !t.read_only)
                .map(BufferTemp::writeback),
        );

        match value {
            Some(v) if !pending.is_empty() => {
                self.tmp_count += 1;
                let rv = format!("rv_{}", self.tmp_count);
                self.emit(format!("let {} = {};", rv, v));
                for w in pending {
                    self.emit(w);
                }
                self.emit(format!("return {};", rv));
            }
            Some(v) => self.emit(format!("return {};", v)),
            None => {
                for w in pending {
                    self.emit(w);
                }
                self.emit("return;");
            }
        }
    }

    fn branch_stmt(&mut self, tok: BranchTok, label: Option<&str>) {
        if let Some(label) = label {
            self.error(format!("labeled {} {} is not supported", tok.as_str(), label));
        }
        match tok {
            BranchTok::Break | BranchTok::Continue => self.emit(format!("{};", tok.as_str())),
            BranchTok::Fallthrough | BranchTok::Goto => {
                self.error(format!("{} is not supported", tok.as_str()));
            }
        }
    }

    /// Condition text without redundant outer parentheses.
    fn cond_text(&mut self, cond: &Expr) -> String {
        match cond {
            Expr::Paren(inner) => self.expr(inner),
            other => self.expr(other),
        }
    }

    /// Opens a `{` scope for an `if`/`switch` init statement.
    fn open_init(&mut self, init: &'a Stmt) {
        self.emit("{");
        self.indent += 1;
        self.scopes.push();
        self.stmt(init);
    }

    fn close_init(&mut self) {
        self.scopes.pop();
        self.indent -= 1;
        self.emit("}");
    }

    /// Prints an `if`; `chained` continues an `} else if` of the enclosing one.
    fn if_stmt(&mut self, s: &'a Stmt, chained: bool) {
        let StmtKind::If {
            init,
            cond,
            body,
            els,
        } = &s.kind
        else {
            return;
        };
        if let Some(init) = init {
            self.open_init(init);
        }
        let mut accesses = Vec::new();
        self.collect_accesses(cond, &mut accesses);
        self.hoist(&accesses);
        let c = self.cond_text(cond);
        self.hoisted.clear();
        if chained {
            self.emit(format!("}} else if ({}) {{", c));
        } else {
            self.emit(format!("if ({}) {{", c));
        }
        self.block_body(&body.stmts, body.end_line);
        match els.as_deref() {
            None => self.emit("}"),
            Some(e) => match &e.kind {
                StmtKind::If {
                    init: None, cond, ..
                } if !self.has_accesses(cond) => {
                    self.line = e.line;
                    self.if_stmt(e, true);
                }
                StmtKind::Block(b) => {
                    self.emit("} else {");
                    self.block_body(&b.stmts, b.end_line);
                    self.emit("}");
                }
                _ => {
                    self.emit("} else {");
                    self.indent += 1;
                    self.stmt(e);
                    self.indent -= 1;
                    self.emit("}");
                }
            },
        }
        if init.is_some() {
            self.close_init();
        }
    }

    fn clause_body(&mut self, clause: &'a CaseClause) {
        for s in &clause.body {
            if let StmtKind::Branch {
                tok: BranchTok::Fallthrough,
                ..
            } = s.kind
            {
                self.line = s.line;
                self.error("fallthrough is not supported");
            }
        }
        let end = clause.body.last().map_or(clause.line, |s| s.end_line);
        self.last_line = clause.line;
        self.block_body(&clause.body, end);
    }

    fn switch_stmt(&mut self, init: Option<&'a Stmt>, tag: Option<&'a Expr>, clauses: &'a [CaseClause]) {
        if let Some(init) = init {
            self.open_init(init);
        }
        let mut accesses = Vec::new();
        if let Some(tag) = tag {
            self.collect_accesses(tag, &mut accesses);
        }
        for clause in clauses {
            for e in &clause.list {
                self.collect_accesses(e, &mut accesses);
            }
        }
        self.hoist(&accesses);
        let tag_text = tag.map(|t| self.cond_text(t));
        let mut lists = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let mut list = Vec::with_capacity(clause.list.len());
            for e in &clause.list {
                let text = self.expr(e);
                list.push(match (tag, e) {
                    (None, Expr::Binary { .. }) if clause.list.len() > 1 => format!("({})", text),
                    _ => text,
                });
            }
            lists.push(list);
        }
        self.hoisted.clear();

        match tag_text {
            Some(tag) => {
                self.emit(format!("switch ({}) {{", tag));
                for (clause, list) in clauses.iter().zip(&lists) {
                    self.flush_comments(clause.line);
                    self.line = clause.line;
                    if clause.is_default {
                        self.emit("default: {");
                    } else {
                        self.emit(format!("case {}: {{", list.join(", ")));
                    }
                    self.clause_body(clause);
                    self.emit("}");
                }
                if !clauses.iter().any(|c| c.is_default) {
                    self.emit("default: {}");
                }
                self.emit("}");
            }
            None => {
                // a tagless switch is an if/else chain
                let mut first = true;
                for (clause, list) in clauses.iter().zip(&lists) {
                    if clause.is_default {
                        continue;
                    }
                    self.flush_comments(clause.line);
                    self.line = clause.line;
                    let cond = list.join(" || ");
                    if first {
                        self.emit(format!("if ({}) {{", cond));
                    } else {
                        self.emit(format!("}} else if ({}) {{", cond));
                    }
                    self.clause_body(clause);
                    first = false;
                }
                if let Some(default) = clauses.iter().find(|c| c.is_default) {
                    self.emit(if first { "{" } else { "} else {" });
                    self.clause_body(default);
                    first = false;
                }
                if !first {
                    self.emit("}");
                }
            }
        }
        if init.is_some() {
            self.close_init();
        }
    }

    /// `for i := range n` becomes a counted loop.
    fn range_stmt(&mut self, key: Option<&Expr>, has_value: bool, define: bool, expr: &Expr, body: &'a Block) {
        if has_value {
            self.error("range with a value variable is not supported; use an index loop");
        }
        let typ = self.env.type_of(&self.scopes, expr);
        let env = self.env;
        if matches!(env.underlying(typ.deref()), Type::Slice(_) | Type::Array(..)) {
            self.error("range over arrays and slices is not supported");
        }
        let n = self.expr(expr);
        let (key, fresh) = match key.and_then(Expr::as_ident).filter(|k| *k != "_") {
            Some(k) => (k.to_string(), define),
            None => {
                self.tmp_count += 1;
                (format!("_i{}", self.tmp_count), true)
            }
        };
        let typ = if typ.is_valid() { typ } else { Type::named("int") };
        let typ_text = self.type_text(&typ);
        self.scopes.push();
        self.scopes.define(&key, typ);
        if fresh {
            self.emit(format!(
                "for (var {k}: {t} = 0; {k} < {n}; {k}++) {{",
                k = key,
                t = typ_text,
                n = n
            ));
        } else {
            self.emit(format!("for ({k} = 0; {k} < {n}; {k}++) {{", k = key, n = n));
        }
        self.block_body(&body.stmts, body.end_line);
        self.emit("}");
        self.scopes.pop();
    }
}
