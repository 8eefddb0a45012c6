//! # WGSL Printer
//!
//! Walks a parsed Go file and prints it as WGSL. The same walk serves both
//! translation passes:
//!
//! - [`Mode::Graph`] visits every function body and records the call graph,
//!   the atomically used variables and the `//gosl:vars` buffer declarations
//!   in [`State`]. Its text output is discarded.
//! - [`Mode::Emit`] prints only the functions of one kernel's closure.
//!
//! Output is line oriented: the printer produces one `String` per output
//! line, carrying source comments over at their original positions so that
//! `//gosl:` region markers survive for the WGSL extractor.

mod expr;
mod stmt;
mod vars;

use crate::diag::Diagnostic;
use crate::directives::Directive;
use crate::error::Result;
use crate::go::ast::{Decl, DeclKind, Expr, FuncDecl, GenDecl, Spec, TypeSpec, ValueSpec};
use crate::go::lexer::Comment;
use crate::go::{File, Scopes, Type, TypeEnv};
use crate::state::State;
use std::collections::{BTreeSet, HashMap};

/// What a printer run is for.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// Build the call graph and the system variables.
    Graph,
    /// Print the given functions (a kernel closure).
    Emit(&'a BTreeSet<String>),
}

/// Result of printing one file.
#[derive(Debug, Default)]
pub struct Printed {
    pub lines: Vec<String>,
    pub diags: Vec<Diagnostic>,
}

/// Prints `file` in the given mode.
pub fn print_file(state: &mut State, env: &TypeEnv, file: &File, mode: Mode<'_>) -> Result<Printed> {
    let mut printer = Printer::new(state, env, file, mode);
    printer.file()?;
    Ok(Printed {
        lines: printer.lines,
        diags: printer.diags,
    })
}

/// A buffer element copied into a local temporary: either for one
/// statement, or for a whole block by `x := GetVar(idx)`.
#[derive(Debug, Clone)]
struct BufferTemp {
    var: String,
    read_only: bool,
    tmp: String,
    /// Index expression as printed.
    index: String,
}

impl BufferTemp {
    fn writeback(&self) -> String {
        format!("{}[{}] = {};", self.var, self.index, self.tmp)
    }
}

pub struct Printer<'a> {
    state: &'a mut State,
    env: &'a TypeEnv,
    file: &'a File,
    mode: Mode<'a>,

    lines: Vec<String>,
    indent: usize,
    next_comment: usize,
    /// Last source line accounted for, used to keep blank-line structure.
    last_line: u32,
    /// Line of the statement or declaration being printed.
    line: u32,
    nowgsl: Vec<(u32, u32)>,

    scopes: Scopes,
    func: Option<String>,
    results: Vec<Type>,
    iota: Option<usize>,
    tmp_count: usize,
    get_vars: Vec<Vec<BufferTemp>>,
    hoisted: HashMap<*const Expr, String>,

    diags: Vec<Diagnostic>,
}

impl<'a> Printer<'a> {
    pub fn new(state: &'a mut State, env: &'a TypeEnv, file: &'a File, mode: Mode<'a>) -> Self {
        Self {
            state,
            env,
            file,
            mode,
            lines: Vec::new(),
            indent: 0,
            next_comment: 0,
            last_line: 0,
            line: 0,
            nowgsl: nowgsl_ranges(&file.comments),
            scopes: Scopes::default(),
            func: None,
            results: Vec::new(),
            iota: None,
            tmp_count: 0,
            get_vars: Vec::new(),
            hoisted: HashMap::new(),
            diags: Vec::new(),
        }
    }

    fn graph_mode(&self) -> bool {
        matches!(self.mode, Mode::Graph)
    }

    fn file(&mut self) -> Result<()> {
        let file = self.file;
        self.lines.push(format!("package {}", file.package));
        self.lines.push(String::new());
        for decl in &file.decls {
            self.decl(decl)?;
        }
        self.flush_comments(u32::MAX);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Output

    fn emit(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", "\t".repeat(self.indent), text));
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let d = Diagnostic {
            file: self.file.name.clone(),
            line: self.line,
            message: message.into(),
        };
        tracing::debug!("[CODEGEN] {}", d);
        self.diags.push(d);
    }

    /// Inserts one blank line when the source had a gap before `line`.
    fn gap(&mut self, line: u32) {
        if self.last_line == 0 || line <= self.last_line + 1 {
            return;
        }
        let open = match self.lines.last() {
            None => true,
            Some(l) => l.is_empty() || l.trim_end().ends_with('{'),
        };
        if !open {
            self.lines.push(String::new());
        }
    }

    // ------------------------------------------------------------------
    // Comments

    /// Emits pending comments that start before `line`.
    fn flush_comments(&mut self, line: u32) {
        let file = self.file;
        while let Some(c) = file.comments.get(self.next_comment) {
            if c.line >= line {
                break;
            }
            self.next_comment += 1;
            self.gap(c.line);
            let mut parts = c.text.lines();
            if let Some(first) = parts.next() {
                self.emit(first);
            }
            self.lines.extend(parts.map(str::to_string));
            self.last_line = c.end_line;
        }
    }

    /// Appends comments trailing code on lines up to `line` to the last output line.
    fn trailing_comment(&mut self, line: u32) {
        let file = self.file;
        while let Some(c) = file.comments.get(self.next_comment) {
            if c.line > line || c.own_line || c.text.contains('\n') {
                break;
            }
            self.next_comment += 1;
            if let Some(last) = self.lines.last_mut() {
                last.push(' ');
                last.push_str(&c.text);
            }
        }
    }

    /// Drops comments inside a skipped range, keeping region markers above it.
    fn skip_comments(&mut self, first: u32, through: u32) {
        let file = self.file;
        while let Some(c) = file.comments.get(self.next_comment) {
            if c.line > through {
                break;
            }
            if c.line < first {
                self.flush_comments(c.line + 1);
                continue;
            }
            self.next_comment += 1;
        }
        self.last_line = through;
    }

    fn in_nowgsl(&self, line: u32) -> bool {
        self.nowgsl.iter().any(|&(start, end)| line > start && line < end)
    }

    // ------------------------------------------------------------------
    // Declarations

    fn decl(&mut self, decl: &'a Decl) -> Result<()> {
        self.line = decl.line();
        if self.in_nowgsl(decl.line()) {
            self.skip_comments(decl.line(), decl.end_line());
            return Ok(());
        }
        match decl {
            Decl::Gen(gd) => self.gen_decl(gd),
            Decl::Func(fd) => {
                self.func_decl(fd);
                Ok(())
            }
        }
    }

    fn gen_decl(&mut self, gd: &'a GenDecl) -> Result<()> {
        let system = gd.doc.iter().find_map(|d| match Directive::parse(d) {
            Some(Directive::Vars(system)) => Some(system),
            _ => None,
        });
        if let Some(system) = system {
            if self.graph_mode() {
                self.system_vars(gd, &system)?;
            }
            // buffers are declared by the kernel header, never printed here
            let first = gd.line.saturating_sub(gd.doc.len() as u32);
            self.skip_comments(first, gd.end_line);
            return Ok(());
        }

        match gd.kind {
            DeclKind::Type => {
                let single = gd.specs.len() == 1;
                for spec in &gd.specs {
                    if let Spec::Type(ts) = spec {
                        let end = if single { gd.end_line } else { ts.line };
                        self.type_spec(ts, end);
                    }
                }
            }
            DeclKind::Const => self.const_specs(&gd.specs),
            DeclKind::Var => {
                for spec in &gd.specs {
                    if let Spec::Value(vs) = spec {
                        self.flush_comments(vs.line);
                        self.gap(vs.line);
                        self.line = vs.line;
                        self.var_spec(vs, "var<private>");
                        self.trailing_comment(vs.line);
                        self.last_line = vs.line;
                    }
                }
            }
        }
        self.flush_comments(gd.end_line + 1);
        self.last_line = gd.end_line;
        Ok(())
    }

    fn type_spec(&mut self, ts: &TypeSpec, end_line: u32) {
        self.flush_comments(ts.line);
        self.gap(ts.line);
        self.line = ts.line;
        match &ts.typ {
            Expr::StructType(fields) => {
                self.emit(format!("struct {} {{", ts.name));
                self.trailing_comment(ts.line);
                self.indent += 1;
                for field in fields {
                    self.flush_comments(field.line);
                    self.line = field.line;
                    let typ = self.type_expr(&field.typ);
                    if field.names.is_empty() {
                        let name = match Type::from_expr(&field.typ).local_name() {
                            Some(n) => n.rsplit('.').next().unwrap_or(&n).to_string(),
                            None => typ.clone(),
                        };
                        self.emit(format!("{}: {},", name, typ));
                    }
                    for name in &field.names {
                        self.emit(format!("{}: {},", name, typ));
                    }
                    self.trailing_comment(field.line);
                    self.last_line = field.line;
                }
                self.flush_comments(end_line);
                self.indent -= 1;
                self.emit("}");
            }
            other => {
                let typ = self.type_expr(other);
                self.emit(format!("alias {} = {};", ts.name, typ));
                self.trailing_comment(ts.line);
            }
        }
        self.last_line = end_line;
    }

    /// Prints constant specs, enumerating `iota` and repeating implicit values.
    fn const_specs(&mut self, specs: &'a [Spec]) {
        let mut last_typ: Option<&'a Expr> = None;
        let mut last_values: &'a [Expr] = &[];
        for (iota, spec) in specs.iter().enumerate() {
            let Spec::Value(vs) = spec else { continue };
            self.flush_comments(vs.line);
            self.gap(vs.line);
            self.line = vs.line;
            if !vs.values.is_empty() {
                last_typ = vs.typ.as_ref();
                last_values = &vs.values;
            } else if vs.typ.is_some() {
                last_typ = vs.typ.as_ref();
            }
            self.iota = Some(iota);
            for (i, name) in vs.names.iter().enumerate() {
                let Some(value) = last_values.get(i) else {
                    self.error(format!("constant {} has no value", name));
                    continue;
                };
                let value = self.expr(value);
                match last_typ {
                    Some(t) => {
                        let t = self.type_expr(t);
                        self.emit(format!("const {}: {} = {};", name, t, value));
                    }
                    None => self.emit(format!("const {} = {};", name, value)),
                }
                if !self.scopes.is_global() {
                    let typ = last_typ.map_or(Type::Invalid, Type::from_expr);
                    self.scopes.define(name, typ);
                }
            }
            self.iota = None;
            self.trailing_comment(vs.line);
            self.last_line = vs.line;
        }
    }

    /// Prints one `var` spec with the given WGSL keyword (`var` or `var<private>`).
    fn var_spec(&mut self, vs: &ValueSpec, keyword: &str) {
        let declared = vs.typ.as_ref().map(Type::from_expr);
        let typ_text = vs.typ.as_ref().map(|t| self.type_expr(t));
        if !vs.values.is_empty() && vs.values.len() != vs.names.len() {
            self.error("multiple return values are not supported");
            return;
        }
        for (i, name) in vs.names.iter().enumerate() {
            let value = vs.values.get(i).map(|v| match &declared {
                Some(t) => self.cast_literal(v, t),
                None => self.expr(v),
            });
            let line = match (&typ_text, value) {
                (Some(t), Some(v)) => format!("{} {}: {} = {};", keyword, name, t, v),
                (Some(t), None) => format!("{} {}: {};", keyword, name, t),
                (None, Some(v)) => format!("{} {} = {};", keyword, name, v),
                (None, None) => {
                    self.error(format!("variable {} needs a type or a value", name));
                    continue;
                }
            };
            self.emit(line);
            if !self.scopes.is_global() {
                let typ = match (&declared, vs.values.get(i)) {
                    (Some(t), _) => t.clone(),
                    (None, Some(v)) => self.env.type_of(&self.scopes, v),
                    (None, None) => Type::Invalid,
                };
                self.scopes.define(name, typ);
            }
        }
    }

    fn excluded(&self, fd: &FuncDecl) -> bool {
        self.state.exclude.contains(&fd.name) || self.state.exclude.contains(&fd.flat_name())
    }

    fn func_decl(&mut self, fd: &'a FuncDecl) {
        let name = fd.flat_name();
        match self.mode {
            Mode::Graph => {
                self.state.recycle_func(&name);
            }
            Mode::Emit(funcs) => {
                if !funcs.contains(&name) || self.excluded(fd) {
                    let first = fd.line.saturating_sub(fd.doc.len() as u32);
                    self.skip_comments(first, fd.end_line);
                    return;
                }
            }
        }
        let Some(body) = &fd.body else {
            self.error(format!("function {} has no body", name));
            return;
        };
        tracing::debug!("[CODEGEN] fn {}", name);

        self.flush_comments(fd.line);
        self.gap(fd.line);
        self.line = fd.line;
        self.scopes.clear();
        self.scopes.push();
        self.tmp_count = 0;

        let mut params = Vec::new();
        if let Some(recv) = &fd.recv {
            let typ = Type::from_expr(&recv.typ);
            let name = recv.names.first().cloned().unwrap_or_else(|| "_recv".to_string());
            params.push(format!("{}: {}", name, self.type_text(&typ)));
            self.scopes.define(&name, typ);
        }
        let mut unnamed = 0;
        for field in &fd.typ.params {
            let typ = Type::from_expr(&field.typ);
            let text = self.type_text(&typ);
            if field.names.is_empty() {
                params.push(format!("_p{}: {}", unnamed, text));
                unnamed += 1;
            }
            for pname in &field.names {
                params.push(format!("{}: {}", pname, text));
                self.scopes.define(pname, typ.clone());
            }
        }

        self.results = fd
            .typ
            .results
            .iter()
            .flat_map(|f| std::iter::repeat(Type::from_expr(&f.typ)).take(f.names.len().max(1)))
            .collect();
        let results = self.results.clone();
        let ret = match results.as_slice() {
            [] => String::new(),
            [one] => format!(" -> {}", self.type_text(one)),
            _ => {
                self.error(format!("function {}: multiple return values are not supported", name));
                String::new()
            }
        };

        self.func = Some(name.clone());
        self.emit(format!("fn {}({}){} {{", name, params.join(", "), ret));
        self.trailing_comment(fd.line);
        self.last_line = body.line;
        self.block_body(&body.stmts, body.end_line);
        self.emit("}");
        self.func = None;
        self.results.clear();
        self.scopes.clear();
        self.last_line = fd.end_line;
    }
}

/// Line ranges opened by `//gosl:nowgsl` and closed by the next `//gosl:end`.
fn nowgsl_ranges(comments: &[Comment]) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    let mut open: Option<u32> = None;
    for c in comments.iter().filter(|c| c.own_line) {
        match (Directive::parse(&c.text), open) {
            (Some(Directive::NoWgsl), None) => open = Some(c.line),
            (Some(Directive::End), Some(start)) => {
                ranges.push((start, c.line));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        ranges.push((start, u32::MAX));
    }
    ranges
}

#[cfg(test)]
mod tests;
