//! Expression and type printing.

use super::Printer;
use crate::go::ast::{BinaryOp, Expr, LitKind, UnaryOp};
use crate::go::types::{is_basic, Signature};
use crate::go::Type;
use crate::state::Var;

/// Vector field order for keyed literals of vector types.
const VECTOR_FIELDS: [&str; 4] = ["X", "Y", "Z", "W"];

impl<'a> Printer<'a> {
    /// A global buffer variable, unless `name` is shadowed by a local.
    pub(super) fn buffer_var(&self, name: &str) -> Option<Var> {
        if self.scopes.lookup(name).is_some() {
            return None;
        }
        self.state.global_var(name).cloned()
    }

    fn is_get_var(&self, name: &str) -> bool {
        self.get_vars.iter().flatten().any(|t| t.tmp == name)
    }

    fn is_pointer_ident(&self, name: &str) -> bool {
        !self.is_get_var(name) && self.scopes.lookup(name).is_some_and(Type::is_pointer)
    }

    pub(super) fn is_atomic_call(&self, func: &Expr) -> bool {
        match func.unparen() {
            Expr::Selector { expr, .. } => {
                expr.as_ident() == Some("atomic") && self.env.is_package(&self.scopes, "atomic")
            }
            _ => false,
        }
    }

    pub(super) fn is_tensor_call(&self, func: &Expr) -> bool {
        match func.unparen() {
            Expr::Selector { expr, .. } => expr
                .as_ident()
                .and_then(|name| self.buffer_var(name))
                .is_some_and(|v| v.tensor),
            _ => false,
        }
    }

    /// Records a call edge from the function being printed.
    fn add_call(&mut self, callee: &str) {
        if !self.graph_mode() {
            return;
        }
        if let Some(cur) = self.func.clone() {
            self.state.recycle_func(&cur).funcs.insert(callee.to_string());
        }
    }

    pub(super) fn expr(&mut self, e: &Expr) -> String {
        if let Some(tmp) = self.hoisted.get(&(e as *const Expr)) {
            return tmp.clone();
        }
        match e {
            Expr::Ident(name) => self.ident(name),
            Expr::BasicLit { kind, value } => match kind {
                LitKind::Int | LitKind::Float => value.replace('_', ""),
                LitKind::Char | LitKind::String => {
                    self.error(format!("string and character literals are not supported: {}", value));
                    value.clone()
                }
            },
            Expr::Binary { op, lhs, rhs } => {
                let l = self.operand(lhs, *op);
                if *op == BinaryOp::AndNot {
                    let r = self.unary_operand(rhs);
                    return format!("{} & ~{}", l, r);
                }
                let r = self.operand(rhs, *op);
                format!("{} {} {}", l, op.as_str(), r)
            }
            Expr::Unary { op, expr } => {
                let x = self.unary_operand(expr);
                match op {
                    UnaryOp::Neg => format!("-{}", x),
                    UnaryOp::Pos => x,
                    UnaryOp::Not => format!("!{}", x),
                    UnaryOp::Xor => format!("~{}", x),
                    UnaryOp::Addr => format!("&{}", x),
                    UnaryOp::Recv => {
                        self.error("channel receive is not supported");
                        x
                    }
                }
            }
            Expr::Star(inner) => format!("*{}", self.unary_operand(inner)),
            Expr::Paren(inner) => format!("({})", self.expr(inner)),
            Expr::Selector { expr, sel } => self.selector(expr, sel),
            Expr::Index { expr, index } => {
                let base = match expr.as_ref() {
                    Expr::Ident(n) if self.is_pointer_ident(n) => format!("(*{})", n),
                    other => self.primary(other),
                };
                format!("{}[{}]", base, self.expr(index))
            }
            Expr::Call { func, args, .. } => self.call(func, args),
            Expr::Composite { typ: Some(typ), elts } => {
                let typ = Type::from_expr(typ);
                self.composite(&typ, elts)
            }
            Expr::Composite { typ: None, .. } => {
                self.error("composite literal without a type");
                e.to_string()
            }
            Expr::ArrayType { .. } | Expr::StructType(_) => self.type_expr(e),
            Expr::KeyValue { .. } => {
                self.error("key: value outside of a composite literal");
                e.to_string()
            }
            Expr::IndexList { .. } => {
                self.error("generic instantiation is not supported");
                e.to_string()
            }
            Expr::Slice { .. } => {
                self.error("slice expressions are not supported");
                e.to_string()
            }
            Expr::MapType { .. } => {
                self.error("maps are not supported");
                e.to_string()
            }
            Expr::FuncType(_) | Expr::FuncLit { .. } => {
                self.error("function literals are not supported");
                e.to_string()
            }
            Expr::Bad(text) => {
                self.error(format!("unsupported expression: {}", text));
                text.clone()
            }
        }
    }

    fn ident(&mut self, name: &str) -> String {
        if self.scopes.lookup(name).is_some() {
            return name.to_string();
        }
        match name {
            "int" => "i32".to_string(),
            "uint" => "u32".to_string(),
            "iota" => match self.iota {
                Some(n) => n.to_string(),
                None => {
                    self.error("iota outside of a constant declaration");
                    "0".to_string()
                }
            },
            "nil" => {
                self.error("nil is not supported");
                name.to_string()
            }
            _ => name.to_string(),
        }
    }

    /// Operand of a binary expression, parenthesized where WGSL needs it.
    fn operand(&mut self, e: &Expr, parent: BinaryOp) -> String {
        let text = self.expr(e);
        match e {
            Expr::Binary { op, .. } if needs_parens(*op, parent) => format!("({})", text),
            _ => text,
        }
    }

    /// Operand of a prefix operator.
    pub(super) fn unary_operand(&mut self, e: &Expr) -> String {
        let hoisted = self.hoisted.contains_key(&(e as *const Expr));
        let text = self.expr(e);
        match e {
            Expr::Binary { .. } | Expr::Unary { .. } | Expr::Star(_) if !hoisted => format!("({})", text),
            _ => text,
        }
    }

    /// Base of a selector, index or call.
    fn primary(&mut self, e: &Expr) -> String {
        self.unary_operand(e)
    }

    fn selector(&mut self, base: &Expr, sel: &str) -> String {
        if let Expr::Ident(name) = base {
            if self.env.is_package(&self.scopes, name) {
                return format!("{}.{}", name, sel);
            }
            if self.is_pointer_ident(name) {
                return format!("(*{}).{}", name, sel);
            }
        }
        format!("{}.{}", self.primary(base), sel)
    }

    // ------------------------------------------------------------------
    // Calls

    fn call(&mut self, func: &Expr, args: &[Expr]) -> String {
        match func.unparen() {
            Expr::Ident(name) => self.func_call(name, args),
            Expr::Selector { expr: base, sel } => {
                if let Expr::Ident(name) = base.as_ref() {
                    if self.env.is_package(&self.scopes, name) {
                        return self.package_call(name, sel, args);
                    }
                    if let Some(var) = self.buffer_var(name).filter(|v| v.tensor) {
                        return self.tensor_method(&var, sel, args);
                    }
                }
                self.method_call(base, sel, args)
            }
            conv @ (Expr::ArrayType { .. } | Expr::Star(_)) => {
                let typ = self.type_expr(conv);
                let args = self.args(args);
                format!("{}({})", typ, args.join(", "))
            }
            other => {
                self.error(format!("unsupported call of {}", other));
                let f = self.expr(other);
                let args = self.args(args);
                format!("{}({})", f, args.join(", "))
            }
        }
    }

    fn args(&mut self, args: &[Expr]) -> Vec<String> {
        args.iter().map(|a| self.expr(a)).collect()
    }

    /// Arguments for a call with a known signature: literals are cast to the
    /// parameter type and `GetVar` locals are passed by address.
    fn fix_args(&mut self, sig: Option<&Signature>, args: &[Expr]) -> Vec<String> {
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let param = sig.and_then(|s| s.param(i));
            let text = match (arg.unparen(), param) {
                (Expr::Ident(n), Some(p)) if p.is_pointer() && self.is_get_var(n) => format!("&{}", n),
                (_, Some(p)) => self.cast_literal(arg, p),
                (_, None) => self.expr(arg),
            };
            out.push(text);
        }
        out
    }

    fn func_call(&mut self, name: &str, args: &[Expr]) -> String {
        let env = self.env;
        let local = self.scopes.lookup(name).is_some();
        if !local {
            if env.is_type_name(name) {
                let typ = self.type_text(&Type::named(name));
                let args = self.args(args);
                return format!("{}({})", typ, args.join(", "));
            }
            match name {
                "min" | "max" => {
                    let args = self.args(args);
                    return format!("{}({})", name, args.join(", "));
                }
                "len" => {
                    if let Some(Expr::Ident(var)) = args.first().map(Expr::unparen) {
                        if self.buffer_var(var).is_some() {
                            return format!("i32(arrayLength(&{}))", var);
                        }
                    }
                    self.error("len is only supported on global buffer variables");
                    return "0".to_string();
                }
                "append" | "cap" | "clear" | "close" | "complex" | "copy" | "delete" | "imag"
                | "make" | "new" | "panic" | "print" | "println" | "real" | "recover" => {
                    self.error(format!("builtin {} is not supported", name));
                    let args = self.args(args);
                    return format!("{}({})", name, args.join(", "));
                }
                _ => {}
            }
            if let Some(var) = self.state.get_func_var(name).cloned() {
                let index = match args.first() {
                    Some(a) => self.expr(a),
                    None => {
                        self.error(format!("{} requires an index argument", name));
                        String::new()
                    }
                };
                return format!("{}[{}]", var.name, index);
            }
        }
        self.add_call(name);
        let args = self.fix_args(env.funcs.get(name), args);
        format!("{}({})", name, args.join(", "))
    }

    fn package_call(&mut self, pkg: &str, sel: &str, args: &[Expr]) -> String {
        if pkg == "atomic" {
            return self.atomic_call(sel, args);
        }
        let args = self.args(args);
        format!("{}.{}({})", pkg, sel, args.join(", "))
    }

    /// `atomic.AddInt32(&X[i], v)` becomes `atomicAdd(&X[i], v)` on the
    /// buffer itself, which is then declared with an atomic element type.
    fn atomic_call(&mut self, sel: &str, args: &[Expr]) -> String {
        let op = sel.trim_end_matches("Int32").trim_end_matches("Uint32");
        let func = match op {
            "Add" => "atomicAdd",
            "Load" => "atomicLoad",
            "Store" => "atomicStore",
            "Swap" => "atomicExchange",
            "Or" => "atomicOr",
            "And" => "atomicAnd",
            _ => {
                self.error(format!("atomic.{} is not supported", sel));
                "atomicAdd"
            }
        };
        if let Some(Expr::Unary {
            op: UnaryOp::Addr,
            expr,
        }) = args.first().map(Expr::unparen)
        {
            match root_ident(expr).filter(|name| self.buffer_var(name).is_some()) {
                Some(var) => {
                    if self.graph_mode() {
                        if let Some(cur) = self.func.clone() {
                            self.state.recycle_func(&cur).atomics.insert(var.to_string());
                        }
                    }
                }
                None => self.error(format!("atomic.{} must address a global variable", sel)),
            }
        }
        let args = self.args(args);
        format!("{}({})", func, args.join(", "))
    }

    /// Tensor accessor methods index the flat buffer through the generated
    /// `Index...D` helper, which reads the strides from the buffer header.
    fn tensor_method(&mut self, var: &Var, method: &str, args: &[Expr]) -> String {
        let method = method.strip_suffix("1D").unwrap_or(method);
        let (op, first_index) = match method {
            "Value" => (None, 0),
            "Set" => (Some("="), 1),
            "SetAdd" => (Some("+="), 1),
            "SetSub" => (Some("-="), 1),
            "SetMul" => (Some("*="), 1),
            "SetDiv" => (Some("/="), 1),
            _ => {
                self.error(format!("tensor method {}.{} is not supported", var.name, method));
                return String::new();
            }
        };
        let indices = &args[first_index.min(args.len())..];
        if var.tensor_dims > 0 && indices.len() != var.tensor_dims {
            self.error(format!(
                "{}.{} takes {} indices, got {}",
                var.name,
                method,
                var.tensor_dims,
                indices.len()
            ));
        }
        let mut parts: Vec<String> = (0..var.tensor_dims)
            .map(|d| format!("{}[{}]", var.name, d))
            .collect();
        for idx in indices {
            let idx = match idx.unparen() {
                Expr::Call { func, args, .. } if func.as_ident() == Some("int") && args.len() == 1 => &args[0],
                other => other,
            };
            parts.push(format!("u32({})", self.expr(idx)));
        }
        let element = format!("{}[{}({})]", var.name, var.index_func(), parts.join(", "));
        match op {
            None => element,
            Some(op) => {
                let value = match args.first() {
                    Some(v) => self.expr(v),
                    None => {
                        self.error(format!("{}.{} requires a value", var.name, method));
                        String::new()
                    }
                };
                format!("{} {} {}", element, op, value)
            }
        }
    }

    /// `x.M(args)` becomes `T_M(recv, args)`.
    fn method_call(&mut self, base: &Expr, sel: &str, args: &[Expr]) -> String {
        let env = self.env;
        let recv_type = env.type_of(&self.scopes, base);
        let Some((type_name, method)) = env.method(&recv_type, sel) else {
            self.error(format!("cannot resolve method {} of {}", sel, base));
            let b = self.primary(base);
            let args = self.args(args);
            return format!("{}.{}({})", b, sel, args.join(", "));
        };
        let flat = format!("{}_{}", type_name, sel);
        self.add_call(&flat);
        let mut parts = vec![self.receiver(base, &recv_type, method.ptr_recv)];
        parts.extend(self.fix_args(Some(&method.sig), args));
        format!("{}({})", flat, parts.join(", "))
    }

    fn receiver(&mut self, base: &Expr, typ: &Type, ptr_recv: bool) -> String {
        let base = base.unparen();
        if let Expr::Ident(name) = base {
            let pointer = self.is_pointer_ident(name);
            return match (pointer, ptr_recv) {
                (true, true) | (false, false) => name.clone(),
                (true, false) => format!("*{}", name),
                (false, true) => format!("&{}", name),
            };
        }
        if !is_field_path(base) {
            self.error(format!(
                "method receiver {} must be a variable or a chain of field selectors",
                base
            ));
        }
        let text = self.expr(base);
        match (typ.is_pointer(), ptr_recv) {
            (true, true) | (false, false) => text,
            (true, false) => format!("*{}", text),
            (false, true) => format!("&{}", text),
        }
    }

    // ------------------------------------------------------------------
    // Literals and types

    /// Prints `e`, casting a bare numeric literal to `typ`.
    pub(super) fn cast_literal(&mut self, e: &Expr, typ: &Type) -> String {
        let literal = match e.unparen() {
            Expr::BasicLit {
                kind: LitKind::Int | LitKind::Float,
                ..
            } => true,
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => matches!(
                expr.unparen(),
                Expr::BasicLit {
                    kind: LitKind::Int | LitKind::Float,
                    ..
                }
            ),
            _ => false,
        };
        let value = self.expr(e);
        if !literal || !self.is_numeric(typ) {
            return value;
        }
        let typ = self.type_text(typ.deref());
        format!("{}({})", typ, value)
    }

    fn is_numeric(&self, typ: &Type) -> bool {
        match self.env.underlying(typ.deref()) {
            Type::Named(n) => is_basic(n) && !matches!(n.as_str(), "bool" | "string"),
            Type::Qualified { pkg, name } => pkg == "slbool" && name == "Bool",
            _ => false,
        }
    }

    /// Composite literals become constructor calls with the fields in
    /// declaration order; omitted fields get their zero value.
    pub(super) fn composite(&mut self, typ: &Type, elts: &[Expr]) -> String {
        let env = self.env;
        let name = self.type_text(typ);
        let mut parts = Vec::with_capacity(elts.len());
        match env.underlying(typ) {
            Type::Struct(fields) => {
                if elts.iter().any(|e| matches!(e, Expr::KeyValue { .. })) {
                    for (field, ftype) in fields {
                        match keyed_value(elts, field) {
                            Some(v) => parts.push(self.element(v, ftype)),
                            None => {
                                let zero = self.type_text(ftype);
                                parts.push(format!("{}()", zero));
                            }
                        }
                    }
                } else {
                    if elts.len() != fields.len() {
                        self.error(format!("{} literal needs all {} fields", name, fields.len()));
                    }
                    for (e, (_, ftype)) in elts.iter().zip(fields) {
                        parts.push(self.element(e, ftype));
                    }
                }
            }
            Type::Array(_, elem) => {
                for e in elts {
                    parts.push(self.element(e, elem));
                }
            }
            Type::Qualified { .. } => {
                if elts.iter().any(|e| matches!(e, Expr::KeyValue { .. })) {
                    for field in VECTOR_FIELDS {
                        if let Some(v) = keyed_value(elts, field) {
                            parts.push(self.expr(v));
                        }
                    }
                } else {
                    parts = self.args(elts);
                }
            }
            Type::Slice(_) => {
                self.error("slice literals are not supported");
            }
            _ => {
                self.error(format!("unsupported composite literal of type {}", name));
            }
        }
        format!("{}({})", name, parts.join(", "))
    }

    fn element(&mut self, e: &Expr, typ: &Type) -> String {
        match e {
            Expr::Composite { typ: None, elts } => self.composite(typ, elts),
            _ => self.cast_literal(e, typ),
        }
    }

    pub(super) fn type_expr(&mut self, e: &Expr) -> String {
        let typ = Type::from_expr(e);
        self.type_text(&typ)
    }

    /// WGSL spelling of a type, before the final `float32 -> f32` style edits.
    pub(super) fn type_text(&mut self, typ: &Type) -> String {
        match typ {
            Type::Named(n) => match n.as_str() {
                "int" => "i32".to_string(),
                "uint" => "u32".to_string(),
                _ => n.clone(),
            },
            Type::Qualified { pkg, name } => format!("{}.{}", pkg, name),
            Type::Pointer(inner) => format!("ptr<function,{}>", self.type_text(inner)),
            Type::Slice(elem) => format!("array<{}>", self.type_text(elem)),
            Type::Array(len, elem) => format!("array<{}, {}>", self.type_text(elem), len),
            Type::Struct(_) => {
                self.error("anonymous struct types are not supported");
                "struct".to_string()
            }
            Type::Func(_) => {
                self.error("function types are not supported");
                "fn".to_string()
            }
            Type::Invalid => {
                self.error("unsupported type");
                "invalid".to_string()
            }
        }
    }
}

/// Whether a child binary expression needs parentheses under `parent`.
fn needs_parens(child: BinaryOp, parent: BinaryOp) -> bool {
    if matches!(parent, BinaryOp::Shl | BinaryOp::Shr) {
        return true;
    }
    if child == parent {
        return false;
    }
    child.is_bitwise()
        || parent.is_bitwise()
        || (child.is_logical() && parent.is_logical())
        || (child.is_comparison() && parent.is_comparison())
}

fn keyed_value<'e>(elts: &'e [Expr], field: &str) -> Option<&'e Expr> {
    elts.iter().find_map(|e| match e {
        Expr::KeyValue { key, value } if key.as_ident() == Some(field) => Some(value.as_ref()),
        _ => None,
    })
}

/// The variable at the root of an index or selector chain.
fn root_ident(e: &Expr) -> Option<&str> {
    match e.unparen() {
        Expr::Ident(name) => Some(name),
        Expr::Index { expr, .. } | Expr::Selector { expr, .. } => root_ident(expr),
        _ => None,
    }
}

/// A variable followed by field selections or indexing.
fn is_field_path(e: &Expr) -> bool {
    match e.unparen() {
        Expr::Ident(_) => true,
        Expr::Selector { expr, .. } | Expr::Index { expr, .. } => is_field_path(expr),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parens_between_mixed_operators() {
        assert!(needs_parens(BinaryOp::And, BinaryOp::Add));
        assert!(needs_parens(BinaryOp::Add, BinaryOp::Shl));
        assert!(needs_parens(BinaryOp::LAnd, BinaryOp::LOr));
        assert!(needs_parens(BinaryOp::Lss, BinaryOp::Eql));
        assert!(!needs_parens(BinaryOp::Mul, BinaryOp::Add));
        assert!(!needs_parens(BinaryOp::Or, BinaryOp::Or));
    }

    #[test]
    fn chains() {
        let e = crate::go::parse_expr("a.b[i].c").unwrap();
        assert!(is_field_path(&e));
        assert_eq!(root_ident(&e), Some("a"));
        let call = crate::go::parse_expr("f(x).c").unwrap();
        assert!(!is_field_path(&call));
    }
}
