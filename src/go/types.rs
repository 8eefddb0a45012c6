//! Package-level type environment.
//!
//! Collects the declared types, functions, methods, globals and constants of
//! every loaded file and answers the handful of type questions the printer
//! asks: what is the type of this expression, which struct field does this
//! selector name, what signature does this call target have.

use super::ast::{BinaryOp, Decl, DeclKind, Expr, Field, File, FuncType, LitKind, Spec, UnaryOp};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const BASIC_TYPES: &[&str] = &[
    "bool", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32",
    "uint64", "float32", "float64", "string", "byte", "rune",
];

pub fn is_basic(name: &str) -> bool {
    BASIC_TYPES.contains(&name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Basic or package-local named type.
    Named(String),
    /// Type from another package, e.g. `slbool.Bool`.
    Qualified { pkg: String, name: String },
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(String, Box<Type>),
    Struct(Vec<(String, Type)>),
    Func(Signature),
    /// Unknown, or an untyped expression the printer cannot resolve.
    Invalid,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<(String, Type)>,
    pub results: Vec<Type>,
}

impl Signature {
    pub fn from_ast(ft: &FuncType) -> Self {
        let mut params = Vec::new();
        for field in &ft.params {
            let typ = Type::from_expr(&field.typ);
            if field.names.is_empty() {
                params.push((String::new(), typ));
            } else {
                params.extend(field.names.iter().map(|n| (n.clone(), typ.clone())));
            }
        }
        let mut results = Vec::new();
        for field in &ft.results {
            let typ = Type::from_expr(&field.typ);
            results.extend(std::iter::repeat(typ).take(field.names.len().max(1)));
        }
        Self { params, results }
    }

    pub fn param(&self, idx: usize) -> Option<&Type> {
        self.params.get(idx).map(|(_, t)| t)
    }
}

impl Type {
    pub fn from_expr(e: &Expr) -> Type {
        match e {
            Expr::Ident(name) => Type::Named(name.clone()),
            Expr::Selector { expr, sel } => match expr.as_ref() {
                Expr::Ident(pkg) => Type::Qualified {
                    pkg: pkg.clone(),
                    name: sel.clone(),
                },
                _ => Type::Invalid,
            },
            Expr::Star(inner) => Type::Pointer(Box::new(Type::from_expr(inner))),
            Expr::Paren(inner) => Type::from_expr(inner),
            Expr::ArrayType { len: None, elem } => Type::Slice(Box::new(Type::from_expr(elem))),
            Expr::ArrayType { len: Some(len), elem } => {
                Type::Array(len.to_string(), Box::new(Type::from_expr(elem)))
            }
            Expr::StructType(fields) => Type::Struct(struct_fields(fields)),
            Expr::FuncType(ft) => Type::Func(Signature::from_ast(ft)),
            _ => Type::Invalid,
        }
    }

    pub fn named(name: &str) -> Type {
        Type::Named(name.to_string())
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Type::Invalid)
    }

    /// The pointee of a pointer, or the type itself.
    pub fn deref(&self) -> &Type {
        match self {
            Type::Pointer(inner) => inner,
            other => other,
        }
    }

    /// Name used for literal casts: `float32`, `Params`, `Bool`.
    pub fn local_name(&self) -> Option<String> {
        match self {
            Type::Named(name) => Some(name.clone()),
            Type::Qualified { pkg, name } => Some(format!("{}.{}", pkg, name)),
            Type::Pointer(inner) => inner.local_name(),
            _ => None,
        }
    }
}

fn struct_fields(fields: &[Field]) -> Vec<(String, Type)> {
    let mut out = Vec::new();
    for field in fields {
        let typ = Type::from_expr(&field.typ);
        if field.names.is_empty() {
            // embedded: the field is named after its type
            let name = match &typ {
                Type::Named(n) | Type::Qualified { name: n, .. } => n.clone(),
                Type::Pointer(inner) => inner.local_name().unwrap_or_default(),
                _ => String::new(),
            };
            out.push((name, typ));
        } else {
            out.extend(field.names.iter().map(|n| (n.clone(), typ.clone())));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub sig: Signature,
    /// Declared with a pointer receiver.
    pub ptr_recv: bool,
}

/// Lexical scopes of the function being printed.
#[derive(Debug, Default)]
pub struct Scopes {
    stack: Vec<HashMap<String, Type>>,
}

impl Scopes {
    pub fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn define(&mut self, name: &str, typ: Type) {
        if name == "_" {
            return;
        }
        if self.stack.is_empty() {
            self.push();
        }
        if let Some(top) = self.stack.last_mut() {
            top.insert(name.to_string(), typ);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.stack.iter().rev().find_map(|s| s.get(name))
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// No function scope is open.
    pub fn is_global(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Declarations of one package.
#[derive(Debug, Default)]
pub struct TypeEnv {
    pub types: BTreeMap<String, Type>,
    pub funcs: BTreeMap<String, Signature>,
    pub methods: BTreeMap<(String, String), Method>,
    pub globals: BTreeMap<String, Type>,
    pub consts: BTreeMap<String, Type>,
    /// Names bound by import declarations.
    pub packages: BTreeSet<String>,
}

impl TypeEnv {
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a File>) -> Self {
        let mut env = TypeEnv::default();
        for file in files {
            env.add_file(file);
        }
        env
    }

    pub fn add_file(&mut self, file: &File) {
        for imp in &file.imports {
            let name = imp
                .name
                .clone()
                .unwrap_or_else(|| imp.path.rsplit('/').next().unwrap_or(&imp.path).to_string());
            self.packages.insert(name);
        }
        for decl in &file.decls {
            match decl {
                Decl::Func(fd) => {
                    let sig = Signature::from_ast(&fd.typ);
                    match fd.recv_type() {
                        Some((recv, ptr_recv)) => {
                            self.methods
                                .insert((recv.to_string(), fd.name.clone()), Method { sig, ptr_recv });
                        }
                        None => {
                            self.funcs.insert(fd.name.clone(), sig);
                        }
                    }
                }
                Decl::Gen(gd) => match gd.kind {
                    DeclKind::Type => {
                        for spec in &gd.specs {
                            if let Spec::Type(ts) = spec {
                                self.types.insert(ts.name.clone(), Type::from_expr(&ts.typ));
                            }
                        }
                    }
                    DeclKind::Var => {
                        for spec in &gd.specs {
                            if let Spec::Value(vs) = spec {
                                for (i, name) in vs.names.iter().enumerate() {
                                    let typ = match (&vs.typ, vs.values.get(i)) {
                                        (Some(t), _) => Type::from_expr(t),
                                        (None, Some(v)) => self.type_of(&Scopes::default(), v),
                                        _ => Type::Invalid,
                                    };
                                    self.globals.insert(name.clone(), typ);
                                }
                            }
                        }
                    }
                    DeclKind::Const => {
                        let mut last: Option<Type> = None;
                        for spec in &gd.specs {
                            if let Spec::Value(vs) = spec {
                                let typ = match (&vs.typ, vs.values.first()) {
                                    (Some(t), _) => Type::from_expr(t),
                                    (None, Some(v)) => self.type_of(&Scopes::default(), v),
                                    (None, None) => last.clone().unwrap_or(Type::Invalid),
                                };
                                for name in &vs.names {
                                    self.consts.insert(name.clone(), typ.clone());
                                }
                                last = Some(typ);
                            }
                        }
                    }
                },
            }
        }
    }

    /// Follows named types to their definition.
    pub fn underlying<'a>(&'a self, mut t: &'a Type) -> &'a Type {
        for _ in 0..16 {
            match t {
                Type::Named(name) => match self.types.get(name) {
                    Some(def) => t = def,
                    None => return t,
                },
                _ => return t,
            }
        }
        t
    }

    /// Fields of a struct type, looking through one pointer.
    pub fn struct_fields<'a>(&'a self, t: &'a Type) -> Option<&'a [(String, Type)]> {
        match self.underlying(t.deref()) {
            Type::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn field_type(&self, t: &Type, name: &str) -> Option<Type> {
        self.struct_fields(t)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
    }

    /// Looks up a method on a named type or a pointer to one.
    pub fn method(&self, recv: &Type, name: &str) -> Option<(&str, &Method)> {
        let type_name = match recv.deref() {
            Type::Named(n) => n.as_str(),
            _ => return None,
        };
        self.methods
            .get_key_value(&(type_name.to_string(), name.to_string()))
            .map(|((t, _), m)| (t.as_str(), m))
    }

    /// Whether `name` refers to an imported package in the current scope.
    pub fn is_package(&self, scopes: &Scopes, name: &str) -> bool {
        scopes.lookup(name).is_none()
            && !self.globals.contains_key(name)
            && !self.consts.contains_key(name)
            && self.packages.contains(name)
    }

    pub fn is_type_name(&self, name: &str) -> bool {
        is_basic(name) || self.types.contains_key(name)
    }

    pub fn ident_type(&self, scopes: &Scopes, name: &str) -> Type {
        if let Some(t) = scopes.lookup(name) {
            return t.clone();
        }
        if let Some(t) = self.globals.get(name).or_else(|| self.consts.get(name)) {
            return t.clone();
        }
        if let Some(sig) = self.funcs.get(name) {
            return Type::Func(sig.clone());
        }
        match name {
            "true" | "false" => Type::named("bool"),
            _ => Type::Invalid,
        }
    }

    /// Best-effort static type of an expression.
    pub fn type_of(&self, scopes: &Scopes, e: &Expr) -> Type {
        match e {
            Expr::Ident(name) => self.ident_type(scopes, name),
            Expr::BasicLit { kind, .. } => match kind {
                LitKind::Int => Type::named("int"),
                LitKind::Float => Type::named("float64"),
                LitKind::Char => Type::named("int32"),
                LitKind::String => Type::named("string"),
            },
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() || op.is_logical() {
                    return Type::named("bool");
                }
                let lt = self.type_of(scopes, lhs);
                if matches!(op, BinaryOp::Shl | BinaryOp::Shr) || !is_untyped(lhs, &lt) {
                    return lt;
                }
                let rt = self.type_of(scopes, rhs);
                if rt.is_valid() {
                    rt
                } else {
                    lt
                }
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Addr => Type::Pointer(Box::new(self.type_of(scopes, expr))),
                UnaryOp::Not => Type::named("bool"),
                _ => self.type_of(scopes, expr),
            },
            Expr::Star(inner) => match self.type_of(scopes, inner) {
                Type::Pointer(elem) => *elem,
                _ => Type::Invalid,
            },
            Expr::Paren(inner) => self.type_of(scopes, inner),
            Expr::Selector { expr, sel } => {
                if let Expr::Ident(pkg) = expr.as_ref() {
                    if self.is_package(scopes, pkg) {
                        return Type::Invalid;
                    }
                }
                let base = self.type_of(scopes, expr);
                if let Some(t) = self.field_type(&base, sel) {
                    return t;
                }
                match self.method(&base, sel) {
                    Some((_, m)) => Type::Func(m.sig.clone()),
                    None => Type::Invalid,
                }
            }
            Expr::Index { expr, .. } => self.elem_type(&self.type_of(scopes, expr)),
            Expr::Slice { expr, .. } => self.type_of(scopes, expr),
            Expr::Call { func, args, .. } => self.call_type(scopes, func, args),
            Expr::Composite { typ: Some(t), .. } => Type::from_expr(t),
            Expr::ArrayType { .. } | Expr::StructType(_) => Type::from_expr(e),
            _ => Type::Invalid,
        }
    }

    fn elem_type(&self, t: &Type) -> Type {
        match self.underlying(t.deref()) {
            Type::Slice(elem) | Type::Array(_, elem) => (**elem).clone(),
            _ => Type::Invalid,
        }
    }

    fn call_type(&self, scopes: &Scopes, func: &Expr, args: &[Expr]) -> Type {
        match func.unparen() {
            Expr::Ident(name) => {
                if scopes.lookup(name).is_none() && self.is_type_name(name) {
                    return Type::Named(name.clone());
                }
                match name.as_str() {
                    "len" | "cap" => return Type::named("int"),
                    "min" | "max" => {
                        return args
                            .first()
                            .map_or(Type::Invalid, |a| self.type_of(scopes, a))
                    }
                    _ => {}
                }
                match self.ident_type(scopes, name) {
                    Type::Func(sig) => sig.results.into_iter().next().unwrap_or(Type::Invalid),
                    _ => Type::Invalid,
                }
            }
            Expr::Selector { expr, sel } => {
                if let Expr::Ident(pkg) = expr.as_ref() {
                    if self.is_package(scopes, pkg) {
                        return package_call_type(scopes, self, sel, args);
                    }
                }
                match self.type_of(scopes, func) {
                    Type::Func(sig) => sig.results.into_iter().next().unwrap_or(Type::Invalid),
                    _ => Type::Invalid,
                }
            }
            Expr::ArrayType { .. } | Expr::Star(_) => Type::from_expr(func.unparen()),
            other => match self.type_of(scopes, other) {
                Type::Func(sig) => sig.results.into_iter().next().unwrap_or(Type::Invalid),
                _ => Type::Invalid,
            },
        }
    }
}

fn package_call_type(scopes: &Scopes, env: &TypeEnv, func: &str, args: &[Expr]) -> Type {
    match func {
        "Float32frombits" => Type::named("float32"),
        "Float32bits" => Type::named("uint32"),
        _ => args
            .first()
            .map_or(Type::Invalid, |a| env.type_of(scopes, a)),
    }
}

fn is_untyped(e: &Expr, t: &Type) -> bool {
    e.unparen().is_basic_lit() || !t.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::parser::{parse_expr, parse_file};

    const SRC: &str = r#"package p

import "cogentcore.org/core/math32"

type Params struct {
	A, B float32
	N    int32
	Sub  SubParams
}

type SubParams struct {
	X float32
}

type Mode int32

const (
	ModeA Mode = iota
	ModeB
)

var Data []float32

func (ps *Params) Sum(x float32) float32 {
	return ps.A + x
}

func Half(x float32) float32 {
	return x * 0.5
}
"#;

    fn env() -> TypeEnv {
        TypeEnv::from_files([&parse_file("p.go", SRC).unwrap()])
    }

    fn ty(env: &TypeEnv, scopes: &Scopes, src: &str) -> Type {
        env.type_of(scopes, &parse_expr(src).unwrap())
    }

    #[test]
    fn collects_declarations() {
        let env = env();
        assert!(env.packages.contains("math32"));
        assert_eq!(env.consts["ModeB"], Type::named("Mode"));
        assert_eq!(
            env.globals["Data"],
            Type::Slice(Box::new(Type::named("float32")))
        );
        let (recv, m) = env.method(&Type::named("Params"), "Sum").unwrap();
        assert_eq!(recv, "Params");
        assert!(m.ptr_recv);
    }

    #[test]
    fn expression_types() {
        let env = env();
        let mut scopes = Scopes::default();
        scopes.push();
        scopes.define("ps", Type::Pointer(Box::new(Type::named("Params"))));
        scopes.define("i", Type::named("int"));
        assert_eq!(ty(&env, &scopes, "ps.Sub.X"), Type::named("float32"));
        assert_eq!(ty(&env, &scopes, "ps.N + 1"), Type::named("int32"));
        assert_eq!(ty(&env, &scopes, "1 + ps.N"), Type::named("int32"));
        assert_eq!(ty(&env, &scopes, "Data[i]"), Type::named("float32"));
        assert_eq!(ty(&env, &scopes, "ps.Sum(1)"), Type::named("float32"));
        assert_eq!(ty(&env, &scopes, "Half(2)"), Type::named("float32"));
        assert_eq!(ty(&env, &scopes, "uint32(i)"), Type::named("uint32"));
        assert_eq!(ty(&env, &scopes, "math32.Sqrt(ps.A)"), Type::named("float32"));
        assert_eq!(ty(&env, &scopes, "i < 3"), Type::named("bool"));
    }

    #[test]
    fn locals_shadow_packages() {
        let env = env();
        let mut scopes = Scopes::default();
        assert!(env.is_package(&scopes, "math32"));
        scopes.define("math32", Type::named("int"));
        assert!(!env.is_package(&scopes, "math32"));
    }
}
