//! Syntax tree for the supported Go subset.
//!
//! Types are expressions, as in Go itself: `[]float32`, `*Params` and
//! `struct{...}` are all [`Expr`] variants, which keeps conversions such as
//! `float32(x)` and composite literal types uniform.

use super::lexer::Comment;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub name: String,
    pub package: String,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub name: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn line(&self) -> u32 {
        match self {
            Decl::Gen(d) => d.line,
            Decl::Func(d) => d.line,
        }
    }

    pub fn end_line(&self) -> u32 {
        match self {
            Decl::Gen(d) => d.end_line,
            Decl::Func(d) => d.end_line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Var,
    Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenDecl {
    pub kind: DeclKind,
    /// Doc comment lines directly above the declaration.
    pub doc: Vec<String>,
    pub specs: Vec<Spec>,
    /// Written with parentheses.
    pub grouped: bool,
    pub line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub doc: Vec<String>,
    pub names: Vec<String>,
    pub typ: Option<Expr>,
    pub values: Vec<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub doc: Vec<String>,
    pub name: String,
    /// `type A = B` rather than `type A B`.
    pub alias: bool,
    pub typ: Expr,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub names: Vec<String>,
    pub typ: Expr,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub doc: Vec<String>,
    pub recv: Option<Field>,
    pub name: String,
    pub typ: FuncType,
    pub body: Option<Block>,
    pub line: u32,
    pub end_line: u32,
}

impl FuncDecl {
    /// Receiver type name and whether it is a pointer receiver.
    pub fn recv_type(&self) -> Option<(&str, bool)> {
        let recv = self.recv.as_ref()?;
        match &recv.typ {
            Expr::Ident(name) => Some((name.as_str(), false)),
            Expr::Star(inner) => match inner.as_ref() {
                Expr::Ident(name) => Some((name.as_str(), true)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Name in the flat shader namespace: `Type_Method` for methods.
    pub fn flat_name(&self) -> String {
        match self.recv_type() {
            Some((typ, _)) => format!("{}_{}", typ, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub line: u32,
    /// Line of the closing brace.
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Empty,
    Decl(GenDecl),
    Expr(Expr),
    IncDec {
        expr: Expr,
        inc: bool,
    },
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    Return(Vec<Expr>),
    Branch {
        tok: BranchTok,
        label: Option<String>,
    },
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        els: Option<Box<Stmt>>,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        body: Block,
    },
    Labeled {
        label: String,
        stmt: Box<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    /// Empty for `default`.
    pub list: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTok {
    Break,
    Continue,
    Fallthrough,
    Goto,
}

impl BranchTok {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchTok::Break => "break",
            BranchTok::Continue => "continue",
            BranchTok::Fallthrough => "fallthrough",
            BranchTok::Goto => "goto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Define,
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Define => ":=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Quo => "/=",
            AssignOp::Rem => "%=",
            AssignOp::And => "&=",
            AssignOp::Or => "|=",
            AssignOp::Xor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::AndNot => "&^=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl BinaryOp {
    /// Go operator precedence (5 binds tightest).
    pub fn precedence(self) -> u8 {
        use BinaryOp::*;
        match self {
            LOr => 1,
            LAnd => 2,
            Eql | Neq | Lss | Leq | Gtr | Geq => 3,
            Add | Sub | Or | Xor => 4,
            Mul | Quo | Rem | Shl | Shr | And | AndNot => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Quo => "/",
            Rem => "%",
            And => "&",
            Or => "|",
            Xor => "^",
            Shl => "<<",
            Shr => ">>",
            AndNot => "&^",
            LAnd => "&&",
            LOr => "||",
            Eql => "==",
            Neq => "!=",
            Lss => "<",
            Leq => "<=",
            Gtr => ">",
            Geq => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Eql | Neq | Lss | Leq | Gtr | Geq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LAnd | BinaryOp::LOr)
    }

    /// Bitwise and shift operators, which WGSL will not mix with others
    /// without explicit parentheses.
    pub fn is_bitwise(self) -> bool {
        use BinaryOp::*;
        matches!(self, And | Or | Xor | Shl | Shr | AndNot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    Xor,
    Addr,
    Recv,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    BasicLit {
        kind: LitKind,
        value: String,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// Pointer dereference, or pointer type in type position.
    Star(Box<Expr>),
    Paren(Box<Expr>),
    Selector {
        expr: Box<Expr>,
        sel: String,
    },
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    /// Explicit generic instantiation `f[T, U]`.
    IndexList {
        expr: Box<Expr>,
        indices: Vec<Expr>,
    },
    Slice {
        expr: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    Composite {
        typ: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },
    StructType(Vec<Field>),
    FuncType(Box<FuncType>),
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    FuncLit {
        typ: Box<FuncType>,
        body: Block,
    },
    /// Unsupported construct kept for diagnostics.
    Bad(String),
}

impl Expr {
    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren(inner) => inner.unparen(),
            other => other,
        }
    }

    pub fn is_basic_lit(&self) -> bool {
        matches!(self, Expr::BasicLit { .. })
    }
}

impl fmt::Display for Expr {
    /// Writes the expression back in Go syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => f.write_str(name),
            Expr::BasicLit { value, .. } => f.write_str(value),
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.as_str(), rhs),
            Expr::Unary { op, expr } => {
                let op = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    UnaryOp::Not => "!",
                    UnaryOp::Xor => "^",
                    UnaryOp::Addr => "&",
                    UnaryOp::Recv => "<-",
                };
                write!(f, "{}{}", op, expr)
            }
            Expr::Star(inner) => write!(f, "*{}", inner),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::Selector { expr, sel } => write!(f, "{}.{}", expr, sel),
            Expr::Index { expr, index } => write!(f, "{}[{}]", expr, index),
            Expr::IndexList { expr, indices } => write!(f, "{}[{}]", expr, join(indices)),
            Expr::Slice { expr, low, high } => {
                write!(f, "{}[", expr)?;
                if let Some(low) = low {
                    write!(f, "{}", low)?;
                }
                f.write_str(":")?;
                if let Some(high) = high {
                    write!(f, "{}", high)?;
                }
                f.write_str("]")
            }
            Expr::Call { func, args, ellipsis } => {
                write!(f, "{}({}", func, join(args))?;
                if *ellipsis {
                    f.write_str("...")?;
                }
                f.write_str(")")
            }
            Expr::Composite { typ, elts } => {
                if let Some(typ) = typ {
                    write!(f, "{}", typ)?;
                }
                write!(f, "{{{}}}", join(elts))
            }
            Expr::KeyValue { key, value } => write!(f, "{}: {}", key, value),
            Expr::ArrayType { len, elem } => match len {
                Some(len) => write!(f, "[{}]{}", len, elem),
                None => write!(f, "[]{}", elem),
            },
            Expr::StructType(_) => f.write_str("struct{...}"),
            Expr::FuncType(_) | Expr::FuncLit { .. } => f.write_str("func(...)"),
            Expr::MapType { key, value } => write!(f, "map[{}]{}", key, value),
            Expr::Bad(text) => f.write_str(text),
        }
    }
}

fn join(list: &[Expr]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
