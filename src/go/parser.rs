//! Recursive-descent parser for the supported Go subset.

use super::ast::*;
use super::lexer::{lex, Comment, Tok, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

type PResult<T> = Result<T, ParseError>;

/// Parses one Go source file.
pub fn parse_file(name: &str, src: &str) -> PResult<File> {
    let lexed = lex(src).map_err(|e| ParseError {
        line: e.line,
        message: format!("invalid token {:?}", e.text),
    })?;
    let mut p = Parser {
        toks: lexed.tokens,
        pos: 0,
        comments: lexed.comments,
        expr_lev: 0,
    };
    p.file(name)
}

/// Parses a standalone expression.
pub fn parse_expr(src: &str) -> PResult<Expr> {
    let lexed = lex(src).map_err(|e| ParseError {
        line: e.line,
        message: format!("invalid token {:?}", e.text),
    })?;
    let mut p = Parser {
        toks: lexed.tokens,
        pos: 0,
        comments: lexed.comments,
        expr_lev: 0,
    };
    p.expr()
}

enum Simple {
    Stmt(Stmt),
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        line: u32,
    },
}

struct Parser {
    toks: Vec<Token>,
    pos: usize,
    comments: Vec<Comment>,
    /// < 0 inside control clauses, where `T{` does not start a composite literal.
    expr_lev: i32,
}

impl Parser {
    fn peek(&self) -> Tok {
        self.toks[self.pos].kind
    }

    fn peek_at(&self, n: usize) -> Tok {
        self.toks
            .get(self.pos + n)
            .map_or(Tok::Eof, |t| t.kind)
    }

    fn line(&self) -> u32 {
        self.toks[self.pos].line
    }

    fn prev_line(&self) -> u32 {
        self.toks[self.pos.saturating_sub(1)].line
    }

    fn next(&mut self) -> Token {
        let tok = self.toks[self.pos].clone();
        if tok.kind != Tok::Eof {
            self.pos += 1;
        }
        tok
    }

    fn got(&mut self, kind: Tok) -> bool {
        if self.peek() == kind {
            self.next();
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> PResult<T> {
        Err(ParseError {
            line: self.line(),
            message: message.into(),
        })
    }

    fn expect(&mut self, kind: Tok) -> PResult<Token> {
        if self.peek() == kind {
            Ok(self.next())
        } else {
            let found = &self.toks[self.pos];
            let text = if found.text == "\n" {
                "newline".to_string()
            } else if found.kind == Tok::Eof {
                "EOF".to_string()
            } else {
                found.text.clone()
            };
            self.error(format!("expected {:?}, found {}", kind, text))
        }
    }

    fn ident(&mut self) -> PResult<String> {
        Ok(self.expect(Tok::Ident)?.text)
    }

    /// Statement terminator: a semicolon, optional before `)` and `}`.
    fn semi(&mut self) -> PResult<()> {
        match self.peek() {
            Tok::RParen | Tok::RBrace | Tok::Eof => Ok(()),
            _ => self.expect(Tok::Semicolon).map(|_| ()),
        }
    }

    /// Own-line comments directly above `line`, closest last.
    fn doc(&self, line: u32) -> Vec<String> {
        let mut doc = Vec::new();
        let mut want = line;
        for c in self.comments.iter().rev() {
            if c.line >= line {
                continue;
            }
            if c.end_line + 1 != want || !c.own_line {
                if c.end_line + 1 < want {
                    break;
                }
                continue;
            }
            doc.push(c.text.clone());
            want = c.line;
        }
        doc.reverse();
        doc
    }

    // ------------------------------------------------------------------
    // Files and declarations

    fn file(&mut self, name: &str) -> PResult<File> {
        while self.got(Tok::Semicolon) {}
        self.expect(Tok::Package)?;
        let package = self.ident()?;
        self.semi()?;

        let mut imports = Vec::new();
        while self.peek() == Tok::Import {
            self.next();
            if self.got(Tok::LParen) {
                while self.peek() != Tok::RParen {
                    imports.push(self.import_spec()?);
                    self.semi()?;
                }
                self.expect(Tok::RParen)?;
            } else {
                imports.push(self.import_spec()?);
            }
            self.semi()?;
        }

        let mut decls = Vec::new();
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Semicolon => {
                    self.next();
                }
                Tok::Func => {
                    decls.push(Decl::Func(self.func_decl()?));
                    self.semi()?;
                }
                Tok::Const | Tok::Var | Tok::Type => {
                    decls.push(Decl::Gen(self.gen_decl()?));
                    self.semi()?;
                }
                Tok::Import => return self.error("imports must appear before other declarations"),
                _ => {
                    let text = self.toks[self.pos].text.clone();
                    return self.error(format!("non-declaration statement outside function body: {}", text));
                }
            }
        }

        Ok(File {
            name: name.to_string(),
            package,
            imports,
            decls,
            comments: std::mem::take(&mut self.comments),
        })
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let name = match self.peek() {
            Tok::Ident => Some(self.next().text),
            Tok::Period => {
                self.next();
                Some(".".to_string())
            }
            _ => None,
        };
        let path = self.expect(Tok::String)?.text;
        Ok(ImportSpec {
            name,
            path: path.trim_matches(|c| c == '"' || c == '`').to_string(),
        })
    }

    fn gen_decl(&mut self) -> PResult<GenDecl> {
        let line = self.line();
        let doc = self.doc(line);
        let kind = match self.next().kind {
            Tok::Const => DeclKind::Const,
            Tok::Var => DeclKind::Var,
            _ => DeclKind::Type,
        };
        let mut specs = Vec::new();
        let grouped = self.got(Tok::LParen);
        if grouped {
            while self.peek() != Tok::RParen {
                specs.push(self.spec(kind)?);
                self.semi()?;
            }
            self.expect(Tok::RParen)?;
        } else {
            specs.push(self.spec(kind)?);
        }
        Ok(GenDecl {
            kind,
            doc,
            specs,
            grouped,
            line,
            end_line: self.prev_line(),
        })
    }

    fn spec(&mut self, kind: DeclKind) -> PResult<Spec> {
        let line = self.line();
        let doc = self.doc(line);
        if kind == DeclKind::Type {
            let name = self.ident()?;
            if self.peek() == Tok::LBrack && self.peek_at(1) == Tok::Ident && self.peek_at(2) != Tok::RBrack {
                return self.error("generic types are not supported");
            }
            let alias = self.got(Tok::Assign);
            let typ = self.parse_type()?;
            return Ok(Spec::Type(TypeSpec {
                doc,
                name,
                alias,
                typ,
                line,
            }));
        }
        let mut names = vec![self.ident()?];
        while self.got(Tok::Comma) {
            names.push(self.ident()?);
        }
        let typ = match self.peek() {
            Tok::Assign | Tok::Semicolon | Tok::RParen => None,
            _ => Some(self.parse_type()?),
        };
        let values = if self.got(Tok::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(Spec::Value(ValueSpec {
            doc,
            names,
            typ,
            values,
            line,
        }))
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let line = self.line();
        let doc = self.doc(line);
        self.expect(Tok::Func)?;
        let recv = if self.peek() == Tok::LParen {
            let mut fields = self.params()?;
            if fields.len() != 1 {
                return self.error("method must have exactly one receiver");
            }
            fields.pop()
        } else {
            None
        };
        let name = self.ident()?;
        if self.peek() == Tok::LBrack {
            return self.error("generic functions are not supported");
        }
        let typ = self.signature()?;
        let body = if self.peek() == Tok::LBrace {
            Some(self.block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            doc,
            recv,
            name,
            typ,
            body,
            line,
            end_line: self.prev_line(),
        })
    }

    fn signature(&mut self) -> PResult<FuncType> {
        let params = self.params()?;
        let results = match self.peek() {
            Tok::LParen => self.params()?,
            Tok::LBrace | Tok::Semicolon | Tok::RParen | Tok::Comma | Tok::RBrack | Tok::Eof => Vec::new(),
            _ => {
                let line = self.line();
                vec![Field {
                    names: Vec::new(),
                    typ: self.parse_type()?,
                    line,
                }]
            }
        };
        Ok(FuncType { params, results })
    }

    /// Parses `( [a, b T, c U | T, U] )` resolving Go's name grouping.
    fn params(&mut self) -> PResult<Vec<Field>> {
        self.expect(Tok::LParen)?;
        let mut entries: Vec<(Option<String>, Expr, u32)> = Vec::new();
        while self.peek() != Tok::RParen {
            let line = self.line();
            let named = self.peek() == Tok::Ident
                && !matches!(
                    self.peek_at(1),
                    Tok::Comma | Tok::RParen | Tok::Period
                );
            if named {
                let name = self.ident()?;
                let typ = self.param_type()?;
                entries.push((Some(name), typ, line));
            } else {
                let typ = self.param_type()?;
                entries.push((None, typ, line));
            }
            if !self.got(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;

        let any_named = entries.iter().any(|(n, _, _)| n.is_some());
        if !any_named {
            return Ok(entries
                .into_iter()
                .map(|(_, typ, line)| Field {
                    names: Vec::new(),
                    typ,
                    line,
                })
                .collect());
        }
        let mut fields = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for (name, typ, line) in entries {
            match name {
                Some(name) => {
                    pending.push(name);
                    fields.push(Field {
                        names: std::mem::take(&mut pending),
                        typ,
                        line,
                    });
                }
                None => match typ {
                    Expr::Ident(name) => pending.push(name),
                    _ => return self.error("mixed named and unnamed parameters"),
                },
            }
        }
        if !pending.is_empty() {
            return self.error("mixed named and unnamed parameters");
        }
        Ok(fields)
    }

    fn param_type(&mut self) -> PResult<Expr> {
        if self.got(Tok::Ellipsis) {
            let elem = self.parse_type()?;
            return Ok(Expr::ArrayType {
                len: None,
                elem: Box::new(elem),
            });
        }
        self.parse_type()
    }

    // ------------------------------------------------------------------
    // Types

    fn parse_type(&mut self) -> PResult<Expr> {
        match self.peek() {
            Tok::Ident => {
                let name = self.ident()?;
                if self.peek() == Tok::Period {
                    self.next();
                    let sel = self.ident()?;
                    return Ok(Expr::Selector {
                        expr: Box::new(Expr::Ident(name)),
                        sel,
                    });
                }
                Ok(Expr::Ident(name))
            }
            Tok::Mul => {
                self.next();
                Ok(Expr::Star(Box::new(self.parse_type()?)))
            }
            Tok::LBrack => self.array_type(),
            Tok::Struct => self.struct_type(),
            Tok::Func => {
                self.next();
                Ok(Expr::FuncType(Box::new(self.signature()?)))
            }
            Tok::Map => {
                self.next();
                self.expect(Tok::LBrack)?;
                let key = self.parse_type()?;
                self.expect(Tok::RBrack)?;
                let value = self.parse_type()?;
                Ok(Expr::MapType {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            Tok::LParen => {
                self.next();
                let t = self.parse_type()?;
                self.expect(Tok::RParen)?;
                Ok(Expr::Paren(Box::new(t)))
            }
            Tok::Chan | Tok::Interface => self.error("channel and interface types are not supported"),
            _ => self.error(format!("expected type, found {:?}", self.toks[self.pos].text)),
        }
    }

    fn array_type(&mut self) -> PResult<Expr> {
        self.expect(Tok::LBrack)?;
        let len = if self.got(Tok::RBrack) {
            None
        } else {
            self.expr_lev += 1;
            let len = if self.got(Tok::Ellipsis) {
                Expr::Bad("...".to_string())
            } else {
                self.expr()?
            };
            self.expr_lev -= 1;
            self.expect(Tok::RBrack)?;
            Some(Box::new(len))
        };
        let elem = self.parse_type()?;
        Ok(Expr::ArrayType {
            len,
            elem: Box::new(elem),
        })
    }

    fn struct_type(&mut self) -> PResult<Expr> {
        self.expect(Tok::Struct)?;
        self.expect(Tok::LBrace)?;
        let mut fields = Vec::new();
        while self.peek() != Tok::RBrace {
            let line = self.line();
            let field = if self.peek() == Tok::Ident
                && matches!(self.peek_at(1), Tok::Semicolon | Tok::RBrace | Tok::String | Tok::Period)
            {
                // embedded field
                Field {
                    names: Vec::new(),
                    typ: self.parse_type()?,
                    line,
                }
            } else if self.peek() == Tok::Mul {
                Field {
                    names: Vec::new(),
                    typ: self.parse_type()?,
                    line,
                }
            } else {
                let mut names = vec![self.ident()?];
                while self.got(Tok::Comma) {
                    names.push(self.ident()?);
                }
                Field {
                    names,
                    typ: self.parse_type()?,
                    line,
                }
            };
            // struct tags are ignored
            self.got(Tok::String);
            fields.push(field);
            self.semi()?;
        }
        self.expect(Tok::RBrace)?;
        Ok(Expr::StructType(fields))
    }

    // ------------------------------------------------------------------
    // Statements

    fn block(&mut self) -> PResult<Block> {
        let line = self.line();
        self.expect(Tok::LBrace)?;
        let stmts = self.stmt_list()?;
        let end_line = self.line();
        self.expect(Tok::RBrace)?;
        Ok(Block {
            stmts,
            line,
            end_line,
        })
    }

    fn stmt_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut list = Vec::new();
        while !matches!(self.peek(), Tok::RBrace | Tok::Eof | Tok::Case | Tok::Default) {
            let stmt = self.stmt()?;
            if stmt.kind != StmtKind::Empty {
                list.push(stmt);
            }
            if matches!(self.peek(), Tok::RBrace | Tok::Case | Tok::Default) {
                break;
            }
            self.semi()?;
        }
        Ok(list)
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Semicolon => StmtKind::Empty,
            Tok::Const | Tok::Var | Tok::Type => StmtKind::Decl(self.gen_decl()?),
            Tok::Return => {
                self.next();
                let results = if matches!(self.peek(), Tok::Semicolon | Tok::RBrace) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                StmtKind::Return(results)
            }
            Tok::Break | Tok::Continue | Tok::Goto | Tok::Fallthrough => {
                let tok = match self.next().kind {
                    Tok::Break => BranchTok::Break,
                    Tok::Continue => BranchTok::Continue,
                    Tok::Goto => BranchTok::Goto,
                    _ => BranchTok::Fallthrough,
                };
                let label = if self.peek() == Tok::Ident {
                    Some(self.ident()?)
                } else {
                    None
                };
                StmtKind::Branch { tok, label }
            }
            Tok::LBrace => StmtKind::Block(self.block()?),
            Tok::If => return self.if_stmt(),
            Tok::Switch => return self.switch_stmt(),
            Tok::For => return self.for_stmt(),
            Tok::Go | Tok::Defer | Tok::Select => {
                return self.error("go, defer and select statements are not supported")
            }
            _ => match self.simple_stmt(false, true)? {
                Simple::Stmt(s) => return Ok(s),
                Simple::Range { .. } => return self.error("unexpected range clause"),
            },
        };
        Ok(Stmt {
            kind,
            line,
            end_line: self.prev_line(),
        })
    }

    fn simple_stmt(&mut self, range_ok: bool, label_ok: bool) -> PResult<Simple> {
        let line = self.line();
        if range_ok && self.peek() == Tok::Range {
            self.next();
            let expr = self.expr()?;
            return Ok(Simple::Range {
                key: None,
                value: None,
                define: false,
                expr,
                line,
            });
        }
        let lhs = self.expr_list()?;
        let assign = match self.peek() {
            Tok::Define => Some(AssignOp::Define),
            Tok::Assign => Some(AssignOp::Assign),
            Tok::AddAssign => Some(AssignOp::Add),
            Tok::SubAssign => Some(AssignOp::Sub),
            Tok::MulAssign => Some(AssignOp::Mul),
            Tok::QuoAssign => Some(AssignOp::Quo),
            Tok::RemAssign => Some(AssignOp::Rem),
            Tok::AndAssign => Some(AssignOp::And),
            Tok::OrAssign => Some(AssignOp::Or),
            Tok::XorAssign => Some(AssignOp::Xor),
            Tok::ShlAssign => Some(AssignOp::Shl),
            Tok::ShrAssign => Some(AssignOp::Shr),
            Tok::AndNotAssign => Some(AssignOp::AndNot),
            _ => None,
        };
        let kind = if let Some(op) = assign {
            self.next();
            if range_ok && self.peek() == Tok::Range && matches!(op, AssignOp::Define | AssignOp::Assign) {
                self.next();
                let expr = self.expr()?;
                let mut lhs = lhs.into_iter();
                return Ok(Simple::Range {
                    key: lhs.next(),
                    value: lhs.next(),
                    define: op == AssignOp::Define,
                    expr,
                    line,
                });
            }
            let rhs = self.expr_list()?;
            StmtKind::Assign { lhs, op, rhs }
        } else if lhs.len() > 1 {
            return self.error("expected assignment after expression list");
        } else {
            let expr = lhs.into_iter().next().unwrap_or(Expr::Bad(String::new()));
            match self.peek() {
                Tok::Inc | Tok::Dec => {
                    let inc = self.next().kind == Tok::Inc;
                    StmtKind::IncDec { expr, inc }
                }
                Tok::Colon if label_ok => {
                    let Expr::Ident(label) = expr else {
                        return self.error("invalid label");
                    };
                    self.next();
                    let stmt = if self.peek() == Tok::RBrace {
                        Stmt {
                            kind: StmtKind::Empty,
                            line: self.line(),
                            end_line: self.line(),
                        }
                    } else {
                        self.stmt()?
                    };
                    StmtKind::Labeled {
                        label,
                        stmt: Box::new(stmt),
                    }
                }
                _ => StmtKind::Expr(expr),
            }
        };
        Ok(Simple::Stmt(Stmt {
            kind,
            line,
            end_line: self.prev_line(),
        }))
    }

    fn simple(&mut self) -> PResult<Stmt> {
        match self.simple_stmt(false, false)? {
            Simple::Stmt(s) => Ok(s),
            Simple::Range { .. } => self.error("unexpected range clause"),
        }
    }

    fn stmt_expr(&self, stmt: Stmt) -> PResult<Expr> {
        match stmt.kind {
            StmtKind::Expr(e) => Ok(e),
            _ => Err(ParseError {
                line: stmt.line,
                message: "expected boolean expression".to_string(),
            }),
        }
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(Tok::If)?;
        let outer = self.expr_lev;
        self.expr_lev = -1;
        let first = self.simple()?;
        let (init, cond) = if self.got(Tok::Semicolon) {
            let cond = self.expr()?;
            (Some(Box::new(first)), cond)
        } else {
            (None, self.stmt_expr(first)?)
        };
        self.expr_lev = outer;
        let body = self.block()?;
        let els = if self.got(Tok::Else) {
            match self.peek() {
                Tok::If => Some(Box::new(self.if_stmt()?)),
                Tok::LBrace => {
                    let b = self.block()?;
                    Some(Box::new(Stmt {
                        line: b.line,
                        end_line: b.end_line,
                        kind: StmtKind::Block(b),
                    }))
                }
                _ => return self.error("else must be followed by if or block"),
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                init,
                cond,
                body,
                els,
            },
            line,
            end_line: self.prev_line(),
        })
    }

    fn switch_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(Tok::Switch)?;
        let outer = self.expr_lev;
        self.expr_lev = -1;
        let mut init = None;
        let mut tag = None;
        if self.peek() != Tok::LBrace {
            let first = if self.peek() == Tok::Semicolon {
                None
            } else {
                Some(self.simple()?)
            };
            if self.got(Tok::Semicolon) {
                init = first.map(Box::new);
                if self.peek() != Tok::LBrace {
                    let t = self.simple()?;
                    tag = Some(self.stmt_expr(t)?);
                }
            } else if let Some(first) = first {
                tag = Some(self.stmt_expr(first)?);
            }
        }
        self.expr_lev = outer;
        self.expect(Tok::LBrace)?;
        let mut clauses = Vec::new();
        while self.peek() != Tok::RBrace {
            let cline = self.line();
            let (list, is_default) = if self.got(Tok::Default) {
                (Vec::new(), true)
            } else {
                self.expect(Tok::Case)?;
                (self.expr_list()?, false)
            };
            self.expect(Tok::Colon)?;
            let body = self.stmt_list()?;
            clauses.push(CaseClause {
                list,
                is_default,
                body,
                line: cline,
            });
        }
        self.expect(Tok::RBrace)?;
        Ok(Stmt {
            kind: StmtKind::Switch { init, tag, clauses },
            line,
            end_line: self.prev_line(),
        })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(Tok::For)?;
        let outer = self.expr_lev;
        self.expr_lev = -1;
        let mut init = None;
        let mut cond = None;
        let mut post = None;
        let mut range = None;
        if self.peek() != Tok::LBrace {
            let first = if self.peek() == Tok::Semicolon {
                None
            } else {
                Some(self.simple_stmt(true, false)?)
            };
            let first = match first {
                Some(Simple::Range {
                    key,
                    value,
                    define,
                    expr,
                    ..
                }) => {
                    range = Some((key, value, define, expr));
                    None
                }
                Some(Simple::Stmt(s)) => Some(s),
                None => None,
            };
            if range.is_none() {
                if self.peek() == Tok::Semicolon {
                    self.next();
                    init = first.map(Box::new);
                    if self.peek() != Tok::Semicolon {
                        cond = Some(self.expr()?);
                    }
                    self.expect(Tok::Semicolon)?;
                    if self.peek() != Tok::LBrace {
                        post = Some(Box::new(self.simple()?));
                    }
                } else if let Some(first) = first {
                    cond = Some(self.stmt_expr(first)?);
                }
            }
        }
        self.expr_lev = outer;
        let body = self.block()?;
        let kind = match range {
            Some((key, value, define, expr)) => StmtKind::Range {
                key,
                value,
                define,
                expr,
                body,
            },
            None => StmtKind::For {
                init,
                cond,
                post,
                body,
            },
        };
        Ok(Stmt {
            kind,
            line,
            end_line: self.prev_line(),
        })
    }

    // ------------------------------------------------------------------
    // Expressions

    fn expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.expr()?];
        while self.got(Tok::Comma) {
            list.push(self.expr()?);
        }
        Ok(list)
    }

    fn expr(&mut self) -> PResult<Expr> {
        self.binary_expr(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek() {
            Tok::Add => BinaryOp::Add,
            Tok::Sub => BinaryOp::Sub,
            Tok::Mul => BinaryOp::Mul,
            Tok::Quo => BinaryOp::Quo,
            Tok::Rem => BinaryOp::Rem,
            Tok::And => BinaryOp::And,
            Tok::Or => BinaryOp::Or,
            Tok::Xor => BinaryOp::Xor,
            Tok::Shl => BinaryOp::Shl,
            Tok::Shr => BinaryOp::Shr,
            Tok::AndNot => BinaryOp::AndNot,
            Tok::LAnd => BinaryOp::LAnd,
            Tok::LOr => BinaryOp::LOr,
            Tok::Eql => BinaryOp::Eql,
            Tok::Neq => BinaryOp::Neq,
            Tok::Lss => BinaryOp::Lss,
            Tok::Leq => BinaryOp::Leq,
            Tok::Gtr => BinaryOp::Gtr,
            Tok::Geq => BinaryOp::Geq,
            _ => return None,
        })
    }

    fn binary_expr(&mut self, prec1: u8) -> PResult<Expr> {
        let mut x = self.unary_expr()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < prec1 {
                break;
            }
            self.next();
            let y = self.binary_expr(prec + 1)?;
            x = Expr::Binary {
                op,
                lhs: Box::new(x),
                rhs: Box::new(y),
            };
        }
        Ok(x)
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Tok::Add => UnaryOp::Pos,
            Tok::Sub => UnaryOp::Neg,
            Tok::Not => UnaryOp::Not,
            Tok::Xor => UnaryOp::Xor,
            Tok::And => UnaryOp::Addr,
            Tok::Arrow => UnaryOp::Recv,
            Tok::Mul => {
                self.next();
                let x = self.unary_expr()?;
                return Ok(Expr::Star(Box::new(x)));
            }
            _ => return self.primary_expr(),
        };
        self.next();
        let x = self.unary_expr()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(x),
        })
    }

    fn operand(&mut self) -> PResult<Expr> {
        match self.peek() {
            Tok::Ident => Ok(Expr::Ident(self.next().text)),
            Tok::Int | Tok::Float | Tok::Char | Tok::String => {
                let tok = self.next();
                let kind = match tok.kind {
                    Tok::Int => LitKind::Int,
                    Tok::Float => LitKind::Float,
                    Tok::Char => LitKind::Char,
                    _ => LitKind::String,
                };
                Ok(Expr::BasicLit {
                    kind,
                    value: tok.text,
                })
            }
            Tok::LParen => {
                self.next();
                self.expr_lev += 1;
                let x = self.expr_or_type()?;
                self.expr_lev -= 1;
                self.expect(Tok::RParen)?;
                Ok(Expr::Paren(Box::new(x)))
            }
            Tok::Func => {
                self.next();
                let typ = self.signature()?;
                if self.peek() == Tok::LBrace {
                    self.expr_lev += 1;
                    let body = self.block()?;
                    self.expr_lev -= 1;
                    Ok(Expr::FuncLit {
                        typ: Box::new(typ),
                        body,
                    })
                } else {
                    Ok(Expr::FuncType(Box::new(typ)))
                }
            }
            Tok::LBrack | Tok::Struct | Tok::Map => self.parse_type(),
            _ => {
                let text = self.toks[self.pos].text.clone();
                self.error(format!("expected operand, found {:?}", text))
            }
        }
    }

    fn expr_or_type(&mut self) -> PResult<Expr> {
        if self.peek() == Tok::Mul && self.peek_at(1) == Tok::Ident && self.peek_at(2) == Tok::RParen {
            self.next();
            return Ok(Expr::Star(Box::new(Expr::Ident(self.ident()?))));
        }
        self.expr()
    }

    fn is_literal_type(x: &Expr) -> bool {
        match x {
            Expr::Ident(_) => true,
            Expr::Selector { expr, .. } => matches!(expr.as_ref(), Expr::Ident(_)),
            Expr::ArrayType { .. } | Expr::StructType(_) | Expr::MapType { .. } => true,
            _ => false,
        }
    }

    fn primary_expr(&mut self) -> PResult<Expr> {
        let mut x = self.operand()?;
        loop {
            match self.peek() {
                Tok::Period => {
                    self.next();
                    if self.peek() == Tok::LParen {
                        return self.error("type assertions are not supported");
                    }
                    let sel = self.ident()?;
                    x = Expr::Selector {
                        expr: Box::new(x),
                        sel,
                    };
                }
                Tok::LBrack => {
                    self.next();
                    self.expr_lev += 1;
                    let low = if self.peek() == Tok::Colon {
                        None
                    } else {
                        Some(self.expr_or_type()?)
                    };
                    if self.got(Tok::Colon) {
                        let high = if self.peek() == Tok::RBrack {
                            None
                        } else {
                            Some(Box::new(self.expr()?))
                        };
                        self.expr_lev -= 1;
                        self.expect(Tok::RBrack)?;
                        x = Expr::Slice {
                            expr: Box::new(x),
                            low: low.map(Box::new),
                            high,
                        };
                        continue;
                    }
                    let mut indices = vec![low.unwrap_or(Expr::Bad(String::new()))];
                    while self.got(Tok::Comma) {
                        if self.peek() == Tok::RBrack {
                            break;
                        }
                        indices.push(self.expr_or_type()?);
                    }
                    self.expr_lev -= 1;
                    self.expect(Tok::RBrack)?;
                    x = if indices.len() == 1 {
                        Expr::Index {
                            expr: Box::new(x),
                            index: Box::new(indices.remove(0)),
                        }
                    } else {
                        Expr::IndexList {
                            expr: Box::new(x),
                            indices,
                        }
                    };
                }
                Tok::LParen => {
                    self.next();
                    self.expr_lev += 1;
                    let mut args = Vec::new();
                    let mut ellipsis = false;
                    while self.peek() != Tok::RParen {
                        args.push(self.arg()?);
                        if self.got(Tok::Ellipsis) {
                            ellipsis = true;
                        }
                        if !self.got(Tok::Comma) {
                            break;
                        }
                    }
                    self.expr_lev -= 1;
                    self.expect(Tok::RParen)?;
                    x = Expr::Call {
                        func: Box::new(x),
                        args,
                        ellipsis,
                    };
                }
                Tok::LBrace => {
                    let literal = matches!(x, Expr::ArrayType { .. } | Expr::StructType(_) | Expr::MapType { .. })
                        || (self.expr_lev >= 0 && Self::is_literal_type(&x));
                    if !literal {
                        break;
                    }
                    x = self.composite(Some(x))?;
                }
                _ => break,
            }
        }
        Ok(x)
    }

    fn arg(&mut self) -> PResult<Expr> {
        match self.peek() {
            Tok::LBrack | Tok::Map | Tok::Struct => {
                let t = self.parse_type()?;
                if self.peek() == Tok::LBrace {
                    return self.composite(Some(t));
                }
                Ok(t)
            }
            _ => self.expr_or_type(),
        }
    }

    fn composite(&mut self, typ: Option<Expr>) -> PResult<Expr> {
        self.expect(Tok::LBrace)?;
        let outer = self.expr_lev;
        self.expr_lev = 1;
        let mut elts = Vec::new();
        while self.peek() != Tok::RBrace {
            let e = self.element()?;
            let e = if self.got(Tok::Colon) {
                let value = self.element()?;
                Expr::KeyValue {
                    key: Box::new(e),
                    value: Box::new(value),
                }
            } else {
                e
            };
            elts.push(e);
            if !self.got(Tok::Comma) {
                break;
            }
        }
        // trailing newline before the brace
        self.got(Tok::Semicolon);
        self.expr_lev = outer;
        self.expect(Tok::RBrace)?;
        Ok(Expr::Composite {
            typ: typ.map(Box::new),
            elts,
        })
    }

    fn element(&mut self) -> PResult<Expr> {
        if self.peek() == Tok::LBrace {
            return self.composite(None);
        }
        self.expr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> File {
        parse_file("test.go", src).unwrap()
    }

    fn body(f: &File, idx: usize) -> &Vec<Stmt> {
        match &f.decls[idx] {
            Decl::Func(fd) => &fd.body.as_ref().unwrap().stmts,
            _ => panic!("not a func"),
        }
    }

    #[test]
    fn package_and_imports() {
        let f = parse("package foo\n\nimport (\n\t\"math\"\n\tm32 \"example.com/math32\"\n)\n");
        assert_eq!(f.package, "foo");
        assert_eq!(f.imports.len(), 2);
        assert_eq!(f.imports[1].name.as_deref(), Some("m32"));
        assert_eq!(f.imports[1].path, "example.com/math32");
    }

    #[test]
    fn grouped_params_and_methods() {
        let f = parse("package p\nfunc (ps *Params) Set(a, b float32, c int) float32 {\n\treturn a\n}\n");
        let Decl::Func(fd) = &f.decls[0] else { panic!() };
        assert_eq!(fd.recv_type(), Some(("Params", true)));
        assert_eq!(fd.flat_name(), "Params_Set");
        assert_eq!(fd.typ.params.len(), 2);
        assert_eq!(fd.typ.params[0].names, vec!["a", "b"]);
        assert_eq!(fd.typ.results.len(), 1);
        assert_eq!(fd.end_line, 4);
    }

    #[test]
    fn control_clauses_do_not_take_composites() {
        let f = parse("package p\nfunc f(x int) {\n\tif x == 1 {\n\t\tx = 2\n\t} else if x > 3 {\n\t}\n\tfor i := 0; i < x; i++ {\n\t}\n\tfor x < 10 {\n\t\tx++\n\t}\n\tfor i := range 10 {\n\t\t_ = i\n\t}\n}\n");
        let stmts = body(&f, 0);
        assert!(matches!(stmts[0].kind, StmtKind::If { els: Some(_), .. }));
        assert!(matches!(stmts[1].kind, StmtKind::For { init: Some(_), cond: Some(_), post: Some(_), .. }));
        assert!(matches!(stmts[2].kind, StmtKind::For { init: None, cond: Some(_), post: None, .. }));
        assert!(matches!(stmts[3].kind, StmtKind::Range { define: true, .. }));
    }

    #[test]
    fn switch_and_composites() {
        let f = parse("package p\nfunc f(x int) V {\n\tswitch x {\n\tcase 1, 2:\n\t\tx = 0\n\tdefault:\n\t}\n\treturn V{X: 1, Y: 2}\n}\n");
        let stmts = body(&f, 0);
        let StmtKind::Switch { clauses, tag, .. } = &stmts[0].kind else { panic!() };
        assert!(tag.is_some());
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].list.len(), 2);
        assert!(clauses[1].is_default);
        let StmtKind::Return(r) = &stmts[1].kind else { panic!() };
        assert!(matches!(&r[0], Expr::Composite { elts, .. } if elts.len() == 2));
    }

    #[test]
    fn doc_comments_attach() {
        let src = "package p\n\n//gosl:vars\nvar (\n\t// Params doc\n\t//gosl:read-only\n\tParams []ParamStruct\n\n\tData []float32 // trailing\n)\n";
        let f = parse(src);
        let Decl::Gen(gd) = &f.decls[0] else { panic!() };
        assert_eq!(gd.doc, vec!["//gosl:vars"]);
        assert!(gd.grouped);
        let Spec::Value(vs) = &gd.specs[0] else { panic!() };
        assert_eq!(vs.doc, vec!["// Params doc", "//gosl:read-only"]);
        let Spec::Value(vs) = &gd.specs[1] else { panic!() };
        assert!(vs.doc.is_empty());
    }

    #[test]
    fn binary_precedence() {
        let e = parse_expr("a + b * c").unwrap();
        let Expr::Binary { op, rhs, .. } = e else { panic!() };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn syntax_error_reports_line() {
        let err = parse_file("bad.go", "package p\n\nfunc f() {\n\tx := \n}\n").unwrap_err();
        assert_eq!(err.line, 5);
    }
}
