//! Tokenizer for the supported Go subset.
//!
//! Uses logos for the raw scan, then applies Go's automatic semicolon
//! insertion. Comments are split out of the token stream and kept with their
//! line numbers so the printer can carry them into the shader output.

use logos::{Lexer, Logos};

fn block_comment(lex: &mut Lexer<Tok>) -> bool {
    match lex.remainder().find("*/") {
        Some(i) => {
            lex.bump(i + 2);
            true
        }
        None => false,
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Tok {
    #[token("\n")]
    Newline,
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,

    // Keywords
    #[token("break")]
    Break,
    #[token("case")]
    Case,
    #[token("chan")]
    Chan,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("default")]
    Default,
    #[token("defer")]
    Defer,
    #[token("else")]
    Else,
    #[token("fallthrough")]
    Fallthrough,
    #[token("for")]
    For,
    #[token("func")]
    Func,
    #[token("go")]
    Go,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("package")]
    Package,
    #[token("range")]
    Range,
    #[token("return")]
    Return,
    #[token("select")]
    Select,
    #[token("struct")]
    Struct,
    #[token("switch")]
    Switch,
    #[token("type")]
    Type,
    #[token("var")]
    Var,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9][0-9_]*")]
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    #[regex(r"0[bB][01_]+")]
    #[regex(r"0[oO][0-7_]+")]
    Int,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9_]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9_]+")]
    Float,
    #[regex(r"'([^'\\\n]|\\[^\n])+'")]
    Char,
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    #[regex(r"`[^`]*`")]
    String,

    // Operators
    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,
    #[token("/")]
    Quo,
    #[token("%")]
    Rem,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Xor,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AndNot,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    QuoAssign,
    #[token("%=")]
    RemAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("&^=")]
    AndNotAssign,
    #[token("&&")]
    LAnd,
    #[token("||")]
    LOr,
    #[token("<-")]
    Arrow,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("==")]
    Eql,
    #[token("<")]
    Lss,
    #[token(">")]
    Gtr,
    #[token("=")]
    Assign,
    #[token("!")]
    Not,
    #[token("~")]
    Tilde,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Leq,
    #[token(">=")]
    Geq,
    #[token(":=")]
    Define,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    LParen,
    #[token("[")]
    LBrack,
    #[token("{")]
    LBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(")")]
    RParen,
    #[token("]")]
    RBrack,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,

    /// End of input, appended by [`lex`].
    Eof,
}

impl Tok {
    /// Tokens after which a newline ends the statement.
    fn ends_statement(self) -> bool {
        matches!(
            self,
            Tok::Ident
                | Tok::Int
                | Tok::Float
                | Tok::Char
                | Tok::String
                | Tok::Break
                | Tok::Continue
                | Tok::Fallthrough
                | Tok::Return
                | Tok::Inc
                | Tok::Dec
                | Tok::RParen
                | Tok::RBrack
                | Tok::RBrace
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: Tok,
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub line: u32,
    pub end_line: u32,
    /// No code precedes the comment on its first line.
    pub own_line: bool,
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: u32,
    pub text: String,
}

/// Tokenizes `src`, inserting semicolons where Go would.
pub fn lex(src: &str) -> Result<Lexed, LexError> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(src.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| -> u32 {
        match line_starts.binary_search(&offset) {
            Ok(i) => i as u32 + 1,
            Err(i) => i as u32,
        }
    };

    let mut out = Lexed::default();
    let mut lexer = Tok::lexer(src);
    let mut last: Option<Tok> = None;

    let auto_semi = |out: &mut Lexed, last: &mut Option<Tok>, line: u32| {
        if last.is_some_and(Tok::ends_statement) {
            out.tokens.push(Token {
                kind: Tok::Semicolon,
                text: "\n".to_string(),
                line,
            });
        }
        *last = None;
    };

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let line = line_of(span.start);
        let kind = result.map_err(|_| LexError {
            line,
            text: lexer.slice().to_string(),
        })?;
        let own_line = out.tokens.last().map_or(true, |t| t.line != line);
        match kind {
            Tok::Newline => auto_semi(&mut out, &mut last, line),
            Tok::LineComment => out.comments.push(Comment {
                text: lexer.slice().to_string(),
                line,
                end_line: line,
                own_line,
            }),
            Tok::BlockComment => {
                let text = lexer.slice().to_string();
                let end_line = line_of(span.end.saturating_sub(1));
                if end_line > line {
                    auto_semi(&mut out, &mut last, line);
                }
                out.comments.push(Comment {
                    text,
                    line,
                    end_line,
                    own_line,
                });
            }
            _ => {
                out.tokens.push(Token {
                    kind,
                    text: lexer.slice().to_string(),
                    line,
                });
                last = Some(kind);
            }
        }
    }
    let eof_line = line_starts.len() as u32;
    auto_semi(&mut out, &mut last, eof_line);
    out.tokens.push(Token {
        kind: Tok::Eof,
        text: String::new(),
        line: eof_line,
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        lex(src).unwrap().tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn semicolons_inserted_after_line_enders() {
        assert_eq!(
            kinds("x := 1\ny++\n"),
            vec![
                Tok::Ident,
                Tok::Define,
                Tok::Int,
                Tok::Semicolon,
                Tok::Ident,
                Tok::Inc,
                Tok::Semicolon,
                Tok::Eof
            ]
        );
        assert_eq!(
            kinds("a +\nb"),
            vec![Tok::Ident, Tok::Add, Tok::Ident, Tok::Semicolon, Tok::Eof]
        );
    }

    #[test]
    fn comments_split_out() {
        let lexed = lex("a := 1 // one\n/* two\nlines */ b").unwrap();
        assert_eq!(lexed.comments.len(), 2);
        assert_eq!(lexed.comments[0].text, "// one");
        assert_eq!(lexed.comments[0].line, 1);
        assert!(!lexed.comments[0].own_line);
        assert!(lexed.comments[1].own_line);
        assert_eq!(lexed.comments[1].line, 2);
        assert_eq!(lexed.comments[1].end_line, 3);
        let b = lexed.tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!(b.line, 3);
    }

    #[test]
    fn numbers() {
        let lexed = lex("1 1.5 .5 1e3 0x1F 0b101").unwrap();
        let k: Vec<_> = lexed.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            &k[..6],
            &[Tok::Int, Tok::Float, Tok::Float, Tok::Float, Tok::Int, Tok::Int]
        );
    }

    #[test]
    fn keywords_and_operators() {
        assert_eq!(
            kinds("func f() { a &^= b }"),
            vec![
                Tok::Func,
                Tok::Ident,
                Tok::LParen,
                Tok::RParen,
                Tok::LBrace,
                Tok::Ident,
                Tok::AndNotAssign,
                Tok::Ident,
                Tok::RBrace,
                Tok::Semicolon,
                Tok::Eof
            ]
        );
    }
}
