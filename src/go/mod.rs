//! # Go front end
//!
//! A lexer, parser and type environment for the Go subset that gosl
//! translates. Only what the shader printer needs is modeled: no generics,
//! interfaces, channels or goroutines.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod types;

pub use ast::File;
pub use parser::{parse_expr, parse_file, ParseError};
pub use types::{Scopes, Signature, Type, TypeEnv};
