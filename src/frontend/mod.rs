//! Source front-end: tokenizer, keyword tables and the recursive-descent parser.

pub(crate) mod keywords;
pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::parse;
