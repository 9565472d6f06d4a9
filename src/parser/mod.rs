pub mod ast;
pub mod lexer;
pub mod parse;

pub use lexer::{Lexer, Span, Spanned, Token};
pub use parse::Parser;
