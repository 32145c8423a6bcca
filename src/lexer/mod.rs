//! Lexical analysis for the game language
//!
//! Converts source text into a stream of tokens, including the layout tokens
//! (`Newline`, `Indent`, `Dedent`) of an indentation-sensitive syntax.

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind, KEYWORDS};
