//! Game language parser module
//!
//! Parses the indentation-sensitive game language into an abstract syntax
//! tree and prints trees back to deterministic source text.

mod ast;
mod game_parser;
pub mod unparse;

pub use ast::{
    Arguments, BinaryOp, BoolOp, ClassDef, CmpOp, Constant, Expr, FunctionDef, Item, Keyword,
    Module, Precedence, Stmt, UnaryOp,
};
pub use game_parser::Parser;

use crate::error::{Error, Result};
use crate::lexer::Scanner;

/// Parses a source file into a module
pub fn parse_module(source: &str) -> Result<Module> {
    let tokens = Scanner::new(source).scan_tokens()?;
    Parser::new(tokens).parse()
}

/// Parses source text holding exactly one function definition
pub fn parse_function(source: &str) -> Result<FunctionDef> {
    let mut module = parse_module(source)?;
    match (module.items.len(), module.items.pop()) {
        (1, Some(Item::Function(function))) => Ok(function),
        (_, Some(Item::Class(class))) => Err(Error::UnexpectedToken {
            expected: "a single function definition".to_string(),
            got: format!("class `{}`", class.name),
            line: class.line,
        }),
        (0, _) | (_, None) => Err(Error::UnexpectedEof),
        (_, Some(Item::Function(function))) => Err(Error::UnexpectedToken {
            expected: "a single function definition".to_string(),
            got: format!("additional definition `{}`", function.name),
            line: function.line,
        }),
    }
}

/// Parses source text holding exactly one class definition
pub fn parse_class(source: &str) -> Result<ClassDef> {
    let mut module = parse_module(source)?;
    match (module.items.len(), module.items.pop()) {
        (1, Some(Item::Class(class))) => Ok(class),
        (_, Some(Item::Function(function))) => Err(Error::UnexpectedToken {
            expected: "a single class definition".to_string(),
            got: format!("function `{}`", function.name),
            line: function.line,
        }),
        (0, _) | (_, None) => Err(Error::UnexpectedEof),
        (_, Some(Item::Class(class))) => Err(Error::UnexpectedToken {
            expected: "a single class definition".to_string(),
            got: format!("additional definition `{}`", class.name),
            line: class.line,
        }),
    }
}

/// Prints a function definition as source text
pub fn unparse_function(function: &FunctionDef) -> String {
    unparse::function_to_string(function)
}

/// Prints a class definition as source text
pub fn unparse_class(class: &ClassDef) -> String {
    unparse::class_to_string(class)
}
