//! # gamehop - Canonicalization and Inlining for Game-Hopping Proofs
//!
//! A game-hopping proof moves between cryptographic games one small,
//! checkable step at a time. This crate checks such steps mechanically: two
//! procedures are treated as equivalent when they reduce to byte-identical
//! canonical text, and the inliner builds the games a step compares.
//!
//! ## Quick Start
//!
//! ```rust
//! use gamehop::canonicalize_function;
//!
//! # fn main() -> gamehop::Result<()> {
//! let left = canonicalize_function("def add(a, b):\n    c = a + b\n    return c\n")?;
//! let right = canonicalize_function("def plus(x, y):\n    z = x + y\n    return z\n")?;
//!
//! assert_eq!(left, right);
//! assert_eq!(left, "def f(v0, v1):\n    v2 = v0 + v1\n    return v2\n");
//! # Ok(())
//! # }
//! ```
//!
//! ### Inlining a function
//!
//! ```rust
//! use gamehop::{inline_function_call, parse_function, unparse_function};
//!
//! # fn main() -> gamehop::Result<()> {
//! let callee = parse_function("def double(a):\n    return a + a\n")?;
//! let caller = parse_function("def f(x):\n    y = double(x)\n    return y\n")?;
//!
//! let inlined = inline_function_call(&callee, &caller)?;
//! assert_eq!(unparse_function(&inlined), "def f(x):\n    y = x + x\n    return y\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → Scanner → Tokens → Parser → AST ─┬→ Inliner ──────┐
//!                                           └→ Canonicalizer ←┘ → canonical text
//! ```
//!
//! ### Main Components
//!
//! - [`lexer`] - Tokenizes the indentation-sensitive game language
//! - [`parser`] - Builds the AST and prints it back deterministically
//! - [`filter`] - Rejects constructs outside the supported subset
//! - [`graph`] - Statement dependency graphs used for reordering
//! - [`canonicalize`] - The normalization pipeline, run to a fixed point
//! - [`inline`] - Function, argument, class, scheme and reduction inlining
//!
//! ## Error Handling
//!
//! Every operation returns [`Result`]. Errors say what was rejected and where:
//!
//! ```rust
//! use gamehop::{canonicalize_function, Error};
//!
//! let err = canonicalize_function("def f(a, b=1):\n    return a\n").unwrap_err();
//! assert!(matches!(err, Error::UnsupportedConstruct { .. }));
//! ```
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and never installs a subscriber:
//! `debug` per pipeline iteration and per inlined call site, `trace` with the
//! intermediate texts.

pub mod canonicalize;
pub mod error;
pub mod filter;
pub mod graph;
pub mod inline;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod utils;
pub mod visit;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types
pub use canonicalize::{
    canonicalize_class, canonicalize_class_def, canonicalize_class_with, canonicalize_function,
    canonicalize_function_with, canonicalize_procedure, CanonicalizeOptions,
};
pub use error::{Error, ErrorSeverity, Result};
pub use filter::GrammarRules;
pub use inline::{
    inline_argument_into_function, inline_class, inline_function_call,
    inline_reduction_into_game, inline_scheme_into_game, ArgumentValue,
};
pub use parser::{
    parse_class, parse_function, parse_module, unparse_class, unparse_function, ClassDef, Expr,
    FunctionDef, Module, Stmt,
};
pub use utils::NameGenerator;
