//! # Canonicalization
//!
//! Reduces a procedure to a normal form so that two semantically equivalent
//! procedures print to the same text.
//!
//! ## Pipeline
//!
//! ```text
//! if → ifexp, call arguments, returns, name f, lambdas, tuples,
//! collapse, simplify, reorder lines, argument order, variable names
//! ```
//!
//! The pipeline is repeated until the unparsed text stops changing.
//!
//! ## Usage
//!
//! ```rust
//! use gamehop::canonicalize_function;
//!
//! # fn main() -> gamehop::Result<()> {
//! let a = canonicalize_function("def add(a, b):\n    c = a + b\n    return c\n")?;
//! let b = canonicalize_function("def plus(x, y):\n    z = x + y\n    unused = y * 2\n    return z\n")?;
//! assert_eq!(a, b);
//! # Ok(())
//! # }
//! ```

pub mod classes;
pub mod collapse;
pub mod expand;
pub mod ifstatements;
pub mod lambdas;
pub mod names;
pub mod ordering;
pub mod simplify;

pub use classes::{canonicalize_class, canonicalize_class_def, canonicalize_class_with};

use crate::error::{Error, Result};
use crate::filter::{validate_function, GrammarRules};
use crate::parser::{parse_function, unparse_function, Expr, FunctionDef, Stmt};
use crate::utils::{is_identifier, NameGenerator};
use serde::{Deserialize, Serialize};

/// Canonicalization options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalizeOptions {
    /// Upper bound on pipeline iterations before giving up
    pub max_iterations: usize,
    /// Rename the procedure to `f`
    pub rename_function: bool,
    /// Keep the parameter list (class methods are called positionally)
    pub keep_signature: bool,
    /// Names never renamed (`self` for methods)
    pub preserved_names: Vec<String>,
    /// Keep the relative order of calls through parameters
    pub preserve_call_order: bool,
}

impl CanonicalizeOptions {
    /// Options for a free-standing procedure
    pub fn function() -> Self {
        CanonicalizeOptions {
            max_iterations: 100,
            rename_function: true,
            keep_signature: false,
            preserved_names: Vec::new(),
            preserve_call_order: true,
        }
    }

    /// Options for a class method: name, signature and `self` are kept
    pub fn method() -> Self {
        CanonicalizeOptions {
            rename_function: false,
            keep_signature: true,
            preserved_names: vec!["self".to_string()],
            ..Self::function()
        }
    }

    /// Loads options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: CanonicalizeOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects options no canonicalization can run with
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidOptions(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = self.preserved_names.iter().find(|n| !is_identifier(n)) {
            return Err(Error::InvalidOptions(format!(
                "preserved name `{}` is not an identifier",
                bad
            )));
        }
        Ok(())
    }

    /// True if `name` must keep its spelling
    pub fn is_preserved(&self, name: &str) -> bool {
        self.preserved_names.iter().any(|n| n == name)
    }
}

impl Default for CanonicalizeOptions {
    fn default() -> Self {
        Self::function()
    }
}

/// Canonical text of the single function in `source`
pub fn canonicalize_function(source: &str) -> Result<String> {
    let function = parse_function(source)?;
    canonicalize_function_with(&function, &CanonicalizeOptions::function())
}

/// Canonical text of a parsed function
pub fn canonicalize_function_with(
    function: &FunctionDef,
    options: &CanonicalizeOptions,
) -> Result<String> {
    let canonical = canonicalize_procedure(function, options)?;
    Ok(unparse_function(&canonical))
}

/// Canonical form of a procedure as a tree
pub fn canonicalize_procedure(
    function: &FunctionDef,
    options: &CanonicalizeOptions,
) -> Result<FunctionDef> {
    options.validate()?;
    validate_function(function, &GrammarRules::input())?;

    let mut names = NameGenerator::new();
    let mut current = function.clone();
    let mut previous = unparse_function(&current);
    let warn_after = options.max_iterations / 2;

    let mut iteration = 0;
    loop {
        iteration += 1;
        if iteration > options.max_iterations {
            return Err(Error::FixedPointExceeded {
                iterations: options.max_iterations,
            });
        }
        if iteration == warn_after + 1 && warn_after > 0 {
            tracing::warn!(
                function = %function.name,
                iteration,
                max_iterations = options.max_iterations,
                "canonicalization is slow to converge"
            );
        }

        run_pipeline(&mut current, &mut names, options)?;

        let text = unparse_function(&current);
        tracing::debug!(function = %function.name, iteration, "canonicalization iteration");
        tracing::trace!("{}", text);
        if text == previous {
            break;
        }
        previous = text;
    }

    validate_function(&current, &GrammarRules::canonical())?;
    Ok(current)
}

/// One round of every pass, in pipeline order
fn run_pipeline(
    function: &mut FunctionDef,
    names: &mut NameGenerator,
    options: &CanonicalizeOptions,
) -> Result<()> {
    ifstatements::if_statements_to_expressions(function, names)?;
    expand::call_arguments(function, names);
    canonicalize_return(function, names);
    if options.rename_function {
        function.name = "f".to_string();
    }
    lambdas::inline_lambdas(function)?;
    expand::unfold_tuples(function, names);
    collapse::collapse_useless_assigns(function, options);
    simplify::simplify(function);
    ordering::reorder_lines(function, options);
    if !options.keep_signature {
        ordering::canonicalize_argument_order(function, options);
    }
    names::canonicalize_variable_names(function, names, options);
    Ok(())
}

/// `return <non-trivial>` becomes `r = <expr>; return r`
pub fn canonicalize_return(function: &mut FunctionDef, names: &mut NameGenerator) {
    let value = match function.body.last_mut() {
        Some(Stmt::Return(Some(value))) if !value.is_trivial() => value,
        _ => return,
    };
    let temp = names.temporary();
    let expr = std::mem::replace(value, Expr::name(&temp));
    let at = function.body.len() - 1;
    function.body.insert(at, Stmt::assign_name(temp, expr));
}
