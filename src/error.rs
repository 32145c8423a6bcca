//! Error types for the gamehop engine

use thiserror::Error;

/// Canonicalization and inlining errors
///
/// Every variant is fatal to the call that produced it: the engine never
/// returns a partial result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Front-end errors
    /// Syntax error encountered while scanning or parsing
    ///
    /// **Triggered by:** Malformed source text (bad indentation, unbalanced
    /// parentheses, unterminated strings)
    /// **Example:** `def f(a:\n    return a`
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// Unexpected token encountered during parsing
    #[error("Unexpected token at line {line}: expected {expected}, got {got}")]
    UnexpectedToken {
        /// Expected token description
        expected: String,
        /// Actual token received
        got: String,
        /// Line of the offending token
        line: usize,
    },

    /// Unexpected end of file during parsing
    #[error("Unexpected end of file")]
    UnexpectedEof,

    // Grammar subset
    /// The input uses a language feature outside the accepted subset
    ///
    /// **Triggered by:** loops, exception handling, comprehensions, imports,
    /// default or variadic parameters, keyword arguments, chained assignment
    /// **Example:** `for i in range(3): ...`
    /// **Prevention:** Rewrite the game without the construct; the tool will
    /// not accept it in any mode
    #[error("Unsupported construct `{construct}` at {location}")]
    UnsupportedConstruct {
        /// Name of the rejected node kind
        construct: String,
        /// Source position or statement path
        location: String,
    },

    // Inlining
    /// A call site or callee does not have a shape the inliner supports
    ///
    /// **Triggered by:** calls nested inside expressions, callees with more
    /// than one return point, value-substituting a reassigned parameter
    /// **Example:** `x = f(a) + 1` when inlining `f`
    #[error("Cannot inline `{callee}`: {reason}")]
    InlineShapeViolation {
        /// Name of the callee being inlined
        callee: String,
        /// Why the shape is unsupported
        reason: String,
    },

    /// A rename target already exists in the destination scope
    #[error("Name collision: `{name}` already exists in {scope}")]
    NameCollision {
        /// Colliding name
        name: String,
        /// Scope the collision was detected in
        scope: String,
    },

    /// A named parameter, method or attribute could not be found
    #[error("Unknown name `{name}` in {context}")]
    UnknownName {
        /// Name looked up
        name: String,
        /// Where it was looked up
        context: String,
    },

    /// Recognized shape that the engine does not handle yet
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// Description of the unhandled shape
        feature: String,
    },

    /// Canonicalization did not reach a fixed point
    #[error("Canonicalization did not converge after {iterations} iterations")]
    FixedPointExceeded {
        /// Iterations performed before giving up
        iterations: usize,
    },

    /// Invalid configuration value
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The input has to be changed (unsupported grammar or shape)
    Input,
    /// The tool itself misbehaved
    Defect,
}

impl Error {
    /// Create an unsupported-construct error
    pub fn unsupported(construct: impl Into<String>, location: impl Into<String>) -> Self {
        Error::UnsupportedConstruct {
            construct: construct.into(),
            location: location.into(),
        }
    }

    /// Create an inline-shape error
    pub fn inline_shape(callee: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InlineShapeViolation {
            callee: callee.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Error::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Classify error severity
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::FixedPointExceeded { .. } => ErrorSeverity::Defect,
            Error::NameCollision { .. } => ErrorSeverity::Defect,
            _ => ErrorSeverity::Input,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidOptions(err.to_string())
    }
}

/// Result type for gamehop operations
pub type Result<T> = std::result::Result<T, Error>;
