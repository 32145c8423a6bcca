use serde::{Deserialize, Serialize};

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All possible token types of the game language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Integer(i64),
    /// Floating-point literal
    Float(f64),
    /// String literal
    String(String),
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    NoneLit,

    /// Identifier or keyword; keywords are resolved by the parser
    Identifier(String),

    // Operators
    /// Plus operator (+)
    Plus,
    /// Minus operator (-)
    Minus,
    /// Star operator (*)
    Star,
    /// Power operator (**)
    StarStar,
    /// Slash operator (/)
    Slash,
    /// Floor division operator (//)
    SlashSlash,
    /// Percent operator (%)
    Percent,
    /// Matrix multiplication / decorator marker (@)
    At,
    /// Left shift (<<)
    LeftShift,
    /// Right shift (>>)
    RightShift,
    /// Bitwise and (&)
    Amp,
    /// Bitwise or (|)
    Pipe,
    /// Bitwise xor (^)
    Caret,
    /// Bitwise invert (~)
    Tilde,
    /// Equality operator (==)
    Eq,
    /// Inequality operator (!=)
    NotEq,
    /// Less than operator (<)
    Lt,
    /// Greater than operator (>)
    Gt,
    /// Less than or equal operator (<=)
    LtEq,
    /// Greater than or equal operator (>=)
    GtEq,
    /// Assignment operator (=)
    Assign,
    /// Augmented assignment; carries the operator text (`+` for `+=`)
    AugAssign(String),
    /// Assignment expression (:=)
    ColonAssign,
    /// Return annotation arrow (->)
    Arrow,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left bracket [
    LeftBracket,
    /// Right bracket ]
    RightBracket,
    /// Left brace {
    LeftBrace,
    /// Right brace }
    RightBrace,
    /// Comma delimiter
    Comma,
    /// Colon delimiter
    Colon,
    /// Dot operator
    Dot,
    /// Semicolon statement separator
    Semicolon,

    // Layout
    /// End of a logical line
    Newline,
    /// Indentation increased
    Indent,
    /// Indentation decreased
    Dedent,

    // Special
    /// End of file marker
    Eof,
}

/// Words the parser gives meaning to, either as part of the accepted subset
/// or to reject a construct by name.
pub const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

impl TokenKind {
    /// Check if token is a keyword
    pub fn is_keyword(&self) -> bool {
        match self {
            TokenKind::Identifier(name) => KEYWORDS.contains(&name.as_str()),
            _ => false,
        }
    }

    /// Check if token is the given keyword
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, TokenKind::Identifier(name) if name == word)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(fl) => write!(f, "{}", fl),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(id) => write!(f, "{}", id),
            TokenKind::AugAssign(op) => write!(f, "{}=", op),
            _ => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection() {
        assert!(TokenKind::Identifier("for".to_string()).is_keyword());
        assert!(TokenKind::Identifier("lambda".to_string()).is_keyword());
        assert!(!TokenKind::Identifier("scheme".to_string()).is_keyword());
        assert!(!TokenKind::Integer(42).is_keyword());
    }

    #[test]
    fn test_is_word() {
        assert!(TokenKind::Identifier("def".to_string()).is_word("def"));
        assert!(!TokenKind::Identifier("define".to_string()).is_word("def"));
        assert!(!TokenKind::Comma.is_word("def"));
    }
}
