use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// Columns a tab advances to, as in Python's tokenizer
const TAB_WIDTH: usize = 8;

/// Scanner for the indentation-sensitive game syntax
pub struct Scanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Column of the start of the current token
    start_column: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Open indentation levels; the bottom entry is always 0
    indent_stack: Vec<usize>,
    /// Nesting depth of (), [] and {}; newlines inside are not significant
    paren_depth: usize,
    /// True while positioned at the beginning of a physical line
    at_line_start: bool,
}

impl Scanner {
    /// Creates a new scanner from source code
    pub fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            start_column: 1,
            current: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            paren_depth: 0,
            at_line_start: true,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            if self.at_line_start && self.paren_depth == 0 {
                self.scan_indentation()?;
                continue;
            }
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token()?;
        }

        if self.paren_depth > 0 {
            return Err(self.error("unexpected end of file inside brackets"));
        }

        let needs_newline = !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Dedent)
        );
        if needs_newline {
            self.push_layout(TokenKind::Newline);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push_layout(TokenKind::Dedent);
        }
        self.push_layout(TokenKind::Eof);

        Ok(std::mem::take(&mut self.tokens))
    }

    /// Measures the indentation of a new line and emits Indent/Dedent tokens.
    /// Blank and comment-only lines are consumed without layout tokens.
    fn scan_indentation(&mut self) -> Result<()> {
        let mut width = 0;
        while !self.is_at_end() {
            match self.peek() {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            '\n' => {
                self.advance();
                self.new_line();
                return Ok(());
            }
            '\r' => {
                self.advance();
                return Ok(());
            }
            '#' => {
                self.skip_line_comment();
                return Ok(());
            }
            '\0' if self.is_at_end() => return Ok(()),
            _ => {}
        }

        self.at_line_start = false;
        self.start = self.current;
        self.start_column = self.column;

        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            self.indent_stack.push(width);
            self.push_layout(TokenKind::Indent);
        } else if width < current {
            while self.indent_stack.last().copied().unwrap_or(0) > width {
                self.indent_stack.pop();
                self.push_layout(TokenKind::Dedent);
            }
            if self.indent_stack.last().copied().unwrap_or(0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' => {}

            '\n' => {
                if self.paren_depth == 0 {
                    self.add_token(TokenKind::Newline);
                    self.at_line_start = true;
                }
                self.new_line();
            }

            // Explicit line joining
            '\\' => {
                let _ = self.match_char('\r');
                if !self.match_char('\n') {
                    return Err(self.error("unexpected character after line continuation"));
                }
                self.new_line();
            }

            '#' => self.skip_line_comment(),

            // Delimiters
            '(' => {
                self.paren_depth += 1;
                self.add_token(TokenKind::LeftParen);
            }
            ')' => {
                self.close_bracket()?;
                self.add_token(TokenKind::RightParen);
            }
            '[' => {
                self.paren_depth += 1;
                self.add_token(TokenKind::LeftBracket);
            }
            ']' => {
                self.close_bracket()?;
                self.add_token(TokenKind::RightBracket);
            }
            '{' => {
                self.paren_depth += 1;
                self.add_token(TokenKind::LeftBrace);
            }
            '}' => {
                self.close_bracket()?;
                self.add_token(TokenKind::RightBrace);
            }
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            '~' => self.add_token(TokenKind::Tilde),
            ':' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::ColonAssign);
                } else {
                    self.add_token(TokenKind::Colon);
                }
            }
            '.' => {
                if self.peek().is_ascii_digit() {
                    self.scan_number()?;
                } else {
                    self.add_token(TokenKind::Dot);
                }
            }

            // Operators
            '+' => self.operator_or_aug(TokenKind::Plus, "+"),
            '%' => self.operator_or_aug(TokenKind::Percent, "%"),
            '@' => self.operator_or_aug(TokenKind::At, "@"),
            '&' => self.operator_or_aug(TokenKind::Amp, "&"),
            '|' => self.operator_or_aug(TokenKind::Pipe, "|"),
            '^' => self.operator_or_aug(TokenKind::Caret, "^"),
            '-' => {
                if self.match_char('>') {
                    self.add_token(TokenKind::Arrow);
                } else {
                    self.operator_or_aug(TokenKind::Minus, "-");
                }
            }
            '*' => {
                if self.match_char('*') {
                    self.operator_or_aug(TokenKind::StarStar, "**");
                } else {
                    self.operator_or_aug(TokenKind::Star, "*");
                }
            }
            '/' => {
                if self.match_char('/') {
                    self.operator_or_aug(TokenKind::SlashSlash, "//");
                } else {
                    self.operator_or_aug(TokenKind::Slash, "/");
                }
            }

            // Comparison operators
            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Eq);
                } else {
                    self.add_token(TokenKind::Assign);
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::NotEq);
                } else {
                    return Err(self.error("unexpected character '!'"));
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::LtEq);
                } else if self.match_char('<') {
                    self.operator_or_aug(TokenKind::LeftShift, "<<");
                } else {
                    self.add_token(TokenKind::Lt);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::GtEq);
                } else if self.match_char('>') {
                    self.operator_or_aug(TokenKind::RightShift, ">>");
                } else {
                    self.add_token(TokenKind::Gt);
                }
            }

            // Strings
            '"' | '\'' => self.scan_string(c)?,

            // Numbers
            c if c.is_ascii_digit() => self.scan_number()?,

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            _ => {
                return Err(self.error(format!("unexpected character '{}'", c)));
            }
        }

        Ok(())
    }

    fn operator_or_aug(&mut self, kind: TokenKind, text: &str) {
        if self.match_char('=') {
            self.add_token(TokenKind::AugAssign(text.to_string()));
        } else {
            self.add_token(kind);
        }
    }

    fn close_bracket(&mut self) -> Result<()> {
        if self.paren_depth == 0 {
            return Err(self.error("unmatched closing bracket"));
        }
        self.paren_depth -= 1;
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<()> {
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != quote {
            match self.peek() {
                '\\' => {
                    self.advance();
                    let escaped = self.advance();
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        'x' => value.push(self.scan_hex_escape()?),
                        _ => {
                            return Err(
                                self.error(format!("invalid escape sequence \\{}", escaped))
                            );
                        }
                    }
                }
                '\n' => return Err(self.error("unterminated string")),
                _ => value.push(self.advance()),
            }
        }

        if self.is_at_end() {
            return Err(self.error("unterminated string"));
        }

        self.advance(); // closing quote

        self.add_token(TokenKind::String(value));
        Ok(())
    }

    /// Two hex digits after `\x`
    fn scan_hex_escape(&mut self) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..2 {
            match self.peek().to_digit(16) {
                Some(d) => {
                    self.advance();
                    code = code * 16 + d;
                }
                None => return Err(self.error("truncated \\xHH escape")),
            }
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid \\xHH escape"))
    }

    fn scan_number(&mut self) -> Result<()> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = self.source[self.start] == '.';
        if self.peek() == '.' && !is_float {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.peek(), 'e' | 'E')
            && (self.peek_next().is_ascii_digit()
                || (matches!(self.peek_next(), '+' | '-')
                    && self.peek_at(2).is_ascii_digit()))
        {
            is_float = true;
            self.advance();
            if matches!(self.peek(), '+' | '-') {
                self.advance();
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid float literal {}", text)))?;
            self.add_token(TokenKind::Float(value));
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(format!("integer literal {} out of range", text)))?;
            self.add_token(TokenKind::Integer(value));
        }

        Ok(())
    }

    fn scan_identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();

        let token_kind = match text.as_str() {
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::NoneLit,
            _ => TokenKind::Identifier(text),
        };

        self.add_token(token_kind);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> char {
        self.source
            .get(self.current + offset)
            .copied()
            .unwrap_or('\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.current += 1;
            self.column += 1;
            true
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens
            .push(Token::new(kind, lexeme, self.line, self.start_column));
    }

    fn push_layout(&mut self, kind: TokenKind) {
        self.tokens
            .push(Token::new(kind, String::new(), self.line, self.column));
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError {
            line: self.line,
            col: self.column,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_assignment() {
        let tokens = kinds("c = a + 9");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("c".to_string()),
                TokenKind::Assign,
                TokenKind::Identifier("a".to_string()),
                TokenKind::Plus,
                TokenKind::Integer(9),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indentation_layout() {
        let tokens = kinds("def f(a):\n    return a\n");
        assert!(tokens.contains(&TokenKind::Indent));
        assert!(tokens.contains(&TokenKind::Dedent));
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let tokens = kinds("def f():\n\n    # comment\n    return 1\n");
        let indents = tokens.iter().filter(|t| **t == TokenKind::Indent).count();
        assert_eq!(indents, 1);
    }

    #[test]
    fn test_newlines_inside_parens() {
        let tokens = kinds("x = f(a,\n      b)\n");
        let newlines = tokens.iter().filter(|t| **t == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a // b ** c -> d += 1");
        assert!(tokens.contains(&TokenKind::SlashSlash));
        assert!(tokens.contains(&TokenKind::StarStar));
        assert!(tokens.contains(&TokenKind::Arrow));
        assert!(tokens.contains(&TokenKind::AugAssign("+".to_string())));
    }

    #[test]
    fn test_numbers_and_strings() {
        let tokens = kinds("x = (1.5, 2e3, 'a\\'b', \"c\")");
        assert!(tokens.contains(&TokenKind::Float(1.5)));
        assert!(tokens.contains(&TokenKind::Float(2000.0)));
        assert!(tokens.contains(&TokenKind::String("a'b".to_string())));
        assert!(tokens.contains(&TokenKind::String("c".to_string())));
    }

    #[test]
    fn test_hex_escapes() {
        let tokens = kinds("x = 'a\\x00b\\x7F'");
        assert!(tokens.contains(&TokenKind::String("a\0b\x7f".to_string())));
        assert!(Scanner::new("x = '\\x4'").scan_tokens().is_err());
        assert!(Scanner::new("x = '\\xzz'").scan_tokens().is_err());
    }

    #[test]
    fn test_bad_dedent() {
        let result = Scanner::new("def f():\n        x = 1\n    return x\n").scan_tokens();
        assert!(matches!(result, Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_unterminated_string() {
        let result = Scanner::new("x = 'abc").scan_tokens();
        assert!(matches!(result, Err(Error::SyntaxError { .. })));
    }
}
