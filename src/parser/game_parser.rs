use super::ast::{
    Arguments, BinaryOp, BoolOp, ClassDef, CmpOp, Constant, Expr, FunctionDef, Item, Keyword,
    Module, Stmt, UnaryOp,
};
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};

/// Keywords that name constructs outside the accepted subset, with the name
/// reported in the error.
const REJECTED_KEYWORDS: &[(&str, &str)] = &[
    ("for", "for loop"),
    ("while", "while loop"),
    ("try", "exception handling"),
    ("except", "exception handling"),
    ("finally", "exception handling"),
    ("raise", "raise statement"),
    ("with", "with statement"),
    ("import", "import"),
    ("from", "import"),
    ("global", "global declaration"),
    ("nonlocal", "nonlocal declaration"),
    ("yield", "generator"),
    ("async", "async code"),
    ("await", "async code"),
    ("del", "del statement"),
    ("assert", "assert statement"),
    ("break", "loop control"),
    ("continue", "loop control"),
];

/// Deepest nesting of expressions and blocks the parser descends into
pub const MAX_NESTING_DEPTH: usize = 64;

/// Recursive descent parser for the game language
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl Parser {
    /// Creates a new parser over scanned tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    /// Parses the tokens into a module
    pub fn parse(&mut self) -> Result<Module> {
        let mut items = Vec::new();

        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            items.push(self.parse_item()?);
        }

        Ok(Module { items })
    }

    fn parse_item(&mut self) -> Result<Item> {
        let decorators = self.parse_decorators()?;
        if self.check_word("def") {
            return Ok(Item::Function(self.parse_function(decorators)?));
        }
        if self.check_word("class") {
            if !decorators.is_empty() {
                return Err(self.unsupported("class decorator"));
            }
            return Ok(Item::Class(self.parse_class()?));
        }
        self.reject_keyword()?;
        Err(self.unexpected("`def` or `class`"))
    }

    fn parse_decorators(&mut self) -> Result<Vec<Expr>> {
        let mut decorators = Vec::new();
        while self.match_kind(&TokenKind::At) {
            decorators.push(self.parse_expression()?);
            self.consume(&TokenKind::Newline, "newline after decorator")?;
            self.skip_newlines();
        }
        Ok(decorators)
    }

    fn parse_function(&mut self, decorators: Vec<Expr>) -> Result<FunctionDef> {
        let line = self.peek().line;
        self.advance(); // def
        let name = self.consume_identifier("function name")?;
        self.consume(&TokenKind::LeftParen, "`(`")?;
        let args = self.parse_parameters()?;
        self.consume(&TokenKind::RightParen, "`)`")?;
        if self.match_kind(&TokenKind::Arrow) {
            // Return annotations carry no semantics for canonicalization
            self.parse_expression()?;
        }
        self.consume(&TokenKind::Colon, "`:`")?;

        let mut body = self.parse_suite()?;
        if matches!(
            body.first(),
            Some(Stmt::Expr(Expr::Constant(Constant::Str(_))))
        ) {
            body.remove(0);
        }

        Ok(FunctionDef {
            name,
            args,
            body,
            decorators,
            line,
        })
    }

    fn parse_parameters(&mut self) -> Result<Arguments> {
        let mut args = Arguments::default();

        while !self.check(&TokenKind::RightParen) {
            if self.match_kind(&TokenKind::StarStar) {
                args.kwarg = Some(self.consume_identifier("parameter name")?);
                self.skip_annotation()?;
            } else if self.match_kind(&TokenKind::Star) {
                if self.check(&TokenKind::Comma) {
                    return Err(self.unsupported("keyword-only parameters"));
                }
                args.vararg = Some(self.consume_identifier("parameter name")?);
                self.skip_annotation()?;
            } else {
                let name = self.consume_identifier("parameter name")?;
                self.skip_annotation()?;
                if self.match_kind(&TokenKind::Assign) {
                    args.defaults.push(self.parse_expression()?);
                }
                args.params.push(name);
            }

            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    fn skip_annotation(&mut self) -> Result<()> {
        if self.match_kind(&TokenKind::Colon) {
            self.parse_expression()?;
        }
        Ok(())
    }

    fn parse_class(&mut self) -> Result<ClassDef> {
        let line = self.peek().line;
        self.advance(); // class
        let name = self.consume_identifier("class name")?;

        let mut bases = Vec::new();
        if self.match_kind(&TokenKind::LeftParen) {
            while !self.check(&TokenKind::RightParen) {
                bases.push(self.parse_expression()?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume(&TokenKind::RightParen, "`)`")?;
        }
        self.consume(&TokenKind::Colon, "`:`")?;

        let mut class = ClassDef {
            name,
            bases,
            methods: Vec::new(),
            classes: Vec::new(),
            line,
        };

        if !self.match_kind(&TokenKind::Newline) {
            // Single-line body: only `class X: pass` is meaningful
            if !self.match_word("pass") {
                return Err(self.unsupported("class-level statement"));
            }
            self.consume_line_end()?;
            return Ok(class);
        }

        self.consume(&TokenKind::Indent, "indented class body")?;
        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.is_at_end() {
                break;
            }
            self.parse_class_member(&mut class)?;
        }

        Ok(class)
    }

    fn parse_class_member(&mut self, class: &mut ClassDef) -> Result<()> {
        let decorators = self.parse_decorators()?;
        if self.check_word("def") {
            class.methods.push(self.parse_function(decorators)?);
            return Ok(());
        }
        if !decorators.is_empty() {
            return Err(self.unexpected("`def` after decorator"));
        }
        if self.check_word("class") {
            class.classes.push(self.parse_class()?);
            return Ok(());
        }
        if self.match_word("pass") {
            return self.consume_line_end();
        }
        if let TokenKind::String(_) = self.peek().kind {
            // Docstring
            self.advance();
            return self.consume_line_end();
        }
        self.reject_keyword()?;
        Err(self.unsupported("class-level statement"))
    }

    /// Parses the block after a `:`, either indented or on the same line
    fn parse_suite(&mut self) -> Result<Vec<Stmt>> {
        self.nested(Self::parse_suite_body)
    }

    fn parse_suite_body(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();

        if self.match_kind(&TokenKind::Newline) {
            self.skip_newlines();
            self.consume(&TokenKind::Indent, "indented block")?;
            while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
                self.parse_statement_into(&mut statements)?;
                self.skip_newlines();
            }
            self.match_kind(&TokenKind::Dedent);
        } else {
            self.parse_simple_statements(&mut statements)?;
        }

        Ok(statements)
    }

    fn parse_statement_into(&mut self, out: &mut Vec<Stmt>) -> Result<()> {
        if self.check_word("if") {
            out.push(self.parse_if()?);
            return Ok(());
        }
        if self.check_word("def") {
            return Err(self.unsupported("nested function definition"));
        }
        if self.check_word("class") {
            return Err(self.unsupported("nested class definition"));
        }
        if self.check(&TokenKind::At) {
            return Err(self.unsupported("decorator"));
        }
        self.parse_simple_statements(out)
    }

    fn parse_simple_statements(&mut self, out: &mut Vec<Stmt>) -> Result<()> {
        loop {
            out.push(self.parse_small_statement()?);
            if self.match_kind(&TokenKind::Semicolon) {
                if self.check(&TokenKind::Newline) || self.is_at_end() {
                    break;
                }
                continue;
            }
            break;
        }
        self.consume_line_end()
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.advance(); // if / elif
        let test = self.parse_expression()?;
        self.consume(&TokenKind::Colon, "`:`")?;
        let body = self.parse_suite()?;

        let orelse = if self.check_word("elif") {
            vec![self.nested(Self::parse_if)?]
        } else if self.match_word("else") {
            self.consume(&TokenKind::Colon, "`:`")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };

        Ok(Stmt::If { test, body, orelse })
    }

    fn parse_small_statement(&mut self) -> Result<Stmt> {
        self.reject_keyword()?;

        if self.match_word("pass") {
            return Ok(Stmt::Pass);
        }

        if self.match_word("return") {
            if self.at_statement_end() {
                return Ok(Stmt::Return(None));
            }
            return Ok(Stmt::Return(Some(self.parse_expression_list()?)));
        }

        let first = self.parse_expression_list()?;

        if self.check(&TokenKind::Assign) {
            let mut targets = vec![first];
            while self.match_kind(&TokenKind::Assign) {
                targets.push(self.parse_expression_list()?);
            }
            let value = targets.pop().ok_or(Error::UnexpectedEof)?;
            return Ok(Stmt::Assign { targets, value });
        }

        if let TokenKind::AugAssign(op) = self.peek().kind.clone() {
            self.advance();
            let op = aug_operator(&op).ok_or_else(|| self.unsupported("augmented assignment"))?;
            let value = self.parse_expression_list()?;
            return Ok(Stmt::assign(
                first.clone(),
                Expr::BinOp {
                    left: Box::new(first),
                    op,
                    right: Box::new(value),
                },
            ));
        }

        if self.match_kind(&TokenKind::Colon) {
            // Annotated assignment; the annotation is discarded
            self.parse_expression()?;
            if self.match_kind(&TokenKind::Assign) {
                let value = self.parse_expression_list()?;
                return Ok(Stmt::assign(first, value));
            }
            return Err(self.unsupported("bare annotation"));
        }

        Ok(Stmt::Expr(first))
    }

    /// Expression list; a comma makes it a bare tuple
    fn parse_expression_list(&mut self) -> Result<Expr> {
        let first = self.parse_expression_or_star()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if self.at_expression_end() {
                break;
            }
            elts.push(self.parse_expression_or_star()?);
        }
        Ok(Expr::Tuple(elts))
    }

    fn parse_expression_or_star(&mut self) -> Result<Expr> {
        if self.match_kind(&TokenKind::Star) {
            return Ok(Expr::Starred(Box::new(self.parse_bit_or()?)));
        }
        self.parse_expression()
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.nested(Self::parse_expression_body)
    }

    fn parse_expression_body(&mut self) -> Result<Expr> {
        if self.check_word("lambda") {
            return self.parse_lambda();
        }

        let body = self.parse_or()?;

        if self.check(&TokenKind::ColonAssign) {
            return Err(self.unsupported("assignment expression"));
        }

        if self.match_word("if") {
            let test = self.parse_or()?;
            if !self.match_word("else") {
                return Err(self.unexpected("`else` in conditional expression"));
            }
            let orelse = self.parse_expression()?;
            return Ok(Expr::if_exp(test, body, orelse));
        }

        Ok(body)
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        self.advance(); // lambda
        let mut params = Vec::new();
        while !self.check(&TokenKind::Colon) {
            if self.check(&TokenKind::Star) || self.check(&TokenKind::StarStar) {
                return Err(self.unsupported("variadic lambda parameter"));
            }
            params.push(self.consume_identifier("lambda parameter")?);
            if self.check(&TokenKind::Assign) {
                return Err(self.unsupported("lambda default parameter"));
            }
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::Colon, "`:` in lambda")?;
        let body = self.parse_expression()?;
        Ok(Expr::Lambda {
            params,
            body: Box::new(body),
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let first = self.parse_and()?;
        if !self.check_word("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.match_word("or") {
            values.push(self.parse_and()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::Or,
            values,
        })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let first = self.parse_not()?;
        if !self.check_word("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.match_word("and") {
            values.push(self.parse_not()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::And,
            values,
        })
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.match_word("not") {
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_bit_or()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        loop {
            let op = match &self.peek().kind {
                TokenKind::Eq => CmpOp::Eq,
                TokenKind::NotEq => CmpOp::NotEq,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::LtEq => CmpOp::LtEq,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::GtEq => CmpOp::GtEq,
                kind if kind.is_word("in") => CmpOp::In,
                kind if kind.is_word("is") => {
                    if self.peek_next().kind.is_word("not") {
                        self.advance();
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                kind if kind.is_word("not") && self.peek_next().kind.is_word("in") => {
                    self.advance();
                    CmpOp::NotIn
                }
                _ => break,
            };
            self.advance();
            ops.push(op);
            comparators.push(self.parse_bit_or()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn parse_bit_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_bit_xor()?;
        while self.match_kind(&TokenKind::Pipe) {
            let right = self.parse_bit_xor()?;
            left = binop(left, BinaryOp::BitOr, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr> {
        let mut left = self.parse_bit_and()?;
        while self.match_kind(&TokenKind::Caret) {
            let right = self.parse_bit_and()?;
            left = binop(left, BinaryOp::BitXor, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_shift()?;
        while self.match_kind(&TokenKind::Amp) {
            let right = self.parse_shift()?;
            left = binop(left, BinaryOp::BitAnd, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        let mut left = self.parse_arith()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::LeftShift => BinaryOp::LShift,
                TokenKind::RightShift => BinaryOp::RShift,
                _ => break,
            };
            self.advance();
            let right = self.parse_arith()?;
            left = binop(left, op, right);
        }
        Ok(left)
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binop(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                TokenKind::At => BinaryOp::MatMul,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = binop(left, op, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Tilde => Some(UnaryOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.nested(Self::parse_factor)?;
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.match_kind(&TokenKind::StarStar) {
            let exponent = self.nested(Self::parse_factor)?;
            return Ok(binop(base, BinaryOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;

        loop {
            if self.match_kind(&TokenKind::Dot) {
                let attr = self.consume_identifier("attribute name")?;
                expr = Expr::attribute(expr, attr);
            } else if self.match_kind(&TokenKind::LeftParen) {
                expr = self.parse_call(expr)?;
            } else if self.match_kind(&TokenKind::LeftBracket) {
                if self.check(&TokenKind::Colon) {
                    return Err(self.unsupported("slice"));
                }
                let index = self.parse_expression_list()?;
                if self.check(&TokenKind::Colon) {
                    return Err(self.unsupported("slice"));
                }
                self.consume(&TokenKind::RightBracket, "`]`")?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_call(&mut self, func: Expr) -> Result<Expr> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            if self.match_kind(&TokenKind::StarStar) {
                keywords.push(Keyword {
                    arg: None,
                    value: self.parse_expression()?,
                });
            } else if self.match_kind(&TokenKind::Star) {
                args.push(Expr::Starred(Box::new(self.parse_expression()?)));
            } else if matches!(self.peek().kind, TokenKind::Identifier(_))
                && self.peek_next().kind == TokenKind::Assign
            {
                let arg = self.consume_identifier("keyword")?;
                self.advance(); // =
                keywords.push(Keyword {
                    arg: Some(arg),
                    value: self.parse_expression()?,
                });
            } else {
                args.push(self.parse_expression()?);
            }

            if self.check_word("for") {
                return Err(self.unsupported("generator expression"));
            }
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::RightParen, "`)` after arguments")?;

        Ok(Expr::Call {
            func: Box::new(func),
            args,
            keywords,
        })
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Constant(Constant::Int(n)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Constant(Constant::Float(f)))
            }
            TokenKind::String(s) => {
                self.advance();
                // Adjacent literals concatenate
                let mut value = s;
                while let TokenKind::String(next) = &self.peek().kind {
                    value.push_str(next);
                    self.advance();
                }
                Ok(Expr::Constant(Constant::Str(value)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::bool(false))
            }
            TokenKind::NoneLit => {
                self.advance();
                Ok(Expr::none())
            }
            TokenKind::Identifier(ref name) => {
                self.reject_keyword()?;
                if token.kind.is_keyword() {
                    return Err(self.unexpected("expression"));
                }
                let name = name.clone();
                self.advance();
                Ok(Expr::Name(name))
            }
            TokenKind::LeftParen => {
                self.advance();
                if self.match_kind(&TokenKind::RightParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expression_or_star()?;
                if self.check_word("for") {
                    return Err(self.unsupported("generator expression"));
                }
                if !self.match_kind(&TokenKind::Comma) {
                    self.consume(&TokenKind::RightParen, "`)`")?;
                    return Ok(first);
                }
                let mut elts = vec![first];
                while !self.check(&TokenKind::RightParen) {
                    elts.push(self.parse_expression_or_star()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(&TokenKind::RightParen, "`)`")?;
                Ok(Expr::Tuple(elts))
            }
            TokenKind::LeftBracket => Err(self.unsupported("list display")),
            TokenKind::LeftBrace => Err(self.unsupported("dict or set display")),
            TokenKind::Eof => Err(Error::UnexpectedEof),
            _ => Err(self.unexpected("expression")),
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn reject_keyword(&self) -> Result<()> {
        if let TokenKind::Identifier(word) = &self.peek().kind {
            if let Some((_, construct)) = REJECTED_KEYWORDS.iter().find(|(kw, _)| kw == word) {
                return Err(self.unsupported(construct));
            }
        }
        Ok(())
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof | TokenKind::Dedent
        )
    }

    fn at_expression_end(&self) -> bool {
        self.at_statement_end()
            || matches!(
                self.peek().kind,
                TokenKind::Assign
                    | TokenKind::AugAssign(_)
                    | TokenKind::RightParen
                    | TokenKind::RightBracket
                    | TokenKind::Colon
            )
    }

    fn consume_line_end(&mut self) -> Result<()> {
        if self.match_kind(&TokenKind::Newline) || self.is_at_end() {
            return Ok(());
        }
        if self.check(&TokenKind::Dedent) {
            return Ok(());
        }
        Err(self.unexpected("end of line"))
    }

    fn skip_newlines(&mut self) {
        while self.match_kind(&TokenKind::Newline) {}
    }

    fn consume_identifier(&mut self, what: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) if !self.peek().kind.is_keyword() => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn consume(&mut self, kind: &TokenKind, what: &str) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else if self.is_at_end() {
            Err(Error::UnexpectedEof)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn check_word(&self, word: &str) -> bool {
        self.peek().kind.is_word(word)
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> &Token {
        let idx = self.current.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn peek_next(&self) -> &Token {
        let idx = (self.current + 1).min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.tokens.is_empty() || self.peek().kind == TokenKind::Eof
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek();
            return Err(Error::SyntaxError {
                line: token.line,
                col: token.column,
                message: format!("nested more than {} levels deep", MAX_NESTING_DEPTH),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn location(&self) -> String {
        let token = self.peek();
        format!("line {}, column {}", token.line, token.column)
    }

    fn unsupported(&self, construct: &str) -> Error {
        Error::unsupported(construct, self.location())
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.peek();
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: if token.lexeme.is_empty() {
                format!("{:?}", token.kind)
            } else {
                token.lexeme.clone()
            },
            line: token.line,
        }
    }
}

fn binop(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn aug_operator(text: &str) -> Option<BinaryOp> {
    Some(match text {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "@" => BinaryOp::MatMul,
        "/" => BinaryOp::Div,
        "//" => BinaryOp::FloorDiv,
        "%" => BinaryOp::Mod,
        "**" => BinaryOp::Pow,
        "<<" => BinaryOp::LShift,
        ">>" => BinaryOp::RShift,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "&" => BinaryOp::BitAnd,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;

    fn parse(source: &str) -> Result<Module> {
        let tokens = Scanner::new(source).scan_tokens()?;
        Parser::new(tokens).parse()
    }

    fn parse_one_function(source: &str) -> FunctionDef {
        match parse(source).unwrap().items.remove(0) {
            Item::Function(f) => f,
            Item::Class(_) => panic!("expected a function"),
        }
    }

    #[test]
    fn test_parse_simple_function() {
        let f = parse_one_function("def f(a, b):\n    c = a + 9\n    return c\n");
        assert_eq!(f.name, "f");
        assert_eq!(f.params(), &["a".to_string(), "b".to_string()]);
        assert_eq!(f.body.len(), 2);
        assert!(f.body[1].is_return());
    }

    #[test]
    fn test_parse_single_line_body() {
        let f = parse_one_function("def f(a,b): c=a+9; d=b+7; e=c+d; return e");
        assert_eq!(f.body.len(), 4);
    }

    #[test]
    fn test_parse_precedence() {
        let f = parse_one_function("def f(a, b):\n    return a + b * 2 ** -1\n");
        match &f.body[0] {
            Stmt::Return(Some(Expr::BinOp { op, right, .. })) => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**right, Expr::BinOp { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_parse_tuple_targets_and_if() {
        let f = parse_one_function(
            "def f(x):\n    (a, b) = x\n    if a == 1:\n        c = b\n    elif a:\n        c = 2\n    else:\n        c = 3\n    return c\n",
        );
        assert!(matches!(&f.body[0], Stmt::Assign { targets, .. } if matches!(targets[0], Expr::Tuple(_))));
        match &f.body[1] {
            Stmt::If { orelse, .. } => assert!(matches!(orelse[0], Stmt::If { .. })),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_parse_class_with_static_method() {
        let module = parse(
            "class Scheme(Crypto.Scheme):\n    @staticmethod\n    def KeyGen():\n        return 1\n\n    class Inner:\n        def __init__(self, a):\n            self.a = a\n",
        )
        .unwrap();
        match &module.items[0] {
            Item::Class(c) => {
                assert_eq!(c.methods.len(), 1);
                assert!(c.methods[0].is_static());
                assert_eq!(c.classes[0].name, "Inner");
            }
            _ => panic!("expected a class"),
        }
    }

    #[test]
    fn test_augmented_assignment_desugars() {
        let f = parse_one_function("def f(a):\n    a += 1\n    return a\n");
        assert!(matches!(
            &f.body[0],
            Stmt::Assign { value: Expr::BinOp { op: BinaryOp::Add, .. }, .. }
        ));
    }

    #[test]
    fn test_rejects_loops_with_position() {
        let err = parse("def f(a):\n    for i in a:\n        pass\n    return a\n").unwrap_err();
        match err {
            Error::UnsupportedConstruct { construct, location } => {
                assert_eq!(construct, "for loop");
                assert_eq!(location, "line 2, column 5");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_rejects_comprehensions() {
        assert!(matches!(
            parse("def f(a):\n    return [x for x in a]\n"),
            Err(Error::UnsupportedConstruct { .. })
        ));
        assert!(matches!(
            parse("def f(a):\n    return g(x for x in a)\n"),
            Err(Error::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let parens = format!("def f(a):\n    return {}a{}\n", "(".repeat(3000), ")".repeat(3000));
        assert!(matches!(parse(&parens), Err(Error::SyntaxError { .. })));

        let negations = format!("def f(a):\n    return {}a\n", "-".repeat(3000));
        assert!(matches!(parse(&negations), Err(Error::SyntaxError { .. })));

        let powers = format!("def f(a):\n    return a{}\n", " ** a".repeat(3000));
        assert!(matches!(parse(&powers), Err(Error::SyntaxError { .. })));

        let mut blocks = String::from("def f(a):\n");
        for level in 1..=100 {
            blocks.push_str(&format!("{}if a:\n", "    ".repeat(level)));
        }
        blocks.push_str(&format!("{}return a\n", "    ".repeat(101)));
        assert!(matches!(parse(&blocks), Err(Error::SyntaxError { .. })));

        let mut elifs = String::from("def f(a):\n    if a == 0:\n        return 0\n");
        for k in 1..3000 {
            elifs.push_str(&format!("    elif a == {}:\n        return {}\n", k, k));
        }
        assert!(matches!(parse(&elifs), Err(Error::SyntaxError { .. })));

        let shallow = format!("def f(a):\n    return {}a{}\n", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn test_records_keyword_arguments_and_defaults() {
        let f = parse_one_function("def f(a, b=1):\n    return g(a, k=b)\n");
        assert_eq!(f.args.defaults.len(), 1);
        match &f.body[0] {
            Stmt::Return(Some(Expr::Call { keywords, .. })) => assert_eq!(keywords.len(), 1),
            other => panic!("unexpected statement {:?}", other),
        }
    }
}
