//! Pretty-printer from AST back to source text
//!
//! The output is deterministic: four-space indentation, minimal parentheses
//! according to operator precedence, single-quoted string literals and
//! Python-style float text. Canonical forms are compared as printed text, so
//! any change here changes every canonical string.

use super::ast::{
    BinaryOp, ClassDef, Constant, Expr, FunctionDef, Item, Module, Precedence, Stmt, UnaryOp,
};
use std::fmt;

const INDENT: &str = "    ";

/// Source emitter
pub struct Unparser {
    output: String,
    indent: usize,
}

impl Unparser {
    /// Creates an emitter at indentation level zero
    pub fn new() -> Self {
        Unparser {
            output: String::new(),
            indent: 0,
        }
    }

    /// Consumes the emitter, returning the text
    pub fn finish(self) -> String {
        self.output
    }

    /// Emits a module, items separated by a blank line
    pub fn emit_module(&mut self, module: &Module) {
        for (i, item) in module.items.iter().enumerate() {
            if i > 0 {
                self.output.push('\n');
            }
            match item {
                Item::Function(f) => self.emit_function(f),
                Item::Class(c) => self.emit_class(c),
            }
        }
    }

    /// Emits a function definition
    pub fn emit_function(&mut self, function: &FunctionDef) {
        for decorator in &function.decorators {
            self.line(&format!("@{}", expr_to_string(decorator)));
        }

        let mut params: Vec<String> = Vec::new();
        let args = &function.args;
        let first_default = args.params.len().saturating_sub(args.defaults.len());
        for (i, param) in args.params.iter().enumerate() {
            if i >= first_default {
                let default = &args.defaults[i - first_default];
                params.push(format!("{}={}", param, expr_to_string(default)));
            } else {
                params.push(param.clone());
            }
        }
        if let Some(vararg) = &args.vararg {
            params.push(format!("*{}", vararg));
        }
        if let Some(kwarg) = &args.kwarg {
            params.push(format!("**{}", kwarg));
        }

        self.line(&format!("def {}({}):", function.name, params.join(", ")));
        self.emit_block(&function.body);
    }

    /// Emits a class definition; methods first, then nested classes
    pub fn emit_class(&mut self, class: &ClassDef) {
        if class.bases.is_empty() {
            self.line(&format!("class {}:", class.name));
        } else {
            let bases: Vec<String> = class.bases.iter().map(expr_to_string).collect();
            self.line(&format!("class {}({}):", class.name, bases.join(", ")));
        }

        self.indent += 1;
        if class.methods.is_empty() && class.classes.is_empty() {
            self.line("pass");
        }
        let mut first = true;
        for method in &class.methods {
            if !first {
                self.output.push('\n');
            }
            first = false;
            self.emit_function(method);
        }
        for inner in &class.classes {
            if !first {
                self.output.push('\n');
            }
            first = false;
            self.emit_class(inner);
        }
        self.indent -= 1;
    }

    fn emit_block(&mut self, body: &[Stmt]) {
        self.indent += 1;
        if body.is_empty() {
            self.line("pass");
        }
        for stmt in body {
            self.emit_stmt(stmt);
        }
        self.indent -= 1;
    }

    /// Emits one statement (possibly spanning several lines)
    pub fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { targets, value } => {
                let mut text = String::new();
                for target in targets {
                    text.push_str(&expr_to_string(target));
                    text.push_str(" = ");
                }
                text.push_str(&expr_to_string(value));
                self.line(&text);
            }
            Stmt::Return(None) => self.line("return"),
            Stmt::Return(Some(value)) => self.line(&format!("return {}", expr_to_string(value))),
            Stmt::Expr(value) => self.line(&expr_to_string(value)),
            Stmt::Pass => self.line("pass"),
            Stmt::If { test, body, orelse } => self.emit_if("if", test, body, orelse),
        }
    }

    fn emit_if(&mut self, keyword: &str, test: &Expr, body: &[Stmt], orelse: &[Stmt]) {
        self.line(&format!("{} {}:", keyword, expr_to_string(test)));
        self.emit_block(body);
        match orelse {
            [] => {}
            [Stmt::If {
                test,
                body,
                orelse,
            }] => self.emit_if("elif", test, body, orelse),
            _ => {
                self.line("else:");
                self.emit_block(orelse);
            }
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str(INDENT);
        }
        self.output.push_str(text);
        self.output.push('\n');
    }
}

impl Default for Unparser {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints an expression at the loosest precedence
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, Precedence::Tuple);
    out
}

/// Prints a single statement without trailing newline
pub fn stmt_to_string(stmt: &Stmt) -> String {
    let mut unparser = Unparser::new();
    unparser.emit_stmt(stmt);
    let mut text = unparser.finish();
    text.truncate(text.trim_end().len());
    text
}

/// Prints a function definition
pub fn function_to_string(function: &FunctionDef) -> String {
    let mut unparser = Unparser::new();
    unparser.emit_function(function);
    unparser.finish()
}

/// Prints a class definition
pub fn class_to_string(class: &ClassDef) -> String {
    let mut unparser = Unparser::new();
    unparser.emit_class(class);
    unparser.finish()
}

fn precedence_of(expr: &Expr) -> Precedence {
    match expr {
        Expr::Name(_) | Expr::Tuple(_) => Precedence::Atom,
        Expr::Constant(Constant::Int(n)) if *n < 0 => Precedence::Unary,
        Expr::Constant(Constant::Float(f)) if f.is_sign_negative() => Precedence::Unary,
        Expr::Constant(_) => Precedence::Atom,
        Expr::Attribute { .. } | Expr::Subscript { .. } | Expr::Call { .. } => Precedence::Call,
        Expr::BinOp { op, .. } => op.precedence(),
        Expr::UnaryOp { op, .. } => op.precedence(),
        Expr::BoolOp { op, .. } => match op {
            super::ast::BoolOp::And => Precedence::And,
            super::ast::BoolOp::Or => Precedence::Or,
        },
        Expr::Compare { .. } => Precedence::Comparison,
        Expr::IfExp { .. } => Precedence::IfExp,
        Expr::Lambda { .. } => Precedence::Lambda,
        Expr::Starred(_) => Precedence::BitOr,
    }
}

fn write_expr(out: &mut String, expr: &Expr, required: Precedence) {
    let own = precedence_of(expr);
    let parens = own < required;
    if parens {
        out.push('(');
    }

    match expr {
        Expr::Name(name) => out.push_str(name),
        Expr::Constant(c) => out.push_str(&constant_to_string(c)),
        Expr::Attribute { value, attr } => {
            write_expr(out, value, Precedence::Call);
            out.push('.');
            out.push_str(attr);
        }
        Expr::Subscript { value, index } => {
            write_expr(out, value, Precedence::Call);
            out.push('[');
            write_expr(out, index, Precedence::Tuple);
            out.push(']');
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            write_expr(out, func, Precedence::Call);
            out.push('(');
            let mut first = true;
            for arg in args {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_expr(out, arg, Precedence::Lambda);
            }
            for keyword in keywords {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                match &keyword.arg {
                    Some(name) => {
                        out.push_str(name);
                        out.push('=');
                    }
                    None => out.push_str("**"),
                }
                write_expr(out, &keyword.value, Precedence::Lambda);
            }
            out.push(')');
        }
        Expr::BinOp { left, op, right } => {
            let (left_prec, right_prec) = if *op == BinaryOp::Pow {
                (own.next(), Precedence::Unary)
            } else {
                (own, own.next())
            };
            write_expr(out, left, left_prec);
            out.push(' ');
            out.push_str(&op.to_string());
            out.push(' ');
            write_expr(out, right, right_prec);
        }
        Expr::UnaryOp { op, operand } => {
            out.push_str(&op.to_string());
            let operand_prec = if *op == UnaryOp::Not {
                Precedence::Not
            } else {
                Precedence::Unary
            };
            write_expr(out, operand, operand_prec);
        }
        Expr::BoolOp { op, values } => {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                    out.push_str(&op.to_string());
                    out.push(' ');
                }
                write_expr(out, value, own.next());
            }
        }
        Expr::Compare {
            left,
            ops,
            comparators,
        } => {
            write_expr(out, left, own.next());
            for (op, comparator) in ops.iter().zip(comparators) {
                out.push(' ');
                out.push_str(&op.to_string());
                out.push(' ');
                write_expr(out, comparator, own.next());
            }
        }
        Expr::IfExp { test, body, orelse } => {
            write_expr(out, body, Precedence::Or);
            out.push_str(" if ");
            write_expr(out, test, Precedence::Or);
            out.push_str(" else ");
            write_expr(out, orelse, Precedence::IfExp);
        }
        Expr::Lambda { params, body } => {
            out.push_str("lambda");
            if !params.is_empty() {
                out.push(' ');
                out.push_str(&params.join(", "));
            }
            out.push_str(": ");
            write_expr(out, body, Precedence::Lambda);
        }
        Expr::Tuple(elts) => {
            out.push('(');
            for (i, elt) in elts.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, elt, Precedence::Lambda);
            }
            if elts.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Expr::Starred(value) => {
            out.push('*');
            write_expr(out, value, Precedence::BitOr);
        }
    }

    if parens {
        out.push(')');
    }
}

/// Literal text of a constant
pub fn constant_to_string(constant: &Constant) -> String {
    match constant {
        // `9223372036854775808` is not a valid literal
        Constant::Int(i64::MIN) => format!("({} - 1)", i64::MIN + 1),
        Constant::Int(n) => n.to_string(),
        Constant::Float(f) => float_repr(*f),
        Constant::Str(s) => string_repr(s),
        Constant::Bool(true) => "True".to_string(),
        Constant::Bool(false) => "False".to_string(),
        Constant::None => "None".to_string(),
    }
}

/// Shortest round-trip float text, switching to exponent form outside
/// `1e-4 <= |f| < 1e16`.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "1e309" } else { "-1e309" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let scientific = format!("{:e}", f);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (scientific.clone(), 0),
    };

    if (-4..16).contains(&exponent) {
        let plain = format!("{}", f);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", expr_to_string(self))
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", stmt_to_string(self))
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", function_to_string(self))
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", class_to_string(self))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut unparser = Unparser::new();
        unparser.emit_module(self);
        write!(f, "{}", unparser.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn roundtrip(source: &str) -> String {
        parse_function(source).unwrap().to_string()
    }

    #[test]
    fn test_minimal_parentheses() {
        assert_eq!(
            roundtrip("def f(a, b):\n    return (a + b) * (a - b)\n"),
            "def f(a, b):\n    return (a + b) * (a - b)\n"
        );
        assert_eq!(
            roundtrip("def f(a, b, c):\n    return a - (b - c)\n"),
            "def f(a, b, c):\n    return a - (b - c)\n"
        );
        assert_eq!(
            roundtrip("def f(a):\n    return ((a.b)(1))[0]\n"),
            "def f(a):\n    return a.b(1)[0]\n"
        );
    }

    #[test]
    fn test_power_and_unary() {
        assert_eq!(
            roundtrip("def f(x):\n    return (-x) ** 2 + -x ** 2\n"),
            "def f(x):\n    return (-x) ** 2 + -x ** 2\n"
        );
        assert_eq!(
            roundtrip("def f(x):\n    return (x ** 2) ** 3\n"),
            "def f(x):\n    return (x ** 2) ** 3\n"
        );
    }

    #[test]
    fn test_tuples_and_if_expressions() {
        assert_eq!(
            roundtrip("def f(x, y):\n    a, b = x, y\n    return a if b else (a,)\n"),
            "def f(x, y):\n    (a, b) = (x, y)\n    return a if b else (a,)\n"
        );
        assert_eq!(
            roundtrip("def f(c, x):\n    return (x if c else c) if c else x\n"),
            "def f(c, x):\n    return (x if c else c) if c else x\n"
        );
    }

    #[test]
    fn test_float_and_string_literals() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.5), "0.5");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-5), "1.5e-05");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(string_repr("ab"), "'ab'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("a\nb"), "'a\\nb'");
    }

    #[test]
    fn test_extreme_literals_parse_back() {
        assert_eq!(constant_to_string(&Constant::Int(i64::MIN)), "(-9223372036854775807 - 1)");
        assert_eq!(string_repr("a\0b\x7f"), "'a\\x00b\\x7f'");
        for text in [
            constant_to_string(&Constant::Int(i64::MIN)),
            string_repr("a\0b\x7f"),
        ] {
            let source = format!("def f():\n    return {}\n", text);
            assert!(parse_function(&source).is_ok(), "{}", source);
        }
    }

    #[test]
    fn test_if_statement_layout() {
        let text = roundtrip(
            "def f(a):\n    if a:\n        b = 1\n    elif a == 2:\n        b = 2\n    else:\n        b = 3\n    return b\n",
        );
        assert_eq!(
            text,
            "def f(a):\n    if a:\n        b = 1\n    elif a == 2:\n        b = 2\n    else:\n        b = 3\n    return b\n"
        );
    }

    #[test]
    fn test_boolean_nesting() {
        assert_eq!(
            roundtrip("def f(a, b, c):\n    return not (a and b) or c\n"),
            "def f(a, b, c):\n    return not (a and b) or c\n"
        );
    }
}
