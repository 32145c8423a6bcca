//! Grammar filter
//!
//! The parser already refuses syntax the AST cannot represent (loops,
//! exception handling, comprehensions, imports). This module rejects the
//! remaining constructs that parse but fall outside the subset the engine
//! rewrites, and is re-run between passes with the strictness that the
//! current pipeline stage allows.

use crate::error::{Error, Result};
use crate::parser::{ClassDef, Expr, FunctionDef, Stmt};
use serde::{Deserialize, Serialize};

/// Strictness of the grammar check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarRules {
    /// `if` statements are accepted (they are converted mid-pipeline)
    pub allow_if_statements: bool,
    /// Lambda expressions are accepted (they are inlined mid-pipeline)
    pub allow_lambdas: bool,
    /// A `return` may appear inside if branches
    pub allow_nested_returns: bool,
}

impl GrammarRules {
    /// Rules for user input
    pub fn input() -> Self {
        GrammarRules {
            allow_if_statements: true,
            allow_lambdas: true,
            allow_nested_returns: true,
        }
    }

    /// Rules every canonical procedure satisfies
    pub fn canonical() -> Self {
        GrammarRules {
            allow_if_statements: false,
            allow_lambdas: false,
            allow_nested_returns: false,
        }
    }
}

impl Default for GrammarRules {
    fn default() -> Self {
        Self::input()
    }
}

/// Checks a procedure against the rules
pub fn validate_function(function: &FunctionDef, rules: &GrammarRules) -> Result<()> {
    let checker = Checker {
        rules,
        function: &function.name,
    };
    checker.check_signature(function)?;
    checker.check_body(&function.body, "", true)
}

/// Checks a class, its methods and its nested classes
pub fn validate_class(class: &ClassDef, rules: &GrammarRules) -> Result<()> {
    let location = format!("class `{}`", class.name);
    if class.bases.len() > 1 {
        return Err(Error::unsupported("multiple inheritance", location));
    }
    for base in &class.bases {
        if base.as_path().is_none() {
            return Err(Error::unsupported("computed base class", location));
        }
    }
    for method in &class.methods {
        validate_function(method, rules)?;
    }
    for inner in &class.classes {
        validate_class(inner, rules)?;
    }
    Ok(())
}

struct Checker<'a> {
    rules: &'a GrammarRules,
    function: &'a str,
}

impl Checker<'_> {
    fn location(&self, path: &str) -> String {
        if path.is_empty() {
            format!("function `{}`", self.function)
        } else {
            format!("function `{}`, statement {}", self.function, path)
        }
    }

    fn check_signature(&self, function: &FunctionDef) -> Result<()> {
        let location = self.location("");
        if !function.args.defaults.is_empty() {
            return Err(Error::unsupported("default parameter value", location));
        }
        if function.args.vararg.is_some() {
            return Err(Error::unsupported("variadic parameter", location));
        }
        if function.args.kwarg.is_some() {
            return Err(Error::unsupported("keyword variadic parameter", location));
        }
        for decorator in &function.decorators {
            if !matches!(decorator, Expr::Name(name) if name == "staticmethod") {
                return Err(Error::unsupported("decorator", location));
            }
        }
        Ok(())
    }

    fn check_body(&self, body: &[Stmt], prefix: &str, top_level: bool) -> Result<()> {
        for (index, stmt) in body.iter().enumerate() {
            let path = if prefix.is_empty() {
                index.to_string()
            } else {
                format!("{}/{}", prefix, index)
            };
            let terminal = index + 1 == body.len();
            self.check_stmt(stmt, &path, top_level, terminal)?;
        }
        Ok(())
    }

    fn check_stmt(&self, stmt: &Stmt, path: &str, top_level: bool, terminal: bool) -> Result<()> {
        match stmt {
            Stmt::Assign { targets, value } => {
                if targets.len() > 1 {
                    return Err(Error::unsupported("chained assignment", self.location(path)));
                }
                for target in targets {
                    self.check_target(target, path)?;
                }
                self.check_expr(value, path)
            }
            Stmt::Return(value) => {
                let misplaced = if top_level {
                    !terminal
                } else {
                    !self.rules.allow_nested_returns
                };
                if misplaced {
                    return Err(Error::unsupported(
                        "return in non-terminal position",
                        self.location(path),
                    ));
                }
                match value {
                    Some(value) => self.check_expr(value, path),
                    None => Ok(()),
                }
            }
            Stmt::If { test, body, orelse } => {
                if !self.rules.allow_if_statements {
                    return Err(Error::unsupported("if statement", self.location(path)));
                }
                self.check_expr(test, path)?;
                self.check_body(body, &format!("{}/body", path), false)?;
                self.check_body(orelse, &format!("{}/orelse", path), false)
            }
            Stmt::Expr(value) => {
                if !value.is_call() {
                    return Err(Error::unsupported(
                        "non-call expression statement",
                        self.location(path),
                    ));
                }
                self.check_expr(value, path)
            }
            Stmt::Pass => Ok(()),
        }
    }

    fn check_target(&self, target: &Expr, path: &str) -> Result<()> {
        match target {
            Expr::Name(_) => Ok(()),
            Expr::Tuple(elts) => elts.iter().try_for_each(|elt| self.check_target(elt, path)),
            Expr::Attribute { value, .. } => self.check_expr(value, path),
            Expr::Subscript { .. } => Err(Error::unsupported("subscript assignment", self.location(path))),
            Expr::Starred(_) => Err(Error::unsupported("starred assignment", self.location(path))),
            _ => Err(Error::unsupported("assignment to expression", self.location(path))),
        }
    }

    fn check_expr(&self, expr: &Expr, path: &str) -> Result<()> {
        match expr {
            Expr::Name(_) | Expr::Constant(_) => Ok(()),
            Expr::Attribute { value, .. } => self.check_expr(value, path),
            Expr::Subscript { value, index } => {
                self.check_expr(value, path)?;
                self.check_expr(index, path)
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                if !keywords.is_empty() {
                    return Err(Error::unsupported("keyword argument", self.location(path)));
                }
                self.check_expr(func, path)?;
                args.iter().try_for_each(|arg| self.check_expr(arg, path))
            }
            Expr::BinOp { left, right, .. } => {
                self.check_expr(left, path)?;
                self.check_expr(right, path)
            }
            Expr::UnaryOp { operand, .. } => self.check_expr(operand, path),
            Expr::BoolOp { values, .. } | Expr::Tuple(values) => {
                values.iter().try_for_each(|v| self.check_expr(v, path))
            }
            Expr::Compare {
                left, comparators, ..
            } => {
                self.check_expr(left, path)?;
                comparators.iter().try_for_each(|c| self.check_expr(c, path))
            }
            Expr::IfExp { test, body, orelse } => {
                self.check_expr(test, path)?;
                self.check_expr(body, path)?;
                self.check_expr(orelse, path)
            }
            Expr::Lambda { body, .. } => {
                if !self.rules.allow_lambdas {
                    return Err(Error::unsupported("lambda", self.location(path)));
                }
                self.check_expr(body, path)
            }
            Expr::Starred(_) => Err(Error::unsupported("starred argument", self.location(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_class, parse_function};

    fn input_error(source: &str) -> Error {
        let f = parse_function(source).unwrap();
        validate_function(&f, &GrammarRules::input()).unwrap_err()
    }

    #[test]
    fn test_accepts_subset() {
        let f = parse_function(
            "def f(a, b):\n    c = g(a)\n    if c:\n        return lambda x: x\n    (d, e) = (a, b)\n    o.x = d\n    h(e)\n    return d\n",
        )
        .unwrap();
        assert!(validate_function(&f, &GrammarRules::input()).is_ok());
        assert!(validate_function(&f, &GrammarRules::canonical()).is_err());
    }

    #[test]
    fn test_rejections_name_the_construct() {
        let cases = [
            ("def f(a=1):\n    return a\n", "default parameter value"),
            ("def f(*a):\n    return a\n", "variadic parameter"),
            ("def f(a):\n    return g(k=a)\n", "keyword argument"),
            ("def f(a):\n    return g(*a)\n", "starred argument"),
            ("def f(a):\n    b = c = a\n    return b\n", "chained assignment"),
            ("def f(a):\n    a[0] = 1\n    return a\n", "subscript assignment"),
            ("def f(a):\n    a + 1\n    return a\n", "non-call expression statement"),
            ("def f(a):\n    return a\n    b = 1\n", "return in non-terminal position"),
        ];
        for (source, construct) in cases {
            match input_error(source) {
                Error::UnsupportedConstruct { construct: got, .. } => assert_eq!(got, construct),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_location_reports_statement_path() {
        let err = input_error("def f(a):\n    if a:\n        x = 1\n        y = z = 2\n    return a\n");
        assert_eq!(
            err,
            Error::unsupported("chained assignment", "function `f`, statement 0/body/1")
        );
    }

    #[test]
    fn test_canonical_rules_forbid_if_statements() {
        let f = parse_function("def f(a):\n    if a:\n        a = 1\n    return a\n").unwrap();
        let err = validate_function(&f, &GrammarRules::canonical()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct { construct, .. } if construct == "if statement"));
    }

    #[test]
    fn test_class_rules() {
        let class = parse_class("class A(B, C):\n    pass\n").unwrap();
        assert!(validate_class(&class, &GrammarRules::input()).is_err());

        let class = parse_class("class A:\n    @classmethod\n    def m(cls):\n        return 1\n").unwrap();
        let err = validate_class(&class, &GrammarRules::input()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct { construct, .. } if construct == "decorator"));

        let class = parse_class("class A:\n    @staticmethod\n    def m(x):\n        return x\n").unwrap();
        assert!(validate_class(&class, &GrammarRules::input()).is_ok());
    }
}
