//! Local lambda inlining

use crate::error::{Error, Result};
use crate::parser::{Expr, FunctionDef, Stmt};
use crate::utils::{stmt_assigned, Substitution};
use crate::visit::{walk_expr_mut, VisitorMut};
use std::collections::HashMap;

/// Substitutes `g = lambda ...` bindings at their call sites and beta
/// reduces directly applied lambdas.
pub fn inline_lambdas(function: &mut FunctionDef) -> Result<()> {
    let mut i = 0;
    while i < function.body.len() {
        let binding = match &function.body[i] {
            Stmt::Assign { targets, value } if targets.len() == 1 => match (&targets[0], value) {
                (Expr::Name(name), Expr::Lambda { params, body }) => {
                    Some((name.clone(), params.clone(), body.as_ref().clone()))
                }
                _ => None,
            },
            _ => None,
        };

        match binding {
            Some((name, params, body)) => {
                let lambda = LocalLambda {
                    name: &name,
                    params: &params,
                    body: &body,
                };
                let end = (i + 1..function.body.len())
                    .find(|&k| stmt_assigned(&function.body[k]).contains(&name))
                    .unwrap_or(function.body.len());
                for k in i + 1..function.body.len().min(end + 1) {
                    lambda.substitute(&mut function.body[k], k == end)?;
                }
                function.body.remove(i);
            }
            None => i += 1,
        }
    }

    let mut reducer = BetaReducer { error: None };
    for stmt in &mut function.body {
        reducer.visit_stmt_mut(stmt);
    }
    match reducer.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct LocalLambda<'a> {
    name: &'a str,
    params: &'a [String],
    body: &'a Expr,
}

impl LocalLambda<'_> {
    /// Replaces calls in one statement; at the rebinding statement only the
    /// value still refers to this lambda
    fn substitute(&self, stmt: &mut Stmt, rebinding: bool) -> Result<()> {
        let mut expander = CallExpander {
            lambda: self,
            error: None,
        };
        match stmt {
            Stmt::Assign { value, .. } if rebinding => expander.visit_expr_mut(value),
            stmt => expander.visit_stmt_mut(stmt),
        }
        match expander.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(&self, args: &[Expr]) -> Result<Expr> {
        apply_lambda(self.name, self.params, self.body, args)
    }
}

fn apply_lambda(name: &str, params: &[String], body: &Expr, args: &[Expr]) -> Result<Expr> {
    if params.len() != args.len() {
        return Err(Error::inline_shape(
            name,
            format!("expected {} arguments, got {}", params.len(), args.len()),
        ));
    }
    let map: HashMap<String, Expr> = params.iter().cloned().zip(args.iter().cloned()).collect();
    let mut expr = body.clone();
    Substitution::apply_expr(&map, &mut expr);
    Ok(expr)
}

struct CallExpander<'a, 'b> {
    lambda: &'a LocalLambda<'b>,
    error: Option<Error>,
}

impl VisitorMut for CallExpander<'_, '_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if self.error.is_some() {
            return;
        }
        match expr {
            Expr::Call { func, args, .. }
                if matches!(func.as_ref(), Expr::Name(n) if n == self.lambda.name) =>
            {
                for arg in args.iter_mut() {
                    self.visit_expr_mut(arg);
                }
                match self.lambda.apply(args) {
                    Ok(inlined) => *expr = inlined,
                    Err(err) => self.error = Some(err),
                }
            }
            Expr::Name(n) if n == self.lambda.name => {
                self.error = Some(Error::inline_shape(
                    self.lambda.name,
                    "lambda referenced without being called",
                ));
            }
            Expr::Lambda { params, .. } if params.iter().any(|p| p == self.lambda.name) => {}
            _ => walk_expr_mut(self, expr),
        }
    }
}

/// `(lambda x: e)(a)` becomes `e[x := a]`
struct BetaReducer {
    error: Option<Error>,
}

impl VisitorMut for BetaReducer {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
        if self.error.is_some() {
            return;
        }
        if let Expr::Call { func, args, .. } = expr {
            if let Expr::Lambda { params, body } = func.as_ref() {
                match apply_lambda("lambda", params, body, args) {
                    Ok(reduced) => *expr = reduced,
                    Err(err) => self.error = Some(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn inlined(source: &str) -> Result<Vec<String>> {
        let mut f = parse_function(source)?;
        inline_lambdas(&mut f)?;
        Ok(f.body.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_lambda_calls_are_substituted() {
        assert_eq!(
            inlined("def f(a):\n    g = lambda x, y: x + y * 2\n    b = g(a, 3)\n    return g(b, b)\n").unwrap(),
            vec!["b = a + 3 * 2", "return b + b * 2"]
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let err = inlined("def f(a):\n    g = lambda x: x\n    return g(a, a)\n").unwrap_err();
        assert!(matches!(err, Error::InlineShapeViolation { callee, .. } if callee == "g"));
    }

    #[test]
    fn test_reference_without_call() {
        let err = inlined("def f(a):\n    g = lambda x: x\n    return (g, a)\n").unwrap_err();
        assert_eq!(
            err,
            Error::inline_shape("g", "lambda referenced without being called")
        );
    }

    #[test]
    fn test_rebinding_ends_the_range() {
        assert_eq!(
            inlined("def f(a):\n    g = lambda x: x + 1\n    g = g(a)\n    return g\n").unwrap(),
            vec!["g = a + 1", "return g"]
        );
    }

    #[test]
    fn test_direct_application() {
        assert_eq!(
            inlined("def f(a):\n    return (lambda x: x * x)(a)\n").unwrap(),
            vec!["return a * a"]
        );
    }
}
