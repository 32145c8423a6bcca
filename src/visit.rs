//! Visitor traits over the AST
//!
//! Override the methods for the nodes a pass cares about and call the
//! matching `walk_*` function to continue the default recursive descent.

use crate::parser::{Expr, Stmt};

/// Read-only traversal
pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    /// Assignment target; by default targets are walked as expressions
    fn visit_target(&mut self, target: &Expr) {
        self.visit_expr(target);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Assign { targets, value } => {
            visitor.visit_expr(value);
            for target in targets {
                visitor.visit_target(target);
            }
        }
        Stmt::Return(Some(value)) | Stmt::Expr(value) => visitor.visit_expr(value),
        Stmt::Return(None) | Stmt::Pass => {}
        Stmt::If { test, body, orelse } => {
            visitor.visit_expr(test);
            for stmt in body.iter().chain(orelse) {
                visitor.visit_stmt(stmt);
            }
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Name(_) | Expr::Constant(_) => {}
        Expr::Attribute { value, .. } => visitor.visit_expr(value),
        Expr::Subscript { value, index } => {
            visitor.visit_expr(value);
            visitor.visit_expr(index);
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            visitor.visit_expr(func);
            for arg in args {
                visitor.visit_expr(arg);
            }
            for keyword in keywords {
                visitor.visit_expr(&keyword.value);
            }
        }
        Expr::BinOp { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::UnaryOp { operand, .. } => visitor.visit_expr(operand),
        Expr::BoolOp { values, .. } | Expr::Tuple(values) => {
            for value in values {
                visitor.visit_expr(value);
            }
        }
        Expr::Compare {
            left, comparators, ..
        } => {
            visitor.visit_expr(left);
            for comparator in comparators {
                visitor.visit_expr(comparator);
            }
        }
        Expr::IfExp { test, body, orelse } => {
            visitor.visit_expr(test);
            visitor.visit_expr(body);
            visitor.visit_expr(orelse);
        }
        Expr::Lambda { body, .. } => visitor.visit_expr(body),
        Expr::Starred(value) => visitor.visit_expr(value),
    }
}

/// In-place rewriting traversal
pub trait VisitorMut {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }

    fn visit_target_mut(&mut self, target: &mut Expr) {
        self.visit_expr_mut(target);
    }
}

pub fn walk_stmt_mut<V: VisitorMut + ?Sized>(visitor: &mut V, stmt: &mut Stmt) {
    match stmt {
        Stmt::Assign { targets, value } => {
            visitor.visit_expr_mut(value);
            for target in targets {
                visitor.visit_target_mut(target);
            }
        }
        Stmt::Return(Some(value)) | Stmt::Expr(value) => visitor.visit_expr_mut(value),
        Stmt::Return(None) | Stmt::Pass => {}
        Stmt::If { test, body, orelse } => {
            visitor.visit_expr_mut(test);
            for stmt in body.iter_mut().chain(orelse.iter_mut()) {
                visitor.visit_stmt_mut(stmt);
            }
        }
    }
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(visitor: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Name(_) | Expr::Constant(_) => {}
        Expr::Attribute { value, .. } => visitor.visit_expr_mut(value),
        Expr::Subscript { value, index } => {
            visitor.visit_expr_mut(value);
            visitor.visit_expr_mut(index);
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            visitor.visit_expr_mut(func);
            for arg in args {
                visitor.visit_expr_mut(arg);
            }
            for keyword in keywords {
                visitor.visit_expr_mut(&mut keyword.value);
            }
        }
        Expr::BinOp { left, right, .. } => {
            visitor.visit_expr_mut(left);
            visitor.visit_expr_mut(right);
        }
        Expr::UnaryOp { operand, .. } => visitor.visit_expr_mut(operand),
        Expr::BoolOp { values, .. } | Expr::Tuple(values) => {
            for value in values {
                visitor.visit_expr_mut(value);
            }
        }
        Expr::Compare {
            left, comparators, ..
        } => {
            visitor.visit_expr_mut(left);
            for comparator in comparators {
                visitor.visit_expr_mut(comparator);
            }
        }
        Expr::IfExp { test, body, orelse } => {
            visitor.visit_expr_mut(test);
            visitor.visit_expr_mut(body);
            visitor.visit_expr_mut(orelse);
        }
        Expr::Lambda { body, .. } => visitor.visit_expr_mut(body),
        Expr::Starred(value) => visitor.visit_expr_mut(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    #[derive(Default)]
    struct CallCounter {
        calls: usize,
    }

    impl Visitor for CallCounter {
        fn visit_expr(&mut self, expr: &Expr) {
            if expr.is_call() {
                self.calls += 1;
            }
            walk_expr(self, expr);
        }
    }

    struct Negate;

    impl VisitorMut for Negate {
        fn visit_expr_mut(&mut self, expr: &mut Expr) {
            walk_expr_mut(self, expr);
            if let Expr::Constant(crate::parser::Constant::Int(n)) = expr {
                *n = -*n;
            }
        }
    }

    #[test]
    fn test_default_walk_reaches_nested_calls() {
        let f = parse_function("def f(a):\n    if g(a):\n        b = h(k(a))\n    return b\n").unwrap();
        let mut counter = CallCounter::default();
        for stmt in &f.body {
            counter.visit_stmt(stmt);
        }
        assert_eq!(counter.calls, 3);
    }

    #[test]
    fn test_mutable_walk() {
        let mut f = parse_function("def f(a):\n    return a + 2\n").unwrap();
        for stmt in &mut f.body {
            Negate.visit_stmt_mut(stmt);
        }
        assert_eq!(f.body[0].to_string(), "return a + -2");
    }
}
