//! Useless-assign collapse
//!
//! `x = <name | constant | tuple of those>` is deleted and the uses of `x`
//! up to its next write read the right-hand side directly.

use super::CanonicalizeOptions;
use crate::parser::{Expr, FunctionDef, Stmt};
use crate::utils::{loaded_names, mentions, stmt_assigned, stmt_mentions, Substitution};
use std::collections::HashMap;

/// Collapses trivial assignments until none is left that can go
pub fn collapse_useless_assigns(function: &mut FunctionDef, options: &CanonicalizeOptions) {
    while let Some(index) = next_collapsible(&function.body, options) {
        collapse_at(&mut function.body, index);
    }
}

fn trivial_assign(stmt: &Stmt) -> Option<(&str, &Expr)> {
    match stmt {
        Stmt::Assign { targets, value } if targets.len() == 1 && value.is_trivial() => {
            match &targets[0] {
                Expr::Name(name) => Some((name.as_str(), value)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn next_collapsible(body: &[Stmt], options: &CanonicalizeOptions) -> Option<usize> {
    (0..body.len()).find(|&i| match trivial_assign(&body[i]) {
        Some((name, value)) => !options.is_preserved(name) && can_collapse(body, i, name, value),
        None => false,
    })
}

/// End of the range in which `name` still refers to the value stored at `i`
fn range_end(body: &[Stmt], i: usize, name: &str) -> usize {
    (i + 1..body.len())
        .find(|&k| stmt_assigned(&body[k]).iter().any(|n| n == name))
        .unwrap_or(body.len().saturating_sub(1))
}

fn can_collapse(body: &[Stmt], i: usize, name: &str, value: &Expr) -> bool {
    if matches!(value, Expr::Name(n) if n == name) {
        return true;
    }
    let end = range_end(body, i, name);
    let uses: Vec<usize> = (i + 1..=end.min(body.len().saturating_sub(1)))
        .filter(|&k| stmt_mentions(&body[k], name))
        .collect();
    let last_use = match uses.last() {
        Some(&k) => k,
        None => return true,
    };

    let rhs_names = loaded_names(value);
    for k in i + 1..last_use {
        let assigned = stmt_assigned(&body[k]);
        if rhs_names.iter().any(|n| assigned.contains(n)) {
            return false;
        }
    }

    for &k in &uses {
        let stmt = &body[k];
        if matches!(stmt, Stmt::If { .. }) {
            return false;
        }
        if captured_by_lambda(stmt, name) {
            return false;
        }
        if !matches!(value, Expr::Name(_)) && is_store_base(stmt, name) {
            return false;
        }
    }
    true
}

fn collapse_at(body: &mut Vec<Stmt>, i: usize) {
    let (name, value) = match trivial_assign(&body[i]) {
        Some((name, value)) => (name.to_string(), value.clone()),
        None => return,
    };
    let end = range_end(body, i, &name);
    let map = HashMap::from([(name, value)]);
    for stmt in body.iter_mut().take(end + 1).skip(i + 1) {
        substitute_loads(stmt, &map);
    }
    body.remove(i);
}

/// Substitutes loads only; plain-name targets keep their spelling
fn substitute_loads(stmt: &mut Stmt, map: &HashMap<String, Expr>) {
    match stmt {
        Stmt::Assign { targets, value } => {
            Substitution::apply_expr(map, value);
            for target in targets {
                substitute_target_bases(target, map);
            }
        }
        Stmt::Return(Some(value)) | Stmt::Expr(value) => Substitution::apply_expr(map, value),
        Stmt::If { .. } => Substitution::apply(map, std::slice::from_mut(stmt)),
        Stmt::Return(None) | Stmt::Pass => {}
    }
}

fn substitute_target_bases(target: &mut Expr, map: &HashMap<String, Expr>) {
    match target {
        Expr::Tuple(elts) => {
            for elt in elts {
                substitute_target_bases(elt, map);
            }
        }
        Expr::Attribute { value, .. } => Substitution::apply_expr(map, value),
        Expr::Subscript { value, index } => {
            Substitution::apply_expr(map, value);
            Substitution::apply_expr(map, index);
        }
        _ => {}
    }
}

fn captured_by_lambda(stmt: &Stmt, name: &str) -> bool {
    use crate::visit::{walk_expr, Visitor};

    struct Capture<'a> {
        name: &'a str,
        found: bool,
    }

    impl Visitor for Capture<'_> {
        fn visit_expr(&mut self, expr: &Expr) {
            match expr {
                Expr::Lambda { .. } => self.found |= mentions(expr, self.name),
                _ => walk_expr(self, expr),
            }
        }
    }

    let mut capture = Capture { name, found: false };
    capture.visit_stmt(stmt);
    capture.found
}

fn is_store_base(stmt: &Stmt, name: &str) -> bool {
    fn base_is(target: &Expr, name: &str) -> bool {
        match target {
            Expr::Tuple(elts) => elts.iter().any(|e| base_is(e, name)),
            Expr::Attribute { .. } | Expr::Subscript { .. } => target.root_name() == Some(name),
            _ => false,
        }
    }
    match stmt {
        Stmt::Assign { targets, .. } => targets.iter().any(|t| base_is(t, name)),
        _ => false,
    }
}
