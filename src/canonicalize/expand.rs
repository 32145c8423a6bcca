//! Flattening passes: call-argument extraction and tuple unfolding

use crate::parser::{Constant, Expr, FunctionDef, Stmt, UnaryOp};
use crate::scope::ScopeTracker;
use crate::utils::{target_paths, NameGenerator};
use crate::visit::{walk_expr_mut, VisitorMut};

/// Hoists every call argument that is not a name, a constant or a tuple
/// of those into a fresh preceding assignment, innermost first.
pub fn call_arguments(function: &mut FunctionDef, names: &mut NameGenerator) {
    let body = std::mem::take(&mut function.body);
    function.body = hoist_block(body, names);
}

fn hoist_block(stmts: Vec<Stmt>, names: &mut NameGenerator) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for mut stmt in stmts {
        let mut hoister = ArgumentHoister {
            names: &mut *names,
            hoisted: Vec::new(),
        };
        match &mut stmt {
            Stmt::Assign { value, .. } => hoister.visit_expr_mut(value),
            Stmt::Return(Some(value)) | Stmt::Expr(value) => hoister.visit_expr_mut(value),
            Stmt::If { test, .. } => hoister.visit_expr_mut(test),
            Stmt::Return(None) | Stmt::Pass => {}
        }
        out.append(&mut hoister.hoisted);

        if let Stmt::If { body, orelse, .. } = &mut stmt {
            *body = hoist_block(std::mem::take(body), names);
            *orelse = hoist_block(std::mem::take(orelse), names);
        }
        out.push(stmt);
    }
    out
}

struct ArgumentHoister<'a> {
    names: &'a mut NameGenerator,
    hoisted: Vec<Stmt>,
}

impl VisitorMut for ArgumentHoister<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Lambda { .. } => {}
            Expr::Call { func, args, .. } => {
                self.visit_expr_mut(func);
                for arg in args.iter_mut() {
                    self.visit_expr_mut(arg);
                    if !arg.is_trivial() {
                        let temp = self.names.temporary();
                        let value = std::mem::replace(arg, Expr::name(&temp));
                        self.hoisted.push(Stmt::assign_name(temp, value));
                    }
                }
            }
            _ => walk_expr_mut(self, expr),
        }
    }
}

/// Unfolds tuple assignments into element assignments and resolves
/// constant subscripts of known tuples.
///
/// * `(a, b) = (e1, e2)` becomes `t0 = e1; t1 = e2; a = t0; b = t1`
/// * `(a, b) = t` with `t` known to hold a tuple display unfolds the same way
/// * `x = (f(y), z)` first hoists `f(y)` so known tuples hold trivial elements
/// * `t[1]` with `t` known to hold a tuple display becomes the element
pub fn unfold_tuples(function: &mut FunctionDef, names: &mut NameGenerator) {
    let mut scope = ScopeTracker::with_parameters(function.params());
    let body = std::mem::take(&mut function.body);
    let mut out = Vec::with_capacity(body.len());

    for mut stmt in body {
        resolve_subscripts(&mut stmt, &scope);

        let expanded = match stmt {
            Stmt::Assign { targets, value } if targets.len() == 1 => {
                let target = targets.into_iter().next().unwrap_or_else(Expr::none);
                unfold_assign(target, value, &scope, names)
            }
            other => vec![other],
        };

        for stmt in expanded {
            record(&stmt, out.len(), &mut scope);
            out.push(stmt);
        }
    }

    function.body = out;
}

fn unfold_assign(target: Expr, value: Expr, scope: &ScopeTracker, names: &mut NameGenerator) -> Vec<Stmt> {
    match (&target, &value) {
        (Expr::Tuple(_), Expr::Tuple(_)) => unfold_pairs(target, value, names),
        (Expr::Tuple(targets), _) => match known_tuple(&value, scope) {
            Some(Expr::Tuple(elts)) if elts.len() == targets.len() => {
                let known = Expr::Tuple(elts.clone());
                unfold_pairs(target, known, names)
            }
            _ => vec![Stmt::assign(target, value)],
        },
        (_, Expr::Tuple(elts)) if !elts.iter().all(Expr::is_trivial) => {
            let mut out = Vec::new();
            let hoisted = hoist_elements(value, names, &mut out);
            out.push(Stmt::assign(target, hoisted));
            out
        }
        _ => vec![Stmt::assign(target, value)],
    }
}

/// Binds every leaf of a tuple-to-tuple assignment through a temporary
fn unfold_pairs(target: Expr, value: Expr, names: &mut NameGenerator) -> Vec<Stmt> {
    let mut pairs = Vec::new();
    flatten_pairs(target, value, &mut pairs);

    let mut bindings = Vec::with_capacity(pairs.len());
    let mut stores = Vec::with_capacity(pairs.len());
    for (target, value) in pairs {
        let temp = names.temporary();
        bindings.push(Stmt::assign_name(&temp, value));
        stores.push(Stmt::assign(target, Expr::name(temp)));
    }
    bindings.extend(stores);
    bindings
}

fn flatten_pairs(target: Expr, value: Expr, pairs: &mut Vec<(Expr, Expr)>) {
    match (target, value) {
        (Expr::Tuple(targets), Expr::Tuple(values)) if targets.len() == values.len() => {
            for (target, value) in targets.into_iter().zip(values) {
                flatten_pairs(target, value, pairs);
            }
        }
        (target, value) => pairs.push((target, value)),
    }
}

fn hoist_elements(value: Expr, names: &mut NameGenerator, out: &mut Vec<Stmt>) -> Expr {
    match value {
        Expr::Tuple(elts) => Expr::Tuple(
            elts.into_iter()
                .map(|elt| match elt {
                    Expr::Tuple(_) => hoist_elements(elt, names, out),
                    elt if elt.is_trivial() => elt,
                    elt => {
                        let temp = names.temporary();
                        out.push(Stmt::assign_name(&temp, elt));
                        Expr::name(temp)
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// Known tuple display stored to a name or attribute path
fn known_tuple<'a>(value: &Expr, scope: &'a ScopeTracker) -> Option<&'a Expr> {
    let path = value.as_path()?;
    match scope.value_of(&path) {
        Some(tuple @ Expr::Tuple(elts)) if elts.iter().all(Expr::is_trivial) => Some(tuple),
        _ => None,
    }
}

fn record(stmt: &Stmt, index: usize, scope: &mut ScopeTracker) {
    match stmt {
        Stmt::Assign { targets, value } => {
            for target in targets {
                let mut paths = Vec::new();
                target_paths(target, &mut paths);
                let single = target.as_path().is_some();
                for path in paths {
                    let known = if single { Some(value.clone()) } else { None };
                    scope.record_store(&path, Some(index), known);
                }
            }
        }
        Stmt::If { body, orelse, .. } => {
            for inner in body.iter().chain(orelse) {
                forget(inner, index, scope);
            }
        }
        _ => {}
    }
}

fn forget(stmt: &Stmt, index: usize, scope: &mut ScopeTracker) {
    match stmt {
        Stmt::Assign { targets, .. } => {
            let mut paths = Vec::new();
            for target in targets {
                target_paths(target, &mut paths);
            }
            for path in paths {
                scope.record_store(&path, Some(index), None);
            }
        }
        Stmt::If { body, orelse, .. } => {
            for inner in body.iter().chain(orelse) {
                forget(inner, index, scope);
            }
        }
        _ => {}
    }
}

fn resolve_subscripts(stmt: &mut Stmt, scope: &ScopeTracker) {
    let mut resolver = SubscriptResolver { scope };
    match stmt {
        Stmt::Assign { value, .. } => resolver.visit_expr_mut(value),
        Stmt::Return(Some(value)) | Stmt::Expr(value) => resolver.visit_expr_mut(value),
        Stmt::If { test, .. } => resolver.visit_expr_mut(test),
        Stmt::Return(None) | Stmt::Pass => {}
    }
}

struct SubscriptResolver<'a> {
    scope: &'a ScopeTracker,
}

impl VisitorMut for SubscriptResolver<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
        if let Expr::Lambda { .. } = expr {
            return;
        }
        let element = match expr {
            Expr::Subscript { value, index } => match (known_tuple(value, self.scope), index.as_ref()) {
                (Some(Expr::Tuple(elts)), index) => constant_index(index)
                    .and_then(|k| tuple_index(elts.len(), k))
                    .map(|i| elts[i].clone()),
                _ => None,
            },
            _ => None,
        };
        if let Some(element) = element {
            *expr = element;
        }
    }
}

/// Integer literal used as an index; `-1` parses as a negated literal
pub(crate) fn constant_index(index: &Expr) -> Option<i64> {
    match index {
        Expr::Constant(Constant::Int(k)) => Some(*k),
        Expr::UnaryOp {
            op: UnaryOp::Neg,
            operand,
        } => match operand.as_ref() {
            Expr::Constant(Constant::Int(k)) => k.checked_neg(),
            _ => None,
        },
        _ => None,
    }
}

/// Python index semantics: negative indices count from the end
pub(crate) fn tuple_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}
