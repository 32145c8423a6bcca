//! Variable-name canonicalization
//!
//! Renaming goes through salted temporaries first: every write of a local
//! gets its own temporary (single assignment), then temporaries become
//! `v0, v1, ...` in parameter-then-definition order. Going through
//! temporaries lets two variables swap names without clobbering each other.

use super::CanonicalizeOptions;
use crate::parser::{Expr, FunctionDef, Stmt};
use crate::utils::{assigned_names, free_names, target_names, NameGenerator, Substitution};
use std::collections::{HashMap, HashSet};

/// Renames parameters and locals to `v0, v1, ...`
pub fn canonicalize_variable_names(
    function: &mut FunctionDef,
    names: &mut NameGenerator,
    options: &CanonicalizeOptions,
) {
    let free: HashSet<String> = free_names(function).into_iter().collect();
    to_single_assignment(function, names, options);
    to_sequential(function, &free, options);
}

/// First phase: one salted temporary per write
fn to_single_assignment(function: &mut FunctionDef, names: &mut NameGenerator, options: &CanonicalizeOptions) {
    let mut current: HashMap<String, Expr> = HashMap::new();

    for param in function.args.params.iter_mut() {
        if options.is_preserved(param) {
            continue;
        }
        let temp = names.temporary();
        current.insert(param.clone(), Expr::name(&temp));
        *param = temp;
    }

    for stmt in function.body.iter_mut() {
        match stmt {
            Stmt::Assign { targets, value } => {
                Substitution::apply_expr(&current, value);
                for target in targets.iter_mut() {
                    rename_target(target, &mut current, names, options);
                }
            }
            Stmt::Return(Some(value)) | Stmt::Expr(value) => Substitution::apply_expr(&current, value),
            Stmt::If { .. } => {
                // Names written under a condition keep one temporary so
                // both paths leave the value under the same name
                for name in assigned_names(std::slice::from_ref(stmt)) {
                    if options.is_preserved(&name) || current.contains_key(&name) {
                        continue;
                    }
                    current.insert(name, Expr::name(names.temporary()));
                }
                Substitution::apply(&current, std::slice::from_mut(stmt));
            }
            Stmt::Return(None) | Stmt::Pass => {}
        }
    }
}

fn rename_target(
    target: &mut Expr,
    current: &mut HashMap<String, Expr>,
    names: &mut NameGenerator,
    options: &CanonicalizeOptions,
) {
    match target {
        Expr::Name(name) => {
            if options.is_preserved(name) {
                return;
            }
            let temp = names.temporary();
            current.insert(name.clone(), Expr::name(&temp));
            *name = temp;
        }
        Expr::Tuple(elts) => {
            for elt in elts {
                rename_target(elt, current, names, options);
            }
        }
        Expr::Starred(value) => rename_target(value, current, names, options),
        Expr::Attribute { value, .. } => Substitution::apply_expr(current, value),
        Expr::Subscript { value, index } => {
            Substitution::apply_expr(current, value);
            Substitution::apply_expr(current, index);
        }
        _ => {}
    }
}

/// Second phase: sequential names skipping free identifiers
fn to_sequential(function: &mut FunctionDef, free: &HashSet<String>, options: &CanonicalizeOptions) {
    let mut order: Vec<String> = Vec::new();
    for param in function.params() {
        if !options.is_preserved(param) {
            order.push(param.clone());
        }
    }
    for stmt in &function.body {
        collect_definitions(stmt, &mut order);
    }

    let mut map: HashMap<String, Expr> = HashMap::new();
    let mut next = 0usize;
    for temp in order {
        if map.contains_key(&temp) || options.is_preserved(&temp) {
            continue;
        }
        let final_name = loop {
            let candidate = format!("v{}", next);
            next += 1;
            if !free.contains(&candidate) && !options.is_preserved(&candidate) {
                break candidate;
            }
        };
        map.insert(temp, Expr::name(final_name));
    }

    for param in function.args.params.iter_mut() {
        if let Some(Expr::Name(renamed)) = map.get(param.as_str()) {
            *param = renamed.clone();
        }
    }
    Substitution::apply(&map, &mut function.body);
}

fn collect_definitions(stmt: &Stmt, order: &mut Vec<String>) {
    match stmt {
        Stmt::Assign { targets, .. } => {
            for target in targets {
                target_names(target, order);
            }
        }
        Stmt::If { body, orelse, .. } => {
            for inner in body.iter().chain(orelse) {
                collect_definitions(inner, order);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn renamed(source: &str, options: &CanonicalizeOptions) -> String {
        let mut f = parse_function(source).unwrap();
        canonicalize_variable_names(&mut f, &mut NameGenerator::new(), options);
        f.to_string()
    }

    #[test]
    fn test_parameters_then_definitions() {
        assert_eq!(
            renamed("def f(b, a):\n    c = a + b\n    return c\n", &CanonicalizeOptions::function()),
            "def f(v0, v1):\n    v2 = v1 + v0\n    return v2\n"
        );
    }

    #[test]
    fn test_every_write_gets_its_own_name() {
        assert_eq!(
            renamed("def f(a):\n    a = a + 1\n    a = a * 2\n    return a\n", &CanonicalizeOptions::function()),
            "def f(v0):\n    v1 = v0 + 1\n    v2 = v1 * 2\n    return v2\n"
        );
    }

    #[test]
    fn test_free_and_preserved_names_are_kept() {
        assert_eq!(
            renamed(
                "def m(self, x):\n    v0 = Scheme.KeyGen(x)\n    self.k = v0\n    return v0\n",
                &CanonicalizeOptions::method()
            ),
            "def m(self, v0):\n    v1 = Scheme.KeyGen(v0)\n    self.k = v1\n    return v1\n"
        );
        assert_eq!(
            renamed("def f(a):\n    b = v0(a)\n    return b\n", &CanonicalizeOptions::function()),
            "def f(v1):\n    v2 = v0(v1)\n    return v2\n"
        );
    }

    #[test]
    fn test_lambda_parameters_are_scoped() {
        assert_eq!(
            renamed("def f(x):\n    g = lambda x: x + 1\n    return g\n", &CanonicalizeOptions::function()),
            "def f(v0):\n    v1 = lambda x: x + 1\n    return v1\n"
        );
    }
}
