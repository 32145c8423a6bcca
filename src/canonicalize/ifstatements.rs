//! If-statement to if-expression conversion
//!
//! Early returns are first moved to a single trailing return. Each `if`
//! statement then becomes a hoisted condition, both branches with their
//! variables renamed apart, padding for variables only one branch assigns,
//! and one selecting if-expression per variable:
//!
//! ```text
//! if c:                 ifcond_0 = c
//!     b = g(a)    ==>   body_0_b = g(a)
//! return b              orelse_0_b = None
//!                       b = body_0_b if ifcond_0 else orelse_0_b
//!                       return b
//! ```

use crate::error::{Error, Result};
use crate::parser::{Expr, FunctionDef, Stmt};
use crate::scope::ScopeTracker;
use crate::utils::{all_names, contains_return, target_paths, NameGenerator, PathReplacement, Substitution};
use crate::visit::VisitorMut;
use std::collections::{HashMap, HashSet};

/// Rewrites every `if` statement of the procedure into straight-line code
pub fn if_statements_to_expressions(function: &mut FunctionDef, names: &mut NameGenerator) -> Result<()> {
    if !function.body.iter().any(|s| matches!(s, Stmt::If { .. })) {
        return Ok(());
    }

    normalize_returns(function, names)?;

    let mut converter = Converter {
        taken: all_names(function),
        scope: ScopeTracker::with_parameters(function.params()),
    };
    let body = std::mem::take(&mut function.body);
    function.body = converter.convert_block(body)?;
    Ok(())
}

fn has_nested_return(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::If { body, orelse, .. } if contains_return(body) || contains_return(orelse))
}

/// Leaves the procedure with a single return, as its last statement
pub fn normalize_returns(function: &mut FunctionDef, names: &mut NameGenerator) -> Result<()> {
    if !function.body.iter().any(has_nested_return) {
        return Ok(());
    }
    if !matches!(function.body.last(), Some(Stmt::Return(_))) {
        function.body.push(Stmt::Return(None));
    }
    let body = std::mem::take(&mut function.body);
    function.body = lift_returns(body, names)?;
    Ok(())
}

/// `stmts` ends with a return. Statements after the first `if` holding a
/// return move into its branches; both branches then end by storing their
/// result, followed by one shared return.
fn lift_returns(mut stmts: Vec<Stmt>, names: &mut NameGenerator) -> Result<Vec<Stmt>> {
    let k = match stmts.iter().position(has_nested_return) {
        Some(k) => k,
        None => {
            let early = stmts.iter().rev().skip(1).any(Stmt::is_return);
            if early {
                return Err(Error::not_implemented("return before the end of an if branch"));
            }
            return Ok(stmts);
        }
    };

    let rest = stmts.split_off(k + 1);
    let (test, body, orelse) = match stmts.pop() {
        Some(Stmt::If { test, body, orelse }) => (test, body, orelse),
        _ => return Err(Error::not_implemented("return inside an unrecognized statement")),
    };

    let result = names.temporary();
    let mut branches = Vec::with_capacity(2);
    for mut branch in [body, orelse] {
        if !matches!(branch.last(), Some(Stmt::Return(_))) {
            branch.extend(rest.iter().cloned());
        }
        let mut branch = lift_returns(branch, names)?;
        match branch.pop() {
            Some(Stmt::Return(value)) => {
                branch.push(Stmt::assign_name(&result, value.unwrap_or_else(Expr::none)));
            }
            _ => return Err(Error::not_implemented("if branch without a final return")),
        }
        branches.push(branch);
    }

    let orelse = branches.pop().unwrap_or_default();
    let body = branches.pop().unwrap_or_default();
    stmts.push(Stmt::If { test, body, orelse });
    stmts.push(Stmt::Return(Some(Expr::name(result))));
    Ok(stmts)
}

struct Converter {
    taken: HashSet<String>,
    scope: ScopeTracker,
}

impl Converter {
    fn convert_block(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let converted = match stmt {
                Stmt::If { test, body, orelse } => self.convert_if(test, body, orelse)?,
                other => vec![other],
            };
            for stmt in converted {
                self.record(&stmt);
                out.push(stmt);
            }
        }
        Ok(out)
    }

    fn record(&mut self, stmt: &Stmt) {
        if let Stmt::Assign { targets, .. } = stmt {
            let mut paths = Vec::new();
            for target in targets {
                target_paths(target, &mut paths);
            }
            for path in paths {
                self.scope.record_store(&path, None, None);
            }
        }
    }

    fn convert_if(&mut self, test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Result<Vec<Stmt>> {
        self.scope.enter_scope();
        let body = self.convert_block(body);
        self.scope.exit_scope();
        let body = body?;

        self.scope.enter_scope();
        let orelse = self.convert_block(orelse);
        self.scope.exit_scope();
        let orelse = orelse?;

        for stmt in body.iter().chain(&orelse) {
            match stmt {
                Stmt::Expr(_) => return Err(Error::not_implemented("call statement inside an if branch")),
                Stmt::Return(_) => return Err(Error::not_implemented("return inside an if branch")),
                _ => {}
            }
        }

        let index = self.free_index();
        let cond = format!("ifcond_{}", index);
        self.taken.insert(cond.clone());

        let (body, body_vars) = self.rename_branch(body, &format!("body_{}_", index));
        let (orelse, orelse_vars) = self.rename_branch(orelse, &format!("orelse_{}_", index));

        let mut out = vec![Stmt::assign_name(&cond, test)];
        out.extend(body);
        for key in orelse_vars.iter().filter(|k| !has_key(&body_vars, k)) {
            let name = self.branch_name(&format!("body_{}_", index), key);
            out.push(Stmt::assign_name(name, self.padding(key)));
        }
        out.extend(orelse);
        for key in body_vars.iter().filter(|k| !has_key(&orelse_vars, k)) {
            let name = self.branch_name(&format!("orelse_{}_", index), key);
            out.push(Stmt::assign_name(name, self.padding(key)));
        }

        let merged = body_vars
            .iter()
            .chain(orelse_vars.iter().filter(|k| !has_key(&body_vars, k)));
        for key in merged {
            let body_name = self.branch_name(&format!("body_{}_", index), key);
            let orelse_name = self.branch_name(&format!("orelse_{}_", index), key);
            out.push(Stmt::assign(
                Expr::path(key),
                Expr::if_exp(Expr::name(&cond), Expr::name(body_name), Expr::name(orelse_name)),
            ));
        }
        Ok(out)
    }

    /// Smallest index whose condition and branch prefixes are all unused
    fn free_index(&self) -> usize {
        (0..)
            .find(|i| {
                let cond = format!("ifcond_{}", i);
                let body = format!("body_{}_", i);
                let orelse = format!("orelse_{}_", i);
                !self.taken.contains(&cond)
                    && !self
                        .taken
                        .iter()
                        .any(|n| n.starts_with(&body) || n.starts_with(&orelse))
            })
            .unwrap_or_default()
    }

    fn branch_name(&mut self, prefix: &str, key: &str) -> String {
        let name = format!("{}{}", prefix, key.replace('.', "_"));
        self.taken.insert(name.clone());
        name
    }

    fn padding(&self, key: &str) -> Expr {
        if key.contains('.') || self.scope.in_scope(key) {
            Expr::path(key)
        } else {
            Expr::none()
        }
    }

    /// Renames the variables a branch assigns, statement by statement, so
    /// loads before the first assignment still read the outer value
    fn rename_branch(&mut self, stmts: Vec<Stmt>, prefix: &str) -> (Vec<Stmt>, Vec<String>) {
        let mut names: HashMap<String, Expr> = HashMap::new();
        let mut paths: Vec<(String, Expr)> = Vec::new();
        // Variables and attribute paths, first assignment order
        let mut assigned: Vec<String> = Vec::new();
        let mut out = Vec::with_capacity(stmts.len());

        for stmt in stmts {
            let (targets, mut value) = match stmt {
                Stmt::Assign { targets, value } => (targets, value),
                Stmt::Pass => continue,
                other => {
                    out.push(other);
                    continue;
                }
            };

            Substitution::apply_expr(&names, &mut value);
            for (path, replacement) in &paths {
                PathReplacement::new(path, replacement).visit_expr_mut(&mut value);
            }

            let targets = targets
                .into_iter()
                .map(|target| self.rename_target(target, prefix, &mut names, &mut paths, &mut assigned))
                .collect();
            out.push(Stmt::Assign { targets, value });
        }
        (out, assigned)
    }

    fn rename_target(
        &mut self,
        target: Expr,
        prefix: &str,
        names: &mut HashMap<String, Expr>,
        paths: &mut Vec<(String, Expr)>,
        assigned: &mut Vec<String>,
    ) -> Expr {
        match target {
            Expr::Name(name) => {
                let renamed = self.branch_name(prefix, &name);
                names.insert(name.clone(), Expr::name(&renamed));
                if !assigned.contains(&name) {
                    assigned.push(name);
                }
                Expr::name(renamed)
            }
            Expr::Tuple(elts) => Expr::Tuple(
                elts.into_iter()
                    .map(|elt| self.rename_target(elt, prefix, names, paths, assigned))
                    .collect(),
            ),
            mut target @ Expr::Attribute { .. } => {
                let local_root = target.root_name().map_or(true, |root| names.contains_key(root));
                let path = target.as_path();
                let inside_synthetic = path
                    .as_deref()
                    .map_or(false, |p| paths.iter().any(|(s, _)| p.starts_with(&format!("{}.", s))));

                if local_root || inside_synthetic || path.is_none() {
                    if let Expr::Attribute { value, .. } = &mut target {
                        Substitution::apply_expr(names, value);
                        for (path, replacement) in paths.iter() {
                            PathReplacement::new(path, replacement).visit_expr_mut(value);
                        }
                    }
                    return target;
                }

                let key = path.unwrap_or_default();
                let renamed = self.branch_name(prefix, &key);
                if !paths.iter().any(|(p, _)| p == &key) {
                    paths.push((key.clone(), Expr::name(&renamed)));
                }
                if !assigned.contains(&key) {
                    assigned.push(key);
                }
                Expr::name(renamed)
            }
            other => other,
        }
    }
}

fn has_key(vars: &[String], key: &str) -> bool {
    vars.iter().any(|v| v == key)
}
