//! # Inlining
//!
//! Substitutes a callee's body at the call sites of a caller, hygienically:
//! callee locals get a prefix unique to the call site, trivial arguments are
//! substituted for parameters and everything else is bound once before the
//! inlined body.
//!
//! ## Supported call sites
//!
//! ```text
//! x = callee(args)      target = <returned value>
//! callee(args)          returned value kept only if it calls something
//! return callee(args)   return <returned value>
//! ```
//!
//! Call sites inside `if` branches are supported. A matching call anywhere
//! else after inlining is an [`Error::InlineShapeViolation`].
//!
//! ## Entry points
//!
//! - [`inline_function_call`]: one function into another
//! - [`inline_argument_into_function`]: a known argument value into a function
//! - [`inline_class`]: the methods and nested constructors of a class held at
//!   an instance path
//! - [`inline_scheme_into_game`]: a scheme into the game that stores it
//! - [`inline_reduction_into_game`]: a reduction spliced into a target game

pub mod argument;
pub mod class;
pub mod function;
pub mod reduction;

pub use argument::{inline_argument_into_function, ArgumentValue};
pub use class::{inline_class, inline_scheme_into_game};
pub use function::inline_function_call;
pub use reduction::inline_reduction_into_game;

use crate::error::{Error, Result};
use crate::parser::{Expr, FunctionDef, Stmt};
use crate::utils::{
    all_names, assigned_names, contains_call, contains_return, find_call, free_names,
    target_paths, NameGenerator, Substitution,
};
use std::collections::{HashMap, HashSet};

/// Rounds of call-site rewriting before a call is considered recursive
pub const MAX_INLINE_DEPTH: usize = 32;

/// Where the value of an inlined call goes
#[derive(Debug, Clone, PartialEq)]
pub enum CallSite {
    /// `target = callee(...)`
    Assign(Expr),
    /// `callee(...)` as a statement
    Discard,
    /// `return callee(...)`
    Return,
}

/// A callee together with the expression that calls it
#[derive(Debug, Clone)]
pub(crate) struct InlineTarget<'a> {
    /// Dotted callee expression matched at call sites (`f`, `self.scheme.Enc`)
    pub path: String,
    pub callee: &'a FunctionDef,
    /// Bound to the callee's first parameter, for instance methods
    pub receiver: Option<Expr>,
}

impl<'a> InlineTarget<'a> {
    pub fn function(path: impl Into<String>, callee: &'a FunctionDef) -> Self {
        InlineTarget {
            path: path.into(),
            callee,
            receiver: None,
        }
    }

    pub fn method(path: impl Into<String>, callee: &'a FunctionDef, receiver: Expr) -> Self {
        InlineTarget {
            path: path.into(),
            callee,
            receiver: Some(receiver),
        }
    }

    fn matches(&self, func: &Expr) -> bool {
        func.as_path().as_deref() == Some(self.path.as_str())
    }
}

/// Names of the caller, taken once per rewriting round
struct CallerContext {
    name: String,
    names: HashSet<String>,
    locals: HashSet<String>,
}

impl CallerContext {
    fn of(caller: &FunctionDef) -> Self {
        CallerContext {
            name: caller.name.clone(),
            names: all_names(caller),
            locals: caller
                .params()
                .iter()
                .cloned()
                .chain(assigned_names(&caller.body))
                .collect(),
        }
    }
}

/// Inlines every supported call site of every target in `caller`
pub(crate) fn inline_calls(
    caller: &mut FunctionDef,
    targets: &[InlineTarget<'_>],
    names: &mut NameGenerator,
) -> Result<()> {
    if targets.is_empty() {
        return Ok(());
    }
    for _ in 0..MAX_INLINE_DEPTH {
        let context = CallerContext::of(caller);
        let mut changed = false;
        let body = std::mem::take(&mut caller.body);
        caller.body = rewrite_block(body, targets, &context, names, &mut changed)?;
        if !changed {
            return check_leftovers(caller, targets, "call in unsupported position");
        }
    }
    check_leftovers(caller, targets, "recursive call")
}

fn check_leftovers(caller: &FunctionDef, targets: &[InlineTarget<'_>], reason: &str) -> Result<()> {
    let leftover = find_call(&caller.body, &|func| targets.iter().any(|t| t.matches(func)));
    if let Some(Expr::Call { func, .. }) = leftover {
        let callee = func.as_path().unwrap_or_default();
        return Err(Error::inline_shape(callee, reason));
    }
    Ok(())
}

fn matched<'t, 'e>(
    value: &'e Expr,
    targets: &'t [InlineTarget<'t>],
) -> Option<(&'t InlineTarget<'t>, &'e [Expr])> {
    match value {
        Expr::Call { func, args, keywords } if keywords.is_empty() => targets
            .iter()
            .find(|t| t.matches(func))
            .map(|t| (t, args.as_slice())),
        _ => None,
    }
}

fn rewrite_block(
    body: Vec<Stmt>,
    targets: &[InlineTarget<'_>],
    context: &CallerContext,
    names: &mut NameGenerator,
    changed: &mut bool,
) -> Result<Vec<Stmt>> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        let expanded = match &stmt {
            Stmt::Assign { targets: lhs, value } if lhs.len() == 1 => match matched(value, targets) {
                Some((target, args)) => Some(expand_call(
                    target,
                    args,
                    context,
                    names,
                    CallSite::Assign(lhs[0].clone()),
                )?),
                None => None,
            },
            Stmt::Expr(value) => match matched(value, targets) {
                Some((target, args)) => {
                    Some(expand_call(target, args, context, names, CallSite::Discard)?)
                }
                None => None,
            },
            Stmt::Return(Some(value)) => match matched(value, targets) {
                Some((target, args)) => {
                    Some(expand_call(target, args, context, names, CallSite::Return)?)
                }
                None => None,
            },
            _ => None,
        };

        match (expanded, stmt) {
            (Some(stmts), _) => {
                *changed = true;
                out.extend(stmts);
            }
            (None, Stmt::If { test, body, orelse }) => out.push(Stmt::If {
                test,
                body: rewrite_block(body, targets, context, names, changed)?,
                orelse: rewrite_block(orelse, targets, context, names, changed)?,
            }),
            (None, stmt) => out.push(stmt),
        }
    }
    Ok(out)
}

/// Body of `target.callee` specialised to one call site
fn expand_call(
    target: &InlineTarget<'_>,
    args: &[Expr],
    context: &CallerContext,
    names: &mut NameGenerator,
    site: CallSite,
) -> Result<Vec<Stmt>> {
    let callee = target.callee;
    let mut body: Vec<Stmt> = callee
        .body
        .iter()
        .filter(|s| !matches!(s, Stmt::Pass))
        .cloned()
        .collect();
    let result = match body.last() {
        Some(Stmt::Return(value)) => {
            let value = value.clone();
            body.pop();
            value
        }
        _ => None,
    };
    if contains_return(&body) {
        return Err(Error::inline_shape(
            &callee.name,
            "return statement before the end of the body",
        ));
    }

    let mut params = callee.params();
    let self_param = match &target.receiver {
        Some(_) => match params.split_first() {
            Some((first, rest)) => {
                params = rest;
                Some(first.as_str())
            }
            None => {
                return Err(Error::inline_shape(&callee.name, "method without a self parameter"))
            }
        },
        None => None,
    };
    if params.len() != args.len() {
        return Err(Error::inline_shape(
            &callee.name,
            format!("expected {} arguments, got {}", params.len(), args.len()),
        ));
    }

    let stored: HashSet<String> = assigned_names(&body).into_iter().collect();
    if let Some(self_name) = self_param {
        if stored.contains(self_name) {
            return Err(Error::inline_shape(&callee.name, "reassigns its self parameter"));
        }
    }
    if let Some(clash) = free_names(callee).into_iter().find(|n| context.locals.contains(n)) {
        return Err(Error::NameCollision {
            name: clash,
            scope: format!("caller `{}`", context.name),
        });
    }

    let prefix = call_site_prefix(&callee.name, context, names);
    let written_roots = target_roots(&body);

    let mut map: HashMap<String, Expr> = HashMap::new();
    let mut out = Vec::new();
    if let (Some(self_name), Some(receiver)) = (self_param, &target.receiver) {
        map.insert(self_name.to_string(), receiver.clone());
    }
    for (param, arg) in params.iter().zip(args) {
        let substitutable = match arg {
            Expr::Name(_) => !stored.contains(param),
            arg => arg.is_trivial() && !stored.contains(param) && !written_roots.contains(param),
        };
        if substitutable {
            map.insert(param.clone(), arg.clone());
        } else {
            let bound = format!("{}{}", prefix, param);
            out.push(Stmt::assign_name(&bound, arg.clone()));
            map.insert(param.clone(), Expr::name(bound));
        }
    }
    for local in &stored {
        if !map.contains_key(local) {
            map.insert(local.clone(), Expr::name(format!("{}{}", prefix, local)));
        }
    }

    tracing::debug!(
        callee = %target.path,
        caller = %context.name,
        prefix = %prefix,
        "inlining call site"
    );

    Substitution::apply(&map, &mut body);
    out.extend(body);
    let result = result.map(|mut value| {
        Substitution::apply_expr(&map, &mut value);
        value
    });

    match (site, result) {
        (CallSite::Assign(lhs), value) => {
            out.push(Stmt::assign(lhs, value.unwrap_or_else(Expr::none)))
        }
        (CallSite::Return, value) => out.push(Stmt::Return(value)),
        (CallSite::Discard, Some(value)) if value.is_call() => out.push(Stmt::Expr(value)),
        (CallSite::Discard, Some(value)) if contains_call(&value) => {
            out.push(Stmt::assign_name(format!("{}return", prefix), value))
        }
        (CallSite::Discard, _) => {}
    }
    Ok(out)
}

/// `_<callee>_<n>_`, with `n` bumped until no caller name starts with it
fn call_site_prefix(callee: &str, context: &CallerContext, names: &mut NameGenerator) -> String {
    let key = format!("inline:{}", callee);
    loop {
        let candidate = format!("_{}_{}_", callee, names.next_index(&key));
        if !context.names.iter().any(|n| n.starts_with(&candidate)) {
            return candidate;
        }
    }
}

/// Roots of attribute and subscript targets (`p` for `p.x = ...`)
pub(crate) fn target_roots(body: &[Stmt]) -> HashSet<String> {
    let mut roots = HashSet::new();
    crate::utils::for_each_stmt(body, &mut |stmt| {
        if let Stmt::Assign { targets, .. } = stmt {
            for target in targets {
                let mut paths = Vec::new();
                target_paths(target, &mut paths);
                if let Expr::Subscript { .. } = target {
                    paths.extend(target.root_name().map(str::to_string));
                }
                for path in paths {
                    if let Some(root) = path.split('.').next() {
                        roots.insert(root.to_string());
                    }
                }
            }
        }
    });
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn inline_into(callee: &str, caller: &str) -> Result<String> {
        let callee = parse_function(callee)?;
        let mut caller = parse_function(caller)?;
        let target = InlineTarget::function(callee.name.clone(), &callee);
        inline_calls(&mut caller, std::slice::from_ref(&target), &mut NameGenerator::new())?;
        Ok(caller.to_string())
    }

    #[test]
    fn test_assignment_site() {
        assert_eq!(
            inline_into(
                "def g(a, b):\n    c = a + b\n    return c * 2\n",
                "def f(x):\n    y = g(x, 1)\n    return y\n"
            )
            .unwrap(),
            "def f(x):\n    _g_0_c = x + 1\n    y = _g_0_c * 2\n    return y\n"
        );
    }

    #[test]
    fn test_non_trivial_argument_is_bound_once() {
        assert_eq!(
            inline_into(
                "def g(a):\n    return a + a\n",
                "def f(x):\n    y = g(x * 3)\n    return y\n"
            )
            .unwrap(),
            "def f(x):\n    _g_0_a = x * 3\n    y = _g_0_a + _g_0_a\n    return y\n"
        );
    }

    #[test]
    fn test_each_site_gets_its_own_prefix() {
        let text = inline_into(
            "def g(a):\n    t = a + 1\n    return t\n",
            "def f(x):\n    y = g(x)\n    z = g(y)\n    return z\n",
        )
        .unwrap();
        assert!(text.contains("_g_0_t = x + 1"));
        assert!(text.contains("_g_1_t = y + 1"));
    }

    #[test]
    fn test_prefix_skips_caller_names() {
        let text = inline_into(
            "def g(a):\n    t = a + 1\n    return t\n",
            "def f(_g_0_t):\n    y = g(_g_0_t)\n    return y\n",
        )
        .unwrap();
        assert!(text.contains("_g_1_t = _g_0_t + 1"));
    }

    #[test]
    fn test_return_and_discard_sites() {
        assert_eq!(
            inline_into("def g(a):\n    return a + 1\n", "def f(x):\n    return g(x)\n").unwrap(),
            "def f(x):\n    return x + 1\n"
        );
        assert_eq!(
            inline_into("def g(a):\n    return h(a)\n", "def f(x):\n    g(x)\n    return x\n").unwrap(),
            "def f(x):\n    h(x)\n    return x\n"
        );
        assert_eq!(
            inline_into("def g(a):\n    return a + 1\n", "def f(x):\n    g(x)\n    return x\n").unwrap(),
            "def f(x):\n    return x\n"
        );
    }

    #[test]
    fn test_callee_without_return_assigns_none() {
        assert_eq!(
            inline_into("def g(a):\n    h(a)\n", "def f(x):\n    y = g(x)\n    return y\n").unwrap(),
            "def f(x):\n    h(x)\n    y = None\n    return y\n"
        );
    }

    #[test]
    fn test_sites_inside_if_branches() {
        let text = inline_into(
            "def g(a):\n    return a + 1\n",
            "def f(x):\n    if x:\n        y = g(x)\n    else:\n        y = 0\n    return y\n",
        )
        .unwrap();
        assert!(text.contains("        y = x + 1\n"));
    }

    #[test]
    fn test_early_return_is_rejected() {
        let err = inline_into(
            "def g(a):\n    if a:\n        return 1\n    return 2\n",
            "def f(x):\n    y = g(x)\n    return y\n",
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::inline_shape("g", "return statement before the end of the body")
        );
    }

    #[test]
    fn test_nested_call_is_rejected() {
        let err = inline_into(
            "def g(a):\n    return a\n",
            "def f(x):\n    y = g(x) + 1\n    return y\n",
        )
        .unwrap_err();
        assert_eq!(err, Error::inline_shape("g", "call in unsupported position"));
    }

    #[test]
    fn test_recursion_is_rejected() {
        let err = inline_into(
            "def g(a):\n    b = g(a)\n    return b\n",
            "def f(x):\n    y = g(x)\n    return y\n",
        )
        .unwrap_err();
        assert_eq!(err, Error::inline_shape("g", "recursive call"));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = inline_into("def g(a, b):\n    return a\n", "def f(x):\n    y = g(x)\n    return y\n")
            .unwrap_err();
        assert_eq!(err, Error::inline_shape("g", "expected 2 arguments, got 1"));
    }

    #[test]
    fn test_free_name_capture_is_rejected() {
        let err = inline_into(
            "def g(a):\n    return a + k\n",
            "def f(x, k):\n    y = g(x)\n    return y\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::NameCollision { name, .. } if name == "k"));
    }

    #[test]
    fn test_reassigned_parameter_is_bound() {
        assert_eq!(
            inline_into(
                "def g(a):\n    a = a + 1\n    return a\n",
                "def f(x):\n    y = g(x)\n    return y\n"
            )
            .unwrap(),
            "def f(x):\n    _g_0_a = x\n    _g_0_a = _g_0_a + 1\n    y = _g_0_a\n    return y\n"
        );
    }
}
