use super::{inline_calls, InlineTarget};
use crate::error::{Error, Result};
use crate::filter::{validate_class, validate_function, GrammarRules};
use crate::parser::{ClassDef, Expr, FunctionDef, Stmt};
use crate::utils::NameGenerator;

/// Inlines the methods of `class` called through `instance_path` in `function`
///
/// - static methods called as `instance.m(..)` or `Class.m(..)` are inlined
///   like functions
/// - instance methods called as `instance.m(..)` bind `self` to
///   `instance_path`, so `self.x` becomes `instance_path.x`
/// - `Class.m(obj, ..)` inlines an instance method with `self` bound to `obj`
/// - `x = instance.Inner(..)` and `x = Class.Inner(..)` become an explicit
///   allocation followed by `x.__init__(..)`, and the nested class is then
///   inlined at `x`
///
/// Calls to methods the class does not define are left untouched.
pub fn inline_class(function: &FunctionDef, instance_path: &str, class: &ClassDef) -> Result<FunctionDef> {
    validate_function(function, &GrammarRules::input())?;
    validate_class(class, &GrammarRules::input())?;

    let mut result = function.clone();
    let mut names = NameGenerator::new();
    inline_class_at(&mut result, instance_path, instance_path, class, &mut names)?;
    Ok(result)
}

/// Same as [`inline_class`], with method calls matched on `call_path` while
/// `self` is bound to `self_path`
pub(crate) fn inline_class_at(
    function: &mut FunctionDef,
    call_path: &str,
    self_path: &str,
    class: &ClassDef,
    names: &mut NameGenerator,
) -> Result<()> {
    let mut targets = Vec::new();
    for method in &class.methods {
        let on_class = format!("{}.{}", class.name, method.name);
        if method.is_static() {
            targets.push(InlineTarget::function(format!("{}.{}", call_path, method.name), method));
        } else if call_path != class.name {
            targets.push(InlineTarget::method(
                format!("{}.{}", call_path, method.name),
                method,
                Expr::path(self_path),
            ));
        }
        targets.push(InlineTarget::function(on_class, method));
    }
    inline_calls(function, &targets, names)?;

    let mut constructed = Vec::new();
    let body = std::mem::take(&mut function.body);
    function.body = expand_constructors(body, call_path, class, &mut constructed);

    for (instance, inner) in dedup_instances(constructed) {
        if let Some(inner) = class.inner_class(&inner) {
            tracing::debug!(class = %inner.name, instance = %instance, "inlining nested class");
            inline_class_at(function, &instance, &instance, inner, names)?;
        }
    }
    Ok(())
}

fn dedup_instances(found: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut unique = Vec::with_capacity(found.len());
    for pair in found {
        if !unique.contains(&pair) {
            unique.push(pair);
        }
    }
    unique
}

/// Nested class a constructor call refers to
fn constructed_class<'c>(func: &Expr, call_path: &str, class: &'c ClassDef) -> Option<&'c ClassDef> {
    let path = func.as_path()?;
    let under = |prefix: &str| path.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('.'));
    let inner = under(call_path).or_else(|| under(&class.name))?;
    class.inner_class(inner)
}

fn expand_constructors(
    body: Vec<Stmt>,
    call_path: &str,
    class: &ClassDef,
    found: &mut Vec<(String, String)>,
) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        match stmt {
            Stmt::Assign { targets, value } => {
                let expansion = match (targets.as_slice(), &value) {
                    ([target], Expr::Call { func, args, keywords }) if keywords.is_empty() => {
                        match (target.as_path(), constructed_class(func, call_path, class)) {
                            (Some(instance), Some(inner)) => Some((target.clone(), instance, inner, args.clone())),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                match expansion {
                    Some((target, instance, inner, args)) => {
                        let allocated = Expr::path(&format!("{}.{}", class.name, inner.name));
                        out.push(Stmt::assign(
                            target.clone(),
                            Expr::call(Expr::path("object.__new__"), vec![allocated]),
                        ));
                        out.push(Stmt::Expr(Expr::call(Expr::attribute(target, "__init__"), args)));
                        found.push((instance, inner.name.clone()));
                    }
                    None => out.push(Stmt::Assign { targets, value }),
                }
            }
            Stmt::If { test, body, orelse } => out.push(Stmt::If {
                test,
                body: expand_constructors(body, call_path, class, found),
                orelse: expand_constructors(orelse, call_path, class, found),
            }),
            other => out.push(other),
        }
    }
    out
}

/// Attribute of `self` the constructor stores parameter `param` in
pub(crate) fn stored_slot(init: &FunctionDef, param: &str) -> Option<String> {
    init.body.iter().find_map(|stmt| match stmt {
        Stmt::Assign { targets, value: Expr::Name(stored) } if targets.len() == 1 && stored == param => {
            match &targets[0] {
                Expr::Attribute { value, attr } if matches!(value.as_ref(), Expr::Name(n) if n == "self") => {
                    Some(attr.clone())
                }
                _ => None,
            }
        }
        _ => None,
    })
}

/// `self.<slot>` where the game's constructor stores its scheme parameter
pub(crate) fn scheme_slot(game: &ClassDef) -> Result<String> {
    let init = game.method("__init__").ok_or_else(|| Error::UnknownName {
        name: "__init__".to_string(),
        context: format!("class `{}`", game.name),
    })?;
    let param = init.params().get(1).ok_or_else(|| Error::UnknownName {
        name: "scheme parameter".to_string(),
        context: format!("constructor of `{}`", game.name),
    })?;
    stored_slot(init, param).ok_or_else(|| Error::UnknownName {
        name: param.clone(),
        context: format!("state stored by the constructor of `{}`", game.name),
    })
}

/// Inlines `scheme` into every method of `game` at the attribute the game's
/// constructor stores its scheme parameter (`__init__`'s first parameter
/// after `self`) in
pub fn inline_scheme_into_game(scheme: &ClassDef, game: &ClassDef) -> Result<ClassDef> {
    validate_class(scheme, &GrammarRules::input())?;
    validate_class(game, &GrammarRules::input())?;

    let slot = format!("self.{}", scheme_slot(game)?);
    let mut names = NameGenerator::new();
    let mut result = game.clone();
    for method in result.methods.iter_mut() {
        inline_class_at(method, &slot, &slot, scheme, &mut names)?;
    }
    tracing::debug!(scheme = %scheme.name, game = %game.name, slot = %slot, "inlined scheme into game");
    Ok(result)
}
