use super::{inline_calls, InlineTarget};
use crate::error::{Error, Result};
use crate::filter::{validate_function, GrammarRules};
use crate::parser::FunctionDef;
use crate::utils::{assigned_names, NameGenerator};

/// Inlines every call to `callee` (by name) in `caller`
///
/// Returns a new caller; the inputs are untouched. A caller without
/// matching call sites comes back unchanged.
///
/// # Errors
///
/// - [`Error::InlineShapeViolation`] for an early return, an arity mismatch,
///   recursion or a call in an unsupported position
/// - [`Error::NameCollision`] when the caller rebinds the callee's name or a
///   local of the caller would capture a free name of the callee
pub fn inline_function_call(callee: &FunctionDef, caller: &FunctionDef) -> Result<FunctionDef> {
    validate_function(callee, &GrammarRules::input())?;
    validate_function(caller, &GrammarRules::input())?;

    let rebinds = caller.params().iter().any(|p| *p == callee.name)
        || assigned_names(&caller.body).contains(&callee.name);
    if rebinds {
        return Err(Error::NameCollision {
            name: callee.name.clone(),
            scope: format!("caller `{}`", caller.name),
        });
    }

    let mut result = caller.clone();
    let target = InlineTarget::function(callee.name.clone(), callee);
    inline_calls(&mut result, std::slice::from_ref(&target), &mut NameGenerator::new())?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    #[test]
    fn test_no_call_sites_is_identity() {
        let callee = parse_function("def g(a):\n    return a\n").unwrap();
        let caller = parse_function("def f(x):\n    return x\n").unwrap();
        assert_eq!(inline_function_call(&callee, &caller).unwrap(), caller);
    }

    #[test]
    fn test_rebound_callee_name() {
        let callee = parse_function("def g(a):\n    return a\n").unwrap();
        let caller = parse_function("def f(g):\n    y = g(1)\n    return y\n").unwrap();
        assert!(matches!(
            inline_function_call(&callee, &caller),
            Err(Error::NameCollision { name, .. }) if name == "g"
        ));
    }

    #[test]
    fn test_unsupported_callee_is_rejected() {
        let callee = parse_function("def g(*a):\n    return a\n").unwrap();
        let caller = parse_function("def f(x):\n    y = g(x)\n    return y\n").unwrap();
        assert!(matches!(
            inline_function_call(&callee, &caller),
            Err(Error::UnsupportedConstruct { .. })
        ));
    }
}
