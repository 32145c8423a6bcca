use super::target_roots;
use crate::error::{Error, Result};
use crate::filter::{validate_function, GrammarRules};
use crate::parser::{Constant, Expr, FunctionDef};
use crate::utils::{assigned_names, is_identifier, Substitution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value known for a parameter before the function runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgumentValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
    Tuple(Vec<ArgumentValue>),
    /// Dotted reference to a class or scheme (`PKE.Scheme`)
    Type(String),
}

impl ArgumentValue {
    /// Expression substituted for the parameter
    pub fn to_expr(&self) -> Result<Expr> {
        Ok(match self {
            ArgumentValue::Bool(b) => Expr::bool(*b),
            ArgumentValue::Int(i) => Expr::int(*i),
            ArgumentValue::Float(x) => Expr::Constant(Constant::Float(*x)),
            ArgumentValue::Str(s) => Expr::Constant(Constant::Str(s.clone())),
            ArgumentValue::None => Expr::none(),
            ArgumentValue::Tuple(elts) => {
                Expr::Tuple(elts.iter().map(ArgumentValue::to_expr).collect::<Result<_>>()?)
            }
            ArgumentValue::Type(path) => {
                if !path.split('.').all(is_identifier) {
                    return Err(Error::unsupported(
                        format!("type reference `{}`", path),
                        "argument value",
                    ));
                }
                Expr::path(path)
            }
        })
    }

    fn is_type(&self) -> bool {
        matches!(self, ArgumentValue::Type(_))
    }
}

/// Substitutes `value` for every load of `param` and drops the parameter
///
/// # Errors
///
/// - [`Error::UnknownName`] if `function` has no parameter `param`
/// - [`Error::InlineShapeViolation`] if the body assigns `param`, or writes
///   through it while `value` is not a type reference
pub fn inline_argument_into_function(
    param: &str,
    value: &ArgumentValue,
    function: &FunctionDef,
) -> Result<FunctionDef> {
    validate_function(function, &GrammarRules::input())?;

    let position = function
        .params()
        .iter()
        .position(|p| p == param)
        .ok_or_else(|| Error::UnknownName {
            name: param.to_string(),
            context: format!("parameters of `{}`", function.name),
        })?;

    if assigned_names(&function.body).iter().any(|n| n == param) {
        return Err(Error::inline_shape(
            &function.name,
            format!("parameter `{}` is reassigned", param),
        ));
    }
    if !value.is_type() && target_roots(&function.body).contains(param) {
        return Err(Error::inline_shape(
            &function.name,
            format!("parameter `{}` is written through", param),
        ));
    }

    let mut result = function.clone();
    result.args.params.remove(position);
    let map = HashMap::from([(param.to_string(), value.to_expr()?)]);
    Substitution::apply(&map, &mut result.body);
    tracing::debug!(function = %function.name, param, "inlined argument value");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn f() -> FunctionDef {
        parse_function("def f(a, n):\n    b = a.KeyGen(n)\n    return (b, n)\n").unwrap()
    }

    #[test]
    fn test_constant_argument() {
        let result = inline_argument_into_function("n", &ArgumentValue::Int(128), &f()).unwrap();
        assert_eq!(
            result.to_string(),
            "def f(a):\n    b = a.KeyGen(128)\n    return (b, 128)\n"
        );
    }

    #[test]
    fn test_type_argument() {
        let value = ArgumentValue::Type("PKE.Scheme".to_string());
        let result = inline_argument_into_function("a", &value, &f()).unwrap();
        assert_eq!(result.params(), ["n"]);
        assert!(result.to_string().contains("PKE.Scheme.KeyGen(n)"));
    }

    #[test]
    fn test_tuple_argument() {
        let value = ArgumentValue::Tuple(vec![ArgumentValue::Bool(true), ArgumentValue::None]);
        let result = inline_argument_into_function("n", &value, &f()).unwrap();
        assert!(result.to_string().contains("return (b, (True, None))"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            inline_argument_into_function("z", &ArgumentValue::Int(1), &f()),
            Err(Error::UnknownName { name, .. }) if name == "z"
        ));

        let reassigned = parse_function("def f(a):\n    a = a + 1\n    return a\n").unwrap();
        assert!(matches!(
            inline_argument_into_function("a", &ArgumentValue::Int(1), &reassigned),
            Err(Error::InlineShapeViolation { .. })
        ));

        let written = parse_function("def f(a):\n    a.x = 1\n    return a\n").unwrap();
        assert!(matches!(
            inline_argument_into_function("a", &ArgumentValue::Int(1), &written),
            Err(Error::InlineShapeViolation { .. })
        ));
        assert!(inline_argument_into_function("a", &ArgumentValue::Type("T".to_string()), &written).is_ok());
    }

    #[test]
    fn test_values_load_from_json() {
        let value: ArgumentValue = serde_json::from_str(r#"{"kind": "type", "value": "KEM.Scheme"}"#).unwrap();
        assert_eq!(value, ArgumentValue::Type("KEM.Scheme".to_string()));
        let none: ArgumentValue = serde_json::from_str(r#"{"kind": "none"}"#).unwrap();
        assert_eq!(none, ArgumentValue::None);
    }
}
