//! End-to-end tests for procedure canonicalization

use gamehop::canonicalize::ifstatements::if_statements_to_expressions;
use gamehop::{
    canonicalize_function, canonicalize_function_with, parse_function, CanonicalizeOptions, Error,
    NameGenerator,
};

fn canonical(source: &str) -> String {
    canonicalize_function(source).unwrap()
}

// ====================
// Equivalence scenarios
// ====================

#[test]
fn test_reordering_and_renaming() {
    let f = "def f(a, b):\n    c = a + 9\n    d = b + 7\n    e = c + d\n    return e\n";
    let g = "def g(w, b):\n    d = b + 7\n    u = w + 9\n    return u + d\n";
    assert_eq!(canonical(f), canonical(g));
}

#[test]
fn test_tuple_unfolding_and_dead_code() {
    let h = "def h():\n    c = 1\n    d = 2\n    (a, b) = (c, d)\n    return a\n";
    assert_eq!(canonical(h), canonical("def f():\n    return 1\n"));
}

#[test]
fn test_constant_condition_collapses() {
    let conditional = "def f(x, y):\n    z = x if 0 == 0 else y\n    return z\n";
    assert_eq!(canonical(conditional), canonical("def f(x, y):\n    return x\n"));
    assert_eq!(canonical(conditional), "def f(v0):\n    return v0\n");
}

#[test]
fn test_one_sided_if_scaffolding() {
    let source = "def f(a):\n    if a:\n        b = g(a)\n    return b\n";

    let mut function = parse_function(source).unwrap();
    if_statements_to_expressions(&mut function, &mut NameGenerator::new()).unwrap();
    assert_eq!(
        function.to_string(),
        "def f(a):\n    ifcond_0 = a\n    body_0_b = g(a)\n    orelse_0_b = None\n    b = body_0_b if ifcond_0 else orelse_0_b\n    return b\n"
    );

    let scaffold = "def f(a):\n    ifcond_0 = a\n    body_0_b = g(a)\n    orelse_0_b = None\n    b = body_0_b if ifcond_0 else orelse_0_b\n    return b\n";
    assert_eq!(canonical(source), canonical(scaffold));
}

// ====================
// Individual normalizations
// ====================

#[test]
fn test_unused_parameters_drop_out() {
    assert_eq!(
        canonical("def f(a, b, c):\n    return c\n"),
        canonical("def f(x):\n    return x\n")
    );
}

#[test]
fn test_parameter_order_follows_use() {
    assert_eq!(
        canonical("def f(a, b):\n    c = b - a\n    return c\n"),
        canonical("def f(b, a):\n    c = b - a\n    return c\n")
    );
}

#[test]
fn test_constant_folding() {
    assert_eq!(
        canonical("def f(x):\n    y = 2 * 3 + 1\n    return x + y\n"),
        canonical("def f(x):\n    return x + 7\n")
    );
}

#[test]
fn test_lambdas_are_inlined() {
    assert_eq!(
        canonical("def f(a):\n    g = lambda x: x + 1\n    return g(a)\n"),
        canonical("def f(a):\n    return a + 1\n")
    );
}

#[test]
fn test_call_arguments_are_hoisted() {
    assert_eq!(
        canonical("def f(a):\n    return F(G(a))\n"),
        canonical("def f(a):\n    b = G(a)\n    c = F(b)\n    return c\n")
    );
}

#[test]
fn test_calls_keep_their_relative_order() {
    let first = canonical("def f(o):\n    a = o.Sample()\n    b = o.Sample()\n    return (a, b)\n");
    let swapped = canonical("def f(o):\n    b = o.Sample()\n    a = o.Sample()\n    return (a, b)\n");
    assert_ne!(first, swapped);
}

#[test]
fn test_method_options_keep_signature() {
    let method = parse_function("def oracle(self, m, unused):\n    c = self.k + m\n    return c\n").unwrap();
    let text = canonicalize_function_with(&method, &CanonicalizeOptions::method()).unwrap();
    assert!(text.starts_with("def oracle(self, v0, v1):\n"));
    assert!(text.contains("self.k + v0"));
}

#[test]
fn test_output_is_a_fixed_point() {
    let once = canonical("def f(a, b):\n    if a:\n        c = b\n    else:\n        c = 1\n    return c\n");
    assert_eq!(canonical(&once), once);
}

#[test]
fn test_extreme_constants_stay_parseable() {
    for source in [
        "def f(a):\n    x = -9223372036854775807 - 1\n    return (a, x)\n",
        "def f(a):\n    x = 'a\\0b\\x01'\n    return (a, x)\n",
    ] {
        let once = canonical(source);
        assert_eq!(canonical(&once), once);
    }
    assert!(canonical("def f(a):\n    x = -9223372036854775807 - 1\n    return (a, x)\n")
        .contains("(-9223372036854775807 - 1)"));
}

// ====================
// Rejections
// ====================

#[test]
fn test_unsupported_input() {
    assert!(matches!(
        canonicalize_function("def f(a, b=1):\n    return a\n"),
        Err(Error::UnsupportedConstruct { .. })
    ));
    assert!(matches!(
        canonicalize_function("def f(**kw):\n    return 1\n"),
        Err(Error::UnsupportedConstruct { .. })
    ));
}

#[test]
fn test_syntax_errors_surface() {
    let err = canonicalize_function("def f(a)\n    return a\n").unwrap_err();
    assert_eq!(err.severity(), gamehop::ErrorSeverity::Input);
}

#[test]
fn test_options_json_drives_canonicalization() {
    let options = CanonicalizeOptions::from_json(r#"{"rename_function": false}"#).unwrap();
    let function = parse_function("def keep(a):\n    return a\n").unwrap();
    let text = canonicalize_function_with(&function, &options).unwrap();
    assert_eq!(text, "def keep(v0):\n    return v0\n");
}
