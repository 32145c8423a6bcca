//! Tests for function, argument and class inlining

use gamehop::{
    canonicalize_function_with, inline_argument_into_function, inline_class, inline_function_call,
    parse_class, parse_function, unparse_function, ArgumentValue, CanonicalizeOptions, Error,
    FunctionDef,
};

fn function(source: &str) -> FunctionDef {
    parse_function(source).unwrap()
}

fn canonical(f: &FunctionDef) -> String {
    canonicalize_function_with(f, &CanonicalizeOptions::function()).unwrap()
}

// ====================
// Function inlining
// ====================

#[test]
fn test_inlined_caller_matches_hand_written() {
    let addseven = function("def addseven(q):\n    return q + 7\n");
    let caller = function("def f(w, b):\n    d = addseven(b)\n    u = w + 9\n    return u + d\n");
    let expected = function("def f(a, b):\n    c = a + 9\n    d = b + 7\n    e = c + d\n    return e\n");

    let inlined = inline_function_call(&addseven, &caller).unwrap();
    assert_eq!(canonical(&inlined), canonical(&expected));
}

#[test]
fn test_every_call_site_is_replaced() {
    let callee = function("def g(a):\n    t = a * a\n    return t + 1\n");
    let caller = function(
        "def f(x, flag):\n    y = g(x)\n    if flag:\n        z = g(y)\n    else:\n        z = y\n    return z\n",
    );
    let text = unparse_function(&inline_function_call(&callee, &caller).unwrap());
    assert!(!text.contains("g("));
    assert!(text.contains("_g_0_t = x * x"));
    assert!(text.contains("_g_1_t = y * y"));
}

#[test]
fn test_inputs_are_not_modified() {
    let callee = function("def g(a):\n    return a\n");
    let caller = function("def f(x):\n    y = g(x)\n    return y\n");
    let before = caller.clone();
    inline_function_call(&callee, &caller).unwrap();
    assert_eq!(caller, before);
}

#[test]
fn test_multiple_returns_are_rejected() {
    let callee = function("def g(a):\n    if a:\n        return 1\n    return 0\n");
    let caller = function("def f(x):\n    y = g(x)\n    return y\n");
    assert!(matches!(
        inline_function_call(&callee, &caller),
        Err(Error::InlineShapeViolation { callee, .. }) if callee == "g"
    ));
}

#[test]
fn test_call_nested_in_expression_is_rejected() {
    let callee = function("def g(a):\n    return a\n");
    let caller = function("def f(x):\n    return (g(x), 1)\n");
    let err = inline_function_call(&callee, &caller).unwrap_err();
    assert_eq!(err, Error::inline_shape("g", "call in unsupported position"));
}

// ====================
// Argument inlining
// ====================

#[test]
fn test_argument_value_specialises_function() {
    let f = function("def f(n, x):\n    y = x if n else 0\n    return y\n");
    let specialised = inline_argument_into_function("n", &ArgumentValue::Bool(false), &f).unwrap();
    assert_eq!(specialised.params(), ["x"]);
    assert_eq!(canonical(&specialised), canonical(&function("def f():\n    return 0\n")));
}

#[test]
fn test_argument_of_unknown_parameter() {
    let f = function("def f(x):\n    return x\n");
    assert!(matches!(
        inline_argument_into_function("y", &ArgumentValue::Int(1), &f),
        Err(Error::UnknownName { .. })
    ));
}

// ====================
// Class inlining
// ====================

const PRF: &str = "class PRF:\n    @staticmethod\n    def Eval(k, x):\n        y = H(k, x)\n        return y\n\n    def Keyed(self, x):\n        y = H(self.key, x)\n        return y\n";

#[test]
fn test_class_methods_inline_at_instance() {
    let prf = parse_class(PRF).unwrap();
    let caller = function("def f(self, m):\n    a = self.prf.Eval(self.k, m)\n    b = self.prf.Keyed(a)\n    return b\n");
    let text = unparse_function(&inline_class(&caller, "self.prf", &prf).unwrap());
    assert!(text.contains("H(self.prf.key, a)"));
    assert!(!text.contains("Eval("));
    assert!(!text.contains("Keyed("));
}

#[test]
fn test_class_inlining_canonicalizes_to_direct_code() {
    let prf = parse_class(PRF).unwrap();
    let caller = function("def f(k, m):\n    c = PRF.Eval(k, m)\n    return c\n");
    let inlined = inline_class(&caller, "prf", &prf).unwrap();
    assert_eq!(
        canonical(&inlined),
        canonical(&function("def f(k, m):\n    return H(k, m)\n"))
    );
}
