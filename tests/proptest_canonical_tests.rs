//! Property-based tests for the canonicalizer
//!
//! Generated procedures, straight-line or with branches, tuple assignments,
//! state writes and extreme literals, check that:
//! 1. Canonicalization is idempotent
//! 2. Independent statements may appear in any order
//! 3. Consistent renaming and unused parameters do not change the result
//! 4. Constant folding agrees with integer arithmetic
//! 5. The parser never panics on arbitrary input

use gamehop::canonicalize::simplify::fold_binary;
use gamehop::parser::{BinaryOp, Constant};
use gamehop::{canonicalize_function, parse_module};
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

fn operator() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("+"), Just("-"), Just("*")]
}

/// A straight-line procedure over `p0..pk` where each line may read the
/// parameters, earlier temporaries, or small constants
fn straight_line_program() -> impl Strategy<Value = String> {
    (1usize..4, 1usize..7)
        .prop_flat_map(|(params, lines)| {
            let operand = move |i: usize| {
                prop_oneof![
                    (0..params).prop_map(|j| format!("p{}", j)),
                    (0..i.max(1)).prop_map(move |j| if i == 0 {
                        "p0".to_string()
                    } else {
                        format!("t{}", j)
                    }),
                    (0i64..10).prop_map(|n| n.to_string()),
                ]
            };
            let rows: Vec<_> = (0..lines)
                .map(|i| (operand(i), operator(), operand(i)))
                .collect();
            (Just(params), rows)
        })
        .prop_map(|(params, rows)| {
            let mut source = format!("def f({}):\n", param_list(params));
            for (i, (left, op, right)) in rows.iter().enumerate() {
                source.push_str(&format!("    t{} = {} {} {}\n", i, left, op, right));
            }
            source.push_str(&format!("    return t{}\n", rows.len() - 1));
            source
        })
}

/// Source literals at the edges of what the scanner and the printer handle
fn wide_constant() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("9223372036854775807"),
        Just("(-9223372036854775807 - 1)"),
        Just("4611686018427387904"),
        Just("-4611686018427387905"),
        Just("'\\x00a'"),
        Just("'tab\\there\\n'"),
        Just("\"it's\""),
        Just("\"both'\\\"\""),
        Just("'back\\\\slash'"),
        Just("'\\x7f\\r'"),
    ]
}

/// One operand of line `i`; line `j` defines `t{2j}`
fn structured_operand(params: usize, i: usize) -> BoxedStrategy<String> {
    let earlier = if i == 0 {
        Just("p0".to_string()).boxed()
    } else {
        (0..i).prop_map(|j| format!("t{}", 2 * j)).boxed()
    };
    prop_oneof![
        3 => (0..params).prop_map(|j| format!("p{}", j)),
        3 => earlier,
        2 => (0i64..10).prop_map(|n| n.to_string()),
        2 => wide_constant().prop_map(str::to_string),
    ]
    .boxed()
}

/// Line `i` of a structured procedure, defining `t{2i}` (and `t{2i+1}` for
/// tuple assignments)
fn structured_line(params: usize, i: usize) -> impl Strategy<Value = String> {
    let operand = move || structured_operand(params, i);
    let expr = move || (operand(), operator(), operand()).prop_map(|(l, op, r)| format!("{} {} {}", l, op, r));
    prop_oneof![
        expr().prop_map(move |e| format!("    t{} = {}\n", 2 * i, e)),
        (expr(), operand()).prop_map(move |(e, o)| {
            format!("    (t{}, t{}) = ({}, {})\n", 2 * i, 2 * i + 1, e, o)
        }),
        (operand(), expr(), expr()).prop_map(move |(c, yes, no)| {
            format!(
                "    if p0 < {}:\n        t{k} = {}\n    else:\n        t{k} = {}\n",
                c,
                yes,
                no,
                k = 2 * i
            )
        }),
        expr().prop_map(move |e| format!("    self.s{i} = {}\n    t{} = self.s{i} + 1\n", e, 2 * i, i = i)),
    ]
}

/// A procedure over `self, p0..pk` mixing if/else blocks, tuple
/// assignments, attribute writes on `self` and wide constants
fn structured_program() -> impl Strategy<Value = String> {
    (1usize..4, 1usize..6)
        .prop_flat_map(|(params, lines)| {
            let rows: Vec<_> = (0..lines).map(|i| structured_line(params, i)).collect();
            (Just(params), rows)
        })
        .prop_map(|(params, rows)| {
            let mut source = format!("def f(self, {}):\n", param_list(params));
            for row in &rows {
                source.push_str(row);
            }
            source.push_str(&format!("    return t{}\n", 2 * (rows.len() - 1)));
            source
        })
}

fn any_program() -> impl Strategy<Value = String> {
    prop_oneof![straight_line_program(), structured_program()]
}

/// Independent lines `ti = pj op (i + 1)`, shuffled, all returned
fn independent_lines() -> impl Strategy<Value = (usize, Vec<String>, Vec<String>)> {
    (1usize..4, 2usize..7).prop_flat_map(|(params, lines)| {
        let rows: Vec<_> = (0..lines)
            .map(|i| {
                ((0..params), operator())
                    .prop_map(move |(j, op)| format!("    t{} = p{} {} {}\n", i, j, op, i + 1))
            })
            .collect();
        rows.prop_flat_map(move |rows| {
            let shuffled = Just(rows.clone()).prop_shuffle();
            (Just(params), Just(rows), shuffled)
        })
    })
}

fn param_list(params: usize) -> String {
    (0..params)
        .map(|j| format!("p{}", j))
        .collect::<Vec<_>>()
        .join(", ")
}

fn program(params: usize, lines: &[String]) -> String {
    let returned: Vec<String> = (0..lines.len()).map(|i| format!("t{}", i)).collect();
    format!(
        "def f({}):\n{}    return ({})\n",
        param_list(params),
        lines.concat(),
        returned.join(", ")
    )
}

/// Prefixes every parameter and temporary name
fn prefixed(source: &str, prefix: &str) -> String {
    let pattern = regex::Regex::new(r"\b([pt]\d+)\b").unwrap();
    pattern
        .replace_all(source, |caps: &regex::Captures| format!("{}{}", prefix, &caps[1]))
        .into_owned()
}

// =============================================================================
// CANONICAL FORM PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn canonical_text_is_a_fixed_point(source in any_program()) {
        let once = canonicalize_function(&source).unwrap();
        prop_assert_eq!(canonicalize_function(&once).unwrap(), once);
    }

    #[test]
    fn independent_lines_in_any_order(case in independent_lines()) {
        let (params, lines, shuffled) = case;
        prop_assert_eq!(
            canonicalize_function(&program(params, &lines)).unwrap(),
            canonicalize_function(&program(params, &shuffled)).unwrap()
        );
    }

    #[test]
    fn renaming_does_not_change_canonical_text(source in any_program()) {
        prop_assert_eq!(
            canonicalize_function(&source).unwrap(),
            canonicalize_function(&prefixed(&source, "zz_")).unwrap()
        );
    }

    #[test]
    fn unused_parameter_does_not_change_canonical_text(source in straight_line_program()) {
        let padded = source.replacen("):\n", ", unused):\n", 1);
        prop_assert_eq!(
            canonicalize_function(&source).unwrap(),
            canonicalize_function(&padded).unwrap()
        );
    }
}

// =============================================================================
// CONSTANT FOLDING
// =============================================================================

proptest! {
    #[test]
    fn integer_folding_matches_arithmetic(a in -1000i64..1000, b in -1000i64..1000) {
        prop_assert_eq!(fold_binary(BinaryOp::Add, &Constant::Int(a), &Constant::Int(b)), Some(Constant::Int(a + b)));
        prop_assert_eq!(fold_binary(BinaryOp::Sub, &Constant::Int(a), &Constant::Int(b)), Some(Constant::Int(a - b)));
        prop_assert_eq!(fold_binary(BinaryOp::Mul, &Constant::Int(a), &Constant::Int(b)), Some(Constant::Int(a * b)));
    }

    #[test]
    fn floor_division_rounds_down(a in -1000i64..1000, b in -50i64..50) {
        prop_assume!(b != 0);
        let quotient = (a as f64 / b as f64).floor() as i64;
        prop_assert_eq!(
            fold_binary(BinaryOp::FloorDiv, &Constant::Int(a), &Constant::Int(b)),
            Some(Constant::Int(quotient))
        );
        prop_assert_eq!(
            fold_binary(BinaryOp::Mod, &Constant::Int(a), &Constant::Int(b)),
            Some(Constant::Int(a - b * quotient))
        );
    }

    #[test]
    fn overflow_is_not_folded(a in (i64::MAX / 2 + 1)..i64::MAX) {
        prop_assert_eq!(fold_binary(BinaryOp::Add, &Constant::Int(a), &Constant::Int(a)), None);
    }
}

// =============================================================================
// PARSER ROBUSTNESS
// =============================================================================

proptest! {
    #[test]
    fn parser_never_panics(source in prop::string::string_regex(r"[\x20-\x7E\n]{0,200}").unwrap()) {
        let _ = parse_module(&source);
    }
}
