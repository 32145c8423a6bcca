//! Constant folding and algebraic simplification
//!
//! Folding follows Python arithmetic exactly: integer results that would
//! overflow `i64`, division by zero, and operations whose float result
//! could differ from the host are left unfolded.

use crate::parser::{BinaryOp, BoolOp, CmpOp, Constant, Expr, FunctionDef, UnaryOp};
use crate::utils::contains_call;
use crate::visit::{walk_expr_mut, VisitorMut};

/// Largest magnitude an integer may have to convert to `f64` exactly
const EXACT_FLOAT_INT: i64 = 1 << 53;

/// Longest string a repetition may fold to
const MAX_FOLDED_STR: usize = 4096;

/// Simplifies every expression of the procedure
pub fn simplify(function: &mut FunctionDef) {
    let mut simplifier = Simplifier;
    for stmt in &mut function.body {
        simplifier.visit_stmt_mut(stmt);
    }
}

/// Simplifies a single expression
pub fn simplify_expr(expr: &mut Expr) {
    Simplifier.visit_expr_mut(expr);
}

struct Simplifier;

impl VisitorMut for Simplifier {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
        if let Some(simpler) = simplify_node(expr) {
            *expr = simpler;
        }
    }

    // Targets are stores, not values
    fn visit_target_mut(&mut self, target: &mut Expr) {
        match target {
            Expr::Attribute { value, .. } => self.visit_expr_mut(value),
            Expr::Tuple(elts) => {
                for elt in elts {
                    self.visit_target_mut(elt);
                }
            }
            _ => {}
        }
    }
}

fn simplify_node(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::BinOp { left, op, right } => simplify_binop(left, *op, right),
        Expr::UnaryOp { op, operand } => {
            let value = operand.as_constant()?;
            fold_unary(*op, value).map(Expr::Constant)
        }
        Expr::Compare {
            left,
            ops,
            comparators,
        } => fold_compare(left, ops, comparators).map(Expr::bool),
        Expr::BoolOp { op, values } => simplify_boolop(*op, values),
        Expr::IfExp { test, body, orelse } => {
            if let Some(test) = test.as_constant() {
                return Some(if truthy(test) {
                    body.as_ref().clone()
                } else {
                    orelse.as_ref().clone()
                });
            }
            if body == orelse && !contains_call(test) {
                return Some(body.as_ref().clone());
            }
            None
        }
        Expr::Subscript { value, index } => match (value.as_ref(), index.as_ref()) {
            (Expr::Tuple(elts), Expr::Constant(Constant::Int(k))) => {
                let i = super::expand::tuple_index(elts.len(), *k)?;
                let others_pure = elts
                    .iter()
                    .enumerate()
                    .all(|(j, e)| j == i || !contains_call(e));
                others_pure.then(|| elts[i].clone())
            }
            _ => None,
        },
        _ => None,
    }
}

fn simplify_binop(left: &Expr, op: BinaryOp, right: &Expr) -> Option<Expr> {
    if let (Some(a), Some(b)) = (left.as_constant(), right.as_constant()) {
        return fold_binary(op, a, b).map(Expr::Constant);
    }

    let is_int = |e: &Expr, n: i64| matches!(e, Expr::Constant(Constant::Int(v)) if *v == n);
    match op {
        BinaryOp::Add if is_int(right, 0) => Some(left.clone()),
        BinaryOp::Add if is_int(left, 0) => Some(right.clone()),
        BinaryOp::Sub if is_int(right, 0) => Some(left.clone()),
        BinaryOp::Mul if is_int(right, 1) => Some(left.clone()),
        BinaryOp::Mul if is_int(left, 1) => Some(right.clone()),
        BinaryOp::Mul if is_int(right, 0) && !contains_call(left) => Some(Expr::int(0)),
        BinaryOp::Mul if is_int(left, 0) && !contains_call(right) => Some(Expr::int(0)),
        _ => None,
    }
}

/// Python truthiness of a constant
pub fn truthy(value: &Constant) -> bool {
    match value {
        Constant::Int(n) => *n != 0,
        Constant::Float(x) => *x != 0.0,
        Constant::Str(s) => !s.is_empty(),
        Constant::Bool(b) => *b,
        Constant::None => false,
    }
}

fn exact_float(n: i64) -> Option<f64> {
    (-EXACT_FLOAT_INT..=EXACT_FLOAT_INT)
        .contains(&n)
        .then_some(n as f64)
}

/// Numeric operand as a float, for mixed arithmetic
fn as_float(value: &Constant) -> Option<f64> {
    match value {
        Constant::Int(n) => exact_float(*n),
        Constant::Float(x) => Some(*x),
        _ => None,
    }
}

fn finite(x: f64) -> Option<Constant> {
    x.is_finite().then_some(Constant::Float(x))
}

/// Folds `a op b`; `None` when Python would raise, overflow `i64`, or
/// the operands are not both numbers of a foldable kind
pub fn fold_binary(op: BinaryOp, a: &Constant, b: &Constant) -> Option<Constant> {
    match (a, b) {
        (Constant::Int(x), Constant::Int(y)) => fold_int(op, *x, *y),
        (Constant::Float(_), Constant::Int(_) | Constant::Float(_))
        | (Constant::Int(_), Constant::Float(_)) => fold_float(op, as_float(a)?, as_float(b)?),
        (Constant::Str(x), Constant::Str(y)) if op == BinaryOp::Add => {
            Some(Constant::Str(format!("{}{}", x, y)))
        }
        (Constant::Str(s), Constant::Int(n)) | (Constant::Int(n), Constant::Str(s))
            if op == BinaryOp::Mul =>
        {
            repeat(s, *n)
        }
        _ => None,
    }
}

fn repeat(s: &str, n: i64) -> Option<Constant> {
    if n <= 0 {
        return Some(Constant::Str(String::new()));
    }
    let n = usize::try_from(n).ok()?;
    if s.len().checked_mul(n)? > MAX_FOLDED_STR {
        return None;
    }
    Some(Constant::Str(s.repeat(n)))
}

fn fold_int(op: BinaryOp, x: i64, y: i64) -> Option<Constant> {
    let value = match op {
        BinaryOp::Add => x.checked_add(y)?,
        BinaryOp::Sub => x.checked_sub(y)?,
        BinaryOp::Mul => x.checked_mul(y)?,
        BinaryOp::FloorDiv => floor_div(x, y)?,
        BinaryOp::Mod => floor_mod(x, y)?,
        BinaryOp::Div => {
            if y == 0 {
                return None;
            }
            return finite(exact_float(x)? / exact_float(y)?);
        }
        BinaryOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return None;
                }
                return finite(exact_float(x)?.powf(exact_float(y)?));
            }
            x.checked_pow(u32::try_from(y).ok()?)?
        }
        BinaryOp::LShift => {
            if y < 0 {
                return None;
            }
            if x == 0 {
                0
            } else if y >= 63 {
                return None;
            } else {
                let shifted = x << y;
                if shifted >> y != x {
                    return None;
                }
                shifted
            }
        }
        BinaryOp::RShift => {
            if y < 0 {
                return None;
            }
            if y >= 64 {
                if x < 0 {
                    -1
                } else {
                    0
                }
            } else {
                x >> y
            }
        }
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        BinaryOp::BitXor => x ^ y,
        BinaryOp::MatMul => return None,
    };
    Some(Constant::Int(value))
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    if y == 0 {
        return None;
    }
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(x: i64, y: i64) -> Option<i64> {
    if y == 0 {
        return None;
    }
    let m = x.checked_rem(y)?;
    if m != 0 && ((m < 0) != (y < 0)) {
        Some(m + y)
    } else {
        Some(m)
    }
}

/// Python's `float_divmod`
fn float_divmod(x: f64, y: f64) -> Option<(f64, f64)> {
    if y == 0.0 {
        return None;
    }
    let mut rem = x % y;
    let mut div = (x - rem) / y;
    if rem != 0.0 {
        if (y < 0.0) != (rem < 0.0) {
            rem += y;
            div -= 1.0;
        }
    } else {
        rem = 0.0_f64.copysign(y);
    }
    let floordiv = if div != 0.0 {
        let mut floordiv = div.floor();
        if div - floordiv > 0.5 {
            floordiv += 1.0;
        }
        floordiv
    } else {
        0.0_f64.copysign(x / y)
    };
    Some((floordiv, rem))
}

fn fold_float(op: BinaryOp, x: f64, y: f64) -> Option<Constant> {
    match op {
        BinaryOp::Add => finite(x + y),
        BinaryOp::Sub => finite(x - y),
        BinaryOp::Mul => finite(x * y),
        BinaryOp::Div if y != 0.0 => finite(x / y),
        BinaryOp::FloorDiv => finite(float_divmod(x, y)?.0),
        BinaryOp::Mod => finite(float_divmod(x, y)?.1),
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return None;
            }
            if x < 0.0 && y.fract() != 0.0 {
                return None;
            }
            finite(x.powf(y))
        }
        _ => None,
    }
}

/// Folds a unary operator; arithmetic on booleans is left alone
pub fn fold_unary(op: UnaryOp, value: &Constant) -> Option<Constant> {
    match (op, value) {
        (UnaryOp::Not, value) => Some(Constant::Bool(!truthy(value))),
        (UnaryOp::Neg, Constant::Int(n)) => n.checked_neg().map(Constant::Int),
        (UnaryOp::Neg, Constant::Float(x)) => Some(Constant::Float(-x)),
        (UnaryOp::Pos, Constant::Int(_) | Constant::Float(_)) => Some(value.clone()),
        (UnaryOp::Invert, Constant::Int(n)) => Some(Constant::Int(!n)),
        _ => None,
    }
}

fn fold_compare(left: &Expr, ops: &[CmpOp], comparators: &[Expr]) -> Option<bool> {
    let mut previous = left.as_constant()?;
    let mut result = true;
    for (op, next) in ops.iter().zip(comparators) {
        let next = next.as_constant()?;
        result &= compare(*op, previous, next)?;
        previous = next;
    }
    Some(result)
}

/// Compares two constants the way Python would, when the answer is certain
pub fn compare(op: CmpOp, a: &Constant, b: &Constant) -> Option<bool> {
    use std::cmp::Ordering;

    let ordering = |ordering: Ordering| -> Option<bool> {
        Some(match op {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::NotEq => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::LtEq => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::GtEq => ordering != Ordering::Less,
            _ => return None,
        })
    };

    match (op, a, b) {
        (CmpOp::Is | CmpOp::IsNot, Constant::None, Constant::None) => Some(op == CmpOp::Is),
        (CmpOp::Is | CmpOp::IsNot, Constant::Bool(x), Constant::Bool(y)) => {
            Some((x == y) == (op == CmpOp::Is))
        }
        (CmpOp::Is | CmpOp::IsNot, _, _) => None,
        (CmpOp::In | CmpOp::NotIn, Constant::Str(needle), Constant::Str(haystack)) => {
            Some(haystack.contains(needle.as_str()) == (op == CmpOp::In))
        }
        (CmpOp::In | CmpOp::NotIn, _, _) => None,
        (_, Constant::Int(x), Constant::Int(y)) => ordering(x.cmp(y)),
        (_, Constant::Int(_) | Constant::Float(_), Constant::Int(_) | Constant::Float(_)) => {
            ordering(as_float(a)?.partial_cmp(&as_float(b)?)?)
        }
        (_, Constant::Str(x), Constant::Str(y)) => ordering(x.cmp(y)),
        (CmpOp::Eq | CmpOp::NotEq, Constant::Bool(x), Constant::Bool(y)) => {
            Some((x == y) == (op == CmpOp::Eq))
        }
        (CmpOp::Eq | CmpOp::NotEq, Constant::None, Constant::None) => Some(op == CmpOp::Eq),
        _ => None,
    }
}

/// True for expressions that always evaluate to a `bool`
fn bool_valued(expr: &Expr) -> bool {
    match expr {
        Expr::Compare { .. } => true,
        Expr::UnaryOp {
            op: UnaryOp::Not, ..
        } => true,
        Expr::Constant(Constant::Bool(_)) => true,
        Expr::BoolOp { values, .. } => values.iter().all(bool_valued),
        _ => false,
    }
}

fn simplify_boolop(op: BoolOp, values: &[Expr]) -> Option<Expr> {
    // `and` stops at the first falsy value, `or` at the first truthy one
    let stops = |c: &Constant| match op {
        BoolOp::And => !truthy(c),
        BoolOp::Or => truthy(c),
    };

    let mut kept: Vec<Expr> = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let last = i + 1 == values.len();
        match value.as_constant() {
            Some(c) if stops(c) => {
                kept.push(value.clone());
                break;
            }
            Some(_) if !last => {}
            _ => kept.push(value.clone()),
        }
    }

    let neutral = matches!(
        (op, kept.last()),
        (BoolOp::And, Some(Expr::Constant(Constant::Bool(true))))
            | (BoolOp::Or, Some(Expr::Constant(Constant::Bool(false))))
    );
    if neutral && kept.len() > 1 && kept[..kept.len() - 1].iter().all(bool_valued) {
        kept.pop();
    }

    if kept.len() == values.len() {
        return None;
    }
    match kept.len() {
        1 => kept.pop(),
        _ => Some(Expr::BoolOp { op, values: kept }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn simplified(expr: &str) -> String {
        let source = format!("def f(x, y):\n    return {}\n", expr);
        let mut f = parse_function(&source).unwrap();
        simplify(&mut f);
        match &f.body[0] {
            crate::parser::Stmt::Return(Some(value)) => value.to_string(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_python_integer_arithmetic() {
        assert_eq!(simplified("7 // -2"), "-4");
        assert_eq!(simplified("-7 % 3"), "2");
        assert_eq!(simplified("7 % -3"), "-2");
        assert_eq!(simplified("7 / 2"), "3.5");
        assert_eq!(simplified("4 / 2"), "2.0");
        assert_eq!(simplified("2 ** -1"), "0.5");
        assert_eq!(simplified("2 ** 10"), "1024");
        assert_eq!(simplified("1 << 4"), "16");
        assert_eq!(simplified("-9 >> 1"), "-5");
    }

    #[test]
    fn test_unfoldable_arithmetic_is_kept() {
        assert_eq!(simplified("1 // 0"), "1 // 0");
        assert_eq!(simplified("1 % 0"), "1 % 0");
        assert_eq!(simplified("0 ** -1"), "0 ** -1");
        assert_eq!(simplified("9223372036854775807 + 1"), "9223372036854775807 + 1");
        assert_eq!(simplified("True + 1"), "True + 1");
    }

    #[test]
    fn test_float_divmod() {
        assert_eq!(simplified("7.5 // 2"), "3.0");
        assert_eq!(simplified("-7.5 % 2"), "0.5");
        assert_eq!(simplified("1.5 * 2"), "3.0");
    }

    #[test]
    fn test_strings() {
        assert_eq!(simplified("'ab' + 'c'"), "'abc'");
        assert_eq!(simplified("'ab' * 2"), "'abab'");
        assert_eq!(simplified("'b' in 'abc'"), "True");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(simplified("0 == 0"), "True");
        assert_eq!(simplified("1 < 2 < 2"), "False");
        assert_eq!(simplified("1 == 1.0"), "True");
        assert_eq!(simplified("None is None"), "True");
        assert_eq!(simplified("x == 1"), "x == 1");
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(simplified("True and x"), "x");
        assert_eq!(simplified("False and x"), "False");
        assert_eq!(simplified("True or x"), "True");
        assert_eq!(simplified("False or x"), "x");
        assert_eq!(simplified("x and False and y"), "x and False");
        assert_eq!(simplified("x == 1 and True"), "x == 1");
        assert_eq!(simplified("x and True"), "x and True");
        assert_eq!(simplified("not True"), "False");
        assert_eq!(simplified("not 0"), "True");
    }

    #[test]
    fn test_identities() {
        assert_eq!(simplified("x + 0"), "x");
        assert_eq!(simplified("0 + x"), "x");
        assert_eq!(simplified("x - 0"), "x");
        assert_eq!(simplified("x * 1"), "x");
        assert_eq!(simplified("x * 0"), "0");
        assert_eq!(simplified("g(x) * 0"), "g(x) * 0");
        assert_eq!(simplified("x + 0.0"), "x + 0.0");
    }

    #[test]
    fn test_if_expressions() {
        assert_eq!(simplified("x if 0 == 0 else y"), "x");
        assert_eq!(simplified("x if 0 else y"), "y");
        assert_eq!(simplified("x if y else x"), "x");
        assert_eq!(simplified("x if g(y) else x"), "x if g(y) else x");
    }

    #[test]
    fn test_tuple_subscript() {
        assert_eq!(simplified("(x, y)[1]"), "y");
        assert_eq!(simplified("(x, y)[-2]"), "x");
        assert_eq!(simplified("(g(x), y)[1]"), "(g(x), y)[1]");
    }

    #[test]
    fn test_nested_folding() {
        assert_eq!(simplified("(1 + 2) * x + 0"), "3 * x");
        assert_eq!(simplified("-(2 + 3)"), "-5");
    }
}
