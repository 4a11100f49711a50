//! Expression evaluation.
//!
//! Binary operands are always both evaluated; only the conditional operator
//! skips work, by evaluating just the taken branch.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, Result};
use crate::value::Value;

/// Variable lookup used during evaluation.
pub trait Context {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Context for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Context for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Evaluate `expr` against `context`.
///
/// Fails with [`ExprError::UnboundIdentifier`] when the context lacks a name
/// and with [`ExprError::UnsupportedOperator`] for operators that have no
/// read-mode meaning (`%`, `^`, `&&`, `||`, `=`).
pub fn evaluate<C: Context + ?Sized>(expr: &Expr, context: &C) -> Result<Value> {
    match expr {
        Expr::Identifier(name) => context
            .lookup(name)
            .cloned()
            .ok_or_else(|| ExprError::UnboundIdentifier(name.clone())),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, context)?.is_truthy() {
                evaluate(consequent, context)
            } else {
                evaluate(alternate, context)
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            apply_binary(*op, &left, &right)
        }
        Expr::Unary { op, operand } => {
            let operand = evaluate(operand, context)?;
            Ok(apply_unary(*op, &operand))
        }
    }
}

/// Apply a binary operator to two already-evaluated operands.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let value = match op {
        BinaryOp::BitTest => {
            let mask = 1i32.wrapping_shl(right.to_u32() & 31);
            Value::Number((left.to_i32() & mask) as f64)
        }
        BinaryOp::Add => match (left, right) {
            (Value::Text(_), _) | (_, Value::Text(_)) => Value::Text(format!("{}{}", left, right)),
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::BitOr => Value::Number((left.to_i32() | right.to_i32()) as f64),
        BinaryOp::BitAnd => Value::Number((left.to_i32() & right.to_i32()) as f64),
        BinaryOp::Shl => Value::Number(left.to_i32().wrapping_shl(right.to_u32() & 31) as f64),
        BinaryOp::Shr => Value::Number(left.to_i32().wrapping_shr(right.to_u32() & 31) as f64),
        BinaryOp::UShr => Value::Number(left.to_u32().wrapping_shr(right.to_u32() & 31) as f64),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNe => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
        BinaryOp::Le => Value::Bool(compare(left, right, |o| o.is_le())),
        BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
        BinaryOp::Ge => Value::Bool(compare(left, right, |o| o.is_ge())),
        BinaryOp::Assign
        | BinaryOp::Rem
        | BinaryOp::BitXor
        | BinaryOp::LogicalAnd
        | BinaryOp::LogicalOr => {
            return Err(ExprError::UnsupportedOperator(op.as_str().to_string()))
        }
    };
    Ok(value)
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Value {
    match op {
        UnaryOp::Neg => Value::Number(-operand.to_number()),
        UnaryOp::Plus => Value::Number(operand.to_number()),
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::BitNot => Value::Number(!operand.to_i32() as f64),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => a == b,
        _ => left.to_number() == right.to_number(),
    }
}

/// NaN operands compare false for every relation.
fn compare(left: &Value, right: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    let ordering = match (left, right) {
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    ordering.map(accept).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn ctx(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval(source: &str, context: &HashMap<String, Value>) -> Result<Value> {
        evaluate(&parse(source).unwrap(), context)
    }

    #[test]
    fn test_bit_test() {
        let on = ctx(&[("W0", Value::Number(8.0))]);
        let off = ctx(&[("W0", Value::Number(0.0))]);
        assert!(eval("W0 # 3", &on).unwrap().is_truthy());
        assert_eq!(eval("W0 # 3", &on).unwrap(), Value::Number(8.0));
        assert_eq!(eval("W0 # 3", &off).unwrap(), Value::Number(0.0));
        assert_eq!(eval("W0 # 2", &on).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_arithmetic_and_bitwise() {
        let c = ctx(&[("W0", Value::Number(0x1234 as f64)), ("W1", Value::Number(3.0))]);
        assert_eq!(eval("W0 & 0xFF", &c).unwrap(), Value::Number(0x34 as f64));
        assert_eq!(eval("W0 >> 8", &c).unwrap(), Value::Number(0x12 as f64));
        assert_eq!(eval("W1 << 4 | 1", &c).unwrap(), Value::Number(49.0));
        assert_eq!(eval("W0 / 2 - W1 * 2", &c).unwrap(), Value::Number(2324.0));
        assert_eq!(eval("-1 >>> 28", &c).unwrap(), Value::Number(15.0));
        assert_eq!(eval("-16 >> 2", &c).unwrap(), Value::Number(-4.0));
        assert_eq!(eval("7.9 | 0", &c).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_comparisons() {
        let c = ctx(&[("current", Value::Text("on".to_string()))]);
        assert_eq!(eval("current == 'on'", &c).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == true", &c).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 === true", &c).unwrap(), Value::Bool(false));
        assert_eq!(eval("'2' == 2", &c).unwrap(), Value::Bool(true));
        assert_eq!(eval("'2' !== 2", &c).unwrap(), Value::Bool(true));
        assert_eq!(eval("3 >= 3", &c).unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' < 'abd'", &c).unwrap(), Value::Bool(true));
        assert_eq!(eval("current < 1", &c).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_unary() {
        let c = ctx(&[("W0", Value::Number(5.0))]);
        assert_eq!(eval("-W0", &c).unwrap(), Value::Number(-5.0));
        assert_eq!(eval("!W0", &c).unwrap(), Value::Bool(false));
        assert_eq!(eval("~W0", &c).unwrap(), Value::Number(-6.0));
        assert_eq!(eval("+true", &c).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_conditional_short_circuits() {
        // The untaken branch references an unbound word and must not be evaluated.
        let c = ctx(&[("W0", Value::Number(4.0))]);
        assert_eq!(eval("W0 # 2 ? 'open' : W9", &c).unwrap(), Value::Text("open".to_string()));
        assert_eq!(
            eval("W0 # 1 ? W9 : 'closed'", &c).unwrap(),
            Value::Text("closed".to_string())
        );
    }

    #[test]
    fn test_binary_evaluates_both_sides() {
        let c = ctx(&[("W0", Value::Number(0.0))]);
        assert_eq!(
            eval("W0 & W9", &c),
            Err(ExprError::UnboundIdentifier("W9".to_string()))
        );
    }

    #[test]
    fn test_unbound_identifier_is_an_error() {
        let c = HashMap::new();
        assert_eq!(
            eval("W0 + 1", &c),
            Err(ExprError::UnboundIdentifier("W0".to_string()))
        );
    }

    #[test]
    fn test_unsupported_operators() {
        let c = ctx(&[("W0", Value::Number(1.0))]);
        for (source, op) in [("W0 % 2", "%"), ("W0 ^ 1", "^"), ("W0 && 1", "&&"), ("W0 = 1", "=")] {
            assert_eq!(
                eval(source, &c),
                Err(ExprError::UnsupportedOperator(op.to_string()))
            );
        }
    }

    #[test]
    fn test_text_concatenation() {
        let c = ctx(&[("W0", Value::Number(3.0))]);
        assert_eq!(eval("'W' + W0", &c).unwrap(), Value::Text("W3".to_string()));
    }
}
