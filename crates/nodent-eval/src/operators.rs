//! Binary and unary operator semantics over runtime values.

use nodent_ast::{BinaryOperator, UnaryOperator};
use nodent_runtime::Value;

/// `left <op> right` with both operands already evaluated.
pub(crate) fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Value> {
    let value = match op {
        BinaryOperator::Add => {
            if concatenates(left) || concatenates(right) {
                let mut text = left.to_display_string();
                text.push_str(&right.to_display_string());
                Value::string(text)
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Equal => Value::Bool(left.loose_equals(right)),
        BinaryOperator::NotEqual => Value::Bool(!left.loose_equals(right)),
        BinaryOperator::StrictEqual => Value::Bool(left.strict_equals(right)),
        BinaryOperator::StrictNotEqual => Value::Bool(!left.strict_equals(right)),
        BinaryOperator::LessThan => compare(left, right, |o| o.is_lt()),
        BinaryOperator::LessThanEqual => compare(left, right, |o| o.is_le()),
        BinaryOperator::GreaterThan => compare(left, right, |o| o.is_gt()),
        BinaryOperator::GreaterThanEqual => compare(left, right, |o| o.is_ge()),
        BinaryOperator::BitwiseAnd => int32(to_int32(left) & to_int32(right)),
        BinaryOperator::BitwiseOr => int32(to_int32(left) | to_int32(right)),
        BinaryOperator::BitwiseXor => int32(to_int32(left) ^ to_int32(right)),
        BinaryOperator::LeftShift => int32(to_int32(left).wrapping_shl(shift_count(right))),
        BinaryOperator::RightShift => int32(to_int32(left).wrapping_shr(shift_count(right))),
        BinaryOperator::In => {
            if !matches!(right, Value::Object(_) | Value::Array(_)) {
                return Err(Value::type_error(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    left.to_display_string(),
                    right.to_display_string()
                )));
            }
            let key = left.to_display_string();
            Value::Bool(right.own_keys().contains(&key))
        }
        BinaryOperator::InstanceOf => instance_of(left, right)?,
    };
    Ok(value)
}

/// Every unary operator except `typeof`/`delete` on references, which need
/// the operand unevaluated.
pub(crate) fn unary(op: UnaryOperator, operand: &Value) -> Value {
    match op {
        UnaryOperator::Not => Value::Bool(!operand.is_truthy()),
        UnaryOperator::Minus => Value::Number(-operand.to_number()),
        UnaryOperator::Plus => Value::Number(operand.to_number()),
        UnaryOperator::BitwiseNot => int32(!to_int32(operand)),
        UnaryOperator::TypeOf => Value::string(operand.type_of()),
        UnaryOperator::Void => Value::Undefined,
        UnaryOperator::Delete => Value::Bool(true),
    }
}

fn concatenates(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Error(_)
    )
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Value::Bool(test(a.cmp(b)));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => Value::Bool(test(ordering)),
        // NaN on either side
        None => Value::Bool(false),
    }
}

fn int32(n: i32) -> Value {
    Value::Number(f64::from(n))
}

pub(crate) fn to_int32(value: &Value) -> i32 {
    let n = value.to_number();
    if !n.is_finite() {
        return 0;
    }
    const TWO_32: f64 = 4_294_967_296.0;
    let mut m = n.trunc() % TWO_32;
    if m < 0.0 {
        m += TWO_32;
    }
    (m as u32) as i32
}

fn shift_count(value: &Value) -> u32 {
    (to_int32(value) as u32) & 31
}

/// Only runtime errors have a prototype chain worth checking: an error is an
/// instance of its own kind's constructor and of `Error`.
fn instance_of(left: &Value, right: &Value) -> Result<Value, Value> {
    if !right.is_callable() {
        return Err(Value::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ));
    }
    let Value::Error(err) = left else {
        return Ok(Value::Bool(false));
    };
    let name = right.get_property("name")?.to_display_string();
    Ok(Value::Bool(name == "Error" || name == err.kind.name()))
}
