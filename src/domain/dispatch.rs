//! Operator dispatch keyed on operand types.
//!
//! A [`DispatchTable`] maps `(operator, left kind, right kind)` to a handler.
//! Tables are assembled with a [`DispatchTableBuilder`], which refuses to
//! replace an existing rule, and are immutable once built.

use std::collections::HashMap;

use super::errors::{DispatchError, EvalError, EvalResult};
use super::parser::BinaryOp;
use super::units::Quantity;
use super::value::{Value, ValueKind};

/// Signature shared by every binary operator implementation.
pub type Handler = fn(BinaryOp, &Value, &Value) -> EvalResult<Value>;

type RuleKey = (BinaryOp, ValueKind, ValueKind);

const ARITHMETIC: [BinaryOp; 6] = [
    BinaryOp::Add,
    BinaryOp::Subtract,
    BinaryOp::Multiply,
    BinaryOp::Divide,
    BinaryOp::Modulo,
    BinaryOp::Power,
];

const COMPARISONS: [BinaryOp; 6] = [
    BinaryOp::Equal,
    BinaryOp::NotEqual,
    BinaryOp::Less,
    BinaryOp::LessEqual,
    BinaryOp::Greater,
    BinaryOp::GreaterEqual,
];

/// Mutable staging area for a [`DispatchTable`].
#[derive(Debug, Default)]
pub struct DispatchTableBuilder {
    rules: HashMap<RuleKey, Handler>,
}

impl DispatchTableBuilder {
    /// An empty builder with no rules at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A builder holding the built-in number and unit rules.
    pub fn new() -> Self {
        let mut builder = Self::empty();
        builder.register_builtin_rules();
        builder
    }

    /// Adds a rule. Existing rules are never replaced.
    pub fn add_rule(
        &mut self,
        op: BinaryOp,
        left: ValueKind,
        right: ValueKind,
        handler: Handler,
    ) -> Result<&mut Self, DispatchError> {
        let key = (op, left, right);
        if self.rules.contains_key(&key) {
            return Err(DispatchError::Conflict {
                op: op.name(),
                left: left.name(),
                right: right.name(),
            });
        }
        self.rules.insert(key, handler);
        Ok(self)
    }

    pub fn has_rule(&self, op: BinaryOp, left: ValueKind, right: ValueKind) -> bool {
        self.rules.contains_key(&(op, left, right))
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable { rules: self.rules }
    }

    fn register_builtin_rules(&mut self) {
        use ValueKind as K;

        let mut builtin = |op, left, right, handler: Handler| {
            self.rules.insert((op, left, right), handler);
        };

        for op in ARITHMETIC {
            builtin(op, K::Number, K::Number, number_number);
        }
        for op in COMPARISONS {
            builtin(op, K::Number, K::Number, compare_numbers);
            builtin(op, K::Quantity, K::Quantity, compare_quantities);
            builtin(op, K::Date, K::Date, compare_dates);
        }

        builtin(BinaryOp::Add, K::Quantity, K::Quantity, add_quantities);
        builtin(BinaryOp::Subtract, K::Quantity, K::Quantity, add_quantities);
        builtin(BinaryOp::Multiply, K::Quantity, K::Quantity, multiply_quantities);
        builtin(BinaryOp::Divide, K::Quantity, K::Quantity, multiply_quantities);

        builtin(BinaryOp::Multiply, K::Quantity, K::Number, scale_quantity);
        builtin(BinaryOp::Divide, K::Quantity, K::Number, scale_quantity);
        builtin(BinaryOp::Multiply, K::Number, K::Quantity, scale_quantity);
        builtin(BinaryOp::Divide, K::Number, K::Quantity, invert_quantity);
        builtin(BinaryOp::Power, K::Quantity, K::Number, power_quantity);
    }
}

/// Immutable operator dispatch table.
#[derive(Debug)]
pub struct DispatchTable {
    rules: HashMap<RuleKey, Handler>,
}

impl DispatchTable {
    /// Applies `op` to the operands using the rule registered for their kinds.
    pub fn dispatch(&self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        match self.rules.get(&(op, left.kind(), right.kind())) {
            Some(handler) => handler(op, left, right),
            None => Err(no_rule(op, left, right)),
        }
    }

    pub fn has_rule(&self, op: BinaryOp, left: ValueKind, right: ValueKind) -> bool {
        self.rules.contains_key(&(op, left, right))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub(crate) fn no_rule(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::NoRule {
        op: op.name(),
        left: left.kind().name(),
        right: right.kind().name(),
    }
}

fn numbers(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(no_rule(op, left, right)),
    }
}

fn quantities<'v>(
    op: BinaryOp,
    left: &'v Value,
    right: &'v Value,
) -> EvalResult<(&'v Quantity, &'v Quantity)> {
    match (left, right) {
        (Value::Quantity(a), Value::Quantity(b)) => Ok((a, b)),
        _ => Err(no_rule(op, left, right)),
    }
}

fn truth(value: bool) -> Value {
    Value::Number(if value { 1.0 } else { 0.0 })
}

/// Equality with a relative tolerance, so `0.1 + 0.2 == 0.3` holds.
fn nearly_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    diff <= 1e-12 * a.abs().max(b.abs())
}

fn compare(op: BinaryOp, a: f64, b: f64) -> Value {
    let result = match op {
        BinaryOp::Equal => nearly_equal(a, b),
        BinaryOp::NotEqual => !nearly_equal(a, b),
        BinaryOp::Less => a < b && !nearly_equal(a, b),
        BinaryOp::LessEqual => a < b || nearly_equal(a, b),
        BinaryOp::Greater => a > b && !nearly_equal(a, b),
        BinaryOp::GreaterEqual => a > b || nearly_equal(a, b),
        _ => false,
    };
    truth(result)
}

fn number_number(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = numbers(op, left, right)?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::Modulo => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            // Floored modulo: the result takes the sign of the divisor.
            a - b * (a / b).floor()
        }
        BinaryOp::Power => a.powf(b),
        _ => return Err(no_rule(op, left, right)),
    };
    Ok(Value::number(result))
}

fn compare_numbers(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = numbers(op, left, right)?;
    Ok(compare(op, a, b))
}

fn compare_quantities(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = quantities(op, left, right)?;
    a.ensure_same_dimension(b)?;
    Ok(compare(op, a.base_value, b.base_value))
}

fn compare_dates(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Date(a), Value::Date(b)) => Ok(compare(
            op,
            a.timestamp_millis() as f64,
            b.timestamp_millis() as f64,
        )),
        _ => Err(no_rule(op, left, right)),
    }
}

fn add_quantities(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = quantities(op, left, right)?;
    a.ensure_same_dimension(b)?;
    let base = match op {
        BinaryOp::Subtract => a.base_value - b.base_value,
        _ => a.base_value + b.base_value,
    };
    Ok(Value::quantity(a.with_base_value(base)))
}

fn multiply_quantities(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = quantities(op, left, right)?;
    let (base, units) = match op {
        BinaryOp::Divide => {
            if b.base_value == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a.base_value / b.base_value, a.units.div(&b.units)?)
        }
        _ => (a.base_value * b.base_value, a.units.mul(&b.units)?),
    };

    let quantity = Quantity::from_base(base, units);
    if quantity.dimension.is_dimensionless() {
        Ok(Value::number(quantity.base_value))
    } else {
        Ok(Value::quantity(quantity))
    }
}

fn scale_quantity(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (quantity, factor) = match (left, right) {
        (Value::Quantity(q), Value::Number(n)) | (Value::Number(n), Value::Quantity(q)) => (q, *n),
        _ => return Err(no_rule(op, left, right)),
    };
    let base = match op {
        BinaryOp::Divide => {
            if factor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            quantity.base_value / factor
        }
        _ => quantity.base_value * factor,
    };
    Ok(Value::quantity(quantity.with_base_value(base)))
}

fn invert_quantity(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (Value::Number(n), Value::Quantity(q)) = (left, right) else {
        return Err(no_rule(op, left, right));
    };
    if q.base_value == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::quantity(Quantity::from_base(n / q.base_value, q.units.pow(-1)?)))
}

fn power_quantity(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (Value::Quantity(q), Value::Number(exponent)) = (left, right) else {
        return Err(no_rule(op, left, right));
    };
    if !exponent.is_finite() || exponent.fract() != 0.0 || exponent.abs() > 64.0 {
        return Err(EvalError::InvalidArgument(format!(
            "unit exponent must be a small integer, got {}",
            exponent
        )));
    }
    let power = *exponent as i32;
    if power == 0 {
        return Ok(Value::Number(1.0));
    }
    Ok(Value::quantity(Quantity::from_base(
        q.base_value.powi(power),
        q.units.pow(power)?,
    )))
}
