//! Extensions that add operator rules on top of the built-in table.

use chrono::{DateTime, Local, TimeDelta};

use super::dispatch::{DispatchTableBuilder, no_rule};
use super::errors::{DispatchError, EvalError, EvalResult};
use super::parser::BinaryOp;
use super::units::{Dimension, Quantity, TIME, Unit, UnitExpr};
use super::value::{Value, ValueKind};

/// A bundle of dispatch rules installed while an engine is being built.
pub trait Extension {
    fn name(&self) -> &'static str;

    fn install(&self, table: &mut DispatchTableBuilder) -> Result<(), DispatchError>;
}

/// Date ± duration and date − date arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateArithmetic;

impl Extension for DateArithmetic {
    fn name(&self) -> &'static str {
        "date-arithmetic"
    }

    fn install(&self, table: &mut DispatchTableBuilder) -> Result<(), DispatchError> {
        table
            .add_rule(BinaryOp::Add, ValueKind::Date, ValueKind::Quantity, add_duration)?
            .add_rule(BinaryOp::Add, ValueKind::Quantity, ValueKind::Date, add_duration)?
            .add_rule(BinaryOp::Subtract, ValueKind::Date, ValueKind::Quantity, subtract_duration)?
            .add_rule(BinaryOp::Subtract, ValueKind::Date, ValueKind::Date, subtract_dates)?;
        Ok(())
    }
}

fn duration_millis(quantity: &Quantity) -> EvalResult<f64> {
    if !quantity.dimension.is_time() {
        return Err(EvalError::UnitMismatch {
            left: "Date".to_string(),
            right: quantity.units.to_string(),
        });
    }
    Ok(quantity.base_value * 1000.0)
}

/// Moves `date` by a (possibly fractional) number of milliseconds.
fn shift(date: &DateTime<Local>, millis: f64) -> EvalResult<Value> {
    if !millis.is_finite() {
        return Err(EvalError::DateOutOfRange);
    }
    // Sub-millisecond parts are dropped, truncating toward zero.
    let delta = TimeDelta::try_milliseconds(millis.trunc() as i64).ok_or(EvalError::DateOutOfRange)?;
    date.checked_add_signed(delta)
        .map(Value::Date)
        .ok_or(EvalError::DateOutOfRange)
}

fn add_duration(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Date(date), Value::Quantity(duration)) | (Value::Quantity(duration), Value::Date(date)) => {
            shift(date, duration_millis(duration)?)
        }
        _ => Err(no_rule(op, left, right)),
    }
}

fn subtract_duration(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (Value::Date(date), Value::Quantity(duration)) = (left, right) else {
        return Err(no_rule(op, left, right));
    };
    shift(date, -duration_millis(duration)?)
}

fn subtract_dates(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (Value::Date(a), Value::Date(b)) = (left, right) else {
        return Err(no_rule(op, left, right));
    };
    let millis = a.signed_duration_since(*b).num_milliseconds() as f64;
    let seconds = Unit::new("s", Dimension::base(TIME), 1.0);
    Ok(Value::Quantity(Quantity::new(millis / 1000.0, UnitExpr::single(seconds))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::units::UnitTable;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn table() -> crate::domain::dispatch::DispatchTable {
        let mut builder = DispatchTableBuilder::new();
        DateArithmetic.install(&mut builder).unwrap();
        builder.build()
    }

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Value {
        Value::Date(Local.with_ymd_and_hms(y, m, d, h, min, s).earliest().unwrap())
    }

    fn quantity(value: f64, unit: &str) -> Value {
        let unit = UnitTable::new().lookup(unit).unwrap();
        Value::Quantity(Quantity::new(value, UnitExpr::single(unit)))
    }

    #[test]
    fn test_date_plus_duration() {
        let table = table();
        let start = date(2024, 1, 1, 12, 0, 0);

        let later = table.dispatch(BinaryOp::Add, &start, &quantity(90.0, "min")).unwrap();
        assert_eq!(later, date(2024, 1, 1, 13, 30, 0));

        let commuted = table.dispatch(BinaryOp::Add, &quantity(90.0, "min"), &start).unwrap();
        assert_eq!(commuted, later);
    }

    #[test]
    fn test_date_minus_duration() {
        let table = table();
        let start = date(2024, 3, 10, 0, 0, 0);
        let earlier = table.dispatch(BinaryOp::Subtract, &start, &quantity(1.0, "week")).unwrap();
        let expected = match &start {
            Value::Date(d) => Value::Date(*d - TimeDelta::try_milliseconds(604_800_000).unwrap()),
            _ => unreachable!(),
        };
        assert_eq!(earlier, expected);
    }

    #[test]
    fn test_date_difference_in_seconds() {
        let table = table();
        let a = date(2024, 1, 2, 0, 0, 0);
        let b = date(2024, 1, 1, 23, 0, 0);
        let diff = table.dispatch(BinaryOp::Subtract, &a, &b).unwrap();
        match diff {
            Value::Quantity(q) => {
                assert_eq!(q.value(), 3600.0);
                assert_eq!(q.units.to_string(), "s");
                assert!(q.dimension.is_time());
                assert_eq!(q.units.factor(), 1.0);
            }
            other => panic!("Expected quantity, got {:?}", other),
        }
    }

    #[test]
    fn test_non_duration_units_are_rejected() {
        let table = table();
        let start = date(2024, 1, 1, 0, 0, 0);
        let result = table.dispatch(BinaryOp::Add, &start, &quantity(3.0, "m"));
        assert!(matches!(result, Err(EvalError::UnitMismatch { .. })));
    }

    #[test]
    fn test_install_keeps_builtin_rules() {
        let table = table();
        let builtins = DispatchTableBuilder::new().build();
        assert_eq!(table.len(), builtins.len() + 4);
        assert!(table.has_rule(BinaryOp::Add, ValueKind::Number, ValueKind::Number));
        assert!(table.has_rule(BinaryOp::Subtract, ValueKind::Date, ValueKind::Date));
        assert!(!table.has_rule(BinaryOp::Subtract, ValueKind::Quantity, ValueKind::Date));
    }

    #[test]
    fn test_installing_twice_conflicts() {
        let mut builder = DispatchTableBuilder::new();
        DateArithmetic.install(&mut builder).unwrap();
        assert!(matches!(
            DateArithmetic.install(&mut builder),
            Err(DispatchError::Conflict { op: "add", left: "Date", right: "Unit" })
        ));
    }

    #[test]
    fn test_far_future_is_out_of_range() {
        let table = table();
        let start = date(2024, 1, 1, 0, 0, 0);
        let result = table.dispatch(BinaryOp::Add, &start, &quantity(1e12, "years"));
        assert_eq!(result, Err(EvalError::DateOutOfRange));
    }

    proptest! {
        #[test]
        fn prop_add_then_subtract_round_trips(
            start_ms in 0i64..4_102_444_800_000,
            minutes in -1_000_000i64..1_000_000,
        ) {
            let table = table();
            let start = Value::Date(Local.timestamp_millis_opt(start_ms).unwrap());
            let duration = quantity(minutes as f64, "min");

            let shifted = table.dispatch(BinaryOp::Add, &start, &duration).unwrap();
            let back = table.dispatch(BinaryOp::Subtract, &shifted, &duration).unwrap();
            prop_assert_eq!(back, start);
        }

        #[test]
        fn prop_difference_matches_milliseconds(
            a_ms in 0i64..4_102_444_800_000,
            b_ms in 0i64..4_102_444_800_000,
        ) {
            let table = table();
            let a = Value::Date(Local.timestamp_millis_opt(a_ms).unwrap());
            let b = Value::Date(Local.timestamp_millis_opt(b_ms).unwrap());
            let diff = table.dispatch(BinaryOp::Subtract, &a, &b).unwrap();
            let Value::Quantity(q) = diff else {
                panic!("Expected quantity");
            };
            prop_assert_eq!(q.value(), (a_ms - b_ms) as f64 / 1000.0);
        }
    }
}
