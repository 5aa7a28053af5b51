use std::collections::HashMap;

use super::errors::{EvalError, EvalResult};
use super::units::{ANGLE, Dimension, Quantity};
use super::value::Value;

/// Function signature for built-in functions.
pub type FunctionImpl = fn(&[Value]) -> EvalResult<Value>;

/// Registry of built-in functions, addressed by their lower-case names.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionImpl>,
}

impl FunctionRegistry {
    /// Creates a new function registry with built-in functions.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_builtin_functions();
        registry
    }

    /// Registers a new function in the registry.
    pub fn register_function(&mut self, name: &'static str, func: FunctionImpl) {
        self.functions.insert(name, func);
    }

    /// Gets a function by name.
    pub fn get_function(&self, name: &str) -> Option<&FunctionImpl> {
        self.functions.get(name)
    }

    /// Returns the registered spelling of `name`, which outlives the registry.
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        self.functions.get_key_value(name).map(|(key, _)| *key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Calls the function registered under `name`.
    pub fn call(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        let func = self
            .get_function(name)
            .ok_or_else(|| EvalError::NotCallable(name.to_string()))?;
        func(args)
    }

    fn register_builtin_functions(&mut self) {
        self.register_function("sqrt", |args| numeric("sqrt", args, f64::sqrt));
        self.register_function("cbrt", |args| numeric("cbrt", args, f64::cbrt));
        self.register_function("exp", |args| numeric("exp", args, f64::exp));
        self.register_function("log10", |args| numeric("log10", args, f64::log10));
        self.register_function("log2", |args| numeric("log2", args, f64::log2));
        self.register_function("asin", |args| numeric("asin", args, f64::asin));
        self.register_function("acos", |args| numeric("acos", args, f64::acos));
        self.register_function("atan", |args| numeric("atan", args, f64::atan));

        self.register_function("sin", |args| angle("sin", args, f64::sin));
        self.register_function("cos", |args| angle("cos", args, f64::cos));
        self.register_function("tan", |args| angle("tan", args, f64::tan));

        self.register_function("abs", |args| magnitude("abs", args, f64::abs));
        self.register_function("floor", |args| magnitude("floor", args, f64::floor));
        self.register_function("ceil", |args| magnitude("ceil", args, f64::ceil));

        self.register_function("round", |args| {
            expect_arity("round", args, 1, 2)?;
            let digits = match args.get(1) {
                Some(value) => {
                    let digits = number("round", value)?;
                    if digits.fract() != 0.0 || !(0.0..=15.0).contains(&digits) {
                        return Err(EvalError::InvalidArgument(format!(
                            "round digits must be an integer between 0 and 15, got {}",
                            digits
                        )));
                    }
                    digits as i32
                }
                None => 0,
            };
            let scale = 10f64.powi(digits);
            map_magnitude("round", &args[0], |x| (x * scale).round() / scale)
        });

        self.register_function("log", |args| {
            expect_arity("log", args, 1, 2)?;
            let x = number("log", &args[0])?;
            match args.get(1) {
                Some(base) => Ok(Value::number(x.ln() / number("log", base)?.ln())),
                None => Ok(Value::number(x.ln())),
            }
        });

        self.register_function("pow", |args| {
            expect_arity("pow", args, 2, 2)?;
            let base = number("pow", &args[0])?;
            let exponent = number("pow", &args[1])?;
            Ok(Value::number(base.powf(exponent)))
        });

        self.register_function("min", |args| {
            fold("min", args, |acc, x| if x < acc { x } else { acc })
        });
        self.register_function("max", |args| {
            fold("max", args, |acc, x| if x > acc { x } else { acc })
        });
        self.register_function("sum", |args| fold("sum", args, |acc, x| acc + x));

        self.register_function("mean", |args| {
            let total = fold("mean", args, |acc, x| acc + x)?;
            let count = args.len() as f64;
            match total {
                Value::Number(n) => Ok(Value::number(n / count)),
                Value::Quantity(q) => Ok(Value::quantity(q.with_base_value(q.base_value / count))),
                other => Ok(other),
            }
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> EvalResult<f64> {
    value.as_number().ok_or_else(|| {
        EvalError::InvalidArgument(format!("{} expects a number, got {}", name, value.kind().name()))
    })
}

fn numeric(name: &str, args: &[Value], f: fn(f64) -> f64) -> EvalResult<Value> {
    expect_arity(name, args, 1, 1)?;
    Ok(Value::number(f(number(name, &args[0])?)))
}

/// Trigonometric input: a plain number of radians or an angle quantity.
fn angle(name: &str, args: &[Value], f: fn(f64) -> f64) -> EvalResult<Value> {
    expect_arity(name, args, 1, 1)?;
    let radians = match &args[0] {
        Value::Number(n) => *n,
        Value::Quantity(q) if q.dimension == Dimension::base(ANGLE) => q.base_value,
        other => {
            return Err(EvalError::InvalidArgument(format!(
                "{} expects a number or an angle, got {}",
                name,
                other.kind().name()
            )));
        }
    };
    Ok(Value::number(f(radians)))
}

fn magnitude(name: &str, args: &[Value], f: fn(f64) -> f64) -> EvalResult<Value> {
    expect_arity(name, args, 1, 1)?;
    map_magnitude(name, &args[0], f)
}

/// Applies `f` to a number, or to a quantity's value in its own units.
fn map_magnitude(name: &str, value: &Value, f: impl Fn(f64) -> f64) -> EvalResult<Value> {
    match value {
        Value::Number(n) => Ok(Value::number(f(*n))),
        Value::Quantity(q) => Ok(Value::quantity(Quantity::new(f(q.value()), q.units.clone()))),
        other => Err(EvalError::InvalidArgument(format!(
            "{} expects a number or a quantity, got {}",
            name,
            other.kind().name()
        ))),
    }
}

/// Folds numbers, or quantities of one dimension in base units. The result
/// of a quantity fold is shown in the first argument's units.
fn fold(name: &str, args: &[Value], op: fn(f64, f64) -> f64) -> EvalResult<Value> {
    let Some((first, rest)) = args.split_first() else {
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        });
    };

    match first {
        Value::Number(start) => {
            let mut acc = *start;
            for value in rest {
                acc = op(acc, number(name, value)?);
            }
            Ok(Value::number(acc))
        }
        Value::Quantity(start) => {
            let mut acc = start.base_value;
            for value in rest {
                let Value::Quantity(q) = value else {
                    return Err(EvalError::InvalidArgument(format!(
                        "{} cannot mix quantities with {}",
                        name,
                        value.kind().name()
                    )));
                };
                start.ensure_same_dimension(q)?;
                acc = op(acc, q.base_value);
            }
            Ok(Value::quantity(start.with_base_value(acc)))
        }
        other => Err(EvalError::InvalidArgument(format!(
            "{} expects numbers or quantities, got {}",
            name,
            other.kind().name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::units::{UnitExpr, UnitTable};

    fn quantity(value: f64, unit: &str) -> Value {
        let unit = UnitTable::new().lookup(unit).unwrap();
        Value::Quantity(Quantity::new(value, UnitExpr::single(unit)))
    }

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn test_basic_functions() {
        let registry = FunctionRegistry::new();

        assert_eq!(registry.call("sqrt", &[n(16.0)]).unwrap(), n(4.0));
        assert_eq!(registry.call("abs", &[n(-2.5)]).unwrap(), n(2.5));
        assert_eq!(registry.call("pow", &[n(2.0), n(10.0)]).unwrap(), n(1024.0));
        let log = registry.call("log", &[n(8.0), n(2.0)]).unwrap().as_number().unwrap();
        assert!((log - 3.0).abs() < 1e-12);
        assert_eq!(registry.call("round", &[n(3.14159), n(2.0)]).unwrap(), n(3.14));
    }

    #[test]
    fn test_aggregates() {
        let registry = FunctionRegistry::new();
        let args = [n(3.0), n(1.0), n(2.0)];

        assert_eq!(registry.call("sum", &args).unwrap(), n(6.0));
        assert_eq!(registry.call("mean", &args).unwrap(), n(2.0));
        assert_eq!(registry.call("min", &args).unwrap(), n(1.0));
        assert_eq!(registry.call("max", &args).unwrap(), n(3.0));
        assert!(matches!(registry.call("max", &[]), Err(EvalError::Arity { .. })));
    }

    #[test]
    fn test_quantity_aggregates_use_first_unit() {
        let registry = FunctionRegistry::new();
        let total = registry
            .call("sum", &[quantity(1.0, "km"), quantity(500.0, "m")])
            .unwrap();
        match total {
            Value::Quantity(q) => {
                assert!((q.value() - 1.5).abs() < 1e-12);
                assert_eq!(q.units.to_string(), "km");
            }
            other => panic!("Expected quantity, got {:?}", other),
        }

        let mismatch = registry.call("max", &[quantity(1.0, "km"), quantity(1.0, "s")]);
        assert!(matches!(mismatch, Err(EvalError::UnitMismatch { .. })));
    }

    #[test]
    fn test_trig_accepts_angles() {
        let registry = FunctionRegistry::new();
        let Value::Number(sine) = registry.call("sin", &[quantity(90.0, "deg")]).unwrap() else {
            panic!("Expected number");
        };
        assert!((sine - 1.0).abs() < 1e-12);
        assert!(registry.call("cos", &[quantity(1.0, "m")]).is_err());
    }

    #[test]
    fn test_arity_errors() {
        let registry = FunctionRegistry::new();
        let err = registry.call("sqrt", &[n(1.0), n(2.0)]).unwrap_err();
        assert_eq!(err.to_string(), "sqrt expects 1 argument(s), got 2");
        assert!(matches!(registry.call("nope", &[]), Err(EvalError::NotCallable(_))));
    }

    #[test]
    fn test_nan_results_become_errors() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry.call("sqrt", &[n(-1.0)]).unwrap(),
            Value::Error("not a number".to_string())
        );
    }

    #[test]
    fn test_custom_function() {
        let mut registry = FunctionRegistry::new();
        registry.register_function("double", |args| {
            expect_arity("double", args, 1, 1)?;
            Ok(Value::number(number("double", &args[0])? * 2.0))
        });
        assert_eq!(registry.call("double", &[n(21.0)]).unwrap(), n(42.0));
        assert_eq!(registry.canonical_name("double"), Some("double"));
        assert!(registry.contains("double"));
    }
}
