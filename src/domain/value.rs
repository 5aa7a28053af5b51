use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};

use super::parser::Expr;
use super::units::Quantity;

/// Runtime type of a [`Value`], used as the dispatch key for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    Date,
    Quantity,
    Function,
    Undefined,
    Error,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Number => "Number",
            ValueKind::Date => "Date",
            ValueKind::Quantity => "Unit",
            ValueKind::Function => "Function",
            ValueKind::Undefined => "Undefined",
            ValueKind::Error => "Error",
        }
    }
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Date(DateTime<Local>),
    Quantity(Quantity),
    Function(Callable),
    Undefined,
    Error(String),
}

impl Value {
    /// Wraps a numeric result; NaN becomes an error value.
    pub fn number(n: f64) -> Value {
        if n.is_nan() {
            Value::Error("not a number".to_string())
        } else {
            Value::Number(n)
        }
    }

    /// Wraps a quantity result; a NaN magnitude becomes an error value.
    pub fn quantity(q: Quantity) -> Value {
        if q.base_value.is_nan() {
            Value::Error("not a number".to_string())
        } else {
            Value::Quantity(q)
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Date(_) => ValueKind::Date,
            Value::Quantity(_) => ValueKind::Quantity,
            Value::Function(_) => ValueKind::Function,
            Value::Undefined => ValueKind::Undefined,
            Value::Error(_) => ValueKind::Error,
        }
    }

    /// Whether the value belongs in a result set.
    pub fn is_displayable(&self) -> bool {
        !matches!(self, Value::Function(_) | Value::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Something that can be applied to arguments.
#[derive(Debug, Clone)]
pub enum Callable {
    Builtin(&'static str),
    User(Arc<UserFunction>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Builtin(name) => name,
            Callable::User(function) => &function.name,
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Builtin(a), Callable::Builtin(b)) => a == b,
            (Callable::User(a), Callable::User(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Builtin(name) => write!(f, "{}(...)", name),
            Callable::User(function) => write!(f, "{}({})", function.name, function.params.join(", ")),
        }
    }
}

/// A function assigned on a line, e.g. `f(x) = x^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_becomes_error() {
        assert_eq!(Value::number(f64::NAN), Value::Error("not a number".to_string()));
        assert_eq!(Value::number(2.0), Value::Number(2.0));
    }

    #[test]
    fn test_displayable_filter() {
        assert!(Value::Number(1.0).is_displayable());
        assert!(Value::Error("x".to_string()).is_displayable());
        assert!(!Value::Undefined.is_displayable());
        assert!(!Value::Function(Callable::Builtin("sqrt")).is_displayable());
    }

    #[test]
    fn test_user_functions_compare_by_identity() {
        let function = Arc::new(UserFunction {
            name: "f".to_string(),
            params: vec!["x".to_string()],
            body: Expr::Symbol("x".to_string()),
        });
        let a = Callable::User(function.clone());
        let b = Callable::User(function.clone());
        let c = Callable::User(Arc::new((*function).clone()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "f(x)");
    }
}
