use thiserror::Error;

/// Failure to turn line text into a statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at column {column}")]
    UnexpectedCharacter { ch: char, column: usize },
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("invalid assignment target")]
    InvalidAssignment,
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Failure raised while evaluating a compiled statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("undefined symbol {0}")]
    UndefinedSymbol(String),
    #[error("unknown unit {0}")]
    UnknownUnit(String),
    #[error("units {left} and {right} do not match")]
    UnitMismatch { left: String, right: String },
    #[error("no rule for {op}({left}, {right})")]
    NoRule {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("date out of range")]
    DateOutOfRange,
    #[error("evaluation exceeded the budget of {0} steps")]
    StepBudgetExceeded(usize),
    #[error("function calls nested deeper than {0}")]
    CallDepthExceeded(usize),
    #[error("unit exponent out of range")]
    ExponentOverflow,
}

/// Failure while assembling the operator dispatch table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("a rule for {op}({left}, {right}) is already registered")]
    Conflict {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EvalError::NoRule { op: "add", left: "Number", right: "Date" };
        assert_eq!(err.to_string(), "no rule for add(Number, Date)");

        let err = ParseError::UnexpectedCharacter { ch: '$', column: 3 };
        assert_eq!(err.to_string(), "unexpected character '$' at column 3");
    }
}
