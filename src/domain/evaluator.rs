use std::collections::HashMap;
use std::f64::consts::{E, PI, TAU};
use std::sync::Arc;

use super::engine::Engine;
use super::errors::{EvalError, EvalResult};
use super::parser::{Expr, Statement, StatementKind, UnaryOp, UnitTerm};
use super::scope::Scope;
use super::units::{Quantity, UnitExpr};
use super::value::{Callable, UserFunction, Value};

const PHI: f64 = 1.618_033_988_749_895;

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(PI),
        "e" => Some(E),
        "tau" => Some(TAU),
        "phi" => Some(PHI),
        "Infinity" => Some(f64::INFINITY),
        "NaN" => Some(f64::NAN),
        _ => None,
    }
}

/// Expression evaluator that walks the AST and computes results.
///
/// One evaluator runs one statement. It owns the step counter for that
/// statement and the parameter frames of user function calls in progress;
/// the document scope is borrowed and only written by assignments.
pub struct ExpressionEvaluator<'a> {
    engine: &'a Engine,
    scope: &'a mut Scope,
    frames: Vec<HashMap<String, Value>>,
    steps: usize,
}

impl<'a> ExpressionEvaluator<'a> {
    /// Creates a new expression evaluator.
    pub fn new(engine: &'a Engine, scope: &'a mut Scope) -> Self {
        Self {
            engine,
            scope,
            frames: Vec::new(),
            steps: 0,
        }
    }

    /// Runs a statement, applying any binding it makes to the scope.
    pub fn execute(&mut self, statement: &Statement) -> EvalResult<Value> {
        let value = match &statement.kind {
            StatementKind::Empty => Value::Undefined,
            StatementKind::Expression(expr) => self.evaluate(expr)?,
            StatementKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.scope.set(name.clone(), value.clone());
                value
            }
            StatementKind::FunctionDef { name, params, body } => {
                let function = Value::Function(Callable::User(Arc::new(UserFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                })));
                self.scope.set(name.clone(), function.clone());
                function
            }
        };

        if statement.silent {
            Ok(Value::Undefined)
        } else {
            Ok(value)
        }
    }

    /// Evaluates an expression AST to a value.
    pub fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.steps += 1;
        let budget = self.engine.config().step_budget;
        if self.steps > budget {
            return Err(EvalError::StepBudgetExceeded(budget));
        }

        match expr {
            Expr::Number(value) => Ok(Value::number(*value)),

            Expr::Symbol(name) => self.resolve(name),

            Expr::Binary { left, operator, right } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                self.engine.dispatch(*operator, &left_val, &right_val)
            }

            Expr::Unary { operator, operand } => {
                let operand_val = self.evaluate(operand)?;
                match (operator, operand_val) {
                    (UnaryOp::Plus, value @ (Value::Number(_) | Value::Quantity(_))) => Ok(value),
                    (UnaryOp::Minus, Value::Number(n)) => Ok(Value::number(-n)),
                    (UnaryOp::Minus, Value::Quantity(q)) => {
                        Ok(Value::quantity(q.with_base_value(-q.base_value)))
                    }
                    (_, other) => Err(EvalError::InvalidArgument(format!(
                        "cannot apply a sign to {}",
                        other.kind().name()
                    ))),
                }
            }

            Expr::Call { callee, args } => {
                let callee_val = match callee.as_ref() {
                    Expr::Symbol(name) => self.resolve_callee(name)?,
                    other => self.evaluate(other)?,
                };
                let Value::Function(function) = callee_val else {
                    return Err(EvalError::NotCallable(describe(callee)));
                };

                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate(arg)?);
                }
                self.call(&function, arg_values)
            }

            Expr::Convert { value, target } => {
                let value = self.evaluate(value)?;
                let target = self.unit_target(target)?;
                match value {
                    Value::Quantity(q) => Ok(Value::quantity(q.to(&target)?)),
                    other => Err(EvalError::UnitMismatch {
                        left: other.kind().name().to_string(),
                        right: target.to_string(),
                    }),
                }
            }
        }
    }

    fn binding(&self, name: &str) -> Option<Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.scope.get(name))
            .cloned()
    }

    fn builtin(&self, name: &str) -> Option<Value> {
        self.engine
            .functions()
            .canonical_name(name)
            .map(|builtin| Value::Function(Callable::Builtin(builtin)))
    }

    /// Resolves a bare identifier: call parameters, then the scope, then
    /// constants, units and finally built-in functions, so `90 min` is a
    /// duration.
    fn resolve(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.binding(name) {
            return Ok(value);
        }
        if let Some(value) = constant(name) {
            return Ok(Value::number(value));
        }
        if let Some(unit) = self.engine.resolve_unit(name) {
            return Ok(Value::Quantity(Quantity::new(1.0, UnitExpr::single(unit))));
        }
        self.builtin(name)
            .ok_or_else(|| EvalError::UndefinedSymbol(name.to_string()))
    }

    /// Resolves an identifier in call position, where built-in functions
    /// win over units: `min(1, 2)`.
    fn resolve_callee(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.binding(name) {
            return Ok(value);
        }
        match self.builtin(name) {
            Some(function) => Ok(function),
            None => self.resolve(name),
        }
    }

    fn unit_target(&self, terms: &[UnitTerm]) -> EvalResult<UnitExpr> {
        let mut target = UnitExpr::default();
        for term in terms {
            let unit = self
                .engine
                .resolve_unit(&term.name)
                .ok_or_else(|| EvalError::UnknownUnit(term.name.clone()))?;
            target = target.mul(&UnitExpr::single(unit).pow(term.power)?)?;
        }
        Ok(target)
    }

    fn call(&mut self, function: &Callable, args: Vec<Value>) -> EvalResult<Value> {
        match function {
            Callable::Builtin(name) => self.engine.functions().call(name, &args),
            Callable::User(function) => {
                if args.len() != function.params.len() {
                    return Err(EvalError::Arity {
                        name: function.name.clone(),
                        expected: function.params.len().to_string(),
                        got: args.len(),
                    });
                }

                let max_depth = self.engine.config().max_call_depth;
                if self.frames.len() >= max_depth {
                    return Err(EvalError::CallDepthExceeded(max_depth));
                }

                let frame = function.params.iter().cloned().zip(args).collect();
                self.frames.push(frame);
                let result = self.evaluate(&function.body);
                self.frames.pop();
                result
            }
        }
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Symbol(name) => name.clone(),
        Expr::Number(n) => n.to_string(),
        _ => "expression".to_string(),
    }
}
