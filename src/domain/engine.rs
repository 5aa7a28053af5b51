//! The evaluation engine: dispatch table, functions and units in one place.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::compiler::CompiledExpression;
use super::currency::{CurrencyLoader, CurrencyRegistry, CurrencyStatus};
use super::dispatch::{DispatchTable, DispatchTableBuilder};
use super::errors::{DispatchError, EvalResult};
use super::evaluator::ExpressionEvaluator;
use super::extensions::{DateArithmetic, Extension};
use super::functions::{FunctionImpl, FunctionRegistry};
use super::parser::{BinaryOp, DEFAULT_MAX_DEPTH};
use super::scope::Scope;
use super::units::{Unit, UnitTable};
use super::value::Value;

/// Limits applied to compilation and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of compiled lines kept per document. A document with
    /// more distinct lines than this re-parses lines on every pass, since a
    /// full pass evicts the lines the next pass starts with.
    pub cache_capacity: usize,
    /// Deepest expression tree a line may parse into.
    pub max_expression_depth: usize,
    /// AST nodes a single line may visit.
    pub step_budget: usize,
    /// Nesting limit for user function calls.
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            max_expression_depth: DEFAULT_MAX_DEPTH,
            step_budget: 100_000,
            max_call_depth: 64,
        }
    }
}

/// Assembles an [`Engine`]. Extensions may add rules but never replace one.
#[derive(Debug)]
pub struct EngineBuilder {
    config: EngineConfig,
    dispatch: DispatchTableBuilder,
    functions: FunctionRegistry,
    extensions: Vec<&'static str>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            dispatch: DispatchTableBuilder::new(),
            functions: FunctionRegistry::new(),
            extensions: Vec::new(),
        }
    }

    pub fn install(mut self, extension: &dyn Extension) -> Result<Self, DispatchError> {
        extension.install(&mut self.dispatch)?;
        debug!(extension = extension.name(), "Installed engine extension");
        self.extensions.push(extension.name());
        Ok(self)
    }

    pub fn function(mut self, name: &'static str, func: FunctionImpl) -> Self {
        self.functions.register_function(name, func);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            config: self.config,
            dispatch: self.dispatch.build(),
            functions: self.functions,
            units: Arc::new(UnitTable::new()),
            currencies: Arc::new(CurrencyRegistry::new()),
            extensions: self.extensions,
        }
    }
}

/// Immutable evaluation context shared by every document pass.
///
/// The only state that changes after construction is the currency registry,
/// which is filled in from a background thread through a [`CurrencyLoader`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    dispatch: DispatchTable,
    functions: FunctionRegistry,
    units: Arc<UnitTable>,
    currencies: Arc<CurrencyRegistry>,
    extensions: Vec<&'static str>,
}

impl Engine {
    /// The built-in rules plus date arithmetic.
    ///
    /// ```
    /// use mathpad::domain::{Engine, EngineConfig, Scope, ExpressionCompiler, Value};
    ///
    /// let engine = Engine::standard(EngineConfig::default()).unwrap();
    /// let mut compiler = ExpressionCompiler::default();
    /// let line = compiler.compile("2 * 21").unwrap();
    /// let value = engine.execute(&line, &mut Scope::new()).unwrap();
    /// assert_eq!(value, Value::Number(42.0));
    /// ```
    pub fn standard(config: EngineConfig) -> Result<Engine, DispatchError> {
        Ok(EngineBuilder::new(config).install(&DateArithmetic)?.build())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatch(&self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        self.dispatch.dispatch(op, left, right)
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }

    /// Resolves a unit name against built-in units, then currencies.
    pub fn resolve_unit(&self, name: &str) -> Option<Unit> {
        self.units.lookup(name).or_else(|| self.currencies.lookup(name))
    }

    pub fn currency_loader(&self) -> CurrencyLoader {
        CurrencyLoader::new(self.units.clone(), self.currencies.clone())
    }

    pub fn currency_status(&self) -> CurrencyStatus {
        self.currencies.status()
    }

    /// Evaluates a compiled line against `scope`.
    pub fn execute(&self, compiled: &CompiledExpression, scope: &mut Scope) -> EvalResult<Value> {
        ExpressionEvaluator::new(self, scope).execute(compiled.statement())
    }
}
