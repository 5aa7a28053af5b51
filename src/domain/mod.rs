pub mod cache;
pub mod compiler;
pub mod currency;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod extensions;
pub mod format;
pub mod functions;
pub mod parser;
pub mod scope;
pub mod units;
pub mod value;

pub use compiler::{CacheStats, CompiledExpression, ExpressionCompiler};
pub use currency::{CurrencyLoader, CurrencyRegistry, CurrencyStatus, ExchangeData};
pub use dispatch::{DispatchTable, DispatchTableBuilder};
pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use errors::*;
pub use extensions::{DateArithmetic, Extension};
pub use format::{FormatConfig, Formatter};
pub use functions::FunctionRegistry;
pub use scope::{Clock, FixedClock, Scope, SystemClock, default_scope};
pub use units::{Quantity, Unit, UnitExpr, UnitTable};
pub use value::{Callable, Value, ValueKind};
