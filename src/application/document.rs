//! Evaluation of a whole document, one line at a time.
//!
//! A pass walks the lines in order, threading a single [`Scope`] through
//! them so that assignments and `last` carry forward. Lines that are blank,
//! fail to parse or fail to evaluate are skipped without aborting the pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::{Clock, Engine, ExpressionCompiler, Scope, SystemClock, Value, default_scope};

/// Line index → displayable value for the most recent pass.
pub type ResultSet = BTreeMap<usize, Value>;

/// Ordered lines of text read by a pass. Never modified by evaluation.
pub trait LineSource {
    fn line_count(&self) -> usize;

    fn line(&self, index: usize) -> &str;
}

impl LineSource for [String] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        &self[index]
    }
}

impl LineSource for Vec<String> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        &self[index]
    }
}

impl LineSource for [&str] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        self[index]
    }
}

impl<const N: usize> LineSource for [&str; N] {
    fn line_count(&self) -> usize {
        N
    }

    fn line(&self, index: usize) -> &str {
        self[index]
    }
}

/// Evaluation state attached to one open document.
#[derive(Debug)]
pub struct MathDocument {
    engine: Arc<Engine>,
    compiler: ExpressionCompiler,
    clock: Arc<dyn Clock>,
    results: ResultSet,
    scope: Scope,
}

impl MathDocument {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_clock(engine, Arc::new(SystemClock))
    }

    pub fn with_clock(engine: Arc<Engine>, clock: Arc<dyn Clock>) -> Self {
        let config = engine.config();
        let compiler =
            ExpressionCompiler::new(config.cache_capacity).with_max_depth(config.max_expression_depth);
        Self {
            engine,
            compiler,
            clock,
            results: ResultSet::new(),
            scope: Scope::new(),
        }
    }

    /// Re-evaluates every line of `document` and returns the results.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use mathpad::application::MathDocument;
    /// use mathpad::domain::{Engine, EngineConfig, Value};
    ///
    /// let engine = Arc::new(Engine::standard(EngineConfig::default()).unwrap());
    /// let mut document = MathDocument::new(engine);
    /// let results = document.evaluate(&["1 + 1", "", "last * 2"]);
    /// assert_eq!(results.get(&2), Some(&Value::Number(4.0)));
    /// ```
    pub fn evaluate<D: LineSource + ?Sized>(&mut self, document: &D) -> &ResultSet {
        self.results.clear();
        self.scope = default_scope(self.clock.as_ref());

        for index in 0..document.line_count() {
            let text = document.line(index).trim();
            if text.is_empty() {
                continue;
            }

            let Some(compiled) = self.compiler.compile(text) else {
                continue;
            };

            match self.engine.execute(&compiled, &mut self.scope) {
                Ok(value) => {
                    self.scope.set_last(value.clone());
                    if value.is_displayable() {
                        self.results.insert(index, value);
                    }
                }
                Err(err) => {
                    trace!(line = index, error = %err, "Line failed to evaluate");
                }
            }
        }

        let stats = self.compiler.stats();
        debug!(
            lines = document.line_count(),
            results = self.results.len(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "Evaluated document"
        );
        &self.results
    }

    /// Results of the most recent pass.
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Scope as left by the most recent pass.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn compiler(&self) -> &ExpressionCompiler {
        &self.compiler
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}
