//! Compilation of line text with a bounded cache.

use std::sync::Arc;

use tracing::trace;

use super::cache::LruCache;
use super::errors::ParseError;
use super::parser::{DEFAULT_MAX_DEPTH, Statement, parse_statement_with_depth};

/// The parsed, directly evaluable form of one line.
///
/// Clones share the same parse; two compilations of the same text served
/// from the cache are [`CompiledExpression::ptr_eq`].
#[derive(Debug, Clone)]
pub struct CompiledExpression(Arc<Compiled>);

#[derive(Debug)]
struct Compiled {
    source: String,
    statement: Statement,
}

impl CompiledExpression {
    pub fn new(source: impl Into<String>, statement: Statement) -> Self {
        CompiledExpression(Arc::new(Compiled {
            source: source.into(),
            statement,
        }))
    }

    pub fn source(&self) -> &str {
        &self.0.source
    }

    pub fn statement(&self) -> &Statement {
        &self.0.statement
    }

    pub fn ptr_eq(&self, other: &CompiledExpression) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Counters describing how the compilation cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub failures: u64,
}

impl CacheStats {
    /// Number of times the parser actually ran.
    pub fn parses(&self) -> u64 {
        self.misses
    }
}

/// Compiles trimmed line text, reusing earlier results for identical text.
#[derive(Debug)]
pub struct ExpressionCompiler {
    cache: LruCache<String, CompiledExpression>,
    stats: CacheStats,
    max_depth: usize,
}

impl ExpressionCompiler {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            stats: CacheStats::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets how deeply a line's expression may nest before it is rejected.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Compiles `text`, or returns `None` when it does not parse.
    pub fn compile(&mut self, text: &str) -> Option<CompiledExpression> {
        self.try_compile(text).ok()
    }

    /// Like [`ExpressionCompiler::compile`] but reports why parsing failed.
    /// Failures are never cached.
    pub fn try_compile(&mut self, text: &str) -> Result<CompiledExpression, ParseError> {
        let key = text.trim();
        if let Some(compiled) = self.cache.get(key) {
            self.stats.hits += 1;
            return Ok(compiled.clone());
        }

        self.stats.misses += 1;
        let statement = parse_statement_with_depth(key, self.max_depth).inspect_err(|err| {
            self.stats.failures += 1;
            trace!(text = key, error = %err, "Line does not parse");
        })?;

        let compiled = CompiledExpression::new(key, statement);
        if self.cache.put(key.to_string(), compiled.clone()).is_some() {
            self.stats.evictions += 1;
        }
        Ok(compiled)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn is_cached(&self, text: &str) -> bool {
        self.cache.contains_key(text.trim())
    }
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::new(1024)
    }
}
