//! Currency units defined at runtime from exchange-rate data.
//!
//! Rates arrive on a background thread after the engine is built. The
//! registry moves through `Uninitialized → Loading → Ready | Failed` and
//! only answers lookups once it is `Ready`; readers see either the old
//! state or the complete table, never a half-registered one.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::units::{CURRENCY, Dimension, Unit, UnitTable};

/// Exchange rates relative to a base currency, as served by the rates API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeData {
    pub base: String,
    #[serde(default)]
    pub date: Option<String>,
    pub rates: BTreeMap<String, f64>,
}

impl ExchangeData {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            date: None,
            rates: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, symbol: impl Into<String>, rate: f64) -> Self {
        self.rates.insert(symbol.into(), rate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl CurrencyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CurrencyStatus::Ready | CurrencyStatus::Failed)
    }
}

#[derive(Debug)]
struct Inner {
    status: CurrencyStatus,
    units: HashMap<String, Unit>,
    failure: Option<String>,
}

/// Shared table of currency units.
#[derive(Debug)]
pub struct CurrencyRegistry {
    inner: RwLock<Inner>,
}

impl CurrencyRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                status: CurrencyStatus::Uninitialized,
                units: HashMap::new(),
                failure: None,
            }),
        }
    }

    pub fn status(&self) -> CurrencyStatus {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).status
    }

    /// Reason recorded by [`CurrencyRegistry::fail`], if any.
    pub fn failure(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .failure
            .clone()
    }

    /// Moves from `Uninitialized` to `Loading`. Returns false if loading
    /// was already started, so registration happens at most once.
    pub fn begin_loading(&self) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.status != CurrencyStatus::Uninitialized {
            return false;
        }
        inner.status = CurrencyStatus::Loading;
        true
    }

    /// Defines one unit per currency in `data` and marks the registry ready.
    ///
    /// The base currency gets factor 1 and every other currency `1 / rate`.
    /// Non-finite or non-positive rates, the base listed again, and symbols
    /// that already name a unit in `units` are skipped. Returns the number
    /// of currencies defined.
    pub fn register(&self, units: &UnitTable, data: &ExchangeData) -> usize {
        // Held from the status check to the commit so only one registration wins.
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.status.is_terminal() {
            drop(inner);
            warn!("Currency units were already registered; ignoring new rates");
            return 0;
        }

        let dimension = Dimension::base(CURRENCY);
        let mut defined = HashMap::with_capacity(data.rates.len() + 1);

        if units.contains(&data.base) {
            warn!(symbol = %data.base, "Base currency collides with an existing unit; skipping");
        } else {
            defined.insert(data.base.clone(), Unit::new(data.base.clone(), dimension, 1.0));
        }

        for (symbol, &rate) in &data.rates {
            if *symbol == data.base {
                continue;
            }
            if !rate.is_finite() || rate <= 0.0 {
                debug!(%symbol, rate, "Skipping currency with unusable rate");
                continue;
            }
            if units.contains(symbol) {
                warn!(%symbol, "Currency collides with an existing unit; skipping");
                continue;
            }
            defined.insert(symbol.clone(), Unit::new(symbol.clone(), dimension, 1.0 / rate));
        }

        let count = defined.len();
        inner.units = defined;
        inner.status = CurrencyStatus::Ready;
        inner.failure = None;
        drop(inner);

        info!("Loaded definitions for {} currencies.", count);
        count
    }

    /// Marks loading as failed. Currency symbols stay unknown for the session.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.status == CurrencyStatus::Ready {
            return;
        }
        inner.status = CurrencyStatus::Failed;
        inner.failure = Some(reason.into());
    }

    /// Looks up a currency unit. Always `None` until the registry is ready.
    pub fn lookup(&self, symbol: &str) -> Option<Unit> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if inner.status != CurrencyStatus::Ready {
            return None;
        }
        inner.units.get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CurrencyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle given to the background task that fetches rates.
///
/// It carries the pieces of an engine that currency registration needs and
/// can be moved to another thread.
#[derive(Debug, Clone)]
pub struct CurrencyLoader {
    units: Arc<UnitTable>,
    registry: Arc<CurrencyRegistry>,
}

impl CurrencyLoader {
    pub fn new(units: Arc<UnitTable>, registry: Arc<CurrencyRegistry>) -> Self {
        Self { units, registry }
    }

    pub fn begin(&self) -> bool {
        self.registry.begin_loading()
    }

    pub fn complete(&self, data: &ExchangeData) -> usize {
        self.registry.register(&self.units, data)
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "Currency definitions unavailable");
        self.registry.fail(reason);
    }

    pub fn status(&self) -> CurrencyStatus {
        self.registry.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> ExchangeData {
        ExchangeData::new("EUR")
            .with_rate("USD", 1.1)
            .with_rate("GBP", 0.85)
            .with_rate("EUR", 1.0)
            .with_rate("XXX", 0.0)
            .with_rate("YYY", f64::INFINITY)
            .with_rate("kg", 2.0)
    }

    #[test]
    fn test_lookup_requires_ready() {
        let registry = CurrencyRegistry::new();
        assert_eq!(registry.status(), CurrencyStatus::Uninitialized);
        assert!(registry.lookup("EUR").is_none());

        assert!(registry.begin_loading());
        assert!(!registry.begin_loading());
        assert_eq!(registry.status(), CurrencyStatus::Loading);
        assert!(registry.lookup("EUR").is_none());

        let count = registry.register(&UnitTable::new(), &rates());
        assert_eq!(count, 3);
        assert_eq!(registry.status(), CurrencyStatus::Ready);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_factors_relative_to_base() {
        let registry = CurrencyRegistry::new();
        registry.register(&UnitTable::new(), &rates());

        let eur = registry.lookup("EUR").unwrap();
        assert_eq!(eur.factor, 1.0);
        assert_eq!(eur.dimension, Dimension::base(CURRENCY));

        let usd = registry.lookup("USD").unwrap();
        assert!((usd.factor - 1.0 / 1.1).abs() < 1e-15);
    }

    #[test]
    fn test_unusable_rates_and_collisions_are_skipped() {
        let registry = CurrencyRegistry::new();
        registry.register(&UnitTable::new(), &rates());
        assert!(registry.lookup("XXX").is_none());
        assert!(registry.lookup("YYY").is_none());
        assert!(registry.lookup("kg").is_none());
        assert!(registry.lookup("usd").is_none());
    }

    #[test]
    fn test_failure_is_final() {
        let registry = CurrencyRegistry::new();
        registry.begin_loading();
        registry.fail("connection refused");
        assert_eq!(registry.status(), CurrencyStatus::Failed);
        assert_eq!(registry.failure().as_deref(), Some("connection refused"));

        assert_eq!(registry.register(&UnitTable::new(), &rates()), 0);
        assert!(registry.lookup("EUR").is_none());
    }

    #[test]
    fn test_loader_is_shared_across_threads() {
        let registry = Arc::new(CurrencyRegistry::new());
        let loader = CurrencyLoader::new(Arc::new(UnitTable::new()), registry.clone());

        let handle = std::thread::spawn(move || {
            assert!(loader.begin());
            loader.complete(&ExchangeData::new("EUR").with_rate("USD", 1.1))
        });
        assert_eq!(handle.join().unwrap(), 2);
        assert!(registry.lookup("USD").is_some());
    }

    #[test]
    fn test_concurrent_registrations_commit_once() {
        let registry = CurrencyRegistry::new();
        let units = UnitTable::new();
        let barrier = std::sync::Barrier::new(8);

        let counts: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (registry, units, barrier) = (&registry, &units, &barrier);
                    scope.spawn(move || {
                        let data = ExchangeData::new("EUR").with_rate("USD", 1.0 + i as f64);
                        barrier.wait();
                        registry.register(units, &data)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(counts.iter().filter(|&&count| count > 0).count(), 1);
        assert_eq!(counts.iter().sum::<usize>(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_exchange_data_json() {
        let json = r#"{"base":"EUR","rates":{"USD":1.1,"JPY":130.5}}"#;
        let data: ExchangeData = serde_json::from_str(json).unwrap();
        assert_eq!(data.base, "EUR");
        assert_eq!(data.date, None);
        assert_eq!(data.rates.get("JPY"), Some(&130.5));
    }
}
