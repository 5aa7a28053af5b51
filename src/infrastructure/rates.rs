//! Exchange-rate providers and the background currency loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{CurrencyLoader, ExchangeData};

#[derive(Debug, Error)]
pub enum RateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid rate data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("rate cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("rate data has no base currency")]
    MissingBase,
}

/// Supplier of a base currency and exchange rates.
pub trait RateProvider: Send {
    fn fetch_rates(&self) -> Result<ExchangeData, RateError>;
}

impl<P: RateProvider + ?Sized> RateProvider for Box<P> {
    fn fetch_rates(&self) -> Result<ExchangeData, RateError> {
        (**self).fetch_rates()
    }
}

fn validate(data: ExchangeData) -> Result<ExchangeData, RateError> {
    if data.base.trim().is_empty() {
        return Err(RateError::MissingBase);
    }
    Ok(data)
}

/// Fetches rates from an HTTP endpoint returning
/// `{"base": "EUR", "date": "2024-01-01", "rates": {"USD": 1.1, ...}}`.
pub struct HttpRateProvider {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpRateProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mathpad/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl RateProvider for HttpRateProvider {
    fn fetch_rates(&self) -> Result<ExchangeData, RateError> {
        info!(url = %self.url, "Fetching latest currency exchange rates");
        let data = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .json::<ExchangeData>()?;
        validate(data)
    }
}

/// Always returns the same data.
#[derive(Debug, Clone)]
pub struct StaticRateProvider(pub ExchangeData);

impl RateProvider for StaticRateProvider {
    fn fetch_rates(&self) -> Result<ExchangeData, RateError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: DateTime<Utc>,
    data: ExchangeData,
}

impl CacheEntry {
    /// Age is measured from the data's own `date` when it has one, otherwise
    /// from when it was fetched.
    fn is_fresh(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        let stamped = self
            .data
            .date
            .as_deref()
            .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
            .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
            .unwrap_or(self.fetched_at);
        now.signed_duration_since(stamped) <= ttl
    }
}

/// Wraps another provider with a JSON file cache.
///
/// Fresh cached data is returned without touching the inner provider. When
/// the cache is stale the inner provider is asked; if that fails the stale
/// data is used rather than nothing.
pub struct CachedRateProvider<P> {
    inner: P,
    path: PathBuf,
    ttl: TimeDelta,
}

impl<P: RateProvider> CachedRateProvider<P> {
    pub fn new(inner: P, path: impl Into<PathBuf>, ttl_days: u64) -> Self {
        let ttl = TimeDelta::try_days(ttl_days as i64).unwrap_or(TimeDelta::MAX);
        Self {
            inner,
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_cache(&self) -> Option<CacheEntry> {
        let text = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&text) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Ignoring unreadable rate cache");
                None
            }
        }
    }

    fn write_cache(&self, data: &ExchangeData) -> Result<(), RateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let entry = CacheEntry {
            fetched_at: Utc::now(),
            data: data.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&entry)?)?;
        Ok(())
    }

    fn fetch_at(&self, now: DateTime<Utc>) -> Result<ExchangeData, RateError> {
        let cached = self.read_cache();
        if let Some(entry) = &cached {
            if entry.is_fresh(self.ttl, now) {
                debug!(path = %self.path.display(), "Using cached exchange rates");
                return Ok(entry.data.clone());
            }
        }

        match self.inner.fetch_rates() {
            Ok(data) => {
                if let Err(err) = self.write_cache(&data) {
                    warn!(path = %self.path.display(), error = %err, "Could not cache exchange rates");
                }
                Ok(data)
            }
            Err(err) => match cached {
                Some(entry) => {
                    warn!(error = %err, "Fetching exchange rates failed; using stale cache");
                    Ok(entry.data)
                }
                None => Err(err),
            },
        }
    }
}

impl<P: RateProvider> RateProvider for CachedRateProvider<P> {
    fn fetch_rates(&self) -> Result<ExchangeData, RateError> {
        self.fetch_at(Utc::now())
    }
}

/// Starts registering currency units on a background thread.
///
/// Returns `None` if registration was already started for this engine.
pub fn spawn_currency_loader<P>(loader: CurrencyLoader, provider: P) -> Option<JoinHandle<()>>
where
    P: RateProvider + 'static,
{
    if !loader.begin() {
        return None;
    }

    let task_loader = loader.clone();
    let spawned = thread::Builder::new()
        .name("currency-loader".to_string())
        .spawn(move || match provider.fetch_rates() {
            Ok(data) => {
                task_loader.complete(&data);
            }
            Err(err) => task_loader.fail(err.to_string()),
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            loader.fail(format!("could not start currency loader: {}", err));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurrencyStatus, Engine, EngineConfig};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        result: Option<ExchangeData>,
    }

    impl RateProvider for CountingProvider {
        fn fetch_rates(&self) -> Result<ExchangeData, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().ok_or(RateError::MissingBase)
        }
    }

    fn sample() -> ExchangeData {
        ExchangeData::new("EUR").with_rate("USD", 1.1)
    }

    fn counting(result: Option<ExchangeData>) -> (CountingProvider, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingProvider {
                calls: calls.clone(),
                result,
            },
            calls,
        )
    }

    #[test]
    fn test_cache_is_written_and_reused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("rates.json");
        let (provider, calls) = counting(Some(sample()));
        let cached = CachedRateProvider::new(provider, &path, 7);

        assert_eq!(cached.fetch_rates().unwrap(), sample());
        assert!(path.exists());
        assert_eq!(cached.fetch_rates().unwrap(), sample());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_cache_is_refreshed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.json");
        let (provider, calls) = counting(Some(sample()));
        let cached = CachedRateProvider::new(provider, &path, 7);

        cached.fetch_rates().unwrap();
        let later = Utc::now() + TimeDelta::try_days(8).unwrap();
        cached.fetch_at(later).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_data_date_controls_freshness() {
        let now = Utc::now();
        let mut data = sample();
        data.date = Some("2000-01-01".to_string());
        let entry = CacheEntry {
            fetched_at: now,
            data,
        };
        assert!(!entry.is_fresh(TimeDelta::try_days(7).unwrap(), now));

        let undated = CacheEntry {
            fetched_at: now,
            data: sample(),
        };
        assert!(undated.is_fresh(TimeDelta::try_days(7).unwrap(), now));
    }

    #[test]
    fn test_stale_cache_survives_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.json");
        CachedRateProvider::new(StaticRateProvider(sample()), &path, 7)
            .fetch_rates()
            .unwrap();

        let (failing, calls) = counting(None);
        let cached = CachedRateProvider::new(failing, &path, 7);
        let later = Utc::now() + TimeDelta::try_days(30).unwrap();
        assert_eq!(cached.fetch_at(later).unwrap(), sample());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_without_cache_propagates() {
        let dir = TempDir::new().unwrap();
        let (failing, _) = counting(None);
        let cached = CachedRateProvider::new(failing, dir.path().join("rates.json"), 7);
        assert!(matches!(cached.fetch_rates(), Err(RateError::MissingBase)));
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.json");
        fs::write(&path, "not json").unwrap();
        let cached = CachedRateProvider::new(StaticRateProvider(sample()), &path, 7);
        assert_eq!(cached.fetch_rates().unwrap(), sample());
    }

    #[test]
    fn test_loader_registers_currencies() {
        let engine = Engine::standard(EngineConfig::default()).unwrap();
        let handle = spawn_currency_loader(engine.currency_loader(), StaticRateProvider(sample()))
            .unwrap();
        handle.join().unwrap();

        assert_eq!(engine.currency_status(), CurrencyStatus::Ready);
        assert!(engine.resolve_unit("USD").is_some());
        assert!(spawn_currency_loader(engine.currency_loader(), StaticRateProvider(sample())).is_none());
    }

    #[test]
    fn test_loader_records_failure() {
        let engine = Engine::standard(EngineConfig::default()).unwrap();
        let (failing, _) = counting(None);
        spawn_currency_loader(engine.currency_loader(), failing)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(engine.currency_status(), CurrencyStatus::Failed);
        assert!(engine.resolve_unit("EUR").is_none());
    }
}
