//! Variable bindings threaded through one evaluation pass.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveTime};

use super::value::Value;

/// Name of the binding holding the previous line's result.
pub const LAST: &str = "last";
pub const TODAY: &str = "today";
pub const NOW: &str = "now";

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    bindings: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn last(&self) -> Option<&Value> {
        self.get(LAST)
    }

    pub fn set_last(&mut self, value: Value) {
        self.set(LAST, value);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A fresh scope holding `today` (local midnight) and `now`.
pub fn default_scope(clock: &dyn Clock) -> Scope {
    let now = clock.now();
    // Midnight can be skipped by a DST transition; keep `now` in that case.
    let today = now
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or(now);

    let mut scope = Scope::new();
    scope.set(TODAY, Value::Date(today));
    scope.set(NOW, Value::Date(now));
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_default_scope() {
        let instant = Local.with_ymd_and_hms(2024, 1, 1, 15, 30, 0).unwrap();
        let scope = default_scope(&FixedClock(instant));

        assert_eq!(scope.len(), 2);
        assert_eq!(scope.get(NOW), Some(&Value::Date(instant)));
        match scope.get(TODAY) {
            Some(Value::Date(today)) => {
                assert_eq!(today.date_naive(), instant.date_naive());
                assert_eq!(today.hour(), 0);
                assert_eq!(today.minute(), 0);
            }
            other => panic!("Expected date, got {:?}", other),
        }
        assert!(scope.last().is_none());
    }

    #[test]
    fn test_bindings() {
        let mut scope = Scope::new();
        scope.set("x", Value::Number(1.0));
        scope.set("x", Value::Number(2.0));
        scope.set_last(Value::Undefined);

        assert_eq!(scope.get("x"), Some(&Value::Number(2.0)));
        assert_eq!(scope.last(), Some(&Value::Undefined));
        assert!(scope.contains(LAST));
        assert_eq!(scope.len(), 2);
    }
}
