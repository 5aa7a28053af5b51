//! Infrastructure layer providing external service integrations.
//!
//! This module contains file persistence, the exchange-rate providers,
//! configuration loading and logging setup.

pub mod config;
pub mod logging;
pub mod persistence;
pub mod rates;

pub use config::*;
pub use logging::*;
pub use persistence::*;
pub use rates::*;
