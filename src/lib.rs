//! mathpad - Terminal Math Notepad Library
//!
//! An incremental, line-oriented calculation engine with units, dates,
//! currencies and user-defined functions, plus the terminal editor built on it.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
