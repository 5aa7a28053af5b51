//! Application layer managing documents and editor state.
//!
//! This module coordinates between the domain layer and presentation layer:
//! the document evaluation loop and the state of the interactive notepad.

pub mod document;
pub mod state;

pub use document::*;
pub use state::*;
