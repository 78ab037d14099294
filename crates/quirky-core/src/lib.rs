//! `quirky-core`: shared types for the request visualizer: configuration,
//! the captured event model, error types and the display sanitizer.

pub mod config;
pub mod error;
pub mod event;
pub mod sanitize;

pub use error::{QuirkyError, Result};
pub use event::CapturedEvent;
pub use sanitize::{sanitize, SanitizeError};
