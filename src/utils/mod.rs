//! Shared utilities.
//!
//! ## Modules
//!
//! - [`app_data`] - user configuration in the application data directory
//! - [`encoding`] - little-endian field codec for persisted indexes
//! - [`logging`] - tracing subscriber setup
//! - [`progress`] - spinners, no-op without the `progress` feature

pub mod app_data;
pub mod encoding;
pub mod logging;
pub mod progress;

pub use app_data::*;
pub use encoding::*;
