//! Settings Module
//!
//! The process-wide configuration: built-in defaults, caller overrides and
//! the configuration source, plus lazily loaded whitelists.

mod defaults;
mod map;

pub use defaults::default_settings;
pub use map::{ConfigEntry, ConfigurationMap};
