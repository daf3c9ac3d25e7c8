//! greyspf Common - Shared types and utilities
//!
//! This crate provides the error type, network range and verbosity types,
//! and configuration-source handling shared across all greyspf components.

pub mod config;
pub mod error;
pub mod types;

pub use config::DatabaseSettings;
pub use error::{Error, Result};
pub use types::{AddressFamily, NetworkRange, Verbosity};
