//! Repository layer for data access

pub mod whitelist;

pub use whitelist::DbWhitelistRepository as WhitelistRepository;
pub use whitelist::{InMemoryWhitelistStore, WhitelistStore};
