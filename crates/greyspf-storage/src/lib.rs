//! greyspf Storage - Database abstraction
//!
//! This crate provides the PostgreSQL pool and the whitelist repository,
//! plus an in-memory whitelist store with the same semantics.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
