//! greyspf Core - Whitelists, configuration and policy requests
//!
//! This crate provides the persisted whitelists, the case-insensitive
//! configuration map that exposes them, the attribute parser for policy
//! requests, and duplicate-request filtering.

pub mod policy;
pub mod settings;
pub mod whitelist;

pub use policy::{
    AttributeParser, AttributeRecord, Checker, InstanceTracker, PolicyService, RequestReader,
    Verdict,
};
pub use settings::{ConfigEntry, ConfigurationMap};
pub use whitelist::{NetworkRangeList, Whitelist};
