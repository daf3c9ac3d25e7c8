//! Policy Module
//!
//! Reading policy requests from the mail transfer agent, filtering repeated
//! requests, and turning a request into a verdict.

mod attributes;
mod instance;
mod service;

pub use attributes::{AttributeParser, AttributeRecord, RequestReader, PRESERVED_KEYS, UNKNOWN};
pub use instance::InstanceTracker;
pub use service::{Checker, PolicyService, Verdict};
