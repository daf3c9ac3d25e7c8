//! Policy service
//!
//! Runs one request through duplicate detection and the enabled checkers.
//! The checks themselves (SPF verification, greylist timing) are supplied by
//! [`Checker`] implementations; a checker is skipped for clients covered by
//! its whitelist.

use async_trait::async_trait;
use greyspf_common::{Error, Result, Verbosity};
use std::fmt;
use tracing::{debug, info, warn};

use super::attributes::AttributeRecord;
use super::instance::InstanceTracker;
use crate::settings::ConfigurationMap;
use crate::whitelist::Whitelist;

/// Outcome of a policy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No opinion; the agent continues with its other restrictions
    Dunno,
    /// Accept the transaction
    Accept,
    /// Defer with a temporary failure
    Defer(String),
    /// Reject with a permanent failure
    Reject(String),
    /// Accept and add a header
    Prepend(String),
}

impl Verdict {
    /// The `action=` value sent back to the agent
    pub fn action(&self) -> String {
        match self {
            Verdict::Dunno => "dunno".to_string(),
            Verdict::Accept => "ok".to_string(),
            Verdict::Defer(msg) => format!("defer_if_permit {}", msg),
            Verdict::Reject(msg) => format!("reject {}", msg),
            Verdict::Prepend(header) => format!("prepend {}", header),
        }
    }

    /// Full response block, terminated by an empty line
    pub fn response(&self) -> String {
        format!("action={}\n\n", self.action())
    }

    /// Reply for a request that could not be evaluated
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::Parse(_) => Verdict::Defer("Malformed policy request".to_string()),
            _ => Verdict::Defer("Policy service temporarily unavailable".to_string()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action())
    }
}

/// One named check, such as SPF verification or greylisting
#[async_trait]
pub trait Checker: Send + Sync {
    /// Name as listed in the `checkers` setting
    fn name(&self) -> &str;

    /// Evaluate a request. [`Verdict::Dunno`] passes it on to the next checker.
    async fn check(&self, record: &AttributeRecord, config: &ConfigurationMap) -> Result<Verdict>;
}

/// Evaluates policy requests against the configuration
pub struct PolicyService {
    config: ConfigurationMap,
    instances: InstanceTracker,
    checkers: Vec<Box<dyn Checker>>,
}

impl PolicyService {
    pub fn new(config: ConfigurationMap) -> Self {
        let capacity = config
            .get_integer("instanceCacheSize")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(InstanceTracker::DEFAULT_CAPACITY);

        Self {
            config,
            instances: InstanceTracker::new(capacity),
            checkers: Vec::new(),
        }
    }

    /// Make a checker available under its name
    pub fn register(&mut self, checker: Box<dyn Checker>) {
        info!(checker = checker.name(), "Registered checker");
        self.checkers.push(checker);
    }

    pub fn config(&self) -> &ConfigurationMap {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigurationMap {
        &mut self.config
    }

    pub fn verbosity(&self) -> Verbosity {
        self.config.verbosity()
    }

    /// Evaluate one request.
    ///
    /// A repeated instance gets [`Verdict::Dunno`] without running any
    /// checker. Otherwise the enabled checkers run in configured order and
    /// the first verdict other than `Dunno` wins.
    pub async fn evaluate(&mut self, record: &AttributeRecord) -> Result<Verdict> {
        let verbosity = self.verbosity();

        if self.instances.is_duplicate(record) {
            if verbosity.allows(1) {
                debug!(instance = record.get("instance"), "Already evaluated this instance");
            }
            return Ok(Verdict::Dunno);
        }

        let client = record.client_address();
        for name in self.config.checkers() {
            let Some(checker) = self.checkers.iter().find(|c| c.name() == name) else {
                if verbosity.allows(2) {
                    warn!(checker = %name, "No checker registered under this name");
                }
                continue;
            };

            if let (Some(which), Some(addr)) = (Whitelist::for_checker(&name), client) {
                if self.config.whitelist(which)?.matches(&addr).await? {
                    if verbosity.allows(1) {
                        debug!(checker = %name, client = %addr, "Client whitelisted");
                    }
                    continue;
                }
            }

            let verdict = checker.check(record, &self.config).await?;
            if verbosity.allows(2) {
                debug!(checker = %name, verdict = %verdict, "Checker finished");
            }
            if verdict != Verdict::Dunno {
                return Ok(verdict);
            }
        }

        Ok(Verdict::Dunno)
    }
}
