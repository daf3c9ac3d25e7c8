//! Duplicate request detection
//!
//! The mail transfer agent repeats a request with the same instance token
//! for every recipient of one transaction. Only the first one is evaluated.

use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::trace;

use super::attributes::AttributeRecord;

/// Remembers instance tokens already seen by this process.
///
/// Memory is bounded: once `capacity` tokens are held, the least recently
/// recorded one is forgotten for each new one.
pub struct InstanceTracker {
    seen: LruCache<String, ()>,
}

impl InstanceTracker {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Whether the request's instance was seen before. Records it otherwise.
    ///
    /// A request without an instance is never a duplicate and leaves the
    /// recorded tokens untouched.
    pub fn is_duplicate(&mut self, record: &AttributeRecord) -> bool {
        match record.instance() {
            Some(token) => self.check_token(token),
            None => false,
        }
    }

    /// Whether `token` was seen before. Records it otherwise.
    pub fn check_token(&mut self, token: &str) -> bool {
        if self.seen.contains(token) {
            trace!(instance = token, "Duplicate instance");
            return true;
        }

        self.seen.put(token.to_string(), ());
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.seen.cap().get()
    }
}

impl Default for InstanceTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
