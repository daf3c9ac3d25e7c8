//! Whitelists Module
//!
//! Network ranges that bypass a check. Each whitelist is persisted in its own
//! store collection and always contains the loopback ranges.

mod list;

pub use list::NetworkRangeList;

use greyspf_common::{NetworkRange, Result};

/// Ranges present in every whitelist regardless of administrator configuration
pub const TRUSTED_RANGES: [&str; 3] = ["127.0.0.0/8", "::ffff:127.0.0.0/104", "::1/128"];

/// Parsed [`TRUSTED_RANGES`]
pub fn trusted_ranges() -> Result<Vec<NetworkRange>> {
    TRUSTED_RANGES.iter().map(|s| s.parse()).collect()
}

/// The two whitelists known to the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Whitelist {
    /// Clients exempt from SPF verification
    Spf,
    /// Clients exempt from greylisting
    Greylist,
}

impl Whitelist {
    pub const ALL: [Whitelist; 2] = [Whitelist::Spf, Whitelist::Greylist];

    /// Reserved configuration key (lower-cased)
    pub fn key(self) -> &'static str {
        match self {
            Whitelist::Spf => "spfwhitelist",
            Whitelist::Greylist => "greylistwhitelist",
        }
    }

    /// Store collection holding the ranges
    pub fn collection(self) -> &'static str {
        self.key()
    }

    /// Name of the checker this whitelist exempts clients from
    pub fn checker(self) -> &'static str {
        match self {
            Whitelist::Spf => "spf",
            Whitelist::Greylist => "greylist",
        }
    }

    /// Look up a reserved key, ignoring case
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|w| w.key().eq_ignore_ascii_case(key))
    }

    /// The whitelist guarding a checker, if any
    pub fn for_checker(checker: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.checker() == checker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_ranges_parse() {
        let ranges = trusted_ranges().unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(|r| r.contains(&"127.0.0.1".parse().unwrap())
            || r.contains(&"::1".parse().unwrap())));
    }

    #[test]
    fn test_reserved_keys() {
        assert_eq!(Whitelist::from_key("spfWhiteList"), Some(Whitelist::Spf));
        assert_eq!(Whitelist::from_key("GREYLISTWHITELIST"), Some(Whitelist::Greylist));
        assert_eq!(Whitelist::from_key("greylistTime"), None);
        assert_ne!(Whitelist::Spf.collection(), Whitelist::Greylist.collection());
    }

    #[test]
    fn test_checker_mapping() {
        assert_eq!(Whitelist::for_checker("spf"), Some(Whitelist::Spf));
        assert_eq!(Whitelist::for_checker("greylist"), Some(Whitelist::Greylist));
        assert_eq!(Whitelist::for_checker("dnsbl"), None);
    }
}
