//! Database models

use greyspf_common::{AddressFamily, Error, NetworkRange, Result};
use sqlx::FromRow;

/// A whitelisted network range at rest.
///
/// All three fields together form the document key: the family tag, the
/// network address as a decimal integer, and the prefix length. Writing the
/// same range twice therefore touches the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, FromRow)]
pub struct WhitelistEntry {
    pub family: i16,
    pub network: String,
    pub prefix_len: i16,
}

impl WhitelistEntry {
    /// Turn the stored document back into a range
    pub fn to_range(&self) -> Result<NetworkRange> {
        let family = AddressFamily::from_tag(self.family)
            .ok_or_else(|| self.malformed(format!("unknown family tag {}", self.family)))?;
        let network: u128 = self
            .network
            .parse()
            .map_err(|_| self.malformed("network is not an integer".to_string()))?;
        let prefix_len = u8::try_from(self.prefix_len)
            .map_err(|_| self.malformed("prefix length out of range".to_string()))?;

        NetworkRange::from_parts(family, network, prefix_len)
            .map_err(|e| self.malformed(e.to_string()))
    }

    fn malformed(&self, reason: String) -> Error {
        Error::Storage(format!(
            "Malformed whitelist entry (family={}, network={}, prefix_len={}): {}",
            self.family, self.network, self.prefix_len, reason
        ))
    }
}

impl From<&NetworkRange> for WhitelistEntry {
    fn from(range: &NetworkRange) -> Self {
        Self {
            family: range.family().tag(),
            network: range.network_value().to_string(),
            prefix_len: i16::from(range.prefix_len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_from_range() {
        let range: NetworkRange = "127.0.0.0/8".parse().unwrap();
        let entry = WhitelistEntry::from(&range);
        assert_eq!(
            entry,
            WhitelistEntry {
                family: 4,
                network: "2130706432".to_string(),
                prefix_len: 8,
            }
        );
        assert_eq!(entry.to_range().unwrap(), range);
    }

    #[test]
    fn test_malformed_entries() {
        let bad_family = WhitelistEntry {
            family: 9,
            network: "0".to_string(),
            prefix_len: 0,
        };
        assert!(matches!(bad_family.to_range(), Err(Error::Storage(_))));

        let bad_network = WhitelistEntry {
            family: 6,
            network: "::1".to_string(),
            prefix_len: 128,
        };
        assert!(matches!(bad_network.to_range(), Err(Error::Storage(_))));

        let bad_prefix = WhitelistEntry {
            family: 4,
            network: "0".to_string(),
            prefix_len: 40,
        };
        assert!(matches!(bad_prefix.to_range(), Err(Error::Storage(_))));
    }
}
