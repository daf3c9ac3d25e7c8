//! Common types for greyspf

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::{Error, Result};

/// Address family tag stored next to every range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Numeric tag used at rest
    pub fn tag(self) -> i16 {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 6,
        }
    }

    /// Parse the numeric tag used at rest
    pub fn from_tag(tag: i16) -> Option<Self> {
        match tag {
            4 => Some(AddressFamily::V4),
            6 => Some(AddressFamily::V6),
            _ => None,
        }
    }
}

/// A network range (address plus prefix length).
///
/// The address never has host bits set: `10.0.0.1/8` is rejected rather than
/// silently widened, so two ranges compare equal exactly when they cover the
/// same addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct NetworkRange(IpNet);

impl NetworkRange {
    /// Wrap a network, rejecting one with host bits set
    pub fn new(net: IpNet) -> Result<Self> {
        if net.trunc() != net {
            return Err(Error::Validation(format!("{} has host bits set", net)));
        }
        Ok(Self(net))
    }

    /// Rebuild a range from its canonical integer form
    pub fn from_parts(family: AddressFamily, network: u128, prefix_len: u8) -> Result<Self> {
        let net = match family {
            AddressFamily::V4 => {
                let bits = u32::try_from(network).map_err(|_| {
                    Error::Validation(format!("{} does not fit an IPv4 address", network))
                })?;
                Ipv4Net::new(Ipv4Addr::from(bits), prefix_len)
                    .map(IpNet::V4)
                    .map_err(|e| Error::Validation(e.to_string()))?
            }
            AddressFamily::V6 => Ipv6Net::new(Ipv6Addr::from(network), prefix_len)
                .map(IpNet::V6)
                .map_err(|e| Error::Validation(e.to_string()))?,
        };
        Self::new(net)
    }

    pub fn family(&self) -> AddressFamily {
        match self.0 {
            IpNet::V4(_) => AddressFamily::V4,
            IpNet::V6(_) => AddressFamily::V6,
        }
    }

    /// Network address as an integer (IPv4 addresses occupy the low 32 bits)
    pub fn network_value(&self) -> u128 {
        match self.0 {
            IpNet::V4(net) => u128::from(u32::from(net.network())),
            IpNet::V6(net) => u128::from(net.network()),
        }
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    pub fn as_ipnet(&self) -> &IpNet {
        &self.0
    }

    /// Whether the address falls inside this range.
    ///
    /// IPv4 addresses also match IPv4-mapped IPv6 ranges and the other way
    /// round, so `::ffff:127.0.0.1` is covered by `127.0.0.0/8`.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (&self.0, addr) {
            (IpNet::V4(net), IpAddr::V4(ip)) => net.contains(ip),
            (IpNet::V6(net), IpAddr::V6(ip)) => net.contains(ip),
            (IpNet::V6(net), IpAddr::V4(ip)) => net.contains(&ip.to_ipv6_mapped()),
            (IpNet::V4(net), IpAddr::V6(ip)) => ip
                .to_ipv4_mapped()
                .map(|mapped| net.contains(&mapped))
                .unwrap_or(false),
        }
    }
}

impl FromStr for NetworkRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let net = if s.contains('/') {
            s.parse::<IpNet>()
                .map_err(|e| Error::Validation(format!("invalid network range '{}': {}", s, e)))?
        } else {
            s.parse::<IpAddr>()
                .map(IpNet::from)
                .map_err(|e| Error::Validation(format!("invalid network range '{}': {}", s, e)))?
        };
        Self::new(net)
    }
}

impl TryFrom<String> for NetworkRange {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for NetworkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Diagnostic verbosity, taken from the `debugLevel` setting.
///
/// Level 0 logs only operational messages; higher levels unlock more detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(u8);

impl Verbosity {
    pub fn new(level: u8) -> Self {
        Self(level)
    }

    /// Build from a configured integer, clamping out-of-range values
    pub fn from_setting(level: i64) -> Self {
        Self(level.clamp(0, i64::from(u8::MAX)) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Whether a message tagged with `level` should be emitted
    pub fn allows(self, level: u8) -> bool {
        self.0 >= level
    }

    /// Default `tracing` filter directive for this verbosity
    pub fn filter_directive(self) -> &'static str {
        match self.0 {
            0 => "info",
            1 | 2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_network_range() {
        let range: NetworkRange = "127.0.0.0/8".parse().unwrap();
        assert_eq!(range.family(), AddressFamily::V4);
        assert_eq!(range.prefix_len(), 8);
        assert_eq!(range.network_value(), 0x7f00_0000);
        assert_eq!(range.to_string(), "127.0.0.0/8");

        let mapped: NetworkRange = "::ffff:127.0.0.0/104".parse().unwrap();
        assert_eq!(mapped.family(), AddressFamily::V6);
        assert_eq!(mapped.to_string(), "::ffff:127.0.0.0/104");
    }

    #[test]
    fn test_bare_address_is_host_range() {
        let range: NetworkRange = "192.0.2.7".parse().unwrap();
        assert_eq!(range.to_string(), "192.0.2.7/32");

        let range: NetworkRange = "::1".parse().unwrap();
        assert_eq!(range.to_string(), "::1/128");
    }

    #[test]
    fn test_host_bits_rejected() {
        assert!("10.0.0.1/8".parse::<NetworkRange>().is_err());
        assert!("not-a-range".parse::<NetworkRange>().is_err());
    }

    #[test]
    fn test_canonical_parts_round_trip() {
        for text in ["10.0.0.0/8", "::1/128", "2001:db8::/32"] {
            let range: NetworkRange = text.parse().unwrap();
            let rebuilt = NetworkRange::from_parts(
                range.family(),
                range.network_value(),
                range.prefix_len(),
            )
            .unwrap();
            assert_eq!(rebuilt, range);
        }
    }

    #[test]
    fn test_from_parts_rejects_bad_values() {
        assert!(NetworkRange::from_parts(AddressFamily::V4, 1u128 << 40, 8).is_err());
        assert!(NetworkRange::from_parts(AddressFamily::V4, 0, 33).is_err());
        assert!(NetworkRange::from_parts(AddressFamily::V4, 0x0a00_0001, 8).is_err());
    }

    #[test]
    fn test_contains_across_families() {
        let v4: NetworkRange = "127.0.0.0/8".parse().unwrap();
        let mapped: NetworkRange = "::ffff:127.0.0.0/104".parse().unwrap();

        let plain: IpAddr = "127.0.0.1".parse().unwrap();
        let as_v6: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        let outside: IpAddr = "192.0.2.1".parse().unwrap();

        assert!(v4.contains(&plain));
        assert!(v4.contains(&as_v6));
        assert!(mapped.contains(&plain));
        assert!(mapped.contains(&as_v6));
        assert!(!v4.contains(&outside));
        assert!(!mapped.contains(&outside));
    }

    #[test]
    fn test_family_tags() {
        assert_eq!(AddressFamily::from_tag(AddressFamily::V4.tag()), Some(AddressFamily::V4));
        assert_eq!(AddressFamily::from_tag(AddressFamily::V6.tag()), Some(AddressFamily::V6));
        assert_eq!(AddressFamily::from_tag(5), None);
    }

    #[test]
    fn test_deserialize_from_strings() {
        let value = toml::Value::Array(vec![
            toml::Value::String("10.0.0.0/8".to_string()),
            toml::Value::String("2001:db8::1".to_string()),
        ]);
        let ranges: Vec<NetworkRange> = value.try_into().unwrap();
        assert_eq!(
            ranges,
            vec![
                "10.0.0.0/8".parse::<NetworkRange>().unwrap(),
                "2001:db8::1/128".parse::<NetworkRange>().unwrap(),
            ]
        );

        let bad = toml::Value::Array(vec![toml::Value::String("10.0.0.1/8".to_string())]);
        assert!(bad.try_into::<Vec<NetworkRange>>().is_err());
    }

    #[test]
    fn test_verbosity() {
        let quiet = Verbosity::default();
        assert!(quiet.allows(0));
        assert!(!quiet.allows(1));
        assert_eq!(quiet.filter_directive(), "info");

        let loud = Verbosity::from_setting(3);
        assert!(loud.allows(3));
        assert!(!loud.allows(4));
        assert_eq!(loud.filter_directive(), "trace");

        assert_eq!(Verbosity::from_setting(-2).level(), 0);
        assert_eq!(Verbosity::from_setting(1000).level(), 255);
    }
}
