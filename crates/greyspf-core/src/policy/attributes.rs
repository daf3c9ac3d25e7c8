//! Policy request attributes
//!
//! The mail transfer agent sends one `name=value` attribute per line and ends
//! each request with an empty line.

use greyspf_common::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, warn};

/// Returned when a request lacks an attribute
pub const UNKNOWN: &str = "<UNKNOWN>";

/// Attributes whose value casing is meaningful and kept as sent
pub const PRESERVED_KEYS: [&str; 3] = ["protocol_state", "protocol_name", "queue_id"];

const LINE_PATTERN: &str = r"^\s*([^=\s]+)\s*=(.*)$";

/// Attributes of one policy request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRecord {
    attributes: HashMap<String, String>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, or [`UNKNOWN`] when absent
    pub fn get(&self, key: &str) -> &str {
        self.get_opt(key).unwrap_or(UNKNOWN)
    }

    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Instance token correlating retries of one transaction
    pub fn instance(&self) -> Option<&str> {
        self.get_opt("instance").filter(|s| !s.is_empty())
    }

    /// Connecting client address, if present and well formed
    pub fn client_address(&self) -> Option<IpAddr> {
        self.get_opt("client_address")?.parse().ok()
    }
}

/// Parser for attribute lines
pub struct AttributeParser {
    line_re: Regex,
}

impl AttributeParser {
    pub fn new() -> Self {
        Self {
            line_re: Regex::new(LINE_PATTERN).expect("attribute line pattern is valid"),
        }
    }

    /// Split one line into its name and normalized value.
    ///
    /// Values are lower-cased unless the name is one of [`PRESERVED_KEYS`].
    pub fn split_line(&self, line: &str) -> Result<(String, String)> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let caps = self
            .line_re
            .captures(trimmed)
            .ok_or_else(|| Error::Parse(trimmed.to_string()))?;

        let key = &caps[1];
        let value = &caps[2];
        let value = if PRESERVED_KEYS.contains(&key) {
            value.to_string()
        } else {
            value.to_lowercase()
        };

        Ok((key.to_string(), value))
    }

    /// Parse one line into `record`. The record is untouched on failure.
    pub fn parse_line(&self, line: &str, record: &mut AttributeRecord) -> Result<()> {
        let (key, value) = self.split_line(line)?;
        record.insert(key, value);
        Ok(())
    }
}

impl Default for AttributeParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads whole requests from a line stream
pub struct RequestReader<R> {
    lines: Lines<R>,
    parser: AttributeParser,
}

impl<R: AsyncBufRead + Unpin> RequestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            parser: AttributeParser::new(),
        }
    }

    /// Next request, or `None` at end of input.
    ///
    /// A malformed line fails only its own request: the remaining lines up to
    /// the terminating empty line are consumed and the first parse error is
    /// returned. Trailing lines without a terminator are discarded.
    pub async fn next_request(&mut self) -> Result<Option<AttributeRecord>> {
        let mut record = AttributeRecord::new();
        let mut failure: Option<Error> = None;
        let mut pending = false;

        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::Internal(format!("Failed to read request: {}", e)))?;

            let Some(line) = line else {
                if pending {
                    warn!(attributes = record.len(), "Input ended inside a request");
                }
                return Ok(None);
            };

            if line.trim().is_empty() {
                if !pending {
                    continue;
                }
                return match failure {
                    Some(e) => Err(e),
                    None => {
                        debug!(attributes = record.len(), "Read policy request");
                        Ok(Some(record))
                    }
                };
            }

            pending = true;
            if failure.is_none() {
                if let Err(e) = self.parser.parse_line(&line, &mut record) {
                    failure = Some(e);
                }
            }
        }
    }
}
