//! Case-insensitive configuration map
//!
//! Scalar settings live in a TOML table keyed by the lower-cased setting
//! name. The two whitelist keys are not stored there: each resolves to a
//! [`NetworkRangeList`] built on first use.

use greyspf_common::config::{read_source, DatabaseSettings};
use greyspf_common::{Error, NetworkRange, Result, Verbosity};
use greyspf_storage::WhitelistStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use toml::{Table, Value};
use tracing::{debug, info};

use super::defaults::default_settings;
use crate::whitelist::{trusted_ranges, NetworkRangeList, Whitelist};

const DEBUG_LEVEL_KEY: &str = "debuglevel";
const CHECKERS_KEY: &str = "checkers";

/// A configuration value as yielded by iteration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEntry {
    Scalar(Value),
    Whitelist(Vec<NetworkRange>),
}

/// Process configuration: scalar settings plus the two persisted whitelists
pub struct ConfigurationMap {
    scalars: Table,
    store: Option<Arc<dyn WhitelistStore>>,
    trusted: Vec<NetworkRange>,
    seeds: HashMap<Whitelist, Vec<NetworkRange>>,
    lists: HashMap<Whitelist, NetworkRangeList>,
    verbosity: Verbosity,
}

impl ConfigurationMap {
    /// Build a map holding the default settings.
    ///
    /// The whitelists need a store, attached once the database settings are
    /// known (see [`ConfigurationMap::attach_store`]).
    pub fn new() -> Result<Self> {
        let mut map = Self {
            scalars: Table::new(),
            store: None,
            trusted: trusted_ranges()?,
            seeds: HashMap::new(),
            lists: HashMap::new(),
            verbosity: Verbosity::default(),
        };
        map.update(default_settings())?;
        Ok(map)
    }

    /// Defaults overlaid with caller-supplied values
    pub fn with_overrides(overrides: Table) -> Result<Self> {
        let mut map = Self::new()?;
        map.update(overrides)?;
        Ok(map)
    }

    /// Defaults, then `overrides`, then the configuration source at `path`.
    ///
    /// Any failure is a configuration error naming the file.
    pub fn load(path: &Path, overrides: Table) -> Result<Self> {
        let mut map = Self::with_overrides(overrides)?;
        let source = read_source(path)?;
        map.update(source).map_err(|e| {
            Error::Config(format!(
                "Error reading config file \"{}\": {}",
                path.display(),
                e
            ))
        })?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(map)
    }

    /// Back the whitelists with `store`. Lists built against a previous
    /// store are dropped.
    pub fn attach_store(&mut self, store: Arc<dyn WhitelistStore>) {
        self.store = Some(store);
        self.lists.clear();
    }

    pub fn with_store(mut self, store: Arc<dyn WhitelistStore>) -> Self {
        self.attach_store(store);
        self
    }

    /// Apply every entry of `table`, in table order
    pub fn update(&mut self, table: Table) -> Result<()> {
        for (key, value) in table {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Set one value.
    ///
    /// `debugLevel` must be an integer and updates the verbosity. `checkers`
    /// is normalized to stripped, lower-cased names. A whitelist key takes a
    /// list of ranges that are added to the seeds written on its first load.
    /// Setting it after the list has loaded drops the list, so the next
    /// access loads it again and writes any seeds the store lacks.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let key = key.to_lowercase();

        if let Some(which) = Whitelist::from_key(&key) {
            return self.set_whitelist_seeds(which, &value);
        }

        let value = match key.as_str() {
            DEBUG_LEVEL_KEY => {
                let level = value.as_integer().ok_or_else(|| {
                    Error::Config(format!("debugLevel must be an integer, got {}", value))
                })?;
                self.verbosity = Verbosity::from_setting(level);
                value
            }
            CHECKERS_KEY => normalize_checkers(&value)?,
            _ => value,
        };

        if self.verbosity.allows(4) {
            debug!(key = %key, value = %value, "Setting configuration value");
        }
        self.scalars.insert(key, value);
        Ok(())
    }

    fn set_whitelist_seeds(&mut self, which: Whitelist, value: &Value) -> Result<()> {
        let items = match value {
            Value::Array(_) => value.clone(),
            Value::String(_) => Value::Array(vec![value.clone()]),
            other => {
                return Err(Error::Config(format!(
                    "{} must be a list of network ranges, got {}",
                    which.key(),
                    other.type_str()
                )))
            }
        };
        let ranges: Vec<NetworkRange> = items
            .try_into()
            .map_err(|e| Error::Config(format!("{}: {}", which.key(), e)))?;

        let seeds = self.seeds.entry(which).or_default();
        for range in ranges {
            if !seeds.contains(&range) {
                seeds.push(range);
            }
        }
        // Rebuilt on next access so the new seeds take part in its first load.
        self.lists.remove(&which);
        Ok(())
    }

    /// Scalar value for a key, ignoring case. Whitelist keys have none.
    pub fn get_scalar(&self, key: &str) -> Option<&Value> {
        self.scalars.get(&key.to_lowercase())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_scalar(key).and_then(Value::as_str)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get_scalar(key).and_then(Value::as_integer)
    }

    /// Float value; integers are widened
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get_scalar(key)? {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_scalar(key).and_then(Value::as_bool)
    }

    /// Enabled checker names, normalized
    pub fn checkers(&self) -> Vec<String> {
        match self.scalars.get(CHECKERS_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Whitelist keys are always present
    pub fn contains_key(&self, key: &str) -> bool {
        Whitelist::from_key(key).is_some() || self.scalars.contains_key(&key.to_lowercase())
    }

    /// Remove a key. For a whitelist key only the in-memory list is dropped;
    /// the stored ranges stay.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if let Some(which) = Whitelist::from_key(key) {
            self.lists.remove(&which);
            return None;
        }
        self.scalars.remove(&key.to_lowercase())
    }

    /// The list behind a whitelist key, created on first use.
    ///
    /// Creation does no I/O; the list loads itself when first read. Fails
    /// only when no store is attached.
    pub fn whitelist(&mut self, which: Whitelist) -> Result<&mut NetworkRangeList> {
        let store = self.store.as_ref().ok_or_else(|| {
            Error::Internal(format!("no store attached for {}", which.key()))
        })?;
        let trusted = &self.trusted;
        let seeds = &self.seeds;
        Ok(self.lists.entry(which).or_insert_with(|| {
            let mut defaults = trusted.clone();
            for range in seeds.get(&which).into_iter().flatten() {
                if !defaults.contains(range) {
                    defaults.push(*range);
                }
            }
            NetworkRangeList::new(store.clone(), which.collection(), Some(defaults))
        }))
    }

    pub fn spf_whitelist(&mut self) -> Result<&mut NetworkRangeList> {
        self.whitelist(Whitelist::Spf)
    }

    pub fn greylist_whitelist(&mut self) -> Result<&mut NetworkRangeList> {
        self.whitelist(Whitelist::Greylist)
    }

    /// Every scalar key, then the whitelist keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let reserved: [&str; 2] = [Whitelist::Spf.key(), Whitelist::Greylist.key()];
        self.scalars.keys().map(String::as_str).chain(reserved)
    }

    /// Number of keys, whitelist keys included
    pub fn len(&self) -> usize {
        self.scalars.len() + Whitelist::ALL.len()
    }

    /// Never empty: the whitelist keys are always present
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every key with its value. Loads both whitelists.
    pub async fn entries(&mut self) -> Result<Vec<(String, ConfigEntry)>> {
        let mut entries: Vec<(String, ConfigEntry)> = self
            .scalars
            .iter()
            .map(|(k, v)| (k.clone(), ConfigEntry::Scalar(v.clone())))
            .collect();

        for which in Whitelist::ALL {
            let ranges = self.whitelist(which)?.ranges().await?.to_vec();
            entries.push((which.key().to_string(), ConfigEntry::Whitelist(ranges)));
        }
        Ok(entries)
    }

    /// The scalar settings table
    pub fn scalars(&self) -> &Table {
        &self.scalars
    }

    pub fn database_settings(&self) -> Result<DatabaseSettings> {
        DatabaseSettings::from_table(&self.scalars)
    }
}

fn normalize_checkers(value: &Value) -> Result<Value> {
    let names: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_lowercase())
                    .ok_or_else(|| Error::Config(format!("checkers entries must be strings, got {}", item)))
            })
            .collect::<Result<_>>()?,
        Value::String(s) => s
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect(),
        other => {
            return Err(Error::Config(format!(
                "checkers must be a list of names, got {}",
                other.type_str()
            )))
        }
    };

    Ok(Value::Array(names.into_iter().map(Value::String).collect()))
}
