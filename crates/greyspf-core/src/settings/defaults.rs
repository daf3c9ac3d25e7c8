//! Built-in setting values

use toml::{Table, Value};

/// Settings every installation starts from, before overrides and the
/// configuration source are applied
pub fn default_settings() -> Table {
    let mut table = Table::new();
    table.insert("debugLevel".to_string(), Value::Integer(0));
    table.insert("defaultSeedOnly".to_string(), Value::Boolean(false));
    table.insert("greylistTime".to_string(), Value::Integer(600));
    table.insert("ignoreLastByte".to_string(), Value::Boolean(true));
    table.insert("greylistByIPOnly".to_string(), Value::Boolean(false));
    table.insert("spfAcceptOnPermError".to_string(), Value::Boolean(true));
    table.insert("greylistExpireDays".to_string(), Value::Float(10.0));
    table.insert(
        "checkers".to_string(),
        Value::Array(vec![
            Value::String("spf".to_string()),
            Value::String("greylist".to_string()),
        ]),
    );
    table.insert("spfSeedOnly".to_string(), Value::Boolean(false));
    table.insert("dbHost".to_string(), Value::String("localhost".to_string()));
    table.insert("dbPort".to_string(), Value::String(String::new()));
    table.insert("databaseName".to_string(), Value::String("greyspf".to_string()));
    table.insert("instanceCacheSize".to_string(), Value::Integer(10_000));
    table
}
