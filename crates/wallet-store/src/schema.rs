//! The closed set of record keys a wallet file may hold.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::error::{Result, StoreError};

pub const MNEMONIC: &str = "MNEMONIC";
pub const XPRIV: &str = "XPRIV";
pub const XPUB: &str = "XPUB";
pub const PATH: &str = "PATH";
pub const GAP_LIMIT: &str = "GAP_LIMIT";
pub const SEGWIT: &str = "SEGWIT";
pub const ADDRESSES_RECEIVING: &str = "ADDRESSES_RECEIVING";
pub const ADDRESSES_CHANGE: &str = "ADDRESSES_CHANGE";
pub const ADDRESSES_USED: &str = "ADDRESSES_USED";
pub const ADDRESS_BALS: &str = "ADDRESS_BALS";
pub const TXNS: &str = "TXNS";
pub const PRICE: &str = "PRICE";
pub const WALLET_BAL: &str = "WALLET_BAL";
pub const UNSPENT_OUTS: &str = "UNSPENT_OUTS";
pub const PASSWORD_HASH: &str = "PASSWORD_HASH";
pub const ADDRESS_WIF_KEYS: &str = "ADDRESS_WIF_KEYS";

/// Keys whose values are sealed on their own before the whole record is
/// encrypted.
pub const SENSITIVE_KEYS: [&str; 3] = [MNEMONIC, XPRIV, ADDRESS_WIF_KEYS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    /// Any JSON number, integer or float.
    Number,
    Boolean,
    List,
    Map,
}

impl ValueKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::Text => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::List => value.is_array(),
            ValueKind::Map => value.is_object(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaEntry {
    pub key: &'static str,
    pub kind: ValueKind,
    default: fn() -> Value,
}

impl SchemaEntry {
    const fn new(key: &'static str, kind: ValueKind, default: fn() -> Value) -> Self {
        Self { key, kind, default }
    }

    pub fn default_value(&self) -> Value {
        (self.default)()
    }

    pub fn is_sensitive(&self) -> bool {
        is_sensitive(self.key)
    }
}

/// Template order is the order keys appear in a freshly initialised record.
pub static TEMPLATE: [SchemaEntry; 16] = [
    SchemaEntry::new(MNEMONIC, ValueKind::Text, || json!("")),
    SchemaEntry::new(XPRIV, ValueKind::Text, || json!("")),
    SchemaEntry::new(XPUB, ValueKind::Text, || json!("")),
    SchemaEntry::new(PATH, ValueKind::Text, || json!("")),
    SchemaEntry::new(GAP_LIMIT, ValueKind::Integer, || json!(0)),
    SchemaEntry::new(SEGWIT, ValueKind::Boolean, || json!(false)),
    SchemaEntry::new(ADDRESSES_RECEIVING, ValueKind::List, || json!([])),
    SchemaEntry::new(ADDRESSES_CHANGE, ValueKind::List, || json!([])),
    SchemaEntry::new(ADDRESSES_USED, ValueKind::List, || json!([])),
    SchemaEntry::new(ADDRESS_BALS, ValueKind::Map, || json!({})),
    SchemaEntry::new(TXNS, ValueKind::List, || json!([])),
    SchemaEntry::new(PRICE, ValueKind::Number, || json!(0.0)),
    SchemaEntry::new(WALLET_BAL, ValueKind::List, || json!([])),
    SchemaEntry::new(UNSPENT_OUTS, ValueKind::List, || json!([])),
    SchemaEntry::new(PASSWORD_HASH, ValueKind::Text, || json!("")),
    SchemaEntry::new(ADDRESS_WIF_KEYS, ValueKind::Map, || json!({})),
];

pub fn entry(key: &str) -> Option<&'static SchemaEntry> {
    TEMPLATE.iter().find(|e| e.key == key)
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    TEMPLATE.iter().map(|e| e.key)
}

pub fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.contains(&key)
}

/// The record every new wallet file starts from, in template order.
/// Sensitive values are still plaintext here.
pub fn default_record() -> Map<String, Value> {
    TEMPLATE
        .iter()
        .map(|e| (e.key.to_string(), e.default_value()))
        .collect()
}

/// Check one key/value pair against the template.
///
/// Keys outside the template are rejected unless `allow_new_key` is set, in
/// which case they are accepted with any value type.
pub fn validate(key: &str, value: &Value, allow_new_key: bool) -> Result<()> {
    let Some(entry) = entry(key) else {
        if allow_new_key {
            return Ok(());
        }
        return Err(StoreError::UnknownKey(key.to_string()));
    };
    if !entry.kind.matches(value) {
        return Err(StoreError::TypeMismatch {
            key: key.to_string(),
            expected: entry.kind,
            found: json_type_name(value),
        });
    }
    Ok(())
}
