//! JSON inputs: marginals `{ "x<i>": p }` and entities `{ "x<i>": 0 | 1 }`.
//!
//! Documents are read into a [`serde_json::Value`] tree and validated by hand,
//! so every rejection names the offending feature.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::attribution::{parse_feature, validate_entity, validate_marginal};
use crate::error::{Error, Result};

fn object(text: &str, what: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "{} must be a JSON object, got {}",
            what,
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses a marginals document.
pub fn parse_marginals(text: &str) -> Result<BTreeMap<String, f64>> {
    let mut marginals = BTreeMap::new();
    for (name, value) in object(text, "marginals")? {
        parse_feature(&name)?;
        let p = value.as_f64().ok_or_else(|| {
            Error::InvalidInput(format!("marginal of '{}' must be a number, got {}", name, kind(&value)))
        })?;
        validate_marginal(&name, p)?;
        marginals.insert(name, p);
    }
    Ok(marginals)
}

/// Parses an entity document. Values may be `0`/`1` or `false`/`true`.
pub fn parse_entity(text: &str) -> Result<BTreeMap<String, u8>> {
    let mut entity = BTreeMap::new();
    for (name, value) in object(text, "entity")? {
        parse_feature(&name)?;
        let bit = match &value {
            Value::Bool(b) => *b as u8,
            Value::Number(n) => {
                let raw = n.as_u64().ok_or_else(|| {
                    Error::InvalidInput(format!("entity value of '{}' must be 0 or 1, got {}", name, n))
                })?;
                let raw = u8::try_from(raw).map_err(|_| {
                    Error::InvalidInput(format!("entity value of '{}' must be 0 or 1, got {}", name, raw))
                })?;
                validate_entity(&name, raw)?;
                raw
            }
            other => {
                return Err(Error::InvalidInput(format!(
                    "entity value of '{}' must be 0 or 1, got {}",
                    name,
                    kind(other)
                )))
            }
        };
        entity.insert(name, bit);
    }
    Ok(entity)
}

pub fn load_marginals(path: impl AsRef<Path>) -> Result<BTreeMap<String, f64>> {
    parse_marginals(&fs::read_to_string(path)?)
}

pub fn load_entity(path: impl AsRef<Path>) -> Result<BTreeMap<String, u8>> {
    parse_entity(&fs::read_to_string(path)?)
}
