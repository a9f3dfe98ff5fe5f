//! Records decoded from DynamoDB export lines
//!
//! Each line of an export holds one item in DynamoDB JSON:
//!
//! ```text
//! {"Item":{"pk":{"S":"user#1"},"age":{"N":"42"},"tags":{"SS":["a","b"]}}}
//! ```
//!
//! The `Item` wrapper and the type descriptors are matched case-insensitively,
//! so exports written by tools that lower-case keys decode the same way.

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{IngestError, Result};

/// Attribute name to typed value, as sent to the store
pub type Item = HashMap<String, AttributeValue>;

/// One decoded item, immutable once produced
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    item: Item,
}

impl Record {
    pub fn new(item: Item) -> Self {
        Self { item }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn into_item(self) -> Item {
        self.item
    }

    /// Decode one export line; `line` is the 1-based line number used in errors
    pub fn from_export_line(text: &str, line: u64) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| IngestError::decode(line, e.to_string()))?;

        let root = match value {
            Value::Object(root) => root,
            _ => return Err(IngestError::decode(line, "expected a JSON object")),
        };

        let attributes = match get_ignore_case(&root, "Item") {
            Some(Value::Object(attributes)) => attributes,
            Some(_) => return Err(IngestError::decode(line, "'Item' is not an object")),
            None => return Err(IngestError::decode(line, "missing 'Item'")),
        };

        let item = attributes
            .iter()
            .map(|(name, value)| {
                to_attribute(value)
                    .map(|attr| (name.clone(), attr))
                    .map_err(|reason| IngestError::decode(line, format!("attribute '{}': {}", name, reason)))
            })
            .collect::<Result<Item>>()?;

        Ok(Self { item })
    }
}

impl From<Item> for Record {
    fn from(item: Item) -> Self {
        Self::new(item)
    }
}

fn get_ignore_case<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
}

type Decoded<T> = std::result::Result<T, String>;

fn to_attribute(value: &Value) -> Decoded<AttributeValue> {
    let descriptor = match value {
        Value::Object(descriptor) if descriptor.len() == 1 => descriptor,
        Value::Object(_) => return Err("expected exactly one type descriptor".to_string()),
        _ => return Err("expected a type descriptor object".to_string()),
    };

    let Some((tag, inner)) = descriptor.iter().next() else {
        return Err("expected exactly one type descriptor".to_string());
    };

    match tag.to_ascii_uppercase().as_str() {
        "S" => as_str(inner).map(|s| AttributeValue::S(s.to_string())),
        "N" => as_number(inner).map(AttributeValue::N),
        "B" => as_blob(inner).map(AttributeValue::B),
        "BOOL" => inner
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| "BOOL must be a boolean".to_string()),
        "NULL" => match inner {
            Value::Bool(true) => Ok(AttributeValue::Null(true)),
            _ => Err("NULL must be true".to_string()),
        },
        "M" => match inner {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| to_attribute(v).map(|attr| (k.clone(), attr)))
                .collect::<Decoded<HashMap<_, _>>>()
                .map(AttributeValue::M),
            _ => Err("M must be an object".to_string()),
        },
        "L" => as_array(inner)?
            .iter()
            .map(to_attribute)
            .collect::<Decoded<Vec<_>>>()
            .map(AttributeValue::L),
        "SS" => as_array(inner)?
            .iter()
            .map(|v| as_str(v).map(str::to_string))
            .collect::<Decoded<Vec<_>>>()
            .map(AttributeValue::Ss),
        "NS" => as_array(inner)?
            .iter()
            .map(as_number)
            .collect::<Decoded<Vec<_>>>()
            .map(AttributeValue::Ns),
        "BS" => as_array(inner)?
            .iter()
            .map(as_blob)
            .collect::<Decoded<Vec<_>>>()
            .map(AttributeValue::Bs),
        other => Err(format!("unknown type descriptor '{}'", other)),
    }
}

fn as_str(value: &Value) -> Decoded<&str> {
    value.as_str().ok_or_else(|| "expected a string".to_string())
}

fn as_array(value: &Value) -> Decoded<&Vec<Value>> {
    value.as_array().ok_or_else(|| "expected an array".to_string())
}

// Numbers travel as strings. Bare JSON numbers are accepted too and keep their
// exact text because serde_json is built with `arbitrary_precision`.
fn as_number(value: &Value) -> Decoded<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err("expected a number".to_string()),
    }
}

fn as_blob(value: &Value) -> Decoded<Blob> {
    let encoded = as_str(value)?;
    STANDARD
        .decode(encoded)
        .map(Blob::new)
        .map_err(|e| format!("invalid base64: {}", e))
}
