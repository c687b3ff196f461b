// Store-native identifiers: 24-hex-char object ids
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CrudError;

/// A 24-hex-character document id, the store-native primary key format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a fresh id from 12 bytes of UUID entropy.
    pub fn new() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let mut hex = String::with_capacity(24);
        for b in &bytes[..12] {
            hex.push_str(&format!("{b:02x}"));
        }
        ObjectId(hex)
    }

    /// Check whether a string has the object-id shape.
    pub fn is_valid(s: &str) -> bool {
        s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Check whether a JSON value has the object-id shape.
    pub fn value_is_object_id(value: &Value) -> bool {
        matches!(value, Value::String(s) if Self::is_valid(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(ObjectId(s.to_string()))
        } else {
            Err(CrudError::validation(format!(
                "'{s}' is not a valid object id (expected 24 hex characters)"
            )))
        }
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::String(id.0)
    }
}

/// JSON-Schema fragment describing the object-id shape. Usable as the
/// `identifier.schema` in entity metadata.
pub fn object_id_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "pattern": "^[0-9a-fA-F]{24}$"
    })
}
