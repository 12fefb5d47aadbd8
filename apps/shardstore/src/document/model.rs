//! Document and change types
//!
//! Wire format (JSON):
//! ```text
//! {"key":"Africa/y","collection":"Customers","fields":{"Name":"Customer 1","Region":"Africa"}}
//! {"method":"PUT","document":{...}}
//! {"method":"DELETE","key":"Africa/y"}
//! ```

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within its shard
    pub key: String,
    /// Logical collection type, e.g. `Customers`
    pub collection: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(key: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            collection: collection.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build a document from any serde entity.
    ///
    /// The entity must serialize to a JSON object; its members become the
    /// document fields.
    pub fn from_entity<T: Serialize>(
        collection: impl Into<String>,
        key: impl Into<String>,
        entity: &T,
    ) -> Result<Self, StoreError> {
        let key = key.into();
        let value = serde_json::to_value(entity).map_err(|source| StoreError::Serialization {
            key: key.clone(),
            source,
        })?;

        match value {
            Value::Object(fields) => Ok(Self {
                key,
                collection: collection.into(),
                fields,
            }),
            other => Err(StoreError::InvalidDocument {
                key,
                reason: format!("entity serialized to {}, expected an object", json_kind(&other)),
            }),
        }
    }

    /// Deserialize the fields back into an entity
    pub fn to_entity<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|source| {
            StoreError::Serialization {
                key: self.key.clone(),
                source,
            }
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String value of a field; `None` when absent or not a string
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One entry of a write batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum Change {
    Put { document: Document },
    Delete { key: String },
}

impl Change {
    pub fn key(&self) -> &str {
        match self {
            Change::Put { document } => &document.key,
            Change::Delete { key } => key,
        }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, Change::Put { .. })
    }
}
