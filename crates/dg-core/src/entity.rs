//! Backend entities and the flat rows projected from them

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An entity as returned by a backend page load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Position of the entity inside the result set it was loaded from
    pub position: usize,

    /// Primary key, when the backend exposes one
    pub key: Option<String>,

    /// Attribute values; related entities are nested objects
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Create an entity from a JSON object
    pub fn new(position: usize, fields: Map<String, Value>) -> Self {
        Self {
            position,
            key: None,
            fields,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Read a field by path; `employer.name` descends into related objects
    pub fn field(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// A flat grid row keyed by column title
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: IndexMap<String, Value>,

    /// The entity this row was projected from
    pub entity: Entity,
}

impl Row {
    pub fn get(&self, title: &str) -> Option<&Value> {
        self.values.get(title)
    }

    /// Serialize the visible values as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
