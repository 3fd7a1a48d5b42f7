//! Data model schemas contributed by modules.
//!
//! Several modules may describe the same model. Their schemas are merged
//! recursively: nested objects combine key by key, anything else is
//! replaced by the later contribution.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// A named schema, as staged by a module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub name: String,
    pub schema: Value,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Merged model schemas, by name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    schemas: RwLock<HashMap<String, Value>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `def`, folding it into any schema already registered under the
    /// same name.
    pub fn merge(&self, def: ModelDefinition) {
        let mut schemas = self.schemas.write();
        match schemas.get_mut(&def.name) {
            Some(existing) => {
                merge_values(existing, def.schema);
                debug!(model = %def.name, "Merged model schema");
            }
            None => {
                schemas.insert(def.name, def.schema);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.schemas.read().get(name).cloned()
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

fn merge_values(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
