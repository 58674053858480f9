//! Data shared by the pages of one workflow run.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{wlog_warn, Result};

/// JSON value map handed to a page set at construction. Clones share the map,
/// so an initializer can store what a later render reads.
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    values: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed read. A value that does not deserialize as `T` reads as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        let value = values.get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                wlog_warn!("Context value '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}
