// ABOUTME: MetricSink contract and the in-memory metric registry
// ABOUTME: Holds the latest displayable value per dotted key

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Publish-or-replace surface for live metric values. Never fails.
pub trait MetricSink: Send + Sync {
    fn inject_value(&self, key: &str, value: &str);
}

/// Thread-safe registry of the latest value per key.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    values: RwLock<HashMap<String, String>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Sorted copy of every key and value.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl MetricSink for MetricRegistry {
    fn inject_value(&self, key: &str, value: &str) {
        trace!("inject {} = {}", key, value);
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
    }
}
