// ABOUTME: Formatters that render a metric registry snapshot for the terminal
// ABOUTME: Supports aligned text, JSON and YAML presentations

use std::collections::BTreeMap;

use super::error::{OutputError, Result};

pub trait SnapshotFormatter: Send + Sync {
    fn format(&self, snapshot: &BTreeMap<String, String>) -> Result<String>;
}

pub struct TextFormatter;

pub struct JsonFormatter {
    pretty: bool,
}

pub struct YamlFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotFormatter for TextFormatter {
    fn format(&self, snapshot: &BTreeMap<String, String>) -> Result<String> {
        let width = snapshot.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        let mut output = String::new();
        for (key, value) in snapshot {
            output.push_str(&format!("{:<width$}  {}\n", key, value, width = width));
        }
        Ok(output)
    }
}

impl SnapshotFormatter for JsonFormatter {
    fn format(&self, snapshot: &BTreeMap<String, String>) -> Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(snapshot).map_err(OutputError::JsonError)
        } else {
            serde_json::to_string(snapshot).map_err(OutputError::JsonError)
        }
    }
}

impl SnapshotFormatter for YamlFormatter {
    fn format(&self, snapshot: &BTreeMap<String, String>) -> Result<String> {
        serde_yaml::to_string(snapshot).map_err(OutputError::YamlError)
    }
}

/// Pick a formatter by name: `text`, `json` or `yaml`.
pub fn formatter_for(format: &str) -> Result<Box<dyn SnapshotFormatter>> {
    match format.to_ascii_lowercase().as_str() {
        "text" | "table" => Ok(Box::new(TextFormatter)),
        "json" => Ok(Box::new(JsonFormatter::new_pretty())),
        "yaml" | "yml" => Ok(Box::new(YamlFormatter)),
        other => Err(OutputError::FormatterNotFound {
            format: other.to_string(),
        }),
    }
}
