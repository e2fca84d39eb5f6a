// ABOUTME: Ordered variable transforms applied after extraction
// ABOUTME: Implements regex_replace and map; failures leave the value unchanged

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::Variables;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transform {
    pub function: TransformFunction,
    /// Defaults to `target_var` when unset or empty.
    #[serde(default)]
    pub source_var: Option<String>,
    pub target_var: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub map: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFunction {
    RegexReplace,
    Map,
    /// Unrecognised function names copy the source value unchanged.
    #[serde(other)]
    Passthrough,
}

impl Transform {
    pub fn source(&self) -> &str {
        match self.source_var.as_deref() {
            Some(source) if !source.is_empty() => source,
            _ => &self.target_var,
        }
    }

    fn apply(&self, value: String) -> String {
        match self.function {
            TransformFunction::RegexReplace => match Regex::new(&self.pattern) {
                Ok(re) => re.replace_all(&value, self.to.as_str()).into_owned(),
                Err(e) => {
                    warn!("Invalid regex pattern '{}': {}", self.pattern, e);
                    value
                }
            },
            TransformFunction::Map => match self.map.get(&value) {
                Some(mapped) => mapped.clone(),
                None => value,
            },
            TransformFunction::Passthrough => value,
        }
    }
}

/// Apply `transforms` in declared order, writing each result into its target variable.
pub fn apply_transforms(transforms: &[Transform], context: &mut Variables) {
    for transform in transforms {
        let Some(value) = context.get(transform.source()).cloned() else {
            debug!(
                "Skipping transform into '{}': source '{}' not set",
                transform.target_var,
                transform.source()
            );
            continue;
        };

        let result = transform.apply(value);
        context.insert(transform.target_var.clone(), result);
    }
}
