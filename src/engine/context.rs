// ABOUTME: Per-target execution context and input merging
// ABOUTME: Carries the variable map and shared services through one target's pipeline

use std::collections::HashMap;

use super::cache::StepCache;
use super::http::HttpRequester;
use crate::parser::Template;
use crate::processor::Variables;
use crate::settings::{metric_key, InstanceConfig};

/// Substituted for empty inputs when previewing labels.
pub const AUTO_PLACEHOLDER: &str = "Auto";

/// Everything one target's pipeline reads and writes.
pub struct TargetContext<'a> {
    pub instance_id: &'a str,
    pub template: &'a Template,
    pub key_suffix: String,
    pub variables: Variables,
    pub http: &'a HttpRequester,
    pub cache: &'a StepCache,
}

impl<'a> TargetContext<'a> {
    pub fn new(
        instance_id: &'a str,
        template: &'a Template,
        key_suffix: String,
        variables: Variables,
        http: &'a HttpRequester,
        cache: &'a StepCache,
    ) -> Self {
        Self {
            instance_id,
            template,
            key_suffix,
            variables,
            http,
            cache,
        }
    }

    /// Live value key for one of the template's outputs.
    pub fn metric_key(&self, output_key: &str) -> String {
        metric_key(self.instance_id, &self.key_suffix, output_key)
    }

    /// Key under which the raw body of an `api_text` execution is published.
    pub fn raw_key(&self) -> String {
        format!("{}{}", self.instance_id, self.key_suffix)
    }

    pub fn cache_key(&self, step_id: &str) -> String {
        StepCache::key(self.instance_id, &self.key_suffix, step_id)
    }
}

/// Merge inputs with priority: template default < instance value < target override.
pub fn merge_inputs(
    template: &Template,
    instance: &InstanceConfig,
    target: &HashMap<String, String>,
) -> Variables {
    let mut merged = instance.input_values.clone();
    merged.extend(target.iter().map(|(k, v)| (k.clone(), v.clone())));

    for input in &template.inputs {
        merged
            .entry(input.key.clone())
            .or_insert_with(|| input.default_value.clone());
    }

    merged
}

/// Merged inputs with every empty declared input replaced by [`AUTO_PLACEHOLDER`].
pub fn label_preview_inputs(
    template: &Template,
    instance: &InstanceConfig,
    target: &HashMap<String, String>,
) -> Variables {
    let mut merged = merge_inputs(template, instance, target);
    for input in &template.inputs {
        if let Some(value) = merged.get_mut(&input.key) {
            if value.is_empty() {
                *value = AUTO_PLACEHOLDER.to_string();
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template::from_json(
            r#"{
                "Id": "weather",
                "Inputs": [
                    { "Key": "city", "DefaultValue": "" },
                    { "Key": "units", "DefaultValue": "metric" },
                    { "Key": "lang", "DefaultValue": "en" }
                ],
                "Execution": { "Type": "api_json" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_merge_priority() {
        let template = template();
        let mut instance = InstanceConfig::new("w", "weather");
        instance
            .input_values
            .insert("units".to_string(), "imperial".to_string());
        instance
            .input_values
            .insert("lang".to_string(), "de".to_string());
        let target = HashMap::from([("lang".to_string(), "fr".to_string())]);

        let merged = merge_inputs(&template, &instance, &target);

        assert_eq!(merged["city"], "");
        assert_eq!(merged["units"], "imperial");
        assert_eq!(merged["lang"], "fr");
    }

    #[test]
    fn test_undeclared_instance_values_kept() {
        let template = template();
        let mut instance = InstanceConfig::new("w", "weather");
        instance
            .input_values
            .insert("extra".to_string(), "1".to_string());

        let merged = merge_inputs(&template, &instance, &HashMap::new());
        assert_eq!(merged["extra"], "1");
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_label_preview_fills_empty_inputs() {
        let template = template();
        let mut instance = InstanceConfig::new("w", "weather");
        instance
            .input_values
            .insert("units".to_string(), String::new());

        let preview = label_preview_inputs(&template, &instance, &HashMap::new());
        assert_eq!(preview["city"], AUTO_PLACEHOLDER);
        assert_eq!(preview["units"], AUTO_PLACEHOLDER);
        assert_eq!(preview["lang"], "en");
    }
}
