// ABOUTME: Persisted settings: template instances and display metric descriptors
// ABOUTME: Also defines how metric and descriptor keys are namespaced per instance

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Prefix that places a metric descriptor in the dashboard namespace.
pub const DESCRIPTOR_PREFIX: &str = "DASH.";

fn default_true() -> bool {
    true
}

fn default_sort_index() -> i32 {
    -1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub plugin_instances: Vec<InstanceConfig>,
    #[serde(default)]
    pub monitor_items: Vec<MonitorItemConfig>,
}

/// A schedulable activation of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceConfig {
    pub id: String,
    pub template_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub input_values: HashMap<String, String>,
    #[serde(default)]
    pub targets: Vec<HashMap<String, String>>,
    /// Milliseconds; zero uses the template interval.
    #[serde(default)]
    pub custom_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MonitorItemConfig {
    pub key: String,
    #[serde(default)]
    pub user_label: String,
    #[serde(default)]
    pub taskbar_label: String,
    #[serde(default)]
    pub unit_panel: String,
    #[serde(default = "default_true")]
    pub visible_in_panel: bool,
    #[serde(default = "default_sort_index")]
    pub sort_index: i32,
}

impl InstanceConfig {
    pub fn new(id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            enabled: true,
            input_values: HashMap::new(),
            targets: Vec::new(),
            custom_interval: 0,
        }
    }

    /// Targets to execute: the configured list, or one empty default target.
    pub fn effective_targets(&self) -> Vec<HashMap<String, String>> {
        if self.targets.is_empty() {
            vec![HashMap::new()]
        } else {
            self.targets.clone()
        }
    }

    /// `.N` when explicit targets exist, empty otherwise.
    pub fn key_suffix(&self, index: usize) -> String {
        if self.targets.is_empty() {
            String::new()
        } else {
            format!(".{}", index)
        }
    }

    /// Custom interval when set, else the template's; never below `floor`.
    pub fn effective_interval(&self, template_interval: Duration, floor: Duration) -> Duration {
        let interval = if self.custom_interval > 0 {
            Duration::from_millis(self.custom_interval)
        } else {
            template_interval
        };
        interval.max(floor)
    }
}

impl MonitorItemConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            user_label: String::new(),
            taskbar_label: String::new(),
            unit_panel: String::new(),
            visible_in_panel: true,
            sort_index: default_sort_index(),
        }
    }

    /// Whether this descriptor lives under the namespace of `instance_id`.
    pub fn belongs_to(&self, instance_id: &str) -> bool {
        let root = format!("{}{}", DESCRIPTOR_PREFIX, instance_id);
        self.key == root
            || self
                .key
                .strip_prefix(root.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Live value key of one output: `<instance><suffix>.<output>`.
pub fn metric_key(instance_id: &str, key_suffix: &str, output_key: &str) -> String {
    format!("{}{}.{}", instance_id, key_suffix, output_key)
}

/// Descriptor key for a live value key.
pub fn descriptor_key(metric_key: &str) -> String {
    format!("{}{}", DESCRIPTOR_PREFIX, metric_key)
}

impl Settings {
    pub fn instance(&self, id: &str) -> Option<&InstanceConfig> {
        self.plugin_instances.iter().find(|inst| inst.id == id)
    }

    pub fn monitor_item_mut(&mut self, key: &str) -> Option<&mut MonitorItemConfig> {
        self.monitor_items.iter_mut().find(|item| item.key == key)
    }

    /// Remove every descriptor namespaced under `instance_id`; returns how many went.
    pub fn remove_instance_items(&mut self, instance_id: &str) -> usize {
        let before = self.monitor_items.len();
        self.monitor_items.retain(|item| !item.belongs_to(instance_id));
        before - self.monitor_items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_suffix_and_targets() {
        let mut instance = InstanceConfig::new("w", "weather");
        assert_eq!(instance.key_suffix(0), "");
        assert_eq!(instance.effective_targets().len(), 1);

        instance.targets = vec![HashMap::new(), HashMap::new()];
        assert_eq!(instance.key_suffix(0), ".0");
        assert_eq!(instance.key_suffix(1), ".1");
        assert_eq!(instance.effective_targets().len(), 2);
    }

    #[test]
    fn test_effective_interval() {
        let floor = Duration::from_millis(1000);
        let mut instance = InstanceConfig::new("w", "weather");

        assert_eq!(
            instance.effective_interval(Duration::from_secs(60), floor),
            Duration::from_secs(60)
        );
        assert_eq!(
            instance.effective_interval(Duration::from_millis(10), floor),
            floor
        );

        instance.custom_interval = 5000;
        assert_eq!(
            instance.effective_interval(Duration::from_secs(60), floor),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_descriptor_namespace() {
        assert!(MonitorItemConfig::new("DASH.w.temp").belongs_to("w"));
        assert!(MonitorItemConfig::new("DASH.w.0.temp").belongs_to("w"));
        assert!(MonitorItemConfig::new("DASH.w").belongs_to("w"));
        assert!(!MonitorItemConfig::new("DASH.weather.temp").belongs_to("w"));
        assert!(!MonitorItemConfig::new("CPU.Load").belongs_to("w"));
    }

    #[test]
    fn test_remove_instance_items() {
        let mut settings = Settings {
            plugin_instances: vec![],
            monitor_items: vec![
                MonitorItemConfig::new("DASH.a.x"),
                MonitorItemConfig::new("DASH.ab.x"),
                MonitorItemConfig::new("CPU.Load"),
            ],
        };
        assert_eq!(settings.remove_instance_items("a"), 1);
        assert_eq!(settings.monitor_items.len(), 2);
    }

    #[test]
    fn test_keys() {
        let key = metric_key("w", ".1", "temp");
        assert_eq!(key, "w.1.temp");
        assert_eq!(descriptor_key(&key), "DASH.w.1.temp");
    }

    #[test]
    fn test_settings_json_shape() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "PluginInstances": [
                    { "Id": "w", "TemplateId": "weather", "InputValues": { "city": "Oslo" },
                      "Targets": [ { "city": "Rome" } ], "CustomInterval": 2000 }
                ],
                "MonitorItems": [ { "Key": "DASH.w.0.temp", "UserLabel": "Rome Temp" } ]
            }"#,
        )
        .unwrap();

        let instance = settings.instance("w").unwrap();
        assert!(instance.enabled);
        assert_eq!(instance.custom_interval, 2000);
        assert_eq!(instance.targets[0]["city"], "Rome");
        assert_eq!(settings.monitor_items[0].sort_index, -1);
        assert!(settings.monitor_items[0].visible_in_panel);
    }
}
