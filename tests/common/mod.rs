// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides template builders and a wired engine/scheduler test environment

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use metricfeed::engine::{ExecutionEngine, InstanceScheduler};
use metricfeed::output::MetricRegistry;
use metricfeed::parser::{Template, TemplateStore};
use metricfeed::settings::{MemoryConfigStore, Settings};

pub struct TestTemplateBuilder {
    id: String,
    name: String,
    inputs: Vec<Value>,
    execution: Map<String, Value>,
    steps: Vec<Value>,
    outputs: Vec<Value>,
}

pub struct TestStepBuilder {
    step: Map<String, Value>,
}

impl TestTemplateBuilder {
    pub fn new(id: &str, execution_type: &str) -> Self {
        let mut execution = Map::new();
        execution.insert("Type".to_string(), json!(execution_type));
        Self {
            id: id.to_string(),
            name: format!("Test {}", id),
            inputs: Vec::new(),
            execution,
            steps: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_input(mut self, key: &str, default_value: &str) -> Self {
        self.inputs
            .push(json!({ "Key": key, "DefaultValue": default_value }));
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        self.with_execution_field("Url", json!(url))
    }

    pub fn with_method(self, method: &str) -> Self {
        self.with_execution_field("Method", json!(method))
    }

    pub fn with_body(self, body: &str) -> Self {
        self.with_execution_field("Body", json!(body))
    }

    pub fn with_interval(self, millis: u64) -> Self {
        self.with_execution_field("Interval", json!(millis))
    }

    pub fn with_extract(mut self, var: &str, path: &str) -> Self {
        let extract = self
            .execution
            .entry("Extract".to_string())
            .or_insert_with(|| json!({}));
        extract[var] = json!(path);
        self
    }

    pub fn with_map_transform(mut self, target_var: &str, from: &str, to: &str) -> Self {
        let process = self
            .execution
            .entry("Process".to_string())
            .or_insert_with(|| json!([]));
        let mut map = Map::new();
        map.insert(from.to_string(), json!(to));
        if let Value::Array(items) = process {
            items.push(json!({
                "Function": "map",
                "TargetVar": target_var,
                "Map": map
            }));
        }
        self
    }

    pub fn with_step(mut self, step: TestStepBuilder) -> Self {
        self.steps.push(Value::Object(step.step));
        self
    }

    pub fn with_output(mut self, key: &str, format: &str) -> Self {
        self.outputs.push(json!({ "Key": key, "Format": format }));
        self
    }

    pub fn with_labelled_output(
        mut self,
        key: &str,
        format: &str,
        label: &str,
        short_label: &str,
        unit: &str,
    ) -> Self {
        self.outputs.push(json!({
            "Key": key,
            "Format": format,
            "Label": label,
            "ShortLabel": short_label,
            "Unit": unit
        }));
        self
    }

    fn with_execution_field(mut self, field: &str, value: Value) -> Self {
        self.execution.insert(field.to_string(), value);
        self
    }

    pub fn to_json(&self) -> String {
        let mut execution = self.execution.clone();
        if !self.steps.is_empty() {
            execution.insert("Steps".to_string(), Value::Array(self.steps.clone()));
        }
        let document = json!({
            "Id": self.id,
            "Meta": { "Name": self.name, "Version": "1.0" },
            "Inputs": self.inputs,
            "Execution": execution,
            "Outputs": self.outputs,
        });
        serde_json::to_string_pretty(&document).unwrap()
    }

    pub fn build(&self) -> Template {
        Template::from_json(&self.to_json()).unwrap()
    }

    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}.json", self.id));
        std::fs::write(&path, self.to_json()).unwrap();
        path
    }
}

impl TestStepBuilder {
    pub fn new(id: &str, url: &str) -> Self {
        let mut step = Map::new();
        step.insert("Id".to_string(), json!(id));
        step.insert("Url".to_string(), json!(url));
        Self { step }
    }

    pub fn with_method(self, method: &str) -> Self {
        self.with_field("Method", json!(method))
    }

    pub fn with_body(self, body: &str) -> Self {
        self.with_field("Body", json!(body))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let headers = self
            .step
            .entry("Headers".to_string())
            .or_insert_with(|| json!({}));
        headers[name] = json!(value);
        self
    }

    pub fn with_extract(mut self, var: &str, path: &str) -> Self {
        let extract = self
            .step
            .entry("Extract".to_string())
            .or_insert_with(|| json!({}));
        extract[var] = json!(path);
        self
    }

    pub fn with_regex_transform(
        mut self,
        source_var: &str,
        target_var: &str,
        pattern: &str,
        to: &str,
    ) -> Self {
        let process = self
            .step
            .entry("Process".to_string())
            .or_insert_with(|| json!([]));
        if let Value::Array(items) = process {
            items.push(json!({
                "Function": "regex_replace",
                "SourceVar": source_var,
                "TargetVar": target_var,
                "Pattern": pattern,
                "To": to
            }));
        }
        self
    }

    pub fn with_cache_minutes(self, minutes: i64) -> Self {
        self.with_field("CacheMinutes", json!(minutes))
    }

    pub fn with_encoding(self, encoding: &str) -> Self {
        self.with_field("ResponseEncoding", json!(encoding))
    }

    pub fn with_format(self, format: &str) -> Self {
        self.with_field("ResponseFormat", json!(format))
    }

    fn with_field(mut self, field: &str, value: Value) -> Self {
        self.step.insert(field.to_string(), value);
        self
    }
}

/// Engine, scheduler, registry and settings wired together over a temp dir.
pub struct TestEnv {
    pub dir: TempDir,
    pub registry: Arc<MetricRegistry>,
    pub store: Arc<MemoryConfigStore>,
    pub scheduler: InstanceScheduler,
}

impl TestEnv {
    pub fn new(settings: Settings) -> Self {
        Self::with_min_interval(settings, Duration::from_millis(1000))
    }

    pub fn with_min_interval(settings: Settings, min_interval: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("plugins")).unwrap();

        let registry = Arc::new(MetricRegistry::new());
        let store = Arc::new(MemoryConfigStore::new(settings));
        let engine = ExecutionEngine::builder(registry.clone(), store.clone())
            .target_delay(Duration::ZERO)
            .build()
            .unwrap();
        let scheduler = InstanceScheduler::new(Arc::new(engine), Arc::new(TemplateStore::new()))
            .with_min_interval(min_interval);

        Self {
            dir,
            registry,
            store,
            scheduler,
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.dir.path().join("plugins")
    }

    pub fn add_template(&self, builder: &TestTemplateBuilder) {
        builder.write_to(&self.templates_dir());
    }

    pub fn load_templates(&self) {
        self.scheduler.load_templates(self.templates_dir()).unwrap();
    }

    pub fn engine(&self) -> &ExecutionEngine {
        self.scheduler.engine()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.registry.get(key)
    }

    /// Poll the registry until `key` holds `expected` or `timeout` passes.
    pub async fn wait_for_value(&self, key: &str, expected: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.registry.get(key).as_deref() == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
