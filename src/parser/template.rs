// ABOUTME: Template definition data structures and JSON parsing
// ABOUTME: Describes a data source: its inputs, execution recipe, chain steps and outputs

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{ParserError, Result};
use crate::processor::{Transform, Variables};

fn default_interval() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub meta: TemplateMeta,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    pub execution: Execution,
    #[serde(default)]
    pub outputs: Vec<OutputDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputDef {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub scope: InputScope,
}

/// Whether an input is edited once per instance or once per target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputScope {
    #[default]
    Global,
    Target,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Execution {
    #[serde(rename = "Type")]
    pub execution_type: ExecutionType,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_method")]
    pub method: RequestMethod,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Refresh period in milliseconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub extract: IndexMap<String, String>,
    #[serde(default)]
    pub process: Vec<Transform>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    ApiJson,
    ApiText,
    Chain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RequestMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

/// One fetch, extract and transform unit of a `chain` execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_method")]
    pub method: RequestMethod,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub response_encoding: Option<String>,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default)]
    pub extract: IndexMap<String, String>,
    #[serde(default)]
    pub process: Vec<Transform>,
    /// Zero disables caching; otherwise entries younger than this many minutes are reused.
    #[serde(default)]
    pub cache_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEncoding {
    Utf8,
    Gbk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Jsonp,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputDef {
    pub key: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub short_label: String,
    #[serde(default)]
    pub unit: String,
}

fn deserialize_method<'de, D>(deserializer: D) -> std::result::Result<RequestMethod, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(RequestMethod::from_name)
        .unwrap_or_default())
}

impl RequestMethod {
    /// Case-insensitive; anything other than POST is a GET.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("POST") {
            RequestMethod::Post
        } else {
            RequestMethod::Get
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
        }
    }
}

impl Step {
    pub fn encoding(&self) -> ResponseEncoding {
        match self.response_encoding.as_deref() {
            Some(enc) if enc.trim().eq_ignore_ascii_case("gbk") => ResponseEncoding::Gbk,
            _ => ResponseEncoding::Utf8,
        }
    }

    pub fn format(&self) -> ResponseFormat {
        match self
            .response_format
            .as_deref()
            .map(|f| f.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("json") => ResponseFormat::Json,
            Some("jsonp") => ResponseFormat::Jsonp,
            Some(_) => ResponseFormat::Other,
        }
    }

    /// Variables this step writes: its extract keys plus every transform target.
    pub fn produced_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extract.keys().map(String::as_str).collect();
        for transform in &self.process {
            if !names.contains(&transform.target_var.as_str()) {
                names.push(transform.target_var.as_str());
            }
        }
        names
    }
}

impl Template {
    /// Parse a template from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_json(&content)
    }

    /// Parse a template from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let template: Template = serde_json::from_str(content).map_err(ParserError::JsonError)?;
        template.validate_structure()?;
        Ok(template)
    }

    fn validate_structure(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ParserError::MissingField("Id".to_string()));
        }

        if self.execution.execution_type == ExecutionType::Chain {
            for step in &self.execution.steps {
                if step.id.trim().is_empty() {
                    return Err(ParserError::InvalidTemplate {
                        template: self.id.clone(),
                        reason: "chain step without Id".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Default value of every declared input
    pub fn default_inputs(&self) -> Variables {
        self.inputs
            .iter()
            .map(|input| (input.key.clone(), input.default_value.clone()))
            .collect()
    }

    /// Label pattern of an output, falling back to "<name> <key>"
    pub fn label_pattern(&self, output: &OutputDef) -> String {
        if output.label.is_empty() {
            format!("{} {}", self.meta.name, output.key)
        } else {
            output.label.clone()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.execution.interval)
    }

    pub fn display_name(&self) -> &str {
        if self.meta.name.is_empty() {
            &self.id
        } else {
            &self.meta.name
        }
    }
}
