// ABOUTME: {{key}} placeholder substitution against a variable context
// ABOUTME: Unknown placeholders are elided so raw tokens never reach a display surface

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::Variables;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is valid"));

/// Check if a string contains a placeholder opening marker
pub fn has_placeholders(text: &str) -> bool {
    text.contains("{{")
}

/// Substitute every `{{key}}` found in `context`, then drop whatever placeholders remain.
pub fn resolve_template(template: &str, context: &Variables) -> String {
    if !has_placeholders(template) {
        return template.to_string();
    }

    let substituted = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    });

    PLACEHOLDER.replace_all(&substituted, "").into_owned()
}
