// ABOUTME: Stateless value processing used by every execution pipeline
// ABOUTME: Exports placeholder resolution, JSON path extraction and variable transforms

pub mod extract;
pub mod resolve;
pub mod transform;

use std::collections::HashMap;

pub use extract::{extract_json_value, NOT_FOUND};
pub use resolve::{has_placeholders, resolve_template};
pub use transform::{apply_transforms, Transform, TransformFunction};

/// Variable context accumulated through one target's pipeline.
pub type Variables = HashMap<String, String>;
