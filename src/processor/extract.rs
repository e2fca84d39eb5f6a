// ABOUTME: Dot-separated JSON path extraction with array index suffixes
// ABOUTME: Supports "data.current.temp", "list[0].id" and "[1]"; misses yield "?"

use serde_json::Value as JsonValue;

/// Returned for any path that cannot be followed.
pub const NOT_FOUND: &str = "?";

struct Segment<'a> {
    name: &'a str,
    indexes: Vec<usize>,
}

/// Parse `name[1][2]` into its property name and index list. A part that does
/// not end in `]` is a plain property name; a bad index yields `None`.
fn parse_segment(part: &str) -> Option<Segment<'_>> {
    let literal = Segment {
        name: part,
        indexes: Vec::new(),
    };
    let Some(open) = part.find('[') else {
        return Some(literal);
    };
    if !part.ends_with(']') {
        return Some(literal);
    }

    let name = &part[..open];
    let mut indexes = Vec::new();
    for raw in part[open + 1..part.len() - 1].split("][") {
        indexes.push(raw.trim().parse::<usize>().ok()?);
    }

    Some(Segment { name, indexes })
}

fn render_leaf(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Follow `path` through `root` and render the leaf as text.
pub fn extract_json_value(root: &JsonValue, path: &str) -> String {
    let mut current = root;

    for part in path.split('.') {
        let Some(segment) = parse_segment(part) else {
            return NOT_FOUND.to_string();
        };

        if segment.indexes.is_empty() || !segment.name.is_empty() {
            match current.as_object().and_then(|obj| obj.get(segment.name)) {
                Some(next) => current = next,
                None => return NOT_FOUND.to_string(),
            }
        }

        for index in segment.indexes {
            match current.as_array().and_then(|items| items.get(index)) {
                Some(next) => current = next,
                None => return NOT_FOUND.to_string(),
            }
        }
    }

    render_leaf(current)
}
