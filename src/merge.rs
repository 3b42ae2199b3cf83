use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Store `image_paths` under `target_field`, or an empty list when `remove`.
///
/// Any previous value of the field is replaced outright. Every other key
/// passes through untouched, and the result is keyed in sorted order so
/// repeated runs serialize identically.
pub fn merge_intended_for(
    image_paths: &[String],
    content: Map<String, Value>,
    target_field: &str,
    remove: bool,
) -> Map<String, Value> {
    let value = if remove {
        Vec::new()
    } else {
        image_paths.iter().cloned().map(Value::String).collect()
    };
    let mut sorted: BTreeMap<String, Value> = content.into_iter().collect();
    sorted.insert(target_field.to_string(), Value::Array(value));
    sorted.into_iter().collect()
}
