// Path-based surgery on JSON-Schema trees, addressed by entity paths
//
// An "entity path" is the dotted field path as it appears on a conforming
// document ("team.id"); the corresponding schema node lives under
// "properties.team.properties.id".
use serde_json::{Map, Value};

use crate::paths;

/// `a.b` -> `properties.a.properties.b`; empty path -> empty string.
pub fn entity_path_to_schema_path(entity_path: &str) -> String {
    if entity_path.is_empty() {
        return String::new();
    }
    entity_path
        .split('.')
        .map(|segment| format!("properties.{segment}"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Path of the `required` array governing the field at `schema_path`.
///
/// `properties.a.properties.b` -> `properties.a.required`;
/// `properties.a` -> `required`.
pub fn required_path_from_schema_path(schema_path: &str) -> String {
    match schema_path.rsplit_once(".properties.") {
        Some((parent, _leaf)) => format!("{parent}.required"),
        None => "required".to_string(),
    }
}

/// Get the schema node for a field, by entity path.
pub fn get_schema_at<'a>(schema: &'a Value, entity_path: &str) -> Option<&'a Value> {
    paths::get_path(schema, &entity_path_to_schema_path(entity_path))
}

/// Set the schema node for a field, creating intermediate `properties`
/// maps as needed.
pub fn set_schema_at(schema: &mut Value, entity_path: &str, node: Value) {
    paths::set_path(schema, &entity_path_to_schema_path(entity_path), node);
}

/// Delete the schema node for a field and drop it from the governing
/// `required` array.
pub fn delete_schema_at(schema: &mut Value, entity_path: &str) {
    let schema_path = entity_path_to_schema_path(entity_path);
    paths::remove_path(schema, &schema_path);
    remove_required(schema, entity_path);
}

fn leaf_name(entity_path: &str) -> &str {
    entity_path.rsplit_once('.').map_or(entity_path, |(_, leaf)| leaf)
}

/// The `required` entries governing the field at `entity_path`.
pub fn get_required(schema: &Value, entity_path: &str) -> Vec<String> {
    let schema_path = entity_path_to_schema_path(entity_path);
    let required_path = required_path_from_schema_path(&schema_path);
    paths::get_path(schema, &required_path)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Mark the field at `entity_path` as required in its parent (set
/// semantics: adding twice is a no-op).
pub fn add_required(schema: &mut Value, entity_path: &str) {
    let schema_path = entity_path_to_schema_path(entity_path);
    let required_path = required_path_from_schema_path(&schema_path);
    let leaf = leaf_name(entity_path).to_string();

    let entries = match paths::get_path_mut(schema, &required_path) {
        Some(Value::Array(entries)) => entries,
        _ => {
            paths::set_path(schema, &required_path, Value::Array(vec![]));
            match paths::get_path_mut(schema, &required_path) {
                Some(Value::Array(entries)) => entries,
                _ => return,
            }
        }
    };
    if !entries.iter().any(|e| e.as_str() == Some(&leaf)) {
        entries.push(Value::String(leaf));
    }
}

/// Remove the field at `entity_path` from its parent's `required` array.
pub fn remove_required(schema: &mut Value, entity_path: &str) {
    let schema_path = entity_path_to_schema_path(entity_path);
    let required_path = required_path_from_schema_path(&schema_path);
    let leaf = leaf_name(entity_path);

    if let Some(Value::Array(entries)) = paths::get_path_mut(schema, &required_path) {
        entries.retain(|e| e.as_str() != Some(leaf));
    }
}

/// Replace the `required` array governing `entity_path` wholesale.
pub fn set_required(schema: &mut Value, entity_path: &str, required: Vec<String>) {
    let schema_path = entity_path_to_schema_path(entity_path);
    let required_path = required_path_from_schema_path(&schema_path);
    let mut deduped: Vec<Value> = Vec::with_capacity(required.len());
    for entry in required {
        if !deduped.iter().any(|e| e.as_str() == Some(entry.as_str())) {
            deduped.push(Value::String(entry));
        }
    }
    paths::set_path(schema, &required_path, Value::Array(deduped));
}

/// Walk every ancestor of a nested entity path, marking each key required
/// in its parent's `required` array, so the whole chain down to the leaf
/// is enforced.
pub fn mark_full_path_as_required(schema: &mut Value, entity_path: &str) {
    if entity_path.is_empty() {
        return;
    }
    let segments: Vec<&str> = entity_path.split('.').collect();
    for depth in 1..=segments.len() {
        add_required(schema, &segments[..depth].join("."));
    }
}

/// Ensure the root of a schema has `properties` and `required` members.
pub fn ensure_object_shape(schema: &mut Value) {
    if !schema.is_object() {
        *schema = Value::Object(Map::new());
    }
    let map = schema.as_object_mut().unwrap();
    map.entry("properties").or_insert_with(|| Value::Object(Map::new()));
    map.entry("required").or_insert_with(|| Value::Array(vec![]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_path_conversion() {
        assert_eq!(entity_path_to_schema_path(""), "");
        assert_eq!(entity_path_to_schema_path("a"), "properties.a");
        assert_eq!(entity_path_to_schema_path("a.b.c"), "properties.a.properties.b.properties.c");
    }

    #[test]
    fn required_path_locates_sibling_array() {
        assert_eq!(required_path_from_schema_path("properties.a"), "required");
        assert_eq!(
            required_path_from_schema_path("properties.a.properties.b"),
            "properties.a.required"
        );
    }

    #[test]
    fn add_required_is_idempotent() {
        let mut schema = json!({"type": "object"});
        add_required(&mut schema, "title");
        add_required(&mut schema, "title");
        assert_eq!(schema["required"], json!(["title"]));
    }

    #[test]
    fn nested_required_lands_on_parent_node() {
        let mut schema = json!({
            "type": "object",
            "properties": {"team": {"type": "object", "properties": {"id": {"type": "string"}}}}
        });
        add_required(&mut schema, "team.id");
        assert_eq!(schema["properties"]["team"]["required"], json!(["id"]));
    }

    #[test]
    fn delete_schema_at_also_drops_required_entry() {
        let mut schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "age": {"type": "number"}},
            "required": ["name", "age"]
        });
        delete_schema_at(&mut schema, "name");
        assert_eq!(schema["properties"], json!({"age": {"type": "number"}}));
        assert_eq!(schema["required"], json!(["age"]));
    }

    #[test]
    fn mark_full_path_walks_ancestors() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "tenant": {"type": "object", "properties": {"id": {"type": "string"}}}
            }
        });
        mark_full_path_as_required(&mut schema, "tenant.id");
        assert_eq!(schema["required"], json!(["tenant"]));
        assert_eq!(schema["properties"]["tenant"]["required"], json!(["id"]));
    }

    #[test]
    fn set_required_dedupes() {
        let mut schema = json!({"type": "object"});
        set_required(&mut schema, "x", vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(schema["required"], json!(["a", "b"]));
    }
}
