// Output mapping: shape persisted entities by the derived output schema
use serde_json::{Map, Value};

use crate::metadata::{EntityMetadata, SchemaRole};

/// Map a persisted entity through the output schema: undeclared fields
/// are dropped, declared primitive types are coerced, nested objects and
/// arrays are mapped recursively. Fields flagged `excludeOnOutput` were
/// already stripped from the schema at generation time, so they fall out
/// here as undeclared.
pub fn map_output(metadata: &EntityMetadata, entity: &Value) -> Value {
    map_node(metadata.schemas.get(SchemaRole::Output), entity)
}

fn map_node(schema: &Value, value: &Value) -> Value {
    match value {
        Value::Object(fields) => match schema.get("properties").and_then(Value::as_object) {
            Some(properties) => {
                let mut mapped = Map::new();
                for (key, field_value) in fields {
                    if let Some(field_schema) = properties.get(key) {
                        mapped.insert(key.clone(), map_node(field_schema, field_value));
                    }
                }
                Value::Object(mapped)
            }
            // Free-form object schema: pass through untouched
            None => value.clone(),
        },
        Value::Array(items) => match schema.get("items") {
            Some(item_schema) => {
                Value::Array(items.iter().map(|item| map_node(item_schema, item)).collect())
            }
            None => value.clone(),
        },
        other => coerce(schema, other),
    }
}

/// Best-effort primitive coercion toward the declared type. Values that
/// cannot be coerced pass through unchanged; validation is not this
/// function's job.
fn coerce(schema: &Value, value: &Value) -> Value {
    let declared = schema.get("type").and_then(Value::as_str);
    match (declared, value) {
        (Some("string"), Value::Number(n)) => Value::String(n.to_string()),
        (Some("string"), Value::Bool(b)) => Value::String(b.to_string()),
        (Some("number" | "integer"), Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| value.clone(), Value::Number),
        (Some("boolean"), Value::String(s)) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::object_id_schema;
    use crate::metadata::raw::RawEntityMetadata;
    use crate::schema::JsonSchemaRegistry;
    use serde_json::json;

    fn metadata() -> EntityMetadata {
        EntityMetadata::generate(
            RawEntityMetadata::from_value(json!({
                "schemas": {
                    "core": {
                        "title": "Todo",
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "count": { "type": "number" },
                            "secret": { "type": "string", "excludeOnOutput": true },
                            "tags": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                },
                "identifier": { "pathToId": "_id", "schema": object_id_schema() },
                "collectionName": "todos",
                "baseUrl": "https://example.com/schemas"
            }))
            .unwrap(),
            &JsonSchemaRegistry::new(),
            &JsonSchemaRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn undeclared_and_excluded_fields_are_dropped() {
        let entity = json!({
            "_id": "5f1d7f3a8e4b2c0012345678",
            "title": "x",
            "secret": "hidden",
            "internal": "junk"
        });
        let mapped = map_output(&metadata(), &entity);
        assert_eq!(mapped["title"], json!("x"));
        assert_eq!(mapped["_id"], json!("5f1d7f3a8e4b2c0012345678"));
        assert!(mapped.get("secret").is_none());
        assert!(mapped.get("internal").is_none());
    }

    #[test]
    fn declared_types_are_coerced() {
        let entity = json!({ "title": 42, "count": "7", "tags": [1, "a"] });
        let mapped = map_output(&metadata(), &entity);
        assert_eq!(mapped["title"], json!("42"));
        assert_eq!(mapped["count"], json!(7.0));
        assert_eq!(mapped["tags"], json!(["1", "a"]));
    }

    #[test]
    fn version_info_survives_mapping() {
        let entity = json!({
            "title": "x",
            "versionInfo": {
                "dateCreated": "2020-01-01T00:00:00+00:00",
                "versionTag": "t",
                "dateUpdated": "2020-01-01T00:00:00+00:00",
                "createdBy": "u1",
                "lastUpdatedBy": "u1",
                "updatedByRequestId": "r1",
                "createdInVersion": "1.0",
                "updatedInVersion": "1.0"
            }
        });
        let mapped = map_output(&metadata(), &entity);
        assert_eq!(mapped["versionInfo"]["versionTag"], json!("t"));
    }
}
