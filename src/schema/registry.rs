// Validator capability: schema registration + validation behind a trait
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{CrudError, CrudResult};

/// Validator capability consumed by metadata generation and the CRUD
/// pipeline. Implementations own compiled schemas addressed by `$id`.
pub trait SchemaValidator: Send + Sync {
    /// Register a schema under its `$id`. Registering the same `$id`
    /// twice is a warn-level no-op, not an error.
    fn add_schema(&self, schema: &Value) -> CrudResult<()>;

    /// Look up a registered schema by `$id`.
    fn get_schema(&self, id: &str) -> Option<Value>;

    /// Validate without raising; unknown schema ids are a configuration
    /// error.
    fn is_valid(&self, schema_id: &str, data: &Value) -> CrudResult<bool>;

    /// Validate, raising `CrudError::Validation` with per-field detail on
    /// failure.
    fn ensure_valid(&self, schema_id: &str, data: &Value) -> CrudResult<()>;
}

/// Default `SchemaValidator` backed by the `jsonschema` crate.
#[derive(Default)]
pub struct JsonSchemaRegistry {
    schemas: RwLock<HashMap<String, RegisteredSchema>>,
}

struct RegisteredSchema {
    source: Value,
    compiled: Arc<jsonschema::Validator>,
}

impl JsonSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct as a shareable handle, the shape the orchestrator wants.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn compiled(&self, schema_id: &str) -> CrudResult<Arc<jsonschema::Validator>> {
        let schemas = self.schemas.read().expect("schema registry lock poisoned");
        schemas
            .get(schema_id)
            .map(|r| Arc::clone(&r.compiled))
            .ok_or_else(|| {
                CrudError::configuration(format!("No schema registered with $id '{schema_id}'"))
            })
    }
}

impl SchemaValidator for JsonSchemaRegistry {
    fn add_schema(&self, schema: &Value) -> CrudResult<()> {
        let id = schema
            .get("$id")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CrudError::configuration("Schema is missing a non-empty '$id'"))?
            .to_string();

        let mut schemas = self.schemas.write().expect("schema registry lock poisoned");
        if schemas.contains_key(&id) {
            tracing::warn!("Schema '{}' is already registered - skipping", id);
            return Ok(());
        }

        let compiled = jsonschema::validator_for(schema).map_err(|e| {
            CrudError::configuration(format!("Schema '{id}' does not compile: {e}"))
        })?;
        tracing::debug!("Registered schema '{}'", id);
        schemas.insert(id, RegisteredSchema { source: schema.clone(), compiled: Arc::new(compiled) });
        Ok(())
    }

    fn get_schema(&self, id: &str) -> Option<Value> {
        let schemas = self.schemas.read().expect("schema registry lock poisoned");
        schemas.get(id).map(|r| r.source.clone())
    }

    fn is_valid(&self, schema_id: &str, data: &Value) -> CrudResult<bool> {
        Ok(self.compiled(schema_id)?.is_valid(data))
    }

    fn ensure_valid(&self, schema_id: &str, data: &Value) -> CrudResult<()> {
        let compiled = self.compiled(schema_id)?;
        let mut field_errors = HashMap::new();
        for error in compiled.iter_errors(data) {
            let path = error.instance_path.to_string();
            let key = if path.is_empty() { "/".to_string() } else { path };
            field_errors.insert(key, error.to_string());
        }
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(CrudError::validation_with_fields(
                format!("Data does not match schema '{schema_id}'"),
                field_errors,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "$id": "https://example.com/test",
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        })
    }

    #[test]
    fn validates_against_registered_schema() {
        let registry = JsonSchemaRegistry::new();
        registry.add_schema(&schema()).unwrap();

        assert!(registry.ensure_valid("https://example.com/test", &json!({"name": "x"})).is_ok());

        let err = registry
            .ensure_valid("https://example.com/test", &json!({"name": 1}))
            .unwrap_err();
        match err {
            CrudError::Validation { field_errors: Some(fields), .. } => {
                assert!(fields.contains_key("/name"), "fields: {fields:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_registration_is_a_no_op() {
        let registry = JsonSchemaRegistry::new();
        registry.add_schema(&schema()).unwrap();
        assert!(registry.add_schema(&schema()).is_ok());
    }

    #[test]
    fn missing_id_is_a_configuration_error() {
        let registry = JsonSchemaRegistry::new();
        let err = registry.add_schema(&json!({"type": "object"})).unwrap_err();
        assert!(matches!(err, CrudError::Configuration(_)));
    }

    #[test]
    fn unknown_schema_id_is_a_configuration_error() {
        let registry = JsonSchemaRegistry::new();
        let err = registry.is_valid("nope", &json!({})).unwrap_err();
        assert!(matches!(err, CrudError::Configuration(_)));
    }
}
