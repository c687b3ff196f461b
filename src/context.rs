// Per-call execution context: who is making the request, and from where
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{CrudError, CrudResult};
use crate::paths;

/// Fixed schema every execution context must satisfy before a mutating
/// operation runs.
static EXECUTION_CONTEXT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$id": "https://entity-crud.dev/schemas/execution-context",
        "type": "object",
        "properties": {
            "requestId": { "type": "string", "minLength": 1, "pattern": "\\S" },
            "identity": {
                "type": "object",
                "properties": {
                    "id": { "type": "string", "minLength": 1, "pattern": "\\S" }
                },
                "required": ["id"]
            },
            "codeVersion": { "type": "string", "minLength": 1, "pattern": "\\S" },
            "sourceIp": { "type": "string" },
            "source": { "type": "string" }
        },
        "required": ["requestId", "identity", "codeVersion"]
    })
});

static EXECUTION_CONTEXT_VALIDATOR: Lazy<jsonschema::Validator> = Lazy::new(|| {
    jsonschema::validator_for(&EXECUTION_CONTEXT_SCHEMA)
        .expect("execution context schema is statically valid")
});

/// The acting identity. `id` is mandatory; any additional claims (tenant
/// ids, group memberships, ...) ride along in `attributes` and stay
/// addressable via dotted source paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), attributes: Map::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Caller-supplied metadata identifying one request. Validated before any
/// mutating operation touches the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub request_id: String,
    pub identity: Identity,
    pub code_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ExecutionContext {
    pub fn new(
        request_id: impl Into<String>,
        identity: Identity,
        code_version: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            identity,
            code_version: code_version.into(),
            source_ip: None,
            source: None,
        }
    }

    /// Validate against the fixed execution-context schema.
    pub fn ensure_valid(&self) -> CrudResult<()> {
        let as_value = self.to_value();
        let errors: Vec<String> = EXECUTION_CONTEXT_VALIDATOR
            .iter_errors(&as_value)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CrudError::validation(format!(
                "Invalid execution context: {}",
                errors.join("; ")
            )))
        }
    }

    /// Serialize to the camelCase wire shape used in audit envelopes.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Resolve a dotted source path (e.g. `identity.organisationId`)
    /// against the context's wire shape.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        let as_value = self.to_value();
        paths::get_path(&as_value, path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext::new("req-1", Identity::new("user-1"), "1.0.0")
    }

    #[test]
    fn valid_context_passes() {
        assert!(context().ensure_valid().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut ctx = context();
        ctx.request_id = "   ".to_string();
        assert!(matches!(ctx.ensure_valid(), Err(CrudError::Validation { .. })));

        let mut ctx = context();
        ctx.identity.id = String::new();
        assert!(ctx.ensure_valid().is_err());
    }

    #[test]
    fn value_at_resolves_identity_attributes() {
        let identity = Identity::new("user-1")
            .with_attribute("organisationId", Value::String("org-42".into()));
        let ctx = ExecutionContext::new("req-1", identity, "1.0.0");
        assert_eq!(ctx.value_at("identity.organisationId"), Some(Value::String("org-42".into())));
        assert_eq!(ctx.value_at("identity.id"), Some(Value::String("user-1".into())));
        assert_eq!(ctx.value_at("identity.missing"), None);
    }
}
