#![allow(dead_code)]
use std::sync::Arc;

use entity_crud::{
    CrudResult, EntityCrud, EntityMetadata, ExecutionContext, Identity, JsonSchemaRegistry,
    MemoryStore, PolicyEnforcer, RawEntityMetadata, StepContext,
};
use futures::future::BoxFuture;
use serde_json::{json, Value};

/// Everything a test needs: the crud handle plus direct access to the
/// store and validators behind it.
pub struct Fixture {
    pub crud: EntityCrud,
    pub metadata: Arc<EntityMetadata>,
    pub store: Arc<MemoryStore>,
    pub input_validator: Arc<JsonSchemaRegistry>,
    pub output_validator: Arc<JsonSchemaRegistry>,
}

/// A fully loaded descriptor: string identifier, tenant scoping,
/// creator ownership, one required status lifecycle and auditing.
pub fn todo_descriptor() -> Value {
    json!({
        "schemas": {
            "core": {
                "title": "Todo",
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "secret": { "type": "string", "excludeOnOutput": true }
                },
                "required": ["title"]
            }
        },
        "identifier": {
            "pathToId": "_id",
            "schema": { "type": "string", "pattern": "^[0-9a-fA-F]{24}$" }
        },
        "stringIdentifier": { "pathToId": "name", "entitySourcePath": "title" },
        "tenantInfo": {
            "entityPathToId": "organisationId",
            "executionContextSourcePath": "identity.organisationId"
        },
        "authorization": {
            "interaction": "or",
            "ownership": { "initialOwner": "creator", "allowedActions": ["*"] }
        },
        "statuses": [{
            "pathToStatusField": "state",
            "allowedValues": [{ "name": "todo" }, { "name": "done" }],
            "isRequired": true
        }],
        "collectionName": "todos",
        "baseUrl": "https://example.com/schemas",
        "auditChanges": true
    })
}

pub fn build(descriptor: Value) -> Fixture {
    build_with_enforcer(descriptor, None)
}

static TRACING: std::sync::Once = std::sync::Once::new();

/// Opt-in pipeline logs during test runs via RUST_LOG.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn build_with_enforcer(
    descriptor: Value,
    enforcer: Option<Arc<dyn PolicyEnforcer>>,
) -> Fixture {
    init_tracing();
    let input_validator = JsonSchemaRegistry::shared();
    let output_validator = JsonSchemaRegistry::shared();
    let raw = RawEntityMetadata::from_value(descriptor).expect("descriptor deserializes");
    let metadata = Arc::new(
        EntityMetadata::generate(raw, input_validator.as_ref(), output_validator.as_ref())
            .expect("metadata generates"),
    );
    let store = Arc::new(MemoryStore::new());
    let crud = EntityCrud::new(
        Arc::clone(&metadata),
        Arc::clone(&store) as Arc<dyn entity_crud::DocumentStore>,
        Arc::clone(&input_validator) as Arc<dyn entity_crud::SchemaValidator>,
        Arc::clone(&output_validator) as Arc<dyn entity_crud::SchemaValidator>,
        enforcer,
    );
    Fixture { crud, metadata, store, input_validator, output_validator }
}

/// Execution context for `user` inside `org`, counter-named per request.
pub fn context_for(user: &str, org: &str) -> ExecutionContext {
    let identity = Identity::new(user).with_attribute("organisationId", json!(org));
    ExecutionContext::new(format!("req-{user}"), identity, "1.0.0")
}

pub fn context(user: &str) -> ExecutionContext {
    context_for(user, "org-1")
}

/// Identity helper that pins a closure to the hook signature, so inline
/// hooks infer the higher-ranked lifetime correctly.
pub fn hook<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut StepContext) -> BoxFuture<'a, CrudResult<()>>,
{
    f
}
