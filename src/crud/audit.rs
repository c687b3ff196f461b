// Audit trail: before/after snapshots of every mutating action
use chrono::Utc;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::{CrudError, CrudResult};
use crate::metadata::EntityMetadata;
use crate::paths;
use crate::store::DocumentStore;

/// The audited action recorded in the `_audit` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Delete,
    Replace,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Delete => "delete",
            AuditAction::Replace => "replace",
        }
    }
}

/// Write one audit document for a committed mutation. A no-op unless the
/// entity type has `auditChanges` enabled. Failures propagate: the
/// primary write already committed, but an incomplete audit trail must
/// surface to the caller.
pub async fn write_audit(
    store: &dyn DocumentStore,
    metadata: &EntityMetadata,
    action: AuditAction,
    entity: &Value,
    previous: Option<&Value>,
    context: &ExecutionContext,
) -> CrudResult<()> {
    if !metadata.audit_changes {
        return Ok(());
    }
    let collection = metadata.audit_collection_name.as_deref().ok_or_else(|| {
        CrudError::configuration(format!(
            "Auditing is enabled for {} but no audit collection is configured",
            metadata.title_plural
        ))
    })?;

    let id = paths::get_path(entity, &metadata.identifier.path_to_id).cloned().ok_or_else(
        || {
            CrudError::is_required(format!(
                "The primary identifier of the audited {}",
                metadata.name
            ))
        },
    )?;

    let mut document = entity.clone();
    paths::remove_path(&mut document, &metadata.identifier.path_to_id);

    let mut envelope = Map::new();
    envelope.insert("id".to_string(), id);
    envelope.insert("action".to_string(), Value::String(action.as_str().to_string()));
    envelope.insert("date".to_string(), Value::String(Utc::now().to_rfc3339()));
    if let Value::Object(context_fields) = context.to_value() {
        for (key, value) in context_fields {
            envelope.insert(key, value);
        }
    }
    if let Some(previous) = previous {
        let mut snapshot = previous.clone();
        paths::remove_path(&mut snapshot, &metadata.identifier.path_to_id);
        envelope.insert("previous".to_string(), snapshot);
    }
    paths::set_path(&mut document, "_audit", Value::Object(envelope));

    tracing::debug!(
        collection,
        action = action.as_str(),
        entity = %metadata.name,
        "Writing audit document"
    );
    store.insert_one(collection, document).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Identity;
    use crate::ids::object_id_schema;
    use crate::metadata::raw::RawEntityMetadata;
    use crate::schema::JsonSchemaRegistry;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn metadata(audit_changes: bool) -> EntityMetadata {
        EntityMetadata::generate(
            RawEntityMetadata::from_value(json!({
                "schemas": { "core": { "title": "Todo", "type": "object" } },
                "identifier": { "pathToId": "_id", "schema": object_id_schema() },
                "collectionName": "todos",
                "baseUrl": "https://example.com/schemas",
                "auditChanges": audit_changes
            }))
            .unwrap(),
            &JsonSchemaRegistry::new(),
            &JsonSchemaRegistry::new(),
        )
        .unwrap()
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("req-1", Identity::new("u1"), "1.0.0")
    }

    #[tokio::test]
    async fn audit_document_strips_id_and_carries_envelope() {
        let store = MemoryStore::new();
        let metadata = metadata(true);
        let entity = json!({ "_id": "5f1d7f3a8e4b2c0012345678", "title": "x" });

        write_audit(&store, &metadata, AuditAction::Create, &entity, None, &context())
            .await
            .unwrap();

        let docs = store.dump("todos-audit").await;
        assert_eq!(docs.len(), 1);
        assert!(docs[0].get("_id").is_none());
        assert_eq!(docs[0]["_audit"]["id"], json!("5f1d7f3a8e4b2c0012345678"));
        assert_eq!(docs[0]["_audit"]["action"], json!("create"));
        assert_eq!(docs[0]["_audit"]["requestId"], json!("req-1"));
        assert_eq!(docs[0]["title"], json!("x"));
    }

    #[tokio::test]
    async fn disabled_auditing_writes_nothing() {
        let store = MemoryStore::new();
        let entity = json!({ "_id": "5f1d7f3a8e4b2c0012345678" });
        write_audit(&store, &metadata(false), AuditAction::Delete, &entity, None, &context())
            .await
            .unwrap();
        assert_eq!(store.count("todos-audit").await, 0);
    }

    #[tokio::test]
    async fn entity_without_id_cannot_be_audited() {
        let store = MemoryStore::new();
        let err = write_audit(
            &store,
            &metadata(true),
            AuditAction::Create,
            &json!({ "title": "x" }),
            None,
            &context(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CrudError::IsRequired(_)));
    }

    #[tokio::test]
    async fn replacement_audit_includes_previous_snapshot() {
        let store = MemoryStore::new();
        let metadata = metadata(true);
        let entity = json!({ "_id": "5f1d7f3a8e4b2c0012345678", "title": "new" });
        let previous = json!({ "_id": "5f1d7f3a8e4b2c0012345678", "title": "old" });

        write_audit(&store, &metadata, AuditAction::Replace, &entity, Some(&previous), &context())
            .await
            .unwrap();

        let docs = store.dump("todos-audit").await;
        assert_eq!(docs[0]["_audit"]["previous"], json!({ "title": "old" }));
    }
}
