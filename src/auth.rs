// Policy + ownership authorization, combined per the declared interaction
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::context::ExecutionContext;
use crate::error::{CrudError, CrudResult};
use crate::metadata::{EntityMetadata, Interaction, OwnerSource};
use crate::paths;

/// External subject/object/action access-control evaluator (ACL/RBAC
/// style). Optional; entities without one rely on ownership rules alone.
#[async_trait]
pub trait PolicyEnforcer: Send + Sync {
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> CrudResult<bool>;
}

/// Pure combinator for the two authorization verdicts.
fn combine(interaction: Interaction, acl_allowed: bool, ownership_allowed: bool) -> bool {
    match interaction {
        Interaction::Or => acl_allowed || ownership_allowed,
        Interaction::And => acl_allowed && ownership_allowed,
    }
}

async fn acl_allows(
    enforcer: Option<&dyn PolicyEnforcer>,
    metadata: &EntityMetadata,
    context: &ExecutionContext,
    action: &str,
) -> CrudResult<bool> {
    match enforcer {
        Some(enforcer) => {
            enforcer.enforce(&context.identity.id, &metadata.name_plural, action).await
        }
        None => Ok(false),
    }
}

fn ownership_allows(
    metadata: &EntityMetadata,
    context: &ExecutionContext,
    action: &str,
    entity: &Value,
) -> bool {
    let Some(ownership) = metadata.ownership() else { return false };
    if !ownership.permits_action(action) {
        return false;
    }
    paths::get_path(entity, "owner.id").and_then(Value::as_str) == Some(context.identity.id.as_str())
}

/// Authorize `action` against one entity. A no-op when the metadata
/// declares no authorization rules (open access).
pub async fn check_authorization(
    enforcer: Option<&dyn PolicyEnforcer>,
    metadata: &EntityMetadata,
    context: &ExecutionContext,
    action: &str,
    entity: &Value,
) -> CrudResult<()> {
    let Some(authorization) = &metadata.authorization else { return Ok(()) };

    let acl_allowed = acl_allows(enforcer, metadata, context, action).await?;
    let ownership_allowed = ownership_allows(metadata, context, action, entity);

    if combine(authorization.interaction, acl_allowed, ownership_allowed) {
        Ok(())
    } else {
        tracing::debug!(
            identity = %context.identity.id,
            resource = %metadata.name_plural,
            action,
            acl_allowed,
            ownership_allowed,
            "Authorization denied"
        );
        Err(CrudError::not_authorized(&context.identity.id, &metadata.name_plural, action))
    }
}

/// Search-time authorization: with no single entity to check ownership
/// against, an acl pass leaves the filter unrestricted, while an
/// ownership-only pass narrows the filter to the caller's own records.
pub async fn check_authorization_or_add_owner_to_filter(
    filter: &mut Map<String, Value>,
    enforcer: Option<&dyn PolicyEnforcer>,
    metadata: &EntityMetadata,
    context: &ExecutionContext,
    action: &str,
) -> CrudResult<()> {
    let Some(authorization) = &metadata.authorization else { return Ok(()) };

    let acl_allowed = acl_allows(enforcer, metadata, context, action).await?;
    let ownership_permits =
        metadata.ownership().map_or(false, |ownership| ownership.permits_action(action));

    let narrow_to_owned = match authorization.interaction {
        // acl grants unrestricted access; ownership alone grants owned-only
        Interaction::Or => {
            if acl_allowed {
                false
            } else if ownership_permits {
                true
            } else {
                return Err(CrudError::not_authorized(
                    &context.identity.id,
                    &metadata.name_plural,
                    action,
                ));
            }
        }
        // both verdicts are needed, so results are always owned-only
        Interaction::And => {
            if acl_allowed && ownership_permits {
                true
            } else {
                return Err(CrudError::not_authorized(
                    &context.identity.id,
                    &metadata.name_plural,
                    action,
                ));
            }
        }
    };

    if narrow_to_owned {
        filter.insert("owner.id".to_string(), Value::String(context.identity.id.clone()));
    }
    Ok(())
}

/// Creation-time owner stamping. Resolves the owner id per the declared
/// `OwnerSource` strategy and writes the owner block with a `creation`
/// log entry. A no-op when the entity type declares no ownership.
pub fn set_owner_if_applicable(
    metadata: &EntityMetadata,
    entity: &mut Value,
    context: &ExecutionContext,
) -> CrudResult<()> {
    let Some(ownership) = metadata.ownership() else { return Ok(()) };

    let owner_id = match &ownership.source {
        OwnerSource::Creator => Some(Value::String(context.identity.id.clone())),
        OwnerSource::FromEntity { path } => paths::get_path(entity, path).cloned(),
        OwnerSource::FromContext { path } => context.value_at(path),
    };

    let owner_id = match owner_id {
        Some(Value::String(s)) if !s.trim().is_empty() => Value::String(s),
        Some(value @ Value::Number(_)) => value,
        _ => return Err(CrudError::is_required("An owner id")),
    };

    let now = Utc::now().to_rfc3339();
    paths::set_path(
        entity,
        "owner",
        json!({
            "id": owner_id.clone(),
            "date": now.clone(),
            "log": [{ "owner": owner_id, "date": now, "reason": "creation" }]
        }),
    );
    Ok(())
}
