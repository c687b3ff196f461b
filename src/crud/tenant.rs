// Tenant scoping: inject the caller's partition value everywhere
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::{CrudError, CrudResult};
use crate::metadata::EntityMetadata;
use crate::paths;

/// Resolve the tenant value from the execution context. `Ok(None)` for
/// entity types that are not tenant-scoped; a missing or blank value on a
/// scoped type is a tenant error.
pub fn tenant_value_from_context(
    metadata: &EntityMetadata,
    context: &ExecutionContext,
) -> CrudResult<Option<Value>> {
    let Some(tenant) = &metadata.tenant_info else { return Ok(None) };

    let value = context.value_at(&tenant.execution_context_source_path);
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(Value::String(s))),
        Some(value @ Value::Number(_)) => Ok(Some(value)),
        _ => Err(CrudError::Tenant(format!(
            "Execution context is missing a value at '{}' for the {} of {}",
            tenant.execution_context_source_path, tenant.title, metadata.title_plural
        ))),
    }
}

/// Stamp the tenant value from the context onto the entity.
pub fn apply_tenant_to_entity(
    metadata: &EntityMetadata,
    entity: &mut Value,
    context: &ExecutionContext,
) -> CrudResult<()> {
    let Some(tenant) = &metadata.tenant_info else { return Ok(()) };
    if let Some(value) = tenant_value_from_context(metadata, context)? {
        paths::set_path(entity, &tenant.entity_path_to_id, value);
    }
    Ok(())
}

/// Constrain a store filter to the caller's tenant.
pub fn add_tenant_to_filter(
    metadata: &EntityMetadata,
    filter: &mut Map<String, Value>,
    context: &ExecutionContext,
) -> CrudResult<()> {
    let Some(tenant) = &metadata.tenant_info else { return Ok(()) };
    if let Some(value) = tenant_value_from_context(metadata, context)? {
        filter.insert(tenant.entity_path_to_id.clone(), value);
    }
    Ok(())
}

/// Replace path: the tenant field can never change, so the incoming
/// entity is forced to the stored entity's value.
pub fn carry_tenant_from_existing(
    metadata: &EntityMetadata,
    entity: &mut Value,
    existing: &Value,
) {
    if let Some(tenant) = &metadata.tenant_info {
        if let Some(value) = paths::get_path(existing, &tenant.entity_path_to_id) {
            paths::set_path(entity, &tenant.entity_path_to_id, value.clone());
        }
    }
}
