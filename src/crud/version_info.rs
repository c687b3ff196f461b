// Stamps the version-info envelope on entities passing through the pipeline
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::error::{CrudError, CrudResult};
use crate::metadata::EntityMetadata;
use crate::paths;

/// Stamp or refresh the `versionInfo` envelope in place.
///
/// First-time stamping sets all eight fields. Re-stamping refreshes only
/// the "updated" half; `dateCreated`/`createdBy`/`createdInVersion` are
/// immutable. An entity that already carries its primary identifier but
/// no `versionInfo` is a persisted-looking object on the creation path,
/// which is a caller bug and raises.
pub fn set_version_info(
    metadata: &EntityMetadata,
    entity: &mut Value,
    context: &ExecutionContext,
) -> CrudResult<()> {
    context.ensure_valid()?;

    let has_identifier = !paths::is_blank_at(entity, &metadata.identifier.path_to_id);
    let has_version_info = paths::get_path(entity, "versionInfo").is_some_and(Value::is_object);

    if has_identifier && !has_version_info {
        return Err(CrudError::is_required(format!(
            "'versionInfo' on the already-identified {} passed through the creation path",
            metadata.name
        )));
    }

    let now = Utc::now().to_rfc3339();
    let version_tag = Uuid::new_v4().to_string();

    if let Some(version_info) =
        paths::get_path_mut(entity, "versionInfo").and_then(Value::as_object_mut)
    {
        version_info.insert("versionTag".to_string(), Value::String(version_tag));
        version_info.insert("dateUpdated".to_string(), Value::String(now));
        version_info
            .insert("lastUpdatedBy".to_string(), Value::String(context.identity.id.clone()));
        version_info
            .insert("updatedByRequestId".to_string(), Value::String(context.request_id.clone()));
        version_info
            .insert("updatedInVersion".to_string(), Value::String(context.code_version.clone()));
    } else {
        paths::set_path(
            entity,
            "versionInfo",
            json!({
                "dateCreated": now,
                "versionTag": version_tag,
                "dateUpdated": now,
                "createdBy": context.identity.id,
                "lastUpdatedBy": context.identity.id,
                "updatedByRequestId": context.request_id,
                "createdInVersion": context.code_version,
                "updatedInVersion": context.code_version
            }),
        );
    }
    Ok(())
}
