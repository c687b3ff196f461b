// Status lifecycle enforcement: defaults, transition logs, sidecar data
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{CrudError, CrudResult};
use crate::metadata::{EntityMetadata, StatusDefinition};
use crate::paths;

fn status_value_at(entity: &Value, field: &str) -> Option<String> {
    match paths::get_path(entity, field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn log_entry(status: Option<&str>, now: &str, data: Option<Value>) -> Value {
    let mut entry = json!({
        "status": status.map_or(Value::Null, |s| Value::String(s.to_string())),
        "statusDate": now
    });
    if let Some(data) = data {
        entry["data"] = data;
    }
    entry
}

/// Apply every declared status definition to an entity. `existing` is the
/// stored entity on the replace path and absent on creation.
pub fn set_statuses_if_applicable(
    metadata: &EntityMetadata,
    entity: &mut Value,
    existing: Option<&Value>,
) -> CrudResult<()> {
    for definition in &metadata.statuses {
        apply_definition(definition, entity, existing)?;
    }
    Ok(())
}

fn apply_definition(
    definition: &StatusDefinition,
    entity: &mut Value,
    existing: Option<&Value>,
) -> CrudResult<()> {
    let field = &definition.path_to_status_field;
    let supplied = status_value_at(entity, field);
    // Consumed into the log entry, never persisted on the entity itself
    let sidecar = paths::remove_path(entity, &definition.data_field());
    let now = Utc::now().to_rfc3339();

    if let Some(value) = &supplied {
        if !definition.allows(value) {
            return Err(CrudError::validation(format!(
                "'{value}' is not an allowed value for '{field}'"
            )));
        }
    }

    let old = existing.and_then(|e| status_value_at(e, field));

    match (old, supplied) {
        // Creation (or first-time set on an existing entity)
        (None, supplied) => {
            if supplied.is_none() && !definition.is_required {
                if sidecar.is_some() {
                    return Err(CrudError::validation(format!(
                        "'{}' was supplied without a value for '{field}'",
                        definition.data_field()
                    )));
                }
                return Ok(());
            }
            let value =
                supplied.unwrap_or_else(|| definition.default_value().to_string());
            paths::set_path(entity, field, Value::String(value.clone()));
            paths::set_path(entity, &definition.date_field(), Value::String(now.clone()));
            paths::set_path(
                entity,
                &definition.log_field(),
                Value::Array(vec![log_entry(Some(&value), &now, sidecar)]),
            );
        }
        // Replace: status cleared
        (Some(_), None) => {
            if definition.is_required {
                return Err(CrudError::validation(format!(
                    "'{field}' is required and cannot be cleared"
                )));
            }
            let mut log = existing
                .and_then(|e| paths::get_path(e, &definition.log_field()))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            log.push(log_entry(None, &now, None));
            paths::remove_path(entity, field);
            paths::set_path(entity, &definition.date_field(), Value::String(now.clone()));
            paths::set_path(entity, &definition.log_field(), Value::Array(log));
        }
        // Replace: unchanged or transitioned
        (Some(old), Some(new)) => {
            let existing_date = existing
                .and_then(|e| paths::get_path(e, &definition.date_field()))
                .cloned();
            let existing_log = existing
                .and_then(|e| paths::get_path(e, &definition.log_field()))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if new == old {
                // Carry the stored trail forward untouched
                if let Some(date) = existing_date {
                    paths::set_path(entity, &definition.date_field(), date);
                }
                paths::set_path(entity, &definition.log_field(), Value::Array(existing_log));
            } else {
                let mut log = existing_log;
                log.push(log_entry(Some(&new), &now, sidecar));
                paths::set_path(entity, field, Value::String(new));
                paths::set_path(entity, &definition.date_field(), Value::String(now.clone()));
                paths::set_path(entity, &definition.log_field(), Value::Array(log));
            }
        }
    }
    Ok(())
}
