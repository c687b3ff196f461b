// Schema derivation: one core schema in, four addressable variants out
use serde_json::{json, Value};
use url::Url;

use crate::error::{CrudError, CrudResult};
use crate::metadata::raw::{RawEntityMetadata, RawOwnership};
use crate::metadata::{
    AllowedStatus, Authorization, EntityMetadata, Identifier, OwnerSource, Ownership, SchemaRole,
    SchemaSet, StatusDefinition, StringIdentifier, TenantInfo,
};
use crate::naming;
use crate::schema::paths as schema_paths;
use crate::schema::SchemaValidator;

/// Derived `$id` values must look like real, resolvable URLs.
const MIN_SCHEMA_ID_LENGTH: usize = 12;

fn date_time_schema() -> Value {
    json!({ "type": "string", "format": "date-time" })
}

/// The audit envelope every persisted entity carries. Merged into the
/// output schema and always required there.
pub fn version_info_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "dateCreated": date_time_schema(),
            "versionTag": { "type": "string" },
            "dateUpdated": date_time_schema(),
            "createdBy": { "type": "string" },
            "lastUpdatedBy": { "type": "string" },
            "updatedByRequestId": { "type": "string" },
            "createdInVersion": { "type": "string" },
            "updatedInVersion": { "type": "string" }
        },
        "required": [
            "dateCreated", "versionTag", "dateUpdated", "createdBy",
            "lastUpdatedBy", "updatedByRequestId", "createdInVersion", "updatedInVersion"
        ]
    })
}

fn owner_schema(id_schema: &Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": id_schema,
            "date": date_time_schema(),
            "log": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "owner": id_schema,
                        "date": date_time_schema(),
                        "reason": { "type": "string" }
                    },
                    "required": ["owner", "date", "reason"]
                }
            }
        },
        "required": ["id", "date", "log"]
    })
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn schema_string(schema: &Value, key: &str) -> Option<String> {
    trimmed(schema.get(key).and_then(Value::as_str))
}

impl EntityMetadata {
    /// Validate a raw descriptor and derive the full metadata: naming
    /// inference, `$id` assignment, the create/output/replace schema
    /// variants, and registration of every variant with the appropriate
    /// validator. Deterministic and idempotent for a given raw input.
    pub fn generate(
        raw: RawEntityMetadata,
        input_validator: &dyn SchemaValidator,
        output_validator: &dyn SchemaValidator,
    ) -> CrudResult<Self> {
        let collection_name = trimmed(Some(raw.collection_name.as_str()))
            .ok_or_else(|| CrudError::validation("'collectionName' must be a non-empty string"))?;

        if !raw.schemas.core.is_object() {
            return Err(CrudError::validation("'schemas.core' must be a schema object"));
        }
        if raw.identifier.path_to_id.trim().is_empty() {
            return Err(CrudError::validation("'identifier.pathToId' must be a non-empty string"));
        }
        for status in &raw.statuses {
            if status.path_to_status_field.trim().is_empty() {
                return Err(CrudError::validation(
                    "'statuses[].pathToStatusField' must be a non-empty string",
                ));
            }
            if status.allowed_values.is_empty() {
                return Err(CrudError::validation(format!(
                    "Status '{}' must declare at least one allowed value",
                    status.path_to_status_field
                )));
            }
        }

        // Naming inference
        let core_title = schema_string(&raw.schemas.core, "title");
        let core_name = schema_string(&raw.schemas.core, "name");
        let title = trimmed(raw.title.as_deref())
            .or_else(|| core_title.clone())
            .or_else(|| core_name.as_deref().map(naming::title_case))
            .ok_or_else(|| {
                CrudError::validation(
                    "Core schema must carry a non-empty 'name' or 'title' (or metadata must set one)",
                )
            })?;
        let name = trimmed(raw.name.as_deref()).unwrap_or_else(|| naming::kebab_case(&title));
        let title_plural =
            trimmed(raw.title_plural.as_deref()).unwrap_or_else(|| naming::pluralize(&title));
        let name_plural =
            trimmed(raw.name_plural.as_deref()).unwrap_or_else(|| naming::kebab_case(&title_plural));
        let a_or_an =
            trimmed(raw.a_or_an.as_deref()).unwrap_or_else(|| naming::a_or_an(&name).to_string());

        let identifier = Identifier {
            path_to_id: raw.identifier.path_to_id.trim().to_string(),
            schema: raw.identifier.schema,
        };

        let string_identifier = raw.string_identifier.map(|s| StringIdentifier {
            path_to_id: s.path_to_id,
            schema: s.schema.unwrap_or_else(|| json!({ "type": "string" })),
            entity_source_path: s.entity_source_path,
        });

        let tenant_info = raw.tenant_info.map(|t| {
            let leaf = t
                .entity_path_to_id
                .rsplit('.')
                .next()
                .unwrap_or(t.entity_path_to_id.as_str())
                .to_string();
            TenantInfo {
                title: t.title.unwrap_or_else(|| naming::title_case(&leaf)),
                schema: t.schema.unwrap_or_else(|| json!({ "type": "string" })),
                entity_path_to_id: t.entity_path_to_id,
                execution_context_source_path: t.execution_context_source_path,
            }
        });

        let authorization = match raw.authorization {
            Some(a) => Some(Authorization {
                policies: a.policies,
                groups: a.groups,
                ownership: a.ownership.map(convert_ownership).transpose()?,
                interaction: a.interaction,
            }),
            None => None,
        };

        let statuses: Vec<StatusDefinition> = raw
            .statuses
            .into_iter()
            .map(|s| StatusDefinition {
                path_to_status_field: s.path_to_status_field,
                allowed_values: s
                    .allowed_values
                    .into_iter()
                    .map(|v| AllowedStatus { name: v.name, description: v.description })
                    .collect(),
                is_required: s.is_required,
                data_required: s.data_required,
            })
            .collect();

        // Core schema: deep-clone, assign a deterministic $id, hydrate
        let mut core = raw.schemas.core.clone();
        ensure_schema_id(&mut core, raw.base_url.as_deref(), &collection_name)?;
        hydrate_core(
            &mut core,
            &identifier,
            string_identifier.as_ref(),
            tenant_info.as_ref(),
            authorization.as_ref().and_then(|a| a.ownership.as_ref()),
            &statuses,
        );

        // Derived variants, each renamed away from core on collision
        let mut output = derive_variant(&core, raw.schemas.output, SchemaRole::Output, &identifier);
        let mut create = derive_variant(&core, raw.schemas.create, SchemaRole::Create, &identifier);
        let mut replace =
            derive_variant(&core, raw.schemas.replace, SchemaRole::Replace, &identifier);

        filter_output_schema(&mut output, &statuses);
        filter_create_schema(
            &mut create,
            &identifier,
            string_identifier.as_ref(),
            tenant_info.as_ref(),
            &statuses,
        );
        filter_replace_schema(&mut replace, &identifier, string_identifier.as_ref());

        input_validator.add_schema(&core)?;
        input_validator.add_schema(&create)?;
        input_validator.add_schema(&replace)?;
        output_validator.add_schema(&output)?;

        let audit_collection_name = match (raw.audit_collection_name, raw.audit_changes) {
            (Some(name), _) => Some(name),
            (None, true) => Some(format!("{collection_name}-audit")),
            (None, false) => None,
        };

        Ok(EntityMetadata {
            schemas: SchemaSet { core, create, output, replace },
            identifier,
            string_identifier,
            tenant_info,
            authorization,
            statuses,
            collection_name,
            audit_collection_name,
            audit_changes: raw.audit_changes,
            base_url: raw.base_url,
            name,
            name_plural,
            title,
            title_plural,
            a_or_an,
        })
    }
}

/// `initialOwner` dispatch: a closed set of strategies; anything else is a
/// descriptor bug, not user input.
fn convert_ownership(raw: RawOwnership) -> CrudResult<Ownership> {
    let source = match raw.initial_owner.as_str() {
        "creator" => OwnerSource::Creator,
        "setFromEntity" => OwnerSource::FromEntity {
            path: raw.path_to_id.clone().ok_or_else(|| {
                CrudError::configuration("'ownership.pathToId' is required for 'setFromEntity'")
            })?,
        },
        "setFromContext" => OwnerSource::FromContext {
            path: raw.path_to_id.clone().ok_or_else(|| {
                CrudError::configuration("'ownership.pathToId' is required for 'setFromContext'")
            })?,
        },
        other => {
            return Err(CrudError::configuration(format!(
                "Unknown 'ownership.initialOwner' strategy '{other}'"
            )))
        }
    };
    Ok(Ownership {
        source,
        allowed_actions: raw.allowed_actions,
        id_schema: raw.id_schema.unwrap_or_else(|| json!({ "type": "string" })),
    })
}

fn ensure_schema_id(core: &mut Value, base_url: Option<&str>, collection_name: &str) -> CrudResult<()> {
    if schema_string(core, "$id").is_some() {
        return Ok(());
    }
    let base_url = base_url.ok_or_else(|| {
        CrudError::validation("Core schema has no '$id' and no 'baseUrl' to derive one from")
    })?;
    let id = format!("{}/{}", base_url.trim_end_matches('/'), collection_name);
    let parsed = Url::parse(&id)
        .map_err(|e| CrudError::validation(format!("Derived schema $id '{id}' is not a URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || id.len() < MIN_SCHEMA_ID_LENGTH {
        return Err(CrudError::validation(format!(
            "Derived schema $id '{id}' must be an http(s) URL"
        )));
    }
    if let Some(map) = core.as_object_mut() {
        map.insert("$id".to_string(), Value::String(id));
    }
    Ok(())
}

/// Inject the structural fields every persisted entity carries into the
/// canonical schema, so derived variants inherit them.
fn hydrate_core(
    core: &mut Value,
    identifier: &Identifier,
    string_identifier: Option<&StringIdentifier>,
    tenant_info: Option<&TenantInfo>,
    ownership: Option<&Ownership>,
    statuses: &[StatusDefinition],
) {
    schema_paths::ensure_object_shape(core);

    if schema_paths::get_schema_at(core, &identifier.path_to_id).is_none() {
        schema_paths::set_schema_at(core, &identifier.path_to_id, identifier.schema.clone());
    }
    schema_paths::mark_full_path_as_required(core, &identifier.path_to_id);

    if let Some(string_id) = string_identifier {
        if schema_paths::get_schema_at(core, &string_id.path_to_id).is_none() {
            schema_paths::set_schema_at(core, &string_id.path_to_id, string_id.schema.clone());
        }
        schema_paths::mark_full_path_as_required(core, &string_id.path_to_id);
    }

    if let Some(tenant) = tenant_info {
        if schema_paths::get_schema_at(core, &tenant.entity_path_to_id).is_none() {
            schema_paths::set_schema_at(core, &tenant.entity_path_to_id, tenant.schema.clone());
        }
        schema_paths::mark_full_path_as_required(core, &tenant.entity_path_to_id);
    }

    if let Some(ownership) = ownership {
        if schema_paths::get_schema_at(core, "owner").is_none() {
            schema_paths::set_schema_at(core, "owner", owner_schema(&ownership.id_schema));
        }
        schema_paths::add_required(core, "owner");
    }

    for status in statuses {
        let names: Vec<&str> = status.allowed_values.iter().map(|v| v.name.as_str()).collect();
        let field = &status.path_to_status_field;
        if schema_paths::get_schema_at(core, field).is_none() {
            schema_paths::set_schema_at(core, field, json!({ "type": "string", "enum": names }));
        }
        if schema_paths::get_schema_at(core, &status.date_field()).is_none() {
            schema_paths::set_schema_at(core, &status.date_field(), date_time_schema());
        }
        if schema_paths::get_schema_at(core, &status.log_field()).is_none() {
            schema_paths::set_schema_at(
                core,
                &status.log_field(),
                json!({
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "status": { "type": ["string", "null"] },
                            "statusDate": date_time_schema(),
                            "data": { "type": "object" }
                        },
                        "required": ["statusDate"]
                    }
                }),
            );
        }
        if schema_paths::get_schema_at(core, &status.data_field()).is_none() {
            schema_paths::set_schema_at(core, &status.data_field(), json!({ "type": "object" }));
        }
        if status.is_required {
            schema_paths::mark_full_path_as_required(core, field);
        }
    }
}

/// Clone (or adopt) a variant and rename its `$id`/`title`/`name` away
/// from the core schema's. Renaming is collision-driven, so running the
/// whole generation twice cannot double-suffix.
fn derive_variant(
    core: &Value,
    supplied: Option<Value>,
    role: SchemaRole,
    identifier: &Identifier,
) -> Value {
    let mut variant = supplied.unwrap_or_else(|| core.clone());
    schema_paths::ensure_object_shape(&mut variant);

    if schema_paths::get_schema_at(&variant, &identifier.path_to_id).is_none() {
        schema_paths::set_schema_at(&mut variant, &identifier.path_to_id, identifier.schema.clone());
    }
    schema_paths::mark_full_path_as_required(&mut variant, &identifier.path_to_id);

    let core_id = schema_string(core, "$id");
    let variant_id = schema_string(&variant, "$id");
    if let Some(core_id) = &core_id {
        let collides = variant_id.as_deref().map_or(true, |id| id == core_id);
        if collides {
            let renamed = format!("{core_id}/{}", role.id_suffix());
            if let Some(map) = variant.as_object_mut() {
                map.insert("$id".to_string(), Value::String(renamed));
            }
        }
    }

    for key in ["title", "name"] {
        let core_value = schema_string(core, key);
        let variant_value = schema_string(&variant, key);
        if let (Some(core_value), Some(variant_value)) = (core_value, variant_value) {
            if variant_value == core_value && !variant_value.ends_with(role.title_suffix()) {
                let renamed = format!("{variant_value}{}", role.title_suffix());
                if let Some(map) = variant.as_object_mut() {
                    map.insert(key.to_string(), Value::String(renamed));
                }
            }
        }
    }

    variant
}

/// Remove a field's schema node and prune now-empty ancestor objects so a
/// stripped nested field doesn't leave an unsatisfiable required chain.
fn delete_field_and_prune(schema: &mut Value, entity_path: &str) {
    schema_paths::delete_schema_at(schema, entity_path);
    let mut segments: Vec<&str> = entity_path.split('.').collect();
    while segments.len() > 1 {
        segments.pop();
        let parent = segments.join(".");
        let empty = schema_paths::get_schema_at(schema, &parent)
            .and_then(|node| node.get("properties"))
            .and_then(Value::as_object)
            .map_or(false, serde_json::Map::is_empty);
        if empty {
            schema_paths::delete_schema_at(schema, &parent);
        } else {
            break;
        }
    }
}

/// Strip every property flagged `excludeOnOutput`, recursing into nested
/// object properties, array items and `definitions`.
fn strip_excluded_on_output(node: &mut Value) {
    let Some(map) = node.as_object_mut() else { return };

    for container in ["properties", "definitions"] {
        let excluded: Vec<String> = map
            .get(container)
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter(|(_, schema)| {
                        schema.get("excludeOnOutput").and_then(Value::as_bool) == Some(true)
                    })
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();

        if let Some(Value::Object(props)) = map.get_mut(container) {
            for key in &excluded {
                props.remove(key);
            }
            for schema in props.values_mut() {
                strip_excluded_on_output(schema);
            }
        }
        if container == "properties" {
            if let Some(Value::Array(required)) = map.get_mut("required") {
                required.retain(|entry| {
                    entry.as_str().map_or(true, |name| !excluded.iter().any(|e| e == name))
                });
            }
        }
    }

    if let Some(items) = map.get_mut("items") {
        strip_excluded_on_output(items);
    }
}

fn filter_output_schema(output: &mut Value, statuses: &[StatusDefinition]) {
    strip_excluded_on_output(output);
    for status in statuses {
        // The data sidecar is consumed into the log, never persisted
        schema_paths::delete_schema_at(output, &status.data_field());
    }
    schema_paths::set_schema_at(output, "versionInfo", version_info_schema());
    schema_paths::add_required(output, "versionInfo");
}

fn filter_create_schema(
    create: &mut Value,
    identifier: &Identifier,
    string_identifier: Option<&StringIdentifier>,
    tenant_info: Option<&TenantInfo>,
    statuses: &[StatusDefinition],
) {
    schema_paths::delete_schema_at(create, "versionInfo");
    delete_field_and_prune(create, &identifier.path_to_id);
    if let Some(string_id) = string_identifier {
        // Auto-derived from the source field, so never demanded on input
        schema_paths::remove_required(create, &string_id.path_to_id);
    }
    if let Some(tenant) = tenant_info {
        delete_field_and_prune(create, &tenant.entity_path_to_id);
    }
    delete_field_and_prune(create, "owner");
    for status in statuses {
        schema_paths::delete_schema_at(create, &status.date_field());
        schema_paths::delete_schema_at(create, &status.log_field());
        // The status field itself stays settable, just optional
        schema_paths::remove_required(create, &status.path_to_status_field);
    }
}

fn filter_replace_schema(
    replace: &mut Value,
    identifier: &Identifier,
    string_identifier: Option<&StringIdentifier>,
) {
    schema_paths::remove_required(replace, "versionInfo");
    delete_field_and_prune(replace, &identifier.path_to_id);
    if let Some(string_id) = string_identifier {
        schema_paths::remove_required(replace, &string_id.path_to_id);
    }
    // The pipeline carries the owner forward from the stored entity;
    // callers cannot supply it
    schema_paths::remove_required(replace, "owner");
}
