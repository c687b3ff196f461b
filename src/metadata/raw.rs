// Caller-supplied entity descriptor, before derivation
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CrudError, CrudResult};

/// The declarative entity description handed to `EntityMetadata::generate`.
/// Field names follow the camelCase wire convention so descriptors can be
/// loaded straight from JSON configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntityMetadata {
    pub schemas: RawSchemas,
    pub identifier: RawIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_identifier: Option<RawStringIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_info: Option<RawTenantInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<RawAuthorization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<RawStatusDefinition>,
    pub collection_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_collection_name: Option<String>,
    #[serde(default)]
    pub audit_changes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_plural: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_plural: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a_or_an: Option<String>,
}

impl RawEntityMetadata {
    /// Deserialize a descriptor from its JSON form, surfacing serde
    /// failures as validation errors (the descriptor failed its
    /// meta-schema).
    pub fn from_value(value: Value) -> CrudResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| CrudError::validation(format!("Invalid entity metadata: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSchemas {
    pub core: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentifier {
    pub path_to_id: String,
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStringIdentifier {
    pub path_to_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    pub entity_source_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTenantInfo {
    pub entity_path_to_id: String,
    pub execution_context_source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuthorization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<RawOwnership>,
    #[serde(default)]
    pub interaction: crate::metadata::Interaction,
}

/// Ownership rules as declared; `initial_owner` stays a free string here
/// and is converted to the closed `OwnerSource` enum during generation so
/// unknown strategies fail as configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOwnership {
    pub initial_owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_to_id: Option<String>,
    pub allowed_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusDefinition {
    pub path_to_status_field: String,
    pub allowed_values: Vec<RawAllowedStatus>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub data_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAllowedStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
