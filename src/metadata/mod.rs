// Entity metadata: the immutable descriptor every pipeline closes over
pub mod generator;
pub mod raw;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use raw::RawEntityMetadata;

/// Role of a schema within an entity's schema set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaRole {
    Core,
    Create,
    Output,
    Replace,
}

impl SchemaRole {
    /// Suffix appended to a derived schema's `$id` when it collides with
    /// the core schema's.
    pub fn id_suffix(self) -> &'static str {
        match self {
            SchemaRole::Core => "",
            SchemaRole::Create => "Create",
            SchemaRole::Output => "Output",
            SchemaRole::Replace => "Replace",
        }
    }

    /// Suffix appended to a colliding `title`/`name`: operation plus
    /// direction, deduplicated when the two coincide ("Output", not
    /// "OutputOutput").
    pub fn title_suffix(self) -> &'static str {
        match self {
            SchemaRole::Core => "",
            SchemaRole::Create => "CreateInput",
            SchemaRole::Output => "Output",
            SchemaRole::Replace => "ReplaceInput",
        }
    }
}

/// The four schema variants of one entity type. `core` is canonical; the
/// others are mechanically derived and independently addressable.
#[derive(Debug, Clone)]
pub struct SchemaSet {
    pub core: Value,
    pub create: Value,
    pub output: Value,
    pub replace: Value,
}

impl SchemaSet {
    pub fn get(&self, role: SchemaRole) -> &Value {
        match role {
            SchemaRole::Core => &self.core,
            SchemaRole::Create => &self.create,
            SchemaRole::Output => &self.output,
            SchemaRole::Replace => &self.replace,
        }
    }

    /// The `$id` of a schema variant. Guaranteed present after generation.
    pub fn id_of(&self, role: SchemaRole) -> &str {
        self.get(role).get("$id").and_then(Value::as_str).unwrap_or_default()
    }
}

/// Primary key declaration: where the id lives on the entity and what
/// shape it has.
#[derive(Debug, Clone)]
pub struct Identifier {
    pub path_to_id: String,
    pub schema: Value,
}

/// Secondary human-readable identifier, derived once from another field
/// via slugify and never overwritten.
#[derive(Debug, Clone)]
pub struct StringIdentifier {
    pub path_to_id: String,
    pub schema: Value,
    pub entity_source_path: String,
}

/// Tenant scoping declaration: every operation injects/verifies the value
/// sourced from the execution context at `execution_context_source_path`
/// into the entity field at `entity_path_to_id` and into search filters.
#[derive(Debug, Clone)]
pub struct TenantInfo {
    pub entity_path_to_id: String,
    pub execution_context_source_path: String,
    pub title: String,
    pub schema: Value,
}

/// How acl and ownership verdicts combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    #[default]
    Or,
    And,
}

/// Where the initial owner id comes from at creation time. Each variant
/// carries only what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerSource {
    Creator,
    FromEntity { path: String },
    FromContext { path: String },
}

#[derive(Debug, Clone)]
pub struct Ownership {
    pub source: OwnerSource,
    pub allowed_actions: Vec<String>,
    pub id_schema: Value,
}

impl Ownership {
    /// True when the ownership rules cover `action` (exact match or the
    /// `*` wildcard).
    pub fn permits_action(&self, action: &str) -> bool {
        self.allowed_actions.iter().any(|a| a == action || a == "*")
    }
}

#[derive(Debug, Clone)]
pub struct Authorization {
    pub policies: Option<Value>,
    pub groups: Option<Value>,
    pub ownership: Option<Ownership>,
    pub interaction: Interaction,
}

#[derive(Debug, Clone)]
pub struct AllowedStatus {
    pub name: String,
    pub description: Option<String>,
}

/// One declared status lifecycle field.
#[derive(Debug, Clone)]
pub struct StatusDefinition {
    pub path_to_status_field: String,
    pub allowed_values: Vec<AllowedStatus>,
    pub is_required: bool,
    pub data_required: bool,
}

impl StatusDefinition {
    /// The implicit initial status when none is supplied on creation.
    pub fn default_value(&self) -> &str {
        &self.allowed_values[0].name
    }

    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values.iter().any(|v| v.name == value)
    }

    pub fn date_field(&self) -> String {
        format!("{}Date", self.path_to_status_field)
    }

    pub fn log_field(&self) -> String {
        format!("{}Log", self.path_to_status_field)
    }

    /// Sidecar input field consumed into the log and stripped from the
    /// persisted entity.
    pub fn data_field(&self) -> String {
        format!("{}Data", self.path_to_status_field)
    }
}

/// The generated, immutable entity descriptor. Produced once at startup
/// by `EntityMetadata::generate`; the CRUD pipeline closes over it.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub schemas: SchemaSet,
    pub identifier: Identifier,
    pub string_identifier: Option<StringIdentifier>,
    pub tenant_info: Option<TenantInfo>,
    pub authorization: Option<Authorization>,
    pub statuses: Vec<StatusDefinition>,
    pub collection_name: String,
    pub audit_collection_name: Option<String>,
    pub audit_changes: bool,
    pub base_url: Option<String>,
    pub name: String,
    pub name_plural: String,
    pub title: String,
    pub title_plural: String,
    pub a_or_an: String,
}

impl EntityMetadata {
    pub fn ownership(&self) -> Option<&Ownership> {
        self.authorization.as_ref()?.ownership.as_ref()
    }

    pub fn core_schema_id(&self) -> &str {
        self.schemas.id_of(SchemaRole::Core)
    }

    pub fn create_schema_id(&self) -> &str {
        self.schemas.id_of(SchemaRole::Create)
    }

    pub fn replace_schema_id(&self) -> &str {
        self.schemas.id_of(SchemaRole::Replace)
    }

    pub fn output_schema_id(&self) -> &str {
        self.schemas.id_of(SchemaRole::Output)
    }
}
