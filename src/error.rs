// Domain error taxonomy shared by every pipeline step
use std::collections::HashMap;

use serde_json::Value;

use crate::store::StoreError;

/// Errors raised by metadata generation and the CRUD pipeline.
///
/// Every step raises exactly one of these kinds and the pipeline aborts at
/// the first failure; nothing is caught and downgraded inside the library.
/// Mapping to transport-level codes is the embedder's job.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    /// Malformed entity-metadata descriptor. Raised at generation time,
    /// never at request time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input or computed entity failed a JSON-Schema check.
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    /// A filter matched nothing.
    #[error("{title} with id '{id}' was not found")]
    EntityNotFound { title: String, id: String },

    /// Execution context is missing the tenant-scoping value.
    #[error("Tenant error: {0}")]
    Tenant(String),

    /// Policy and/or ownership check denied the action.
    #[error("Identity '{identity}' is not authorized to {action} {resource}")]
    NotAuthorized {
        identity: String,
        resource: String,
        action: String,
    },

    /// A required internal parameter was not supplied. Signals a
    /// programming or integration error, not bad user input.
    #[error("{0} is required")]
    IsRequired(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CrudError {
    pub fn validation(message: impl Into<String>) -> Self {
        CrudError::Validation { message: message.into(), field_errors: None }
    }

    pub fn validation_with_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        CrudError::Validation { message: message.into(), field_errors: Some(field_errors) }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CrudError::Configuration(message.into())
    }

    pub fn not_found(title: impl Into<String>, id: &Value) -> Self {
        let id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        CrudError::EntityNotFound { title: title.into(), id }
    }

    pub fn not_authorized(
        identity: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        CrudError::NotAuthorized {
            identity: identity.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn is_required(name: impl Into<String>) -> Self {
        CrudError::IsRequired(name.into())
    }

    /// Stable code for client-side handling, mirroring the taxonomy kinds.
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::Configuration(_) => "CONFIGURATION_ERROR",
            CrudError::Validation { .. } => "VALIDATION_ERROR",
            CrudError::EntityNotFound { .. } => "NOT_FOUND",
            CrudError::Tenant(_) => "TENANT_ERROR",
            CrudError::NotAuthorized { .. } => "NOT_AUTHORIZED",
            CrudError::IsRequired(_) => "IS_REQUIRED",
            CrudError::Store(_) => "STORE_ERROR",
        }
    }
}

pub type CrudResult<T> = Result<T, CrudError>;
