//! Metadata-driven CRUD over a document store.
//!
//! An entity type is declared once as raw metadata (a core JSON Schema
//! plus identifier, tenant, ownership and status declarations);
//! [`EntityMetadata::generate`] derives the create/output/replace schema
//! variants and registers everything with the schema validators. The
//! resulting descriptor powers an [`EntityCrud`] handle whose five
//! operations (create, get, delete, replace, search) run a shared,
//! hook-extensible step pipeline: input validation, tenant scoping,
//! authorization, status lifecycles, version stamping, audit trail and
//! output mapping all fall out of the metadata rather than per-entity
//! code.

pub mod auth;
pub mod context;
pub mod crud;
pub mod error;
pub mod ids;
pub mod metadata;
pub mod naming;
pub mod paths;
pub mod schema;
pub mod store;

pub use auth::PolicyEnforcer;
pub use context::{ExecutionContext, Identity};
pub use crud::pipeline::{Hooks, OperationKind, StepContext, StepTag};
pub use crud::{EntityCrud, SearchResult, Utilities};
pub use error::{CrudError, CrudResult};
pub use ids::ObjectId;
pub use metadata::{EntityMetadata, RawEntityMetadata};
pub use schema::{JsonSchemaRegistry, SchemaValidator};
pub use store::{DocumentStore, MemoryStore, SortOrder, StoreError, StoreQuery};
