// Generic CRUD orchestration over one entity type
pub mod audit;
pub mod identifier;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod tenant;
pub mod version_info;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::auth::{
    check_authorization, check_authorization_or_add_owner_to_filter, set_owner_if_applicable,
    PolicyEnforcer,
};
use crate::context::ExecutionContext;
use crate::error::{CrudError, CrudResult};
use crate::ids::ObjectId;
use crate::metadata::EntityMetadata;
use crate::naming;
use crate::paths;
use crate::schema::SchemaValidator;
use crate::store::{DocumentStore, SortOrder, StoreQuery};

use audit::AuditAction;
use pipeline::{Hooks, OperationKind, StepContext, StepTag};

/// Default page size for search when the caller sets no limit.
const DEFAULT_SEARCH_LIMIT: u64 = 20;

const CREATE_STEPS: &[StepTag] = &[
    StepTag::SetEntityFromInput,
    StepTag::ValidateInput,
    StepTag::SetMetadata,
    StepTag::Authorize,
    StepTag::Persist,
    StepTag::WriteAudit,
    StepTag::MapOutput,
];

const GET_BY_ID_STEPS: &[StepTag] = &[
    StepTag::BuildFilter,
    StepTag::FindExisting,
    StepTag::Authorize,
    StepTag::MapOutput,
];

const DELETE_BY_ID_STEPS: &[StepTag] = &[
    StepTag::BuildFilter,
    StepTag::FindExisting,
    StepTag::Authorize,
    StepTag::Persist,
    StepTag::WriteAudit,
];

const REPLACE_BY_ID_STEPS: &[StepTag] = &[
    StepTag::SanitizeInput,
    StepTag::BuildFilter,
    StepTag::FindExisting,
    StepTag::Authorize,
    StepTag::ApplyTenant,
    StepTag::ValidateInput,
    StepTag::MergeExisting,
    StepTag::ValidateEntity,
    StepTag::Persist,
    StepTag::WriteAudit,
    StepTag::MapOutput,
];

const SEARCH_STEPS: &[StepTag] = &[
    StepTag::NormalizeQuery,
    StepTag::ApplyTenant,
    StepTag::NarrowFilter,
    StepTag::ExecuteQuery,
    StepTag::MapOutput,
];

/// Search results. Wrapped in a named struct so the shape can grow
/// (counts, cursors) without breaking callers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub items: Vec<Value>,
}

/// Handles for hook authors and advanced composition: the metadata and
/// collaborators one `EntityCrud` closes over.
#[derive(Clone)]
pub struct Utilities {
    pub metadata: Arc<EntityMetadata>,
    pub store: Arc<dyn DocumentStore>,
    pub input_validator: Arc<dyn SchemaValidator>,
    pub output_validator: Arc<dyn SchemaValidator>,
}

/// The per-entity-type CRUD object. Built once at startup, closing over
/// the generated metadata and the store/validator/enforcer
/// collaborators; every call then runs a hook-extensible step pipeline
/// against a fresh per-call context.
pub struct EntityCrud {
    metadata: Arc<EntityMetadata>,
    store: Arc<dyn DocumentStore>,
    input_validator: Arc<dyn SchemaValidator>,
    output_validator: Arc<dyn SchemaValidator>,
    enforcer: Option<Arc<dyn PolicyEnforcer>>,
}

impl EntityCrud {
    pub fn new(
        metadata: Arc<EntityMetadata>,
        store: Arc<dyn DocumentStore>,
        input_validator: Arc<dyn SchemaValidator>,
        output_validator: Arc<dyn SchemaValidator>,
        enforcer: Option<Arc<dyn PolicyEnforcer>>,
    ) -> Self {
        Self { metadata, store, input_validator, output_validator, enforcer }
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn utilities(&self) -> Utilities {
        Utilities {
            metadata: Arc::clone(&self.metadata),
            store: Arc::clone(&self.store),
            input_validator: Arc::clone(&self.input_validator),
            output_validator: Arc::clone(&self.output_validator),
        }
    }

    // ========================================
    // Operations
    // ========================================

    /// Validate, stamp and persist a new entity. The caller's input is
    /// never mutated; the mapped output is returned.
    pub async fn create(
        &self,
        entity: &Value,
        context: &ExecutionContext,
        hooks: Option<&Hooks>,
    ) -> CrudResult<Value> {
        let mut ctx = StepContext::new(OperationKind::Create, context.clone());
        ctx.input = entity.clone();
        self.run_pipeline(CREATE_STEPS, &mut ctx, hooks).await?;
        Ok(ctx.output)
    }

    /// Fetch one entity by primary or string identifier.
    pub async fn get_by_id(
        &self,
        id: &Value,
        context: &ExecutionContext,
        hooks: Option<&Hooks>,
    ) -> CrudResult<Value> {
        let mut ctx = StepContext::new(OperationKind::GetById, context.clone());
        ctx.id = id.clone();
        self.run_pipeline(GET_BY_ID_STEPS, &mut ctx, hooks).await?;
        Ok(ctx.output)
    }

    /// Delete one entity by identifier, auditing the pre-delete snapshot.
    pub async fn delete_by_id(
        &self,
        id: &Value,
        context: &ExecutionContext,
        hooks: Option<&Hooks>,
    ) -> CrudResult<()> {
        let mut ctx = StepContext::new(OperationKind::DeleteById, context.clone());
        ctx.id = id.clone();
        self.run_pipeline(DELETE_BY_ID_STEPS, &mut ctx, hooks).await
    }

    /// Replace one entity wholesale, preserving the server-managed
    /// fields (version info, owner, tenant, primary id).
    pub async fn replace_by_id(
        &self,
        id: &Value,
        entity: &Value,
        context: &ExecutionContext,
        hooks: Option<&Hooks>,
    ) -> CrudResult<Value> {
        let mut ctx = StepContext::new(OperationKind::ReplaceById, context.clone());
        ctx.id = id.clone();
        ctx.input = entity.clone();
        self.run_pipeline(REPLACE_BY_ID_STEPS, &mut ctx, hooks).await?;
        Ok(ctx.output)
    }

    /// Search with tenant scoping and ownership narrowing applied.
    pub async fn search(
        &self,
        query: &Value,
        context: &ExecutionContext,
        hooks: Option<&Hooks>,
    ) -> CrudResult<SearchResult> {
        let mut ctx = StepContext::new(OperationKind::Search, context.clone());
        ctx.input = query.clone();
        self.run_pipeline(SEARCH_STEPS, &mut ctx, hooks).await?;
        Ok(SearchResult { items: ctx.items })
    }

    // ========================================
    // Pipeline execution
    // ========================================

    async fn run_pipeline(
        &self,
        steps: &[StepTag],
        ctx: &mut StepContext,
        hooks: Option<&Hooks>,
    ) -> CrudResult<()> {
        tracing::debug!(
            operation = ?ctx.operation,
            entity = %self.metadata.name,
            request_id = %ctx.execution_context.request_id,
            "Pipeline starting"
        );
        for &tag in steps {
            if let Some(hook) = hooks.and_then(|h| h.before_fn(tag)) {
                hook(ctx).await?;
            }
            match hooks.and_then(|h| h.replace_fn(tag)) {
                Some(hook) => hook(ctx).await?,
                None => self.run_builtin(tag, ctx).await?,
            }
            if let Some(hook) = hooks.and_then(|h| h.after_fn(tag)) {
                hook(ctx).await?;
            }
        }
        Ok(())
    }

    async fn run_builtin(&self, tag: StepTag, ctx: &mut StepContext) -> CrudResult<()> {
        match tag {
            StepTag::SetEntityFromInput => self.step_set_entity_from_input(ctx),
            StepTag::SanitizeInput => self.step_sanitize_input(ctx),
            StepTag::ValidateInput => self.step_validate_input(ctx),
            StepTag::SetMetadata => self.step_set_metadata(ctx),
            StepTag::BuildFilter => self.step_build_filter(ctx),
            StepTag::FindExisting => self.step_find_existing(ctx).await,
            StepTag::Authorize => self.step_authorize(ctx).await,
            StepTag::ApplyTenant => self.step_apply_tenant(ctx),
            StepTag::MergeExisting => self.step_merge_existing(ctx),
            StepTag::ValidateEntity => self.step_validate_entity(ctx),
            StepTag::Persist => self.step_persist(ctx).await,
            StepTag::WriteAudit => self.step_write_audit(ctx).await,
            StepTag::NormalizeQuery => self.step_normalize_query(ctx),
            StepTag::NarrowFilter => self.step_narrow_filter(ctx).await,
            StepTag::ExecuteQuery => self.step_execute_query(ctx).await,
            StepTag::MapOutput => self.step_map_output(ctx),
        }
    }

    // ========================================
    // Built-in steps
    // ========================================

    fn step_set_entity_from_input(&self, ctx: &mut StepContext) -> CrudResult<()> {
        if !ctx.input.is_object() {
            return Err(CrudError::validation(format!(
                "{} {} must be an object",
                self.metadata.a_or_an, self.metadata.name
            )));
        }
        ctx.entity = ctx.input.clone();
        Ok(())
    }

    /// Replace path: server-managed fields can never come from outside.
    fn step_sanitize_input(&self, ctx: &mut StepContext) -> CrudResult<()> {
        if !ctx.input.is_object() {
            return Err(CrudError::validation(format!(
                "{} {} must be an object",
                self.metadata.a_or_an, self.metadata.name
            )));
        }
        let mut entity = ctx.input.clone();
        paths::remove_path(&mut entity, "versionInfo");
        paths::remove_path(&mut entity, &self.metadata.identifier.path_to_id);
        paths::remove_path(&mut entity, "owner");
        ctx.entity = entity;
        Ok(())
    }

    fn step_validate_input(&self, ctx: &mut StepContext) -> CrudResult<()> {
        let schema_id = match ctx.operation {
            OperationKind::ReplaceById => self.metadata.replace_schema_id(),
            _ => self.metadata.create_schema_id(),
        };
        self.input_validator.ensure_valid(schema_id, &ctx.entity)
    }

    /// Creation-time stamping: string identifier, tenant, statuses,
    /// version info, owner, fresh primary id, then a core-schema check
    /// of the computed entity.
    fn step_set_metadata(&self, ctx: &mut StepContext) -> CrudResult<()> {
        self.set_string_identifier_if_absent(&mut ctx.entity, None);
        tenant::apply_tenant_to_entity(&self.metadata, &mut ctx.entity, &ctx.execution_context)?;
        status::set_statuses_if_applicable(&self.metadata, &mut ctx.entity, None)?;
        version_info::set_version_info(&self.metadata, &mut ctx.entity, &ctx.execution_context)?;
        set_owner_if_applicable(&self.metadata, &mut ctx.entity, &ctx.execution_context)?;
        paths::set_path(
            &mut ctx.entity,
            &self.metadata.identifier.path_to_id,
            ObjectId::new().into(),
        );
        self.input_validator.ensure_valid(self.metadata.core_schema_id(), &ctx.entity)
    }

    fn step_build_filter(&self, ctx: &mut StepContext) -> CrudResult<()> {
        let mut filter = identifier::build_identifier_filter(&self.metadata, &ctx.id)?;
        tenant::add_tenant_to_filter(&self.metadata, &mut filter, &ctx.execution_context)?;
        ctx.filter = filter;
        Ok(())
    }

    async fn step_find_existing(&self, ctx: &mut StepContext) -> CrudResult<()> {
        let found = self
            .store
            .find_one(&self.metadata.collection_name, &ctx.filter)
            .await?
            .ok_or_else(|| CrudError::not_found(&self.metadata.title, &ctx.id))?;
        ctx.existing = Some(found);
        Ok(())
    }

    async fn step_authorize(&self, ctx: &mut StepContext) -> CrudResult<()> {
        // Ownership checks run against the stored entity for by-id
        // operations and against the freshly stamped one for create
        let entity = match ctx.operation {
            OperationKind::Create => &ctx.entity,
            _ => ctx.existing.as_ref().unwrap_or(&Value::Null),
        };
        check_authorization(
            self.enforcer.as_deref(),
            &self.metadata,
            &ctx.execution_context,
            ctx.operation.action(),
            entity,
        )
        .await
    }

    fn step_apply_tenant(&self, ctx: &mut StepContext) -> CrudResult<()> {
        match ctx.operation {
            OperationKind::ReplaceById => {
                if let Some(existing) = &ctx.existing {
                    tenant::carry_tenant_from_existing(&self.metadata, &mut ctx.entity, existing);
                }
                Ok(())
            }
            OperationKind::Search => tenant::add_tenant_to_filter(
                &self.metadata,
                &mut ctx.query.filter,
                &ctx.execution_context,
            ),
            _ => Ok(()),
        }
    }

    /// Replace path: carry the server-managed fields forward from the
    /// stored entity, then refresh the mutable half.
    fn step_merge_existing(&self, ctx: &mut StepContext) -> CrudResult<()> {
        let existing = ctx
            .existing
            .clone()
            .ok_or_else(|| CrudError::is_required("The existing entity on the replace path"))?;

        for field in ["versionInfo", "owner"] {
            if let Some(value) = paths::get_path(&existing, field) {
                paths::set_path(&mut ctx.entity, field, value.clone());
            }
        }
        status::set_statuses_if_applicable(&self.metadata, &mut ctx.entity, Some(&existing))?;
        version_info::set_version_info(&self.metadata, &mut ctx.entity, &ctx.execution_context)?;
        self.set_string_identifier_if_absent(&mut ctx.entity, Some(&existing));
        if let Some(id) = paths::get_path(&existing, &self.metadata.identifier.path_to_id) {
            paths::set_path(&mut ctx.entity, &self.metadata.identifier.path_to_id, id.clone());
        }
        Ok(())
    }

    fn step_validate_entity(&self, ctx: &mut StepContext) -> CrudResult<()> {
        self.input_validator.ensure_valid(self.metadata.core_schema_id(), &ctx.entity)
    }

    async fn step_persist(&self, ctx: &mut StepContext) -> CrudResult<()> {
        let collection = &self.metadata.collection_name;
        match ctx.operation {
            OperationKind::Create => {
                self.store.insert_one(collection, ctx.entity.clone()).await?;
                Ok(())
            }
            OperationKind::ReplaceById => {
                let previous = self
                    .store
                    .find_one_and_replace(collection, &ctx.filter, ctx.entity.clone())
                    .await?;
                match previous {
                    Some(_) => Ok(()),
                    None => Err(CrudError::not_found(&self.metadata.title, &ctx.id)),
                }
            }
            OperationKind::DeleteById => {
                let removed = self.store.find_one_and_delete(collection, &ctx.filter).await?;
                match removed {
                    Some(_) => Ok(()),
                    None => Err(CrudError::not_found(&self.metadata.title, &ctx.id)),
                }
            }
            _ => Ok(()),
        }
    }

    async fn step_write_audit(&self, ctx: &mut StepContext) -> CrudResult<()> {
        let (action, entity, previous) = match ctx.operation {
            OperationKind::Create => (AuditAction::Create, &ctx.entity, None),
            OperationKind::DeleteById => {
                let snapshot = ctx
                    .existing
                    .as_ref()
                    .ok_or_else(|| CrudError::is_required("The deleted entity snapshot"))?;
                (AuditAction::Delete, snapshot, None)
            }
            OperationKind::ReplaceById => {
                (AuditAction::Replace, &ctx.entity, ctx.existing.as_ref())
            }
            _ => return Ok(()),
        };
        audit::write_audit(
            self.store.as_ref(),
            &self.metadata,
            action,
            entity,
            previous,
            &ctx.execution_context,
        )
        .await
    }

    fn step_normalize_query(&self, ctx: &mut StepContext) -> CrudResult<()> {
        ctx.query = normalize_query(&ctx.input)?;
        Ok(())
    }

    async fn step_narrow_filter(&self, ctx: &mut StepContext) -> CrudResult<()> {
        check_authorization_or_add_owner_to_filter(
            &mut ctx.query.filter,
            self.enforcer.as_deref(),
            &self.metadata,
            &ctx.execution_context,
            ctx.operation.action(),
        )
        .await
    }

    async fn step_execute_query(&self, ctx: &mut StepContext) -> CrudResult<()> {
        if ctx.query.limit.is_none() {
            ctx.query.limit = Some(DEFAULT_SEARCH_LIMIT);
        }
        ctx.items = self.store.find_many(&self.metadata.collection_name, &ctx.query).await?;
        Ok(())
    }

    fn step_map_output(&self, ctx: &mut StepContext) -> CrudResult<()> {
        match ctx.operation {
            OperationKind::Create | OperationKind::ReplaceById => {
                ctx.output = output::map_output(&self.metadata, &ctx.entity);
            }
            OperationKind::GetById => {
                let entity = ctx
                    .existing
                    .as_ref()
                    .ok_or_else(|| CrudError::is_required("The entity located by id"))?;
                ctx.output = output::map_output(&self.metadata, entity);
            }
            OperationKind::Search => {
                ctx.items = ctx
                    .items
                    .iter()
                    .map(|item| output::map_output(&self.metadata, item))
                    .collect();
            }
            OperationKind::DeleteById => {}
        }
        Ok(())
    }

    /// Set-once string identifier derivation: fills the slug from the
    /// declared source field only when the field is still blank.
    fn set_string_identifier_if_absent(&self, entity: &mut Value, existing: Option<&Value>) {
        let Some(string_id) = &self.metadata.string_identifier else { return };
        if !paths::is_blank_at(entity, &string_id.path_to_id) {
            return;
        }
        if let Some(stored) = existing {
            if let Some(value) = paths::get_path(stored, &string_id.path_to_id) {
                paths::set_path(entity, &string_id.path_to_id, value.clone());
                return;
            }
        }
        if let Some(source) = paths::get_path(entity, &string_id.entity_source_path)
            .and_then(Value::as_str)
        {
            let slug = naming::slugify(source);
            if !slug.is_empty() {
                paths::set_path(entity, &string_id.path_to_id, Value::String(slug));
            }
        }
    }
}

/// Normalize a caller-supplied search query into a `StoreQuery`. A bare
/// object with none of the reserved keys is treated as the filter
/// itself. Query strings are the business of an external mapper.
fn normalize_query(input: &Value) -> CrudResult<StoreQuery> {
    let object = match input {
        Value::Null => return Ok(StoreQuery::default()),
        Value::Object(object) => object,
        Value::String(_) => {
            return Err(CrudError::validation(
                "Query strings must be translated by an external query mapper before searching",
            ))
        }
        other => {
            return Err(CrudError::validation(format!("A search query must be an object: {other}")))
        }
    };

    const RESERVED: [&str; 5] = ["filter", "skip", "limit", "sort", "projection"];
    let structured = object.keys().any(|key| RESERVED.contains(&key.as_str()));
    if !structured {
        return Ok(StoreQuery::with_filter(object.clone()));
    }

    let mut query = StoreQuery::default();
    if let Some(filter) = object.get("filter") {
        query.filter = filter
            .as_object()
            .cloned()
            .ok_or_else(|| CrudError::validation("'filter' must be an object"))?;
    }
    query.skip = object.get("skip").and_then(Value::as_u64);
    query.limit = object.get("limit").and_then(Value::as_u64);

    if let Some(sort) = object.get("sort").and_then(Value::as_object) {
        for (field, direction) in sort {
            let order = match direction {
                Value::Number(n) if n.as_i64() == Some(-1) => SortOrder::Descending,
                Value::String(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Descending,
                _ => SortOrder::Ascending,
            };
            query.sort.push((field.clone(), order));
        }
    }

    match object.get("projection") {
        Some(Value::Array(fields)) => {
            query.projection =
                fields.iter().filter_map(Value::as_str).map(str::to_string).collect();
        }
        Some(Value::Object(fields)) => {
            query.projection = fields
                .iter()
                .filter(|(_, include)| {
                    !matches!(include, Value::Bool(false))
                        && !matches!(include, Value::Number(n) if n.as_i64() == Some(0))
                })
                .map(|(field, _)| field.clone())
                .collect();
        }
        _ => {}
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_object_becomes_the_filter() {
        let query = normalize_query(&json!({ "title": "x" })).unwrap();
        assert_eq!(query.filter.get("title"), Some(&json!("x")));
        assert!(query.limit.is_none());
    }

    #[test]
    fn structured_query_is_unpacked() {
        let query = normalize_query(&json!({
            "filter": { "state": "open" },
            "skip": 5,
            "limit": 10,
            "sort": { "title": -1 },
            "projection": ["title"]
        }))
        .unwrap();
        assert_eq!(query.filter.get("state"), Some(&json!("open")));
        assert_eq!(query.skip, Some(5));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.sort, vec![("title".to_string(), SortOrder::Descending)]);
        assert_eq!(query.projection, vec!["title".to_string()]);
    }

    #[test]
    fn query_strings_are_rejected() {
        assert!(normalize_query(&json!("title=x")).is_err());
        assert!(normalize_query(&json!(42)).is_err());
    }
}
