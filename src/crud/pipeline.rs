// Hook-extensible step pipeline shared by all five operations
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::CrudResult;
use crate::store::StoreQuery;

/// The five operations driving the pipeline. Built-in steps branch on
/// this where their behavior differs per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    GetById,
    DeleteById,
    ReplaceById,
    Search,
}

impl OperationKind {
    /// The authorization action checked for this operation.
    pub fn action(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::GetById => "retrieve",
            OperationKind::DeleteById => "delete",
            OperationKind::ReplaceById => "update",
            OperationKind::Search => "search",
        }
    }
}

/// Stable tags identifying each pipeline step. Hooks address steps by
/// tag, so replacing or wrapping a step never relies on function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepTag {
    SetEntityFromInput,
    SanitizeInput,
    ValidateInput,
    SetMetadata,
    BuildFilter,
    FindExisting,
    Authorize,
    ApplyTenant,
    MergeExisting,
    ValidateEntity,
    Persist,
    WriteAudit,
    NormalizeQuery,
    NarrowFilter,
    ExecuteQuery,
    MapOutput,
}

/// Shared mutable state flowing through one operation's pipeline. Hooks
/// receive the same record the built-in steps operate on.
#[derive(Debug)]
pub struct StepContext {
    pub operation: OperationKind,
    pub execution_context: ExecutionContext,
    /// The caller's raw input (entity body or search query), never
    /// mutated.
    pub input: Value,
    /// The caller-supplied identifier for by-id operations.
    pub id: Value,
    /// The working entity being built up for persistence.
    pub entity: Value,
    /// The stored entity located by `FindExisting`.
    pub existing: Option<Value>,
    /// Store filter for by-id operations.
    pub filter: Map<String, Value>,
    /// Translated search query.
    pub query: StoreQuery,
    /// Search results before output mapping.
    pub items: Vec<Value>,
    /// The operation's mapped result.
    pub output: Value,
}

impl StepContext {
    pub fn new(operation: OperationKind, execution_context: ExecutionContext) -> Self {
        Self {
            operation,
            execution_context,
            input: Value::Null,
            id: Value::Null,
            entity: Value::Null,
            existing: None,
            filter: Map::new(),
            query: StoreQuery::default(),
            items: Vec::new(),
            output: Value::Null,
        }
    }
}

/// A hook body: an async closure borrowing the step context.
pub type StepFn =
    Arc<dyn for<'a> Fn(&'a mut StepContext) -> BoxFuture<'a, CrudResult<()>> + Send + Sync>;

#[derive(Default, Clone)]
struct StepHooks {
    before: Option<StepFn>,
    replace: Option<StepFn>,
    after: Option<StepFn>,
}

/// Per-call hook registration: any step can be wrapped with before/after
/// callbacks or replaced outright, keyed by its stable tag.
#[derive(Default, Clone)]
pub struct Hooks {
    steps: HashMap<StepTag, StepHooks>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(mut self, tag: StepTag, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut StepContext) -> BoxFuture<'a, CrudResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.steps.entry(tag).or_default().before = Some(Arc::new(hook));
        self
    }

    pub fn replace<F>(mut self, tag: StepTag, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut StepContext) -> BoxFuture<'a, CrudResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.steps.entry(tag).or_default().replace = Some(Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, tag: StepTag, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut StepContext) -> BoxFuture<'a, CrudResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.steps.entry(tag).or_default().after = Some(Arc::new(hook));
        self
    }

    pub(crate) fn before_fn(&self, tag: StepTag) -> Option<&StepFn> {
        self.steps.get(&tag)?.before.as_ref()
    }

    pub(crate) fn replace_fn(&self, tag: StepTag) -> Option<&StepFn> {
        self.steps.get(&tag)?.replace.as_ref()
    }

    pub(crate) fn after_fn(&self, tag: StepTag) -> Option<&StepFn> {
        self.steps.get(&tag)?.after.as_ref()
    }
}
