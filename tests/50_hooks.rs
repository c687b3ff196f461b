mod common;

use common::{build, context, hook, todo_descriptor};
use entity_crud::{CrudError, Hooks, StepTag};
use serde_json::json;

#[tokio::test]
async fn before_hook_enriches_the_entity() {
    let fixture = build(todo_descriptor());
    let hooks = Hooks::new().before(
        StepTag::SetMetadata,
        hook(|ctx| {
            Box::pin(async move {
                ctx.entity["description"] = json!("added by hook");
                Ok(())
            })
        }),
    );

    let created = fixture
        .crud
        .create(&json!({ "title": "Buy milk" }), &context("u1"), Some(&hooks))
        .await
        .unwrap();
    assert_eq!(created["description"], json!("added by hook"));
}

#[tokio::test]
async fn replace_hook_overrides_the_builtin_step() {
    let fixture = build(todo_descriptor());
    let hooks = Hooks::new().replace(
        StepTag::MapOutput,
        hook(|ctx| {
            Box::pin(async move {
                ctx.output = json!({ "id": ctx.entity["_id"] });
                Ok(())
            })
        }),
    );

    let created = fixture
        .crud
        .create(&json!({ "title": "Buy milk" }), &context("u1"), Some(&hooks))
        .await
        .unwrap();
    assert_eq!(created.as_object().unwrap().len(), 1);
    assert!(created["id"].is_string());
}

#[tokio::test]
async fn after_hook_post_processes_the_output() {
    let fixture = build(todo_descriptor());
    let hooks = Hooks::new().after(
        StepTag::MapOutput,
        hook(|ctx| {
            Box::pin(async move {
                ctx.output["fetchedBy"] = json!(ctx.execution_context.identity.id);
                Ok(())
            })
        }),
    );

    let ctx = context("u1");
    let created = fixture.crud.create(&json!({ "title": "Buy milk" }), &ctx, None).await.unwrap();
    let fetched = fixture.crud.get_by_id(&created["_id"], &ctx, Some(&hooks)).await.unwrap();
    assert_eq!(fetched["fetchedBy"], json!("u1"));
}

#[tokio::test]
async fn hook_failure_aborts_before_the_write() {
    let fixture = build(todo_descriptor());
    let hooks = Hooks::new().before(
        StepTag::Persist,
        hook(|_ctx| Box::pin(async move { Err(CrudError::validation("rejected by hook")) })),
    );

    let err = fixture
        .crud
        .create(&json!({ "title": "Buy milk" }), &context("u1"), Some(&hooks))
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));
    assert_eq!(fixture.store.count("todos").await, 0);
}

#[tokio::test]
async fn search_hook_can_constrain_the_query() {
    let fixture = build(todo_descriptor());
    let ctx = context("u1");
    fixture.crud.create(&json!({ "title": "Open", "state": "todo" }), &ctx, None).await.unwrap();
    fixture.crud.create(&json!({ "title": "Done", "state": "done" }), &ctx, None).await.unwrap();

    let hooks = Hooks::new().before(
        StepTag::ExecuteQuery,
        hook(|ctx| {
            Box::pin(async move {
                ctx.query.filter.insert("state".to_string(), json!("done"));
                Ok(())
            })
        }),
    );

    let results = fixture.crud.search(&json!({}), &ctx, Some(&hooks)).await.unwrap();
    assert_eq!(results.items.len(), 1);
    assert_eq!(results.items[0]["title"], json!("Done"));
}
