mod common;

use common::{build, context, todo_descriptor};
use entity_crud::CrudError;
use serde_json::{json, Value};

fn optional_status_descriptor() -> Value {
    let mut descriptor = todo_descriptor();
    descriptor["statuses"][0]["isRequired"] = json!(false);
    descriptor
}

#[tokio::test]
async fn supplied_status_and_sidecar_land_in_the_log() {
    let fixture = build(todo_descriptor());
    let created = fixture
        .crud
        .create(
            &json!({ "title": "Buy milk", "state": "done", "stateData": { "note": "pre-done" } }),
            &context("u1"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(created["state"], json!("done"));
    assert_eq!(created["stateLog"][0]["status"], json!("done"));
    assert_eq!(created["stateLog"][0]["data"], json!({ "note": "pre-done" }));
    assert!(created.get("stateData").is_none());

    let stored = &fixture.store.dump("todos").await[0];
    assert!(stored.get("stateData").is_none());
}

#[tokio::test]
async fn disallowed_status_value_is_rejected() {
    let fixture = build(todo_descriptor());
    let err = fixture
        .crud
        .create(&json!({ "title": "Buy milk", "state": "bogus" }), &context("u1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));
}

#[tokio::test]
async fn transition_appends_to_the_log_and_refreshes_the_date() {
    let fixture = build(todo_descriptor());
    let ctx = context("u1");
    let created = fixture.crud.create(&json!({ "title": "Buy milk" }), &ctx, None).await.unwrap();

    let replaced = fixture
        .crud
        .replace_by_id(
            &created["_id"],
            &json!({ "title": "Buy milk", "state": "done", "stateData": { "by": "hand" } }),
            &ctx,
            None,
        )
        .await
        .unwrap();

    assert_eq!(replaced["state"], json!("done"));
    let log = replaced["stateLog"].as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0]["status"], json!("todo"));
    assert_eq!(log[1]["status"], json!("done"));
    assert_eq!(log[1]["data"], json!({ "by": "hand" }));
}

#[tokio::test]
async fn unchanged_status_keeps_the_stored_trail() {
    let fixture = build(todo_descriptor());
    let ctx = context("u1");
    let created = fixture.crud.create(&json!({ "title": "Buy milk" }), &ctx, None).await.unwrap();

    let replaced = fixture
        .crud
        .replace_by_id(
            &created["_id"],
            &json!({ "title": "Buy oat milk", "state": "todo" }),
            &ctx,
            None,
        )
        .await
        .unwrap();

    assert_eq!(replaced["stateDate"], created["stateDate"]);
    assert_eq!(replaced["stateLog"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn optional_status_can_be_cleared_with_a_trace() {
    let fixture = build(optional_status_descriptor());
    let ctx = context("u1");
    let created = fixture
        .crud
        .create(&json!({ "title": "Buy milk", "state": "todo" }), &ctx, None)
        .await
        .unwrap();

    let replaced = fixture
        .crud
        .replace_by_id(&created["_id"], &json!({ "title": "Buy milk" }), &ctx, None)
        .await
        .unwrap();

    assert!(replaced.get("state").is_none());
    let log = replaced["stateLog"].as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1]["status"], Value::Null);
}

#[tokio::test]
async fn optional_status_is_simply_absent_when_never_set() {
    let fixture = build(optional_status_descriptor());
    let created = fixture
        .crud
        .create(&json!({ "title": "Buy milk" }), &context("u1"), None)
        .await
        .unwrap();
    assert!(created.get("state").is_none());
    assert!(created.get("stateLog").is_none());
}

#[tokio::test]
async fn every_mutation_leaves_an_audit_document() {
    let fixture = build(todo_descriptor());
    let ctx = context("u1");
    let created = fixture.crud.create(&json!({ "title": "Buy milk" }), &ctx, None).await.unwrap();
    fixture
        .crud
        .replace_by_id(
            &created["_id"],
            &json!({ "title": "Buy oat milk", "state": "todo" }),
            &ctx,
            None,
        )
        .await
        .unwrap();
    fixture.crud.delete_by_id(&created["_id"], &ctx, None).await.unwrap();

    let trail = fixture.store.dump("todos-audit").await;
    assert_eq!(trail.len(), 3);

    let actions: Vec<&str> =
        trail.iter().filter_map(|doc| doc["_audit"]["action"].as_str()).collect();
    assert_eq!(actions, vec!["create", "replace", "delete"]);

    for doc in &trail {
        assert_eq!(doc["_audit"]["id"], created["_id"]);
        assert_eq!(doc["_audit"]["requestId"], json!("req-u1"));
        assert!(doc.get("_id").is_none());
    }

    assert_eq!(trail[1]["_audit"]["previous"]["title"], json!("Buy milk"));
    assert_eq!(trail[1]["title"], json!("Buy oat milk"));
    assert_eq!(trail[2]["title"], json!("Buy oat milk"));
}

#[tokio::test]
async fn auditing_off_means_no_trail() {
    let mut descriptor = todo_descriptor();
    descriptor["auditChanges"] = json!(false);
    let fixture = build(descriptor);
    let ctx = context("u1");

    let created = fixture.crud.create(&json!({ "title": "Buy milk" }), &ctx, None).await.unwrap();
    fixture.crud.delete_by_id(&created["_id"], &ctx, None).await.unwrap();
    assert_eq!(fixture.store.count("todos-audit").await, 0);
}
