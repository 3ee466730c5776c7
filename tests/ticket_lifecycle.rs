//! Ticket lifecycle integration tests.
//!
//! Status only moves through the dedicated transition endpoints, and every
//! transition leaves an immutable status_change entry on the timeline.

mod common;

use common::TestApp;
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn ticket_moves_through_closure_and_back() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    app.create_company(&owner, "Acme").await;

    let ticket = app.create_ticket(&owner, "Printer on fire").await;
    let ticket_id = ticket["id"].as_str().unwrap();
    assert_eq!(ticket["status"].as_str().unwrap(), "open");
    assert!(ticket["closed_at"].is_null());

    // Resolve parks the ticket in pending_closure with a closing statement.
    let response = app
        .post(
            &format!("/tickets/{ticket_id}/resolve"),
            &owner.token,
            json!({ "closing_statement": "Extinguished" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ticket"]["status"].as_str().unwrap(), "pending_closure");
    assert_eq!(
        body["ticket"]["closing_statement"].as_str().unwrap(),
        "Extinguished"
    );

    // Finalize stamps the closure.
    let response = app
        .post(&format!("/tickets/{ticket_id}/close"), &owner.token, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ticket"]["status"].as_str().unwrap(), "closed");
    assert!(!body["ticket"]["closed_at"].is_null());
    assert_eq!(
        body["ticket"]["closed_by"].as_str().unwrap(),
        owner.id.to_string()
    );

    // Reopen clears every closing field.
    let response = app
        .post(&format!("/tickets/{ticket_id}/reopen"), &owner.token, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ticket"]["status"].as_str().unwrap(), "open");
    assert!(body["ticket"]["closing_statement"].is_null());
    assert!(body["ticket"]["closed_by"].is_null());
    assert!(body["ticket"]["closed_at"].is_null());

    // The timeline kept one entry per transition, oldest first.
    let response = app
        .get(&format!("/tickets/{ticket_id}/timeline"), &owner.token)
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let timeline: serde_json::Value = response.json().await.unwrap();
    let entries = timeline.as_array().unwrap();
    let contents: Vec<&str> = entries
        .iter()
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert_eq!(
        contents,
        vec![
            "Ticket created",
            "Marked for closing (Resolved)",
            "Ticket closed",
            "Ticket reopened",
        ]
    );
    for entry in entries {
        assert_eq!(entry["entry_type"].as_str().unwrap(), "status_change");
    }
}

#[tokio::test]
#[serial]
async fn initiate_close_records_the_reason() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    app.create_company(&owner, "Acme").await;

    let ticket = app.create_ticket(&owner, "Duplicate report").await;
    let ticket_id = ticket["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/tickets/{ticket_id}/initiate-close"),
            &owner.token,
            json!({ "reason": "duplicate of another ticket" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ticket"]["status"].as_str().unwrap(), "pending_closure");
    assert_eq!(
        body["ticket"]["closing_statement"].as_str().unwrap(),
        "duplicate of another ticket"
    );

    let response = app
        .get(&format!("/tickets/{ticket_id}/timeline"), &owner.token)
        .await;
    let timeline: serde_json::Value = response.json().await.unwrap();
    let last = timeline.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["content"].as_str().unwrap(), "Marked for closing");
    assert_eq!(
        last["metadata"]["reason"].as_str().unwrap(),
        "duplicate of another ticket"
    );
    assert_eq!(last["metadata"]["status"].as_str().unwrap(), "pending_closure");
}

#[tokio::test]
#[serial]
async fn unrelated_employee_cannot_finalize_closure() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    let company_id = app.create_company(&owner, "Acme").await;
    let employee = app.add_employee(&owner, company_id, "Employee").await;

    let ticket = app.create_ticket(&owner, "Sensitive issue").await;
    let ticket_id = ticket["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/tickets/{ticket_id}/close"),
            &employee.token,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"].as_str().unwrap(), "CANNOT_CLOSE_TICKET");

    // The creator may close it.
    let response = app
        .post(&format!("/tickets/{ticket_id}/close"), &owner.token, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
#[serial]
async fn workspace_member_may_close_assigned_ticket() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    let company_id = app.create_company(&owner, "Acme").await;
    let employee = app.add_employee(&owner, company_id, "Employee").await;

    let response = app
        .post(
            "/workspaces",
            &owner.token,
            json!({ "name": "Support", "kind": "support" }),
        )
        .await;
    let workspace: serde_json::Value = response.json().await.unwrap();
    let workspace_id = workspace["workspace"]["id"].as_str().unwrap().to_string();

    let response = app
        .post(
            &format!("/workspaces/{workspace_id}/access"),
            &owner.token,
            json!({ "user_id": employee.id }),
        )
        .await;
    assert!(response.status().is_success());

    let response = app
        .post(
            "/tickets",
            &owner.token,
            json!({ "subject": "Assigned issue", "assigned_workspace_id": workspace_id }),
        )
        .await;
    let ticket: serde_json::Value = response.json().await.unwrap();
    let ticket_id = ticket["ticket"]["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/tickets/{ticket_id}/close"),
            &employee.token,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ticket"]["status"].as_str().unwrap(), "closed");
    assert_eq!(
        body["ticket"]["closed_by"].as_str().unwrap(),
        employee.id.to_string()
    );
}

#[tokio::test]
#[serial]
async fn generic_update_never_touches_status() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    app.create_company(&owner, "Acme").await;

    let ticket = app.create_ticket(&owner, "Original subject").await;
    let ticket_id = ticket["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/tickets/{ticket_id}/resolve"),
            &owner.token,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .patch(
            &format!("/tickets/{ticket_id}"),
            &owner.token,
            json!({ "subject": "Renamed", "priority": "high" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ticket"]["subject"].as_str().unwrap(), "Renamed");
    assert_eq!(body["ticket"]["priority"].as_str().unwrap(), "high");
    assert_eq!(body["ticket"]["status"].as_str().unwrap(), "pending_closure");
}

#[tokio::test]
#[serial]
async fn timeline_accepts_only_user_authorable_entries() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    app.create_company(&owner, "Acme").await;

    let ticket = app.create_ticket(&owner, "Needs notes").await;
    let ticket_id = ticket["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/tickets/{ticket_id}/timeline"),
            &owner.token,
            json!({ "entry_type": "status_change", "content": "forged transition" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"].as_str().unwrap(), "INVALID_ENTRY_TYPE");

    let response = app
        .post(
            &format!("/tickets/{ticket_id}/timeline"),
            &owner.token,
            json!({ "entry_type": "comment", "content": "looking into it" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let entry: serde_json::Value = response.json().await.unwrap();
    assert_eq!(entry["entry_type"].as_str().unwrap(), "comment");
    assert_eq!(entry["content"].as_str().unwrap(), "looking into it");
}
