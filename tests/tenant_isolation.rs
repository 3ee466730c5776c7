//! Cross-tenant isolation and company membership integration tests.
//!
//! Everything a company owns must be invisible to members of other
//! companies, and references across the boundary always come back as 404.

mod common;

use common::TestApp;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error};
use serde_json::json;
use serial_test::serial;

use bridge::models::RequestStatus;
use bridge::schema::company_requests;

#[tokio::test]
#[serial]
async fn company_resources_are_invisible_across_tenants() {
    let app = TestApp::spawn().await;

    let owner_a = app.register_user("Owner A").await;
    app.create_company(&owner_a, "Acme").await;

    let owner_b = app.register_user("Owner B").await;
    app.create_company(&owner_b, "Globex").await;

    let ticket = app.create_ticket(&owner_b, "Globex outage").await;
    let ticket_id = ticket["id"].as_str().unwrap();

    let response = app
        .post(
            "/workspaces",
            &owner_b.token,
            json!({ "name": "Growth", "kind": "growth" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let workspace: serde_json::Value = response.json().await.unwrap();
    let workspace_id = workspace["workspace"]["id"].as_str().unwrap();

    // A's ticket list never contains B's data.
    let response = app.get("/tickets", &owner_a.token).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // Direct references across the boundary are reported as missing, not
    // forbidden.
    let response = app
        .patch(
            &format!("/tickets/{ticket_id}"),
            &owner_a.token,
            json!({ "subject": "hijacked" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"].as_str().unwrap(), "TICKET_NOT_FOUND");

    let response = app
        .get(&format!("/tickets/{ticket_id}/timeline"), &owner_a.token)
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .get(&format!("/workspaces/{workspace_id}"), &owner_a.token)
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .delete(&format!("/workspaces/{workspace_id}"), &owner_a.token)
        .await;
    assert_eq!(response.status().as_u16(), 404);

    // B still sees its own ticket untouched.
    let response = app.get("/tickets", &owner_b.token).await;
    let body: serde_json::Value = response.json().await.unwrap();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["subject"].as_str().unwrap(), "Globex outage");
}

#[tokio::test]
#[serial]
async fn join_request_approval_grants_employee_membership() {
    let app = TestApp::spawn().await;

    let owner = app.register_user("Owner").await;
    let company_id = app.create_company(&owner, "Acme").await;

    let applicant = app.register_user("Applicant").await;

    // Without a company, tenant-scoped endpoints are off limits.
    let response = app.get("/tickets", &applicant.token).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .post(
            &format!("/companies/{company_id}/join"),
            &applicant.token,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let request: serde_json::Value = response.json().await.unwrap();
    assert_eq!(request["status"].as_str().unwrap(), "pending");
    let request_id = request["id"].as_str().unwrap().to_string();

    let response = app.get("/users/me/join-request", &applicant.token).await;
    let pending: serde_json::Value = response.json().await.unwrap();
    assert_eq!(pending["id"].as_str().unwrap(), request_id);

    let response = app.get("/companies/me/requests", &owner.token).await;
    let requests: serde_json::Value = response.json().await.unwrap();
    assert_eq!(requests.as_array().unwrap().len(), 1);

    let response = app
        .post(
            &format!("/companies/me/requests/{request_id}/resolve"),
            &owner.token,
            json!({ "approved": true }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.get("/users/me", &applicant.token).await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["user"]["company_id"].as_str().unwrap(),
        company_id.to_string()
    );
    assert_eq!(body["user"]["system_role"].as_str().unwrap(), "employee");

    let response = app.get("/tickets", &applicant.token).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
#[serial]
async fn rejected_join_request_leaves_user_without_company() {
    let app = TestApp::spawn().await;

    let owner = app.register_user("Owner").await;
    let company_id = app.create_company(&owner, "Acme").await;
    let applicant = app.register_user("Applicant").await;

    let response = app
        .post(
            &format!("/companies/{company_id}/join"),
            &applicant.token,
            json!({}),
        )
        .await;
    let request: serde_json::Value = response.json().await.unwrap();
    let request_id = request["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/companies/me/requests/{request_id}/resolve"),
            &owner.token,
            json!({ "approved": false }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.get("/users/me", &applicant.token).await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["user"]["company_id"].is_null());

    let response = app.get("/tickets", &applicant.token).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
#[serial]
async fn duplicate_join_request_is_rejected() {
    let app = TestApp::spawn().await;

    let owner = app.register_user("Owner").await;
    let company_id = app.create_company(&owner, "Acme").await;
    let applicant = app.register_user("Applicant").await;

    let response = app
        .post(
            &format!("/companies/{company_id}/join"),
            &applicant.token,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .post(
            &format!("/companies/{company_id}/join"),
            &applicant.token,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"].as_str().unwrap(), "REQUEST_ALREADY_PENDING");
}

#[tokio::test]
#[serial]
async fn database_rejects_second_pending_join_request() {
    let app = TestApp::spawn().await;

    let owner = app.register_user("Owner").await;
    let company_id = app.create_company(&owner, "Acme").await;
    let applicant = app.register_user("Applicant").await;

    // Bypass the handler's advisory check and hit the partial unique index
    // directly, as a racing second submission would.
    let mut conn = app.db_pool.get().unwrap();

    let inserted = diesel::insert_into(company_requests::table)
        .values((
            company_requests::user_id.eq(applicant.id),
            company_requests::company_id.eq(company_id),
            company_requests::status.eq(RequestStatus::Pending),
        ))
        .execute(&mut conn);
    assert_eq!(inserted.unwrap(), 1);

    let duplicate = diesel::insert_into(company_requests::table)
        .values((
            company_requests::user_id.eq(applicant.id),
            company_requests::company_id.eq(company_id),
            company_requests::status.eq(RequestStatus::Pending),
        ))
        .execute(&mut conn);
    assert!(matches!(
        duplicate,
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
    ));
}

#[tokio::test]
#[serial]
async fn join_requests_resolve_only_within_their_company() {
    let app = TestApp::spawn().await;

    let owner_a = app.register_user("Owner A").await;
    app.create_company(&owner_a, "Acme").await;

    let owner_b = app.register_user("Owner B").await;
    let company_b = app.create_company(&owner_b, "Globex").await;

    let applicant = app.register_user("Applicant").await;
    let response = app
        .post(
            &format!("/companies/{company_b}/join"),
            &applicant.token,
            json!({}),
        )
        .await;
    let request: serde_json::Value = response.json().await.unwrap();
    let request_id = request["id"].as_str().unwrap();

    // A's admin cannot resolve a request addressed to B.
    let response = app
        .post(
            &format!("/companies/me/requests/{request_id}/resolve"),
            &owner_a.token,
            json!({ "approved": true }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"].as_str().unwrap(), "REQUEST_NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn requests_require_a_valid_token() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/tickets").await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(format!("{}/tickets", app.base_url))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}
