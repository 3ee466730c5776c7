//! Data reset integration tests.

mod common;

use common::{TestApp, RESET_SECRET};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn reset_rejects_a_wrong_secret() {
    let app = TestApp::spawn().await;

    let response = app
        .post_public("/admin/reset", json!({ "secret": "wrong" }))
        .await;
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"].as_str().unwrap(), "INVALID_RESET_SECRET");
}

#[tokio::test]
#[serial]
async fn reset_wipes_tenant_data_but_keeps_user_rows() {
    let app = TestApp::spawn().await;

    let owner = app.register_user("Owner").await;
    app.create_company(&owner, "Acme").await;
    app.create_ticket(&owner, "Soon to vanish").await;

    let response = app
        .post_public("/admin/reset", json!({ "secret": RESET_SECRET }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let summary: serde_json::Value = response.json().await.unwrap();
    assert_eq!(summary["companies"].as_i64().unwrap(), 1);
    assert_eq!(summary["tickets"].as_i64().unwrap(), 1);

    // The user row survives with its company affiliation cleared.
    let response = app.get("/users/me", &owner.token).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["user"]["company_id"].is_null());
    assert!(body["user"]["system_role"].is_null());

    let response = app.get("/tickets", &owner.token).await;
    assert_eq!(response.status().as_u16(), 403);
}
