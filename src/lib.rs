//! Bridge - multi-tenant internal operations backend.

pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod openapi;
pub mod pagination;
pub mod schema;
pub mod storage;
pub mod telemetry;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use identity::IdentityVerifier;
use middleware::{identity_middleware, request_id_middleware};
use notify::{LogMailer, Mailer};
use storage::{BlobStore, DevBlobStore};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub identity: Arc<IdentityVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub blobs: Arc<dyn BlobStore>,
    pub reset_secret: Option<String>,
    pub verification_code_ttl_mins: i64,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> Self {
        Self {
            db_pool,
            identity: Arc::new(IdentityVerifier::from_config(&config.identity)),
            mailer: Arc::new(LogMailer),
            blobs: Arc::new(DevBlobStore::default()),
            reset_secret: config.app.reset_secret.clone(),
            verification_code_ttl_mins: config.app.verification_code_ttl_mins,
        }
    }

    /// Swaps in a different mail collaborator. Useful when wiring a real
    /// provider in main or a capturing fake in tests.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/admin/reset", post(handlers::admin::reset_data))
        .with_state(state.clone());

    let user_routes = Router::new()
        .route("/users/me", get(handlers::users::current_user))
        .route("/users/me", patch(handlers::users::update_self))
        .route("/users/me/sync", post(handlers::users::sync_profile))
        .route(
            "/users/me/verify-email",
            post(handlers::users::verify_email_change),
        )
        .route(
            "/users/me/resend-verification",
            post(handlers::users::resend_verification_code),
        )
        .route(
            "/users/me/join-request",
            get(handlers::companies::get_my_request),
        )
        .route(
            "/users/me/invitations",
            get(handlers::companies::list_my_invitations),
        )
        .route(
            "/users/me/invitations/{request_id}/accept",
            post(handlers::companies::accept_invitation),
        )
        .route(
            "/users/me/invitations/{request_id}/decline",
            post(handlers::companies::decline_invitation),
        )
        .route("/users", get(handlers::users::list_users))
        .route("/users/{user_id}", patch(handlers::users::update_user))
        .route("/users/{user_id}", delete(handlers::users::delete_user));

    let company_routes = Router::new()
        .route("/companies", post(handlers::companies::create_company))
        .route("/companies", get(handlers::companies::list_companies))
        .route("/companies/me", get(handlers::companies::get_my_company))
        .route("/companies/me", patch(handlers::companies::update_company))
        .route("/companies/me", delete(handlers::companies::delete_company))
        .route(
            "/companies/me/leave",
            post(handlers::companies::leave_company),
        )
        .route(
            "/companies/me/transfer-ownership",
            post(handlers::companies::transfer_ownership),
        )
        .route(
            "/companies/me/requests",
            get(handlers::companies::list_join_requests),
        )
        .route(
            "/companies/me/requests/{request_id}/resolve",
            post(handlers::companies::resolve_join_request),
        )
        .route(
            "/companies/me/invitations",
            post(handlers::companies::invite_member),
        )
        .route(
            "/companies/{company_id}/join",
            post(handlers::companies::join_company),
        );

    let role_routes = Router::new()
        .route("/roles", get(handlers::roles::list_roles))
        .route("/roles", post(handlers::roles::create_role))
        .route("/roles/{role_id}", patch(handlers::roles::update_role))
        .route("/roles/{role_id}", delete(handlers::roles::delete_role))
        .route("/role-requests", post(handlers::roles::request_role))
        .route("/role-requests", get(handlers::roles::list_role_requests))
        .route(
            "/role-requests/{request_id}/resolve",
            post(handlers::roles::resolve_role_request),
        );

    let workspace_routes = Router::new()
        .route("/workspaces", post(handlers::workspaces::create_workspace))
        .route("/workspaces", get(handlers::workspaces::list_workspaces))
        .route(
            "/workspaces/statuses",
            get(handlers::workspaces::workspace_statuses),
        )
        .route(
            "/workspaces/access/me",
            get(handlers::workspaces::list_my_access),
        )
        .route(
            "/workspaces/access/{user_id}",
            get(handlers::workspaces::get_user_access),
        )
        .route(
            "/workspaces/requests",
            get(handlers::workspaces::list_access_requests),
        )
        .route(
            "/workspaces/requests/me",
            get(handlers::workspaces::list_my_requests),
        )
        .route(
            "/workspaces/requests/{request_id}/resolve",
            post(handlers::workspaces::resolve_access_request),
        )
        .route(
            "/workspaces/{workspace_id}",
            get(handlers::workspaces::get_workspace),
        )
        .route(
            "/workspaces/{workspace_id}",
            delete(handlers::workspaces::delete_workspace),
        )
        .route(
            "/workspaces/{workspace_id}/features",
            patch(handlers::workspaces::update_features),
        )
        .route(
            "/workspaces/{workspace_id}/requests",
            post(handlers::workspaces::request_access),
        )
        .route(
            "/workspaces/{workspace_id}/access",
            post(handlers::workspaces::grant_access),
        )
        .route(
            "/workspaces/{workspace_id}/access/{user_id}",
            delete(handlers::workspaces::revoke_access),
        )
        .route(
            "/workspaces/{workspace_id}/role",
            get(handlers::workspaces::my_workspace_role),
        )
        .route(
            "/workspaces/{workspace_id}/members",
            get(handlers::workspaces::list_members),
        )
        .route(
            "/workspaces/{workspace_id}/members/{user_id}",
            patch(handlers::workspaces::update_member_role),
        );

    let ticket_routes = Router::new()
        .route("/tickets", get(handlers::tickets::list_tickets))
        .route("/tickets", post(handlers::tickets::create_ticket))
        .route(
            "/tickets/{ticket_id}",
            patch(handlers::tickets::update_ticket),
        )
        .route(
            "/tickets/{ticket_id}",
            delete(handlers::tickets::delete_ticket),
        )
        .route(
            "/tickets/{ticket_id}/resolve",
            post(handlers::tickets::resolve_ticket),
        )
        .route(
            "/tickets/{ticket_id}/initiate-close",
            post(handlers::tickets::initiate_close),
        )
        .route(
            "/tickets/{ticket_id}/reopen",
            post(handlers::tickets::reopen_ticket),
        )
        .route(
            "/tickets/{ticket_id}/close",
            post(handlers::tickets::finalize_close),
        )
        .route(
            "/tickets/{ticket_id}/forward",
            post(handlers::tickets::forward_ticket),
        )
        .route(
            "/tickets/{ticket_id}/timeline",
            get(handlers::tickets::get_timeline),
        )
        .route(
            "/tickets/{ticket_id}/timeline",
            post(handlers::tickets::add_timeline_entry),
        );

    let misc_routes = Router::new()
        .route("/tasks", get(handlers::tasks::list_tasks))
        .route("/tasks", post(handlers::tasks::create_task))
        .route("/tasks/{task_id}", patch(handlers::tasks::update_task))
        .route("/tasks/{task_id}", delete(handlers::tasks::delete_task))
        .route(
            "/tasks/{task_id}/status",
            patch(handlers::tasks::update_task_status),
        )
        .route("/leads", get(handlers::leads::list_leads))
        .route("/leads", post(handlers::leads::create_lead))
        .route("/leads/{lead_id}", patch(handlers::leads::update_lead))
        .route("/leads/{lead_id}", delete(handlers::leads::delete_lead))
        .route(
            "/channels/{channel}/messages",
            get(handlers::chat::list_messages),
        )
        .route(
            "/channels/{channel}/messages",
            post(handlers::chat::send_message),
        )
        .route(
            "/messages/{message_id}",
            delete(handlers::chat::delete_message),
        )
        .route(
            "/announcements",
            get(handlers::announcements::list_announcements),
        )
        .route(
            "/announcements",
            post(handlers::announcements::create_announcement),
        )
        .route(
            "/assets/upload-url",
            post(handlers::assets::create_upload_url),
        )
        .route("/assets", post(handlers::assets::create_asset))
        .route("/assets", get(handlers::assets::list_assets))
        .route("/assets/{asset_id}", delete(handlers::assets::delete_asset))
        .route("/admin/clear-data", post(handlers::admin::clear_data));

    let protected_routes = Router::new()
        .merge(user_routes)
        .merge(company_routes)
        .merge(role_routes)
        .merge(workspace_routes)
        .merge(ticket_routes)
        .merge(misc_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .with_state(state.clone());

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found", "code": "NOT_FOUND"})),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    if config.cors.allow_credentials && is_wildcard_origin {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else if config.cors.allow_credentials {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else {
        let cors = if is_wildcard_origin {
            CorsLayer::new().allow_origin(Any)
        } else {
            let origins: Vec<_> = config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    }
}

pub fn create_db_pool(config: &config::Config) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn create_db_pool_with_url(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use config::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_build_cors_layer_wildcard() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec!["*".to_string()];
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_build_cors_layer_specific_origins() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        let _ = build_cors_layer(&config);
    }
}
