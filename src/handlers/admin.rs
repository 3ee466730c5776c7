//! Destructive maintenance endpoints.
//!
//! Both endpoints wipe every tenant table in one transaction. The
//! authenticated variant keeps the invoker usable as an admin afterwards; the
//! secret-gated variant resets everyone, including whoever triggered it.

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    authz,
    error::{get_db_conn, ApiError, ApiResult},
    identity::Caller,
    models::SystemRole,
    schema::{
        announcements, assets, companies, company_requests, leads, messages, role_requests, roles,
        tasks, ticket_timeline, tickets, users, workspace_access, workspace_requests, workspaces,
    },
    storage::BlobStore,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetDataRequest {
    pub secret: String,
}

/// Rows removed (or reset, for users) per table.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct DataResetSummary {
    pub companies: usize,
    pub company_requests: usize,
    pub roles: usize,
    pub role_requests: usize,
    pub workspaces: usize,
    pub workspace_access: usize,
    pub workspace_requests: usize,
    pub tickets: usize,
    pub ticket_timeline: usize,
    pub tasks: usize,
    pub leads: usize,
    pub messages: usize,
    pub announcements: usize,
    pub assets: usize,
    pub users_reset: usize,
}

/// Deletes every tenant row and strips company affiliation from all users.
/// Blobs are removed individually since storage has no bulk delete.
fn wipe_all_data(
    conn: &mut PgConnection,
    blobs: &Arc<dyn BlobStore>,
) -> Result<DataResetSummary, diesel::result::Error> {
    conn.transaction::<DataResetSummary, diesel::result::Error, _>(|conn| {
        let storage_refs: Vec<String> = assets::table
            .select(assets::storage_ref)
            .load(conn)?;
        for storage_ref in &storage_refs {
            blobs.delete(storage_ref);
        }

        let summary = DataResetSummary {
            ticket_timeline: diesel::delete(ticket_timeline::table).execute(conn)?,
            tickets: diesel::delete(tickets::table).execute(conn)?,
            tasks: diesel::delete(tasks::table).execute(conn)?,
            leads: diesel::delete(leads::table).execute(conn)?,
            messages: diesel::delete(messages::table).execute(conn)?,
            announcements: diesel::delete(announcements::table).execute(conn)?,
            assets: diesel::delete(assets::table).execute(conn)?,
            workspace_access: diesel::delete(workspace_access::table).execute(conn)?,
            workspace_requests: diesel::delete(workspace_requests::table).execute(conn)?,
            workspaces: diesel::delete(workspaces::table).execute(conn)?,
            role_requests: diesel::delete(role_requests::table).execute(conn)?,
            roles: diesel::delete(roles::table).execute(conn)?,
            company_requests: diesel::delete(company_requests::table).execute(conn)?,
            companies: diesel::delete(companies::table).execute(conn)?,
            users_reset: diesel::update(users::table)
                .set((
                    users::company_id.eq(None::<Uuid>),
                    users::system_role.eq(None::<SystemRole>),
                    users::custom_role_id.eq(None::<Uuid>),
                    users::department.eq(None::<String>),
                ))
                .execute(conn)?,
        };

        Ok(summary)
    })
}

#[utoipa::path(
    post,
    path = "/admin/clear-data",
    tag = "Admin",
    responses(
        (status = 200, description = "All tenant data wiped; invoker keeps admin role", body = DataResetSummary),
        (status = 403, description = "Administrator role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn clear_data(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<DataResetSummary>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;

    if user.system_role != Some(SystemRole::Admin) {
        return Err(ApiError::forbidden(
            "Administrator role required",
            "NOT_ADMIN",
        ));
    }

    let invoker_id = user.id;
    let summary = conn
        .transaction::<DataResetSummary, diesel::result::Error, _>(|conn| {
            let summary = wipe_all_data(conn, &state.blobs)?;
            // The invoker stays an admin so the instance is not left without
            // anyone able to bootstrap a new company.
            diesel::update(users::table.find(invoker_id))
                .set(users::system_role.eq(SystemRole::Admin))
                .execute(conn)?;
            Ok(summary)
        })
        .map_err(|_| ApiError::db_error())?;

    warn!(invoked_by = %invoker_id, "Cleared all tenant data");

    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/admin/reset",
    tag = "Admin",
    request_body = ResetDataRequest,
    responses(
        (status = 200, description = "All tenant data wiped", body = DataResetSummary),
        (status = 401, description = "Bad or missing reset secret", body = ApiError)
    )
)]
pub async fn reset_data(
    State(state): State<AppState>,
    Json(payload): Json<ResetDataRequest>,
) -> ApiResult<Json<DataResetSummary>> {
    let configured = state.reset_secret.as_deref().ok_or_else(|| {
        ApiError::unauthorized("Data reset is not enabled", "RESET_DISABLED")
    })?;

    if payload.secret != configured {
        return Err(ApiError::unauthorized(
            "Invalid reset secret",
            "INVALID_RESET_SECRET",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    let summary = wipe_all_data(&mut conn, &state.blobs).map_err(|_| ApiError::db_error())?;

    info!("Reset all tenant data via secret endpoint");

    Ok(Json(summary))
}
