//! Company announcement handlers. Read by everyone, written by admins.

use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    authz,
    error::{get_db_conn, ApiError, ApiResult},
    identity::Caller,
    models::{Announcement, NewAnnouncement},
    schema::{announcements, users},
    AppState,
};

/// The feed only surfaces the most recent announcements.
const FEED_WINDOW: i64 = 20;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnnouncementRequest {
    #[schema(example = "Office closed Friday")]
    pub title: String,
    pub content: String,
    #[schema(example = "high")]
    pub priority: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementEntry {
    #[serde(flatten)]
    pub announcement: Announcement,
    pub author_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementResponse {
    pub announcement: Announcement,
}

#[utoipa::path(
    get,
    path = "/announcements",
    tag = "Announcements",
    responses(
        (status = 200, description = "Most recent announcements, newest first", body = Vec<AnnouncementEntry>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_announcements(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<AnnouncementEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let feed: Vec<Announcement> = announcements::table
        .filter(announcements::company_id.eq(company_id))
        .order(announcements::created_at.desc())
        .limit(FEED_WINDOW)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let author_ids: Vec<Uuid> = feed.iter().map(|a| a.author_id).collect();
    let author_names: HashMap<Uuid, Option<String>> = users::table
        .filter(users::id.eq_any(&author_ids))
        .select((users::id, users::name))
        .load::<(Uuid, Option<String>)>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .collect();

    let entries = feed
        .into_iter()
        .map(|announcement| AnnouncementEntry {
            author_name: author_names
                .get(&announcement.author_id)
                .cloned()
                .flatten()
                .unwrap_or_else(|| "Unknown".to_string()),
            announcement,
        })
        .collect();

    Ok(Json(entries))
}

#[utoipa::path(
    post,
    path = "/announcements",
    tag = "Announcements",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 200, description = "Announcement published", body = AnnouncementResponse),
        (status = 403, description = "Administrator role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> ApiResult<Json<AnnouncementResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let announcement: Announcement = diesel::insert_into(announcements::table)
        .values(&NewAnnouncement {
            company_id,
            author_id: user.id,
            title: payload.title,
            content: payload.content,
            priority: payload.priority,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(
        announcement_id = %announcement.id,
        company_id = %company_id,
        priority = %announcement.priority,
        "Published announcement"
    );

    Ok(Json(AnnouncementResponse { announcement }))
}
