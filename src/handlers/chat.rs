//! Channel chat handlers.
//!
//! Channels are plain strings. Workspace chat uses the workspace id as the
//! channel name, which is what lets workspace admins moderate those messages.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    authz,
    error::{get_db_conn, ApiError, ApiResult},
    identity::Caller,
    models::{Message, NewMessage, SystemRole, User, WorkspaceRole},
    schema::{messages, users},
    AppState,
};

/// Only the most recent messages are served; clients page by scrolling.
const MESSAGE_WINDOW: i64 = 50;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[schema(example = "Standup moved to 10:30")]
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageEntry {
    #[serde(flatten)]
    pub message: Message,
    pub user_name: String,
    pub user_image: Option<String>,
    pub user_role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: Message,
}

/// Author can always delete their own message. Company admins moderate every
/// channel; a workspace admin moderates only the channel named after their
/// workspace.
pub(crate) fn can_delete_message(
    is_author: bool,
    is_company_admin: bool,
    workspace_role: Option<WorkspaceRole>,
) -> bool {
    is_author || is_company_admin || workspace_role == Some(WorkspaceRole::Admin)
}

#[utoipa::path(
    get,
    path = "/channels/{channel}/messages",
    tag = "Chat",
    params(("channel" = String, Path, description = "Channel name")),
    responses(
        (status = 200, description = "Latest messages in chronological order", body = Vec<MessageEntry>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(channel): Path<String>,
) -> ApiResult<Json<Vec<MessageEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let mut recent: Vec<Message> = messages::table
        .filter(messages::company_id.eq(company_id))
        .filter(messages::channel.eq(&channel))
        .order(messages::created_at.desc())
        .limit(MESSAGE_WINDOW)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    // Fetched newest-first to bound the window, served oldest-first.
    recent.reverse();

    let author_ids: Vec<Uuid> = recent.iter().map(|m| m.user_id).collect();
    let authors: HashMap<Uuid, User> = users::table
        .filter(users::id.eq_any(&author_ids))
        .load::<User>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let entries = recent
        .into_iter()
        .map(|message| {
            let author = authors.get(&message.user_id);
            MessageEntry {
                user_name: author
                    .and_then(|u| u.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                user_image: author.and_then(|u| u.image.clone()),
                user_role: author
                    .and_then(|u| u.system_role)
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_else(|| SystemRole::Employee.as_str().to_string()),
                message,
            }
        })
        .collect();

    Ok(Json(entries))
}

#[utoipa::path(
    post,
    path = "/channels/{channel}/messages",
    tag = "Chat",
    params(("channel" = String, Path, description = "Channel name")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = MessageResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(channel): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let message: Message = diesel::insert_into(messages::table)
        .values(&NewMessage {
            company_id,
            user_id: user.id,
            body: payload.body,
            channel: Some(channel),
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(MessageResponse { message }))
}

#[utoipa::path(
    delete,
    path = "/messages/{message_id}",
    tag = "Chat",
    params(("message_id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 204, description = "Message deleted"),
        (status = 403, description = "Not allowed to delete this message", body = ApiError),
        (status = 404, description = "Message not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let message: Message = messages::table
        .find(message_id)
        .filter(messages::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Message not found", "MESSAGE_NOT_FOUND"))?;

    let workspace_role = match message.channel.as_deref().and_then(|c| Uuid::parse_str(c).ok()) {
        Some(workspace_id) => authz::workspace_role(&mut conn, user.id, workspace_id)?,
        None => None,
    };

    if !can_delete_message(
        message.user_id == user.id,
        user.is_company_admin(),
        workspace_role,
    ) {
        return Err(ApiError::forbidden(
            "You cannot delete this message",
            "CANNOT_DELETE_MESSAGE",
        ));
    }

    diesel::delete(messages::table.find(message_id))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(message_id = %message_id, deleted_by = %user.id, "Deleted chat message");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_can_delete_own_message() {
        assert!(can_delete_message(true, false, None));
    }

    #[test]
    fn company_admin_moderates_any_channel() {
        assert!(can_delete_message(false, true, None));
    }

    #[test]
    fn workspace_admin_moderates_workspace_channel() {
        assert!(can_delete_message(false, false, Some(WorkspaceRole::Admin)));
    }

    #[test]
    fn workspace_member_cannot_moderate() {
        assert!(!can_delete_message(
            false,
            false,
            Some(WorkspaceRole::Member)
        ));
        assert!(!can_delete_message(false, false, None));
    }
}
