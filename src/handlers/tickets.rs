//! Support ticket lifecycle and timeline handlers.
//!
//! Status moves only through the dedicated transition endpoints: resolve and
//! initiate-close park the ticket in `pending_closure`, finalize-close stamps
//! `closed`, reopen returns it to `open` and wipes the closing fields. The
//! generic update endpoint never touches status. Every transition appends an
//! immutable `status_change` timeline entry.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    authz,
    error::{get_db_conn, ApiError, ApiResult},
    identity::Caller,
    models::{
        NewTicket, NewTimelineEntry, SystemRole, Ticket, TicketPriority, TicketStatus,
        TimelineEntry, TimelineEntryType, User,
    },
    pagination::{PaginationMeta, PaginationParams},
    schema::{ticket_timeline, tickets, users, workspaces},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TicketListParams {
    /// Restrict to tickets assigned to this workspace.
    pub workspace_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    #[schema(example = "Login page broken on mobile")]
    pub subject: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub priority: Option<TicketPriority>,
    pub assigned_workspace_id: Option<Uuid>,
    pub sentiment_score: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub priority: Option<TicketPriority>,
    pub assigned_workspace_id: Option<Uuid>,
    pub sentiment_score: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveTicketRequest {
    pub closing_statement: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiateCloseRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForwardTicketRequest {
    pub workspace_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddTimelineEntryRequest {
    /// Only `comment` and `commit` may be written directly.
    pub entry_type: TimelineEntryType,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketResponse {
    pub ticket: Ticket,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketListEntry {
    #[serde(flatten)]
    pub ticket: Ticket,
    #[schema(example = "Growth")]
    pub workspace_name: String,
    #[schema(example = "Jane Doe")]
    pub creator_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketsListResponse {
    pub data: Vec<TicketListEntry>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelineEntryView {
    #[serde(flatten)]
    pub entry: TimelineEntry,
    pub user_name: String,
    pub user_image: Option<String>,
}

/// Builds the status-change entry recorded alongside a transition into
/// `pending_closure`. The two entry points share the ticket patch but keep
/// distinct audit wording.
fn pending_closure_entry(
    ticket_id: Uuid,
    user_id: Uuid,
    content: &str,
    reason: Option<&str>,
) -> NewTimelineEntry {
    NewTimelineEntry {
        ticket_id,
        user_id,
        entry_type: TimelineEntryType::StatusChange,
        content: content.to_string(),
        metadata: Some(json!({
            "status": TicketStatus::PendingClosure,
            "reason": reason,
        })),
    }
}

/// Whether a user may finalize a ticket's closure: company admins, the
/// creator, and any member of the assigned workspace.
fn can_finalize_close(user: &User, ticket: &Ticket, has_workspace_access: bool) -> bool {
    user.system_role == Some(SystemRole::Admin)
        || ticket.created_by == user.id
        || (ticket.assigned_workspace_id.is_some() && has_workspace_access)
}

/// Only user-authored entry kinds may be appended directly.
fn is_user_authorable(entry_type: TimelineEntryType) -> bool {
    matches!(
        entry_type,
        TimelineEntryType::Comment | TimelineEntryType::Commit
    )
}

fn load_company_ticket(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    company_id: Uuid,
) -> ApiResult<Ticket> {
    tickets::table
        .find(ticket_id)
        .filter(tickets::company_id.eq(company_id))
        .first(conn)
        .map_err(|_| ApiError::not_found("Ticket not found", "TICKET_NOT_FOUND"))
}

#[utoipa::path(
    get,
    path = "/tickets",
    tag = "Tickets",
    params(TicketListParams, PaginationParams),
    responses(
        (status = 200, description = "Tickets in the company, newest first", body = TicketsListResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<TicketListParams>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<TicketsListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let total_count: i64 = match params.workspace_id {
        Some(workspace_id) => tickets::table
            .filter(tickets::company_id.eq(company_id))
            .filter(tickets::assigned_workspace_id.eq(workspace_id))
            .count()
            .get_result(&mut conn),
        None => tickets::table
            .filter(tickets::company_id.eq(company_id))
            .count()
            .get_result(&mut conn),
    }
    .map_err(|_| ApiError::db_error())?;

    let mut list_query = tickets::table
        .left_join(
            workspaces::table.on(workspaces::id.nullable().eq(tickets::assigned_workspace_id)),
        )
        .left_join(users::table.on(users::id.eq(tickets::created_by)))
        .filter(tickets::company_id.eq(company_id))
        .select((
            Ticket::as_select(),
            workspaces::name.nullable(),
            users::name.nullable(),
            users::email.nullable(),
        ))
        .into_boxed();

    if let Some(workspace_id) = params.workspace_id {
        list_query = list_query.filter(tickets::assigned_workspace_id.eq(workspace_id));
    }

    let (limit, offset) = pagination.limit_offset();

    let rows: Vec<(Ticket, Option<String>, Option<String>, Option<String>)> = list_query
        .order(tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(ticket, workspace_name, creator_name, creator_email)| TicketListEntry {
            workspace_name: match (ticket.assigned_workspace_id, workspace_name) {
                (None, _) => "Unassigned".to_string(),
                (Some(_), Some(name)) => name,
                (Some(_), None) => "Unknown Workspace".to_string(),
            },
            creator_name: creator_name
                .or(creator_email)
                .unwrap_or_else(|| "Unknown".to_string()),
            ticket,
        })
        .collect();

    Ok(Json(TicketsListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    post,
    path = "/tickets",
    tag = "Tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 200, description = "Ticket created in the open state", body = TicketResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateTicketRequest>,
) -> ApiResult<Json<TicketResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    if let Some(workspace_id) = payload.assigned_workspace_id {
        workspaces::table
            .find(workspace_id)
            .filter(workspaces::company_id.eq(company_id))
            .select(workspaces::id)
            .first::<Uuid>(&mut conn)
            .map_err(|_| ApiError::not_found("Workspace not found", "WORKSPACE_NOT_FOUND"))?;
    }

    let ticket = conn
        .transaction::<Ticket, diesel::result::Error, _>(|conn| {
            let ticket: Ticket = diesel::insert_into(tickets::table)
                .values(&NewTicket {
                    company_id,
                    subject: payload.subject.clone(),
                    description: payload.description.clone(),
                    client_id: payload.client_id.clone(),
                    priority: payload.priority.unwrap_or_default(),
                    sentiment_score: payload.sentiment_score,
                    status: TicketStatus::Open,
                    assigned_workspace_id: payload.assigned_workspace_id,
                    created_by: user.id,
                })
                .get_result(conn)?;

            diesel::insert_into(ticket_timeline::table)
                .values(&NewTimelineEntry {
                    ticket_id: ticket.id,
                    user_id: user.id,
                    entry_type: TimelineEntryType::StatusChange,
                    content: "Ticket created".to_string(),
                    metadata: Some(json!({ "status": TicketStatus::Open })),
                })
                .execute(conn)?;

            if let Some(workspace_id) = ticket.assigned_workspace_id {
                let name: String = workspaces::table
                    .find(workspace_id)
                    .select(workspaces::name)
                    .first(conn)?;
                diesel::insert_into(ticket_timeline::table)
                    .values(&NewTimelineEntry {
                        ticket_id: ticket.id,
                        user_id: user.id,
                        entry_type: TimelineEntryType::Assignment,
                        content: format!("Assigned to {name}"),
                        metadata: Some(json!({ "workspace_id": workspace_id })),
                    })
                    .execute(conn)?;
            }

            Ok(ticket)
        })
        .map_err(|_| ApiError::internal("Failed to create ticket", "TICKET_CREATE_FAILED"))?;

    info!(ticket_id = %ticket.id, company_id = %company_id, "Created ticket");

    Ok(Json(TicketResponse { ticket }))
}

#[utoipa::path(
    patch,
    path = "/tickets/{ticket_id}",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    request_body = UpdateTicketRequest,
    responses(
        (status = 200, description = "Ticket fields updated; status is never touched here", body = TicketResponse),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<UpdateTicketRequest>,
) -> ApiResult<Json<TicketResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    let ticket: Ticket = diesel::update(tickets::table.find(ticket_id))
        .set((
            payload.subject.map(|s| tickets::subject.eq(s)),
            payload.description.map(|d| tickets::description.eq(d)),
            payload.client_id.map(|c| tickets::client_id.eq(c)),
            payload.priority.map(|p| tickets::priority.eq(p)),
            payload
                .assigned_workspace_id
                .map(|w| tickets::assigned_workspace_id.eq(w)),
            payload
                .sentiment_score
                .map(|s| tickets::sentiment_score.eq(s)),
            tickets::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(TicketResponse { ticket }))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/resolve",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    request_body = ResolveTicketRequest,
    responses(
        (status = 200, description = "Ticket marked pending closure", body = TicketResponse),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<ResolveTicketRequest>,
) -> ApiResult<Json<TicketResponse>> {
    mark_pending_closure(
        &state,
        &caller,
        ticket_id,
        payload.closing_statement.as_deref(),
        "Marked for closing (Resolved)",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/initiate-close",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    request_body = InitiateCloseRequest,
    responses(
        (status = 200, description = "Ticket marked pending closure", body = TicketResponse),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn initiate_close(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<InitiateCloseRequest>,
) -> ApiResult<Json<TicketResponse>> {
    mark_pending_closure(
        &state,
        &caller,
        ticket_id,
        Some(&payload.reason),
        "Marked for closing",
    )
    .await
}

async fn mark_pending_closure(
    state: &AppState,
    caller: &Caller,
    ticket_id: Uuid,
    reason: Option<&str>,
    content: &str,
) -> ApiResult<Json<TicketResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    let ticket = conn
        .transaction::<Ticket, diesel::result::Error, _>(|conn| {
            let ticket: Ticket = diesel::update(tickets::table.find(ticket_id))
                .set((
                    tickets::status.eq(TicketStatus::PendingClosure),
                    tickets::closing_statement.eq(reason),
                    tickets::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result(conn)?;

            diesel::insert_into(ticket_timeline::table)
                .values(&pending_closure_entry(ticket_id, user.id, content, reason))
                .execute(conn)?;

            Ok(ticket)
        })
        .map_err(|_| ApiError::internal("Failed to update ticket", "TRANSITION_FAILED"))?;

    info!(ticket_id = %ticket_id, status = "pending_closure", "Ticket transition");

    Ok(Json(TicketResponse { ticket }))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/reopen",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket reopened, closing fields cleared", body = TicketResponse),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn reopen_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> ApiResult<Json<TicketResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    // Reopening an already-open ticket is allowed; the entry still lands as a
    // visible audit event.
    let ticket = conn
        .transaction::<Ticket, diesel::result::Error, _>(|conn| {
            let ticket: Ticket = diesel::update(tickets::table.find(ticket_id))
                .set((
                    tickets::status.eq(TicketStatus::Open),
                    tickets::closing_statement.eq(None::<String>),
                    tickets::closed_by.eq(None::<Uuid>),
                    tickets::closed_at.eq(None::<chrono::NaiveDateTime>),
                    tickets::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result(conn)?;

            diesel::insert_into(ticket_timeline::table)
                .values(&NewTimelineEntry {
                    ticket_id,
                    user_id: user.id,
                    entry_type: TimelineEntryType::StatusChange,
                    content: "Ticket reopened".to_string(),
                    metadata: Some(json!({ "status": TicketStatus::Open })),
                })
                .execute(conn)?;

            Ok(ticket)
        })
        .map_err(|_| ApiError::internal("Failed to reopen ticket", "TRANSITION_FAILED"))?;

    info!(ticket_id = %ticket_id, status = "open", "Ticket transition");

    Ok(Json(TicketResponse { ticket }))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/close",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket closed", body = TicketResponse),
        (status = 403, description = "Caller may not close this ticket", body = ApiError),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn finalize_close(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> ApiResult<Json<TicketResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let existing = load_company_ticket(&mut conn, ticket_id, company_id)?;

    let has_workspace_access = match existing.assigned_workspace_id {
        Some(workspace_id) => authz::has_explicit_access(&mut conn, user.id, workspace_id)?,
        None => false,
    };

    if !can_finalize_close(&user, &existing, has_workspace_access) {
        return Err(ApiError::forbidden(
            "You do not have permission to close this ticket",
            "CANNOT_CLOSE_TICKET",
        ));
    }

    let now = Utc::now().naive_utc();
    let ticket = conn
        .transaction::<Ticket, diesel::result::Error, _>(|conn| {
            let ticket: Ticket = diesel::update(tickets::table.find(ticket_id))
                .set((
                    tickets::status.eq(TicketStatus::Closed),
                    tickets::closed_by.eq(user.id),
                    tickets::closed_at.eq(now),
                    tickets::updated_at.eq(now),
                ))
                .get_result(conn)?;

            diesel::insert_into(ticket_timeline::table)
                .values(&NewTimelineEntry {
                    ticket_id,
                    user_id: user.id,
                    entry_type: TimelineEntryType::StatusChange,
                    content: "Ticket closed".to_string(),
                    metadata: Some(json!({ "status": TicketStatus::Closed })),
                })
                .execute(conn)?;

            Ok(ticket)
        })
        .map_err(|_| ApiError::internal("Failed to close ticket", "TRANSITION_FAILED"))?;

    info!(ticket_id = %ticket_id, status = "closed", closed_by = %user.id, "Ticket transition");

    Ok(Json(TicketResponse { ticket }))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/forward",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    request_body = ForwardTicketRequest,
    responses(
        (status = 200, description = "Ticket reassigned to another workspace", body = TicketResponse),
        (status = 404, description = "Ticket or workspace not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn forward_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<ForwardTicketRequest>,
) -> ApiResult<Json<TicketResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    let workspace_name: String = workspaces::table
        .find(payload.workspace_id)
        .filter(workspaces::company_id.eq(company_id))
        .select(workspaces::name)
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Workspace not found", "WORKSPACE_NOT_FOUND"))?;

    let ticket = conn
        .transaction::<Ticket, diesel::result::Error, _>(|conn| {
            let ticket: Ticket = diesel::update(tickets::table.find(ticket_id))
                .set((
                    tickets::assigned_workspace_id.eq(payload.workspace_id),
                    tickets::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result(conn)?;

            diesel::insert_into(ticket_timeline::table)
                .values(&NewTimelineEntry {
                    ticket_id,
                    user_id: user.id,
                    entry_type: TimelineEntryType::Forward,
                    content: format!("Forwarded to {workspace_name}"),
                    metadata: Some(json!({ "workspace_id": payload.workspace_id })),
                })
                .execute(conn)?;

            Ok(ticket)
        })
        .map_err(|_| ApiError::internal("Failed to forward ticket", "FORWARD_FAILED"))?;

    info!(
        ticket_id = %ticket_id,
        workspace_id = %payload.workspace_id,
        "Forwarded ticket"
    );

    Ok(Json(TicketResponse { ticket }))
}

#[utoipa::path(
    get,
    path = "/tickets/{ticket_id}/timeline",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Timeline entries, oldest first", body = Vec<TimelineEntryView>),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_timeline(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TimelineEntryView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    let rows: Vec<(TimelineEntry, Option<String>, Option<String>, Option<String>)> =
        ticket_timeline::table
            .left_join(users::table.on(users::id.eq(ticket_timeline::user_id)))
            .filter(ticket_timeline::ticket_id.eq(ticket_id))
            .order(ticket_timeline::created_at.asc())
            .select((
                TimelineEntry::as_select(),
                users::name.nullable(),
                users::email.nullable(),
                users::image.nullable(),
            ))
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(entry, name, email, image)| TimelineEntryView {
            user_name: name.or(email).unwrap_or_else(|| "Unknown".to_string()),
            user_image: image,
            entry,
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/timeline",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    request_body = AddTimelineEntryRequest,
    responses(
        (status = 200, description = "Entry appended", body = TimelineEntry),
        (status = 400, description = "Entry kind is not user-authorable", body = ApiError),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_timeline_entry(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<AddTimelineEntryRequest>,
) -> ApiResult<Json<TimelineEntry>> {
    if !is_user_authorable(payload.entry_type) {
        return Err(ApiError::bad_request(
            "Only comment and commit entries may be added directly",
            "INVALID_ENTRY_TYPE",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    let entry: TimelineEntry = diesel::insert_into(ticket_timeline::table)
        .values(&NewTimelineEntry {
            ticket_id,
            user_id: user.id,
            entry_type: payload.entry_type,
            content: payload.content,
            metadata: None,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/tickets/{ticket_id}",
    tag = "Tickets",
    params(("ticket_id" = Uuid, Path, description = "Ticket ID")),
    responses(
        (status = 204, description = "Ticket and its timeline deleted"),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Ticket not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    load_company_ticket(&mut conn, ticket_id, company_id)?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(ticket_timeline::table.filter(ticket_timeline::ticket_id.eq(ticket_id)))
            .execute(conn)?;
        diesel::delete(tickets::table.find(ticket_id)).execute(conn)?;
        Ok(())
    })
    .map_err(|_| ApiError::internal("Failed to delete ticket", "DELETE_FAILED"))?;

    info!(ticket_id = %ticket_id, "Deleted ticket and timeline");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<SystemRole>) -> User {
        let now = Utc::now().naive_utc();
        User {
            id: Uuid::new_v4(),
            name: None,
            email: None,
            image: None,
            system_role: role,
            custom_role_id: None,
            department: None,
            company_id: Some(Uuid::new_v4()),
            pending_email: None,
            verification_code: None,
            verification_code_expires_at: None,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ticket(created_by: Uuid, assigned_workspace_id: Option<Uuid>) -> Ticket {
        let now = Utc::now().naive_utc();
        Ticket {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            subject: "subject".to_string(),
            description: None,
            client_id: None,
            priority: TicketPriority::Medium,
            sentiment_score: None,
            status: TicketStatus::PendingClosure,
            assigned_workspace_id,
            closing_statement: None,
            closed_by: None,
            closed_at: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admins_can_always_close() {
        let admin = user(Some(SystemRole::Admin));
        let t = ticket(Uuid::new_v4(), None);
        assert!(can_finalize_close(&admin, &t, false));
    }

    #[test]
    fn creator_can_close_own_ticket() {
        let creator = user(Some(SystemRole::Employee));
        let t = ticket(creator.id, None);
        assert!(can_finalize_close(&creator, &t, false));
    }

    #[test]
    fn workspace_member_can_close_assigned_ticket() {
        let member = user(Some(SystemRole::Employee));
        let t = ticket(Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(can_finalize_close(&member, &t, true));
        assert!(!can_finalize_close(&member, &t, false));
    }

    #[test]
    fn workspace_access_is_irrelevant_for_unassigned_tickets() {
        let member = user(Some(SystemRole::Employee));
        let t = ticket(Uuid::new_v4(), None);
        assert!(!can_finalize_close(&member, &t, true));
    }

    #[test]
    fn only_comments_and_commits_are_user_authorable() {
        assert!(is_user_authorable(TimelineEntryType::Comment));
        assert!(is_user_authorable(TimelineEntryType::Commit));
        assert!(!is_user_authorable(TimelineEntryType::StatusChange));
        assert!(!is_user_authorable(TimelineEntryType::Assignment));
        assert!(!is_user_authorable(TimelineEntryType::Forward));
    }

    #[test]
    fn pending_closure_entry_records_reason() {
        let entry = pending_closure_entry(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Marked for closing",
            Some("duplicate of another ticket"),
        );
        assert_eq!(entry.entry_type, TimelineEntryType::StatusChange);
        let metadata = entry.metadata.unwrap();
        assert_eq!(metadata["status"], "pending_closure");
        assert_eq!(metadata["reason"], "duplicate of another ticket");
    }

    #[test]
    fn pending_closure_entry_without_reason() {
        let entry =
            pending_closure_entry(Uuid::new_v4(), Uuid::new_v4(), "Marked for closing", None);
        let metadata = entry.metadata.unwrap();
        assert!(metadata["reason"].is_null());
    }
}
