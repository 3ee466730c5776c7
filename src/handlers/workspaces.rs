//! Workspace CRUD, feature toggles and the access-control workflow.
//!
//! Company admins hold implicit admin access to every workspace; explicit
//! access rows only exist for non-admin members. The status endpoints merge
//! the two views so clients never have to special-case admins.

use std::collections::{HashMap, HashSet};

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
    models::{
        NewWorkspace, NewWorkspaceAccess, NewWorkspaceRequest, RequestStatus, SystemRole, User,
        Workspace, WorkspaceAccess, WorkspaceFeatures, WorkspaceRequest, WorkspaceRole,
    },
    schema::{users, workspace_access, workspace_requests, workspaces},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWorkspaceRequest {
    #[schema(example = "Growth")]
    pub name: String,
    #[schema(example = "growth")]
    pub kind: String,
    pub features: Option<WorkspaceFeatures>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFeaturesRequest {
    pub features: WorkspaceFeatures,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantAccessRequest {
    pub user_id: Uuid,
    pub role: Option<WorkspaceRole>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub role: WorkspaceRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveAccessRequestBody {
    pub approved: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkspaceResponse {
    pub workspace: Workspace,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkspaceStatusEntry {
    pub id: Uuid,
    #[schema(example = "Growth")]
    pub label: String,
    #[schema(example = "growth")]
    pub kind: String,
    pub has_access: bool,
    /// "member", "pending" or "none".
    #[schema(example = "member")]
    pub status: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessRequestEntry {
    #[serde(flatten)]
    pub request: WorkspaceRequest,
    pub workspace_name: String,
    pub requester_name: String,
    pub requester_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkspaceMember {
    pub user_id: Uuid,
    pub role: WorkspaceRole,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyRoleResponse {
    pub role: Option<WorkspaceRole>,
}

/// Computes the access status shown on a workspace card.
fn access_status(is_admin: bool, has_access: bool, has_pending: bool) -> (bool, &'static str) {
    if is_admin || has_access {
        (true, "member")
    } else if has_pending {
        (false, "pending")
    } else {
        (false, "none")
    }
}

fn load_company_workspace(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    company_id: Uuid,
) -> ApiResult<Workspace> {
    workspaces::table
        .find(workspace_id)
        .filter(workspaces::company_id.eq(company_id))
        .first(conn)
        .map_err(|_| ApiError::not_found("Workspace not found", "WORKSPACE_NOT_FOUND"))
}

#[utoipa::path(
    post,
    path = "/workspaces",
    tag = "Workspaces",
    request_body = CreateWorkspaceRequest,
    responses(
        (status = 200, description = "Workspace created with all features enabled by default", body = WorkspaceResponse),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let workspace: Workspace = diesel::insert_into(workspaces::table)
        .values(&NewWorkspace {
            company_id,
            name: payload.name,
            kind: payload.kind,
            features: payload.features.unwrap_or_default(),
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(workspace_id = %workspace.id, company_id = %company_id, "Created workspace");

    Ok(Json(WorkspaceResponse { workspace }))
}

#[utoipa::path(
    get,
    path = "/workspaces",
    tag = "Workspaces",
    responses(
        (status = 200, description = "Workspaces in the caller's company", body = Vec<Workspace>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Workspace>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let list: Vec<Workspace> = workspaces::table
        .filter(workspaces::company_id.eq(company_id))
        .order(workspaces::created_at.asc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Workspace detail", body = WorkspaceResponse),
        (status = 404, description = "Workspace not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let workspace = load_company_workspace(&mut conn, workspace_id, company_id)?;

    Ok(Json(WorkspaceResponse { workspace }))
}

#[utoipa::path(
    delete,
    path = "/workspaces/{workspace_id}",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 204, description = "Workspace, access rows and requests deleted"),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Workspace not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    load_company_workspace(&mut conn, workspace_id, company_id)?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(
            workspace_access::table.filter(workspace_access::workspace_id.eq(workspace_id)),
        )
        .execute(conn)?;
        diesel::delete(
            workspace_requests::table.filter(workspace_requests::workspace_id.eq(workspace_id)),
        )
        .execute(conn)?;
        diesel::delete(workspaces::table.find(workspace_id)).execute(conn)?;
        Ok(())
    })
    .map_err(|_| ApiError::internal("Failed to delete workspace", "DELETE_FAILED"))?;

    info!(workspace_id = %workspace_id, "Deleted workspace");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/workspaces/{workspace_id}/features",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    request_body = UpdateFeaturesRequest,
    responses(
        (status = 200, description = "Feature toggles replaced", body = WorkspaceResponse),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Workspace not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_features(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<UpdateFeaturesRequest>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    load_company_workspace(&mut conn, workspace_id, company_id)?;

    let workspace: Workspace = diesel::update(workspaces::table.find(workspace_id))
        .set(workspaces::features.eq(payload.features))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(workspace_id = %workspace_id, "Updated workspace features");

    Ok(Json(WorkspaceResponse { workspace }))
}

#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/requests",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Access request created", body = WorkspaceRequest),
        (status = 409, description = "Already has access or a request is pending", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn request_access(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<WorkspaceRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_workspace(&mut conn, workspace_id, company_id)?;

    if authz::has_explicit_access(&mut conn, user.id, workspace_id)? {
        return Err(ApiError::conflict(
            "Already have access",
            "ALREADY_HAS_ACCESS",
        ));
    }

    let pending: Option<Uuid> = workspace_requests::table
        .filter(workspace_requests::user_id.eq(user.id))
        .filter(workspace_requests::workspace_id.eq(workspace_id))
        .filter(workspace_requests::status.eq(RequestStatus::Pending))
        .select(workspace_requests::id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;
    if pending.is_some() {
        return Err(ApiError::conflict(
            "Request already pending",
            "REQUEST_ALREADY_PENDING",
        ));
    }

    let request: WorkspaceRequest = diesel::insert_into(workspace_requests::table)
        .values(&NewWorkspaceRequest {
            user_id: user.id,
            workspace_id,
            status: RequestStatus::Pending,
            company_id,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(user_id = %user.id, workspace_id = %workspace_id, "Requested workspace access");

    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/workspaces/access/me",
    tag = "Workspaces",
    responses(
        (status = 200, description = "Workspace IDs the caller can enter; admins get all of them", body = Vec<Uuid>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_access(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Uuid>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let ids: Vec<Uuid> = if user.is_company_admin() {
        workspaces::table
            .filter(workspaces::company_id.eq(company_id))
            .select(workspaces::id)
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?
    } else {
        workspace_access::table
            .filter(workspace_access::user_id.eq(user.id))
            .select(workspace_access::workspace_id)
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?
    };

    Ok(Json(ids))
}

#[utoipa::path(
    get,
    path = "/workspaces/requests/me",
    tag = "Workspaces",
    responses(
        (status = 200, description = "The caller's pending access requests", body = Vec<WorkspaceRequest>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<WorkspaceRequest>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let list: Vec<WorkspaceRequest> = workspace_requests::table
        .filter(workspace_requests::user_id.eq(caller.user_id))
        .filter(workspace_requests::status.eq(RequestStatus::Pending))
        .order(workspace_requests::created_at.desc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/workspaces/statuses",
    tag = "Workspaces",
    responses(
        (status = 200, description = "Access status for every workspace in the company", body = Vec<WorkspaceStatusEntry>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn workspace_statuses(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<WorkspaceStatusEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;
    let is_admin = user.is_company_admin();

    let list: Vec<Workspace> = workspaces::table
        .filter(workspaces::company_id.eq(company_id))
        .order(workspaces::created_at.asc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let access: HashSet<Uuid> = workspace_access::table
        .filter(workspace_access::user_id.eq(user.id))
        .select(workspace_access::workspace_id)
        .load::<Uuid>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .collect();

    let pending: HashSet<Uuid> = workspace_requests::table
        .filter(workspace_requests::user_id.eq(user.id))
        .filter(workspace_requests::status.eq(RequestStatus::Pending))
        .select(workspace_requests::workspace_id)
        .load::<Uuid>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .collect();

    let entries = list
        .into_iter()
        .map(|ws| {
            let (has_access, status) =
                access_status(is_admin, access.contains(&ws.id), pending.contains(&ws.id));
            WorkspaceStatusEntry {
                id: ws.id,
                label: ws.name,
                kind: ws.kind,
                has_access,
                status,
            }
        })
        .collect();

    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/workspaces/requests",
    tag = "Workspaces",
    responses(
        (status = 200, description = "Pending access requests across the company", body = Vec<AccessRequestEntry>),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_access_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<AccessRequestEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let rows: Vec<(WorkspaceRequest, String, Option<String>, Option<String>)> =
        workspace_requests::table
            .inner_join(workspaces::table.on(workspaces::id.eq(workspace_requests::workspace_id)))
            .inner_join(users::table.on(users::id.eq(workspace_requests::user_id)))
            .filter(workspace_requests::company_id.eq(company_id))
            .filter(workspace_requests::status.eq(RequestStatus::Pending))
            .order(workspace_requests::created_at.asc())
            .select((
                WorkspaceRequest::as_select(),
                workspaces::name,
                users::name,
                users::email,
            ))
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(request, workspace_name, name, email)| AccessRequestEntry {
            workspace_name,
            requester_name: name
                .or_else(|| email.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            requester_email: email,
            request,
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/workspaces/requests/{request_id}/resolve",
    tag = "Workspaces",
    params(("request_id" = Uuid, Path, description = "Access request ID")),
    request_body = ResolveAccessRequestBody,
    responses(
        (status = 200, description = "Request resolved, member access granted on approval", body = WorkspaceRequest),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_access_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ResolveAccessRequestBody>,
) -> ApiResult<Json<WorkspaceRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let request: WorkspaceRequest = workspace_requests::table
        .find(request_id)
        .filter(workspace_requests::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Request not found", "REQUEST_NOT_FOUND"))?;

    let resolved = conn
        .transaction::<WorkspaceRequest, diesel::result::Error, _>(|conn| {
            let resolved: WorkspaceRequest =
                diesel::update(workspace_requests::table.find(request.id))
                    .set(workspace_requests::status.eq(RequestStatus::resolved(payload.approved)))
                    .get_result(conn)?;

            if payload.approved {
                diesel::insert_into(workspace_access::table)
                    .values(&NewWorkspaceAccess {
                        user_id: request.user_id,
                        workspace_id: request.workspace_id,
                        role: WorkspaceRole::Member,
                        company_id,
                    })
                    .execute(conn)?;
            }

            Ok(resolved)
        })
        .map_err(|_| ApiError::internal("Failed to resolve request", "RESOLVE_FAILED"))?;

    info!(
        request_id = %request.id,
        approved = payload.approved,
        "Resolved workspace access request"
    );

    Ok(Json(resolved))
}

#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/access",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    request_body = GrantAccessRequest,
    responses(
        (status = 200, description = "Access granted; idempotent if the grant already exists", body = WorkspaceAccess),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn grant_access(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<GrantAccessRequest>,
) -> ApiResult<Json<WorkspaceAccess>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    load_company_workspace(&mut conn, workspace_id, company_id)?;

    let access = conn
        .transaction::<WorkspaceAccess, diesel::result::Error, _>(|conn| {
            let existing: Option<WorkspaceAccess> = workspace_access::table
                .filter(workspace_access::user_id.eq(payload.user_id))
                .filter(workspace_access::workspace_id.eq(workspace_id))
                .first(conn)
                .optional()?;

            let access = match existing {
                Some(access) => access,
                None => diesel::insert_into(workspace_access::table)
                    .values(&NewWorkspaceAccess {
                        user_id: payload.user_id,
                        workspace_id,
                        role: payload.role.unwrap_or(WorkspaceRole::Member),
                        company_id,
                    })
                    .get_result(conn)?,
            };

            // A direct grant settles any open request for the same workspace.
            diesel::update(
                workspace_requests::table
                    .filter(workspace_requests::user_id.eq(payload.user_id))
                    .filter(workspace_requests::workspace_id.eq(workspace_id))
                    .filter(workspace_requests::status.eq(RequestStatus::Pending))
                    .filter(workspace_requests::company_id.eq(company_id)),
            )
            .set(workspace_requests::status.eq(RequestStatus::Approved))
            .execute(conn)?;

            Ok(access)
        })
        .map_err(|_| ApiError::internal("Failed to grant access", "GRANT_FAILED"))?;

    info!(
        user_id = %payload.user_id,
        workspace_id = %workspace_id,
        "Granted workspace access"
    );

    Ok(Json(access))
}

#[utoipa::path(
    delete,
    path = "/workspaces/{workspace_id}/access/{user_id}",
    tag = "Workspaces",
    params(
        ("workspace_id" = Uuid, Path, description = "Workspace ID"),
        ("user_id" = Uuid, Path, description = "User whose access is revoked")
    ),
    responses(
        (status = 204, description = "Access revoked (no-op when no grant existed)"),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_access(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((workspace_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    diesel::delete(
        workspace_access::table
            .filter(workspace_access::user_id.eq(user_id))
            .filter(workspace_access::workspace_id.eq(workspace_id))
            .filter(workspace_access::company_id.eq(company_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    info!(user_id = %user_id, workspace_id = %workspace_id, "Revoked workspace access");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/workspaces/access/{user_id}",
    tag = "Workspaces",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "A user's explicit access rows within the company", body = Vec<WorkspaceAccess>),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_access(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<WorkspaceAccess>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let list: Vec<WorkspaceAccess> = workspace_access::table
        .filter(workspace_access::user_id.eq(user_id))
        .filter(workspace_access::company_id.eq(company_id))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}/role",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "The caller's effective role in the workspace, if any", body = MyRoleResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_workspace_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<MyRoleResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;

    if user.company_id.is_none() {
        return Ok(Json(MyRoleResponse { role: None }));
    }

    let role = authz::effective_workspace_role(&mut conn, &user, workspace_id)?;

    Ok(Json(MyRoleResponse { role }))
}

#[utoipa::path(
    patch,
    path = "/workspaces/{workspace_id}/members/{user_id}",
    tag = "Workspaces",
    params(
        ("workspace_id" = Uuid, Path, description = "Workspace ID"),
        ("user_id" = Uuid, Path, description = "Member whose workspace role changes")
    ),
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Member role updated", body = WorkspaceAccess),
        (status = 403, description = "Company admin or workspace admin required", body = ApiError),
        (status = 404, description = "Member has no access row", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((workspace_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> ApiResult<Json<WorkspaceAccess>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    authz::require_workspace_manager(&mut conn, &user, workspace_id)?;

    let updated: WorkspaceAccess = diesel::update(
        workspace_access::table
            .filter(workspace_access::user_id.eq(user_id))
            .filter(workspace_access::workspace_id.eq(workspace_id)),
    )
    .set(workspace_access::role.eq(payload.role))
    .get_result(&mut conn)
    .map_err(|_| ApiError::not_found("Member not found in workspace", "MEMBER_NOT_FOUND"))?;

    info!(
        member_id = %user_id,
        workspace_id = %workspace_id,
        role = payload.role.as_str(),
        "Updated workspace member role"
    );

    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}/members",
    tag = "Workspaces",
    params(("workspace_id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Explicit members merged with implicit company admins", body = Vec<WorkspaceMember>),
        (status = 404, description = "Workspace not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<Vec<WorkspaceMember>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_workspace(&mut conn, workspace_id, company_id)?;

    let admins: Vec<User> = users::table
        .filter(users::company_id.eq(company_id))
        .filter(users::system_role.eq(SystemRole::Admin))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let explicit: Vec<(WorkspaceRole, User)> = workspace_access::table
        .inner_join(users::table.on(users::id.eq(workspace_access::user_id)))
        .filter(workspace_access::workspace_id.eq(workspace_id))
        .select((workspace_access::role, User::as_select()))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    // Admins first; an explicit row for an admin never downgrades them.
    let mut members: HashMap<Uuid, WorkspaceMember> = HashMap::new();
    for admin in admins {
        members.insert(
            admin.id,
            WorkspaceMember {
                user_id: admin.id,
                role: WorkspaceRole::Admin,
                name: admin.name,
                email: admin.email,
                image: admin.image,
            },
        );
    }
    for (role, member) in explicit {
        members.entry(member.id).or_insert(WorkspaceMember {
            user_id: member.id,
            role,
            name: member.name,
            email: member.email,
            image: member.image,
        });
    }

    let mut list: Vec<WorkspaceMember> = members.into_values().collect();
    list.sort_by_key(|m| m.user_id);

    Ok(Json(list))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_always_read_as_members() {
        assert_eq!(access_status(true, false, false), (true, "member"));
        // Even with a stale pending request on file.
        assert_eq!(access_status(true, false, true), (true, "member"));
    }

    #[test]
    fn explicit_access_wins_over_pending() {
        assert_eq!(access_status(false, true, true), (true, "member"));
    }

    #[test]
    fn pending_without_access_reads_pending() {
        assert_eq!(access_status(false, false, true), (false, "pending"));
    }

    #[test]
    fn no_access_no_request_reads_none() {
        assert_eq!(access_status(false, false, false), (false, "none"));
    }
}
