//! Custom role management and the role-request workflow.
//!
//! The `admin` system role is deliberately unreachable through requests: it
//! is rejected at submission and again at approval.

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
    models::{NewRole, NewRoleRequest, RequestStatus, Role, RoleRequest, SystemRole},
    schema::{role_requests, roles, users},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    #[schema(example = "Designer")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestRoleBody {
    pub role: Option<SystemRole>,
    pub custom_role_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRoleRequestBody {
    pub approved: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleRequestEntry {
    #[serde(flatten)]
    pub request: RoleRequest,
    pub requester_name: String,
    pub requester_email: Option<String>,
    pub custom_role_name: Option<String>,
}

/// Validates a role request against what the user already holds. Pure, so
/// the rejection matrix is unit-testable.
fn validate_role_request(
    requested: Option<SystemRole>,
    custom_role_id: Option<Uuid>,
    current_role: Option<SystemRole>,
    current_custom_role: Option<Uuid>,
) -> ApiResult<()> {
    if requested.is_none() && custom_role_id.is_none() {
        return Err(ApiError::bad_request(
            "Must request either a system role or a custom role",
            "EMPTY_ROLE_REQUEST",
        ));
    }
    if requested == Some(SystemRole::Admin) {
        return Err(ApiError::forbidden(
            "The admin role is restricted and cannot be requested",
            "ADMIN_NOT_REQUESTABLE",
        ));
    }
    if let Some(role) = requested {
        if current_role == Some(role) && custom_role_id.is_none() {
            return Err(ApiError::conflict(
                "You already have this role",
                "ROLE_ALREADY_HELD",
            ));
        }
    }
    if custom_role_id.is_some() && custom_role_id == current_custom_role {
        return Err(ApiError::conflict(
            "You already have this custom role",
            "ROLE_ALREADY_HELD",
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "Custom roles defined in the caller's company", body = Vec<Role>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Role>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let roles_list: Vec<Role> = roles::table
        .filter(roles::company_id.eq(company_id))
        .order(roles::name.asc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(roles_list))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "Roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 200, description = "Role created", body = RoleResponse),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let role: Role = diesel::insert_into(roles::table)
        .values(&NewRole {
            company_id,
            name: payload.name,
            description: payload.description,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("Failed to create role", "ROLE_CREATE_FAILED"))?;

    info!(role_id = %role.id, company_id = %company_id, "Created custom role");

    Ok(Json(RoleResponse { role }))
}

#[utoipa::path(
    patch,
    path = "/roles/{role_id}",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Role not found in company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let role: Role = diesel::update(
        roles::table
            .find(role_id)
            .filter(roles::company_id.eq(company_id)),
    )
    .set((
        roles::name.eq(payload.name),
        roles::description.eq(payload.description),
    ))
    .get_result(&mut conn)
    .map_err(|_| ApiError::not_found("Role not found in company", "ROLE_NOT_FOUND"))?;

    info!(role_id = %role.id, "Updated custom role");

    Ok(Json(RoleResponse { role }))
}

#[utoipa::path(
    delete,
    path = "/roles/{role_id}",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted and unassigned from all holders"),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Role not found in company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    roles::table
        .find(role_id)
        .filter(roles::company_id.eq(company_id))
        .select(roles::id)
        .first::<Uuid>(&mut conn)
        .map_err(|_| ApiError::not_found("Role not found in company", "ROLE_NOT_FOUND"))?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::update(users::table.filter(users::custom_role_id.eq(role_id)))
            .set(users::custom_role_id.eq(None::<Uuid>))
            .execute(conn)?;
        diesel::delete(roles::table.find(role_id)).execute(conn)?;
        Ok(())
    })
    .map_err(|_| ApiError::internal("Failed to delete role", "DELETE_FAILED"))?;

    info!(role_id = %role_id, company_id = %company_id, "Deleted custom role");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/role-requests",
    tag = "Roles",
    request_body = RequestRoleBody,
    responses(
        (status = 200, description = "Role request submitted", body = RoleRequest),
        (status = 403, description = "Admin role cannot be requested", body = ApiError),
        (status = 409, description = "Role already held or a request is already pending", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn request_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<RequestRoleBody>,
) -> ApiResult<Json<RoleRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    validate_role_request(
        payload.role,
        payload.custom_role_id,
        user.system_role,
        user.custom_role_id,
    )?;

    if let Some(role_id) = payload.custom_role_id {
        roles::table
            .find(role_id)
            .filter(roles::company_id.eq(company_id))
            .select(roles::id)
            .first::<Uuid>(&mut conn)
            .map_err(|_| ApiError::not_found("Role not found in company", "ROLE_NOT_FOUND"))?;
    }

    // One open request per user.
    let pending: Option<Uuid> = role_requests::table
        .filter(role_requests::user_id.eq(user.id))
        .filter(role_requests::status.eq(RequestStatus::Pending))
        .select(role_requests::id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;
    if pending.is_some() {
        return Err(ApiError::conflict(
            "You already have a pending role request",
            "REQUEST_ALREADY_PENDING",
        ));
    }

    let request: RoleRequest = diesel::insert_into(role_requests::table)
        .values(&NewRoleRequest {
            user_id: user.id,
            company_id,
            requested_role: payload.role,
            custom_role_id: payload.custom_role_id,
            status: RequestStatus::Pending,
            reason: payload.reason,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(user_id = %user.id, request_id = %request.id, "Submitted role request");

    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/role-requests",
    tag = "Roles",
    responses(
        (status = 200, description = "Pending role requests for the caller's company", body = Vec<RoleRequestEntry>),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_role_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<RoleRequestEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let rows: Vec<(RoleRequest, Option<String>, Option<String>, Option<String>)> =
        role_requests::table
            .inner_join(users::table.on(users::id.eq(role_requests::user_id)))
            .left_join(roles::table.on(roles::id.nullable().eq(role_requests::custom_role_id)))
            .filter(role_requests::company_id.eq(company_id))
            .filter(role_requests::status.eq(RequestStatus::Pending))
            .order(role_requests::created_at.asc())
            .select((
                RoleRequest::as_select(),
                users::name,
                users::email,
                roles::name.nullable(),
            ))
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(request, name, email, custom_role_name)| RoleRequestEntry {
            requester_name: name
                .or_else(|| email.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            requester_email: email,
            custom_role_name,
            request,
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/role-requests/{request_id}/resolve",
    tag = "Roles",
    params(("request_id" = Uuid, Path, description = "Role request ID")),
    request_body = ResolveRoleRequestBody,
    responses(
        (status = 200, description = "Request resolved, role applied on approval", body = RoleRequest),
        (status = 403, description = "Admin access required, or admin role approval attempted", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_role_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ResolveRoleRequestBody>,
) -> ApiResult<Json<RoleRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let request: RoleRequest = role_requests::table
        .find(request_id)
        .filter(role_requests::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Request not found", "REQUEST_NOT_FOUND"))?;

    // Submission already blocks this; guard again in case the row predates
    // the rule or was written by hand.
    if payload.approved && request.requested_role == Some(SystemRole::Admin) {
        return Err(ApiError::forbidden(
            "Cannot approve admin role requests",
            "ADMIN_NOT_REQUESTABLE",
        ));
    }

    let resolved = conn
        .transaction::<RoleRequest, diesel::result::Error, _>(|conn| {
            let resolved: RoleRequest = diesel::update(role_requests::table.find(request.id))
                .set(role_requests::status.eq(RequestStatus::resolved(payload.approved)))
                .get_result(conn)?;

            if payload.approved {
                diesel::update(users::table.find(request.user_id))
                    .set((
                        request.requested_role.map(|r| users::system_role.eq(r)),
                        request.custom_role_id.map(|r| users::custom_role_id.eq(r)),
                        users::updated_at.eq(chrono::Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;
            }

            Ok(resolved)
        })
        .map_err(|_| ApiError::internal("Failed to resolve request", "RESOLVE_FAILED"))?;

    info!(
        request_id = %request.id,
        approved = payload.approved,
        "Resolved role request"
    );

    Ok(Json(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_is_rejected() {
        let err = validate_role_request(None, None, None, None).unwrap_err();
        assert_eq!(err.1.code, "EMPTY_ROLE_REQUEST");
    }

    #[test]
    fn admin_role_is_never_requestable() {
        let err = validate_role_request(Some(SystemRole::Admin), None, None, None).unwrap_err();
        assert_eq!(err.1.code, "ADMIN_NOT_REQUESTABLE");

        // Even alongside a custom role request.
        let custom = Some(Uuid::new_v4());
        let err = validate_role_request(Some(SystemRole::Admin), custom, None, None).unwrap_err();
        assert_eq!(err.1.code, "ADMIN_NOT_REQUESTABLE");
    }

    #[test]
    fn already_held_system_role_is_rejected() {
        let err = validate_role_request(
            Some(SystemRole::Employee),
            None,
            Some(SystemRole::Employee),
            None,
        )
        .unwrap_err();
        assert_eq!(err.1.code, "ROLE_ALREADY_HELD");
    }

    #[test]
    fn held_system_role_plus_new_custom_role_is_allowed() {
        let custom = Some(Uuid::new_v4());
        assert!(validate_role_request(
            Some(SystemRole::Employee),
            custom,
            Some(SystemRole::Employee),
            None,
        )
        .is_ok());
    }

    #[test]
    fn already_held_custom_role_is_rejected() {
        let custom = Some(Uuid::new_v4());
        let err = validate_role_request(None, custom, None, custom).unwrap_err();
        assert_eq!(err.1.code, "ROLE_ALREADY_HELD");
    }

    #[test]
    fn valid_requests_pass() {
        assert!(validate_role_request(Some(SystemRole::Client), None, None, None).is_ok());
        assert!(validate_role_request(None, Some(Uuid::new_v4()), None, None).is_ok());
    }
}
