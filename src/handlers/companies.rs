//! Company lifecycle, membership and invitation handlers.
//!
//! A user belongs to at most one company. Joining happens either through a
//! user-initiated join request or an admin-initiated invitation, both stored
//! as `company_requests` rows distinguished by status.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
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
        Company, CompanyRequest, NewCompany, NewCompanyRequest, RequestStatus, SystemRole, User,
    },
    pagination::{PaginationMeta, PaginationParams},
    schema::{
        announcements, assets, companies, company_requests, leads, messages, role_requests, roles,
        tasks, ticket_timeline, tickets, users, workspace_access, workspace_requests, workspaces,
    },
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCompanyRequest {
    #[schema(example = "Acme")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteMemberRequest {
    #[schema(example = "teammate@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferOwnershipRequest {
    pub new_owner_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequestBody {
    pub approved: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompanyResponse {
    pub company: Company,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompanyDirectoryEntry {
    #[serde(flatten)]
    pub company: Company,
    pub member_count: i64,
    #[schema(example = "Jane Doe")]
    pub owner_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompaniesListResponse {
    pub data: Vec<CompanyDirectoryEntry>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRequestEntry {
    #[serde(flatten)]
    pub request: CompanyRequest,
    pub requester_name: String,
    pub requester_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationEntry {
    #[serde(flatten)]
    pub request: CompanyRequest,
    pub company_name: String,
}

fn display_name(name: &Option<String>, email: &Option<String>) -> String {
    name.clone()
        .or_else(|| email.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[utoipa::path(
    post,
    path = "/companies",
    tag = "Companies",
    request_body = CreateCompanyRequest,
    responses(
        (status = 200, description = "Company created, caller becomes owner and admin", body = CompanyResponse),
        (status = 409, description = "Caller already belongs to a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_company(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateCompanyRequest>,
) -> ApiResult<Json<CompanyResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;

    if user.company_id.is_some() {
        return Err(ApiError::conflict(
            "Already in a company",
            "ALREADY_IN_COMPANY",
        ));
    }

    let company = conn
        .transaction::<Company, diesel::result::Error, _>(|conn| {
            let company: Company = diesel::insert_into(companies::table)
                .values(&NewCompany {
                    name: payload.name.clone(),
                    owner_id: user.id,
                })
                .get_result(conn)?;

            diesel::update(users::table.find(user.id))
                .set((
                    users::company_id.eq(company.id),
                    users::system_role.eq(SystemRole::Admin),
                    users::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

            Ok(company)
        })
        .map_err(|_| ApiError::internal("Failed to create company", "COMPANY_CREATE_FAILED"))?;

    info!(company_id = %company.id, owner_id = %user.id, "Created company");

    Ok(Json(CompanyResponse { company }))
}

#[utoipa::path(
    get,
    path = "/companies",
    tag = "Companies",
    params(PaginationParams),
    responses(
        (status = 200, description = "Cross-tenant company directory", body = CompaniesListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_companies(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<CompaniesListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = companies::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();

    let page: Vec<Company> = companies::table
        .order(companies::created_at.asc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let company_ids: Vec<Uuid> = page.iter().map(|c| c.id).collect();
    let owner_ids: Vec<Uuid> = page.iter().map(|c| c.owner_id).collect();

    let counts: HashMap<Uuid, i64> = users::table
        .filter(users::company_id.eq_any(&company_ids))
        .group_by(users::company_id)
        .select((users::company_id, diesel::dsl::count_star()))
        .load::<(Option<Uuid>, i64)>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .filter_map(|(id, n)| id.map(|id| (id, n)))
        .collect();

    let owners: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(&owner_ids))
        .select((users::id, users::name, users::email))
        .load::<(Uuid, Option<String>, Option<String>)>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .map(|(id, name, email)| (id, display_name(&name, &email)))
        .collect();

    let data = page
        .into_iter()
        .map(|company| CompanyDirectoryEntry {
            member_count: counts.get(&company.id).copied().unwrap_or(0),
            owner_name: owners
                .get(&company.owner_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            company,
        })
        .collect();

    Ok(Json(CompaniesListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    get,
    path = "/companies/me",
    tag = "Companies",
    responses(
        (status = 200, description = "The caller's company", body = CompanyResponse),
        (status = 404, description = "Caller has no company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_my_company(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<CompanyResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;

    let company_id = user
        .company_id
        .ok_or_else(|| ApiError::not_found("Not part of a company", "NO_COMPANY"))?;

    let company: Company = companies::table
        .find(company_id)
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Company not found", "COMPANY_NOT_FOUND"))?;

    Ok(Json(CompanyResponse { company }))
}

#[utoipa::path(
    patch,
    path = "/companies/me",
    tag = "Companies",
    request_body = UpdateCompanyRequest,
    responses(
        (status = 200, description = "Company updated", body = CompanyResponse),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_company(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<UpdateCompanyRequest>,
) -> ApiResult<Json<CompanyResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    if payload.name.is_none() && payload.description.is_none() {
        return Err(ApiError::bad_request(
            "At least one field (name or description) must be provided",
            "NO_FIELDS_TO_UPDATE",
        ));
    }

    let company: Company = diesel::update(companies::table.find(company_id))
        .set((
            payload.name.map(|n| companies::name.eq(n)),
            payload
                .description
                .map(|d| companies::description.eq(d)),
            companies::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(company_id = %company.id, "Updated company");

    Ok(Json(CompanyResponse { company }))
}

#[utoipa::path(
    post,
    path = "/companies/{company_id}/join",
    tag = "Companies",
    params(("company_id" = Uuid, Path, description = "Company to join")),
    responses(
        (status = 200, description = "Join request created", body = CompanyRequest),
        (status = 409, description = "Already in a company or request already pending", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn join_company(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<CompanyRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;

    if user.company_id.is_some() {
        return Err(ApiError::conflict(
            "Already in a company",
            "ALREADY_IN_COMPANY",
        ));
    }

    companies::table
        .find(company_id)
        .select(companies::id)
        .first::<Uuid>(&mut conn)
        .map_err(|_| ApiError::not_found("Company not found", "COMPANY_NOT_FOUND"))?;

    // Best-effort dedup; a concurrent duplicate is resolved by whichever
    // request the admin handles first.
    let existing: Option<Uuid> = company_requests::table
        .filter(company_requests::user_id.eq(user.id))
        .filter(company_requests::company_id.eq(company_id))
        .filter(company_requests::status.eq(RequestStatus::Pending))
        .select(company_requests::id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Request already pending",
            "REQUEST_ALREADY_PENDING",
        ));
    }

    let request: CompanyRequest = diesel::insert_into(company_requests::table)
        .values(&NewCompanyRequest {
            user_id: user.id,
            company_id,
            status: RequestStatus::Pending,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(user_id = %user.id, company_id = %company_id, "Created join request");

    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/users/me/join-request",
    tag = "Companies",
    responses(
        (status = 200, description = "The caller's pending join request, if any", body = Option<CompanyRequest>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_my_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Option<CompanyRequest>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let request: Option<CompanyRequest> = company_requests::table
        .filter(company_requests::user_id.eq(caller.user_id))
        .filter(company_requests::status.eq(RequestStatus::Pending))
        .order(company_requests::created_at.desc())
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/companies/me/requests",
    tag = "Companies",
    responses(
        (status = 200, description = "Pending join requests for the caller's company", body = Vec<JoinRequestEntry>),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_join_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<JoinRequestEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let rows: Vec<(CompanyRequest, Option<String>, Option<String>)> = company_requests::table
        .inner_join(users::table.on(users::id.eq(company_requests::user_id)))
        .filter(company_requests::company_id.eq(company_id))
        .filter(company_requests::status.eq(RequestStatus::Pending))
        .order(company_requests::created_at.asc())
        .select((CompanyRequest::as_select(), users::name, users::email))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(request, name, email)| JoinRequestEntry {
            requester_name: display_name(&name, &email),
            requester_email: email,
            request,
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/companies/me/requests/{request_id}/resolve",
    tag = "Companies",
    params(("request_id" = Uuid, Path, description = "Join request ID")),
    request_body = ResolveRequestBody,
    responses(
        (status = 200, description = "Request resolved", body = CompanyRequest),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_join_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ResolveRequestBody>,
) -> ApiResult<Json<CompanyRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let request: CompanyRequest = company_requests::table
        .find(request_id)
        .filter(company_requests::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Request not found", "REQUEST_NOT_FOUND"))?;

    let resolved = conn
        .transaction::<CompanyRequest, diesel::result::Error, _>(|conn| {
            let resolved: CompanyRequest =
                diesel::update(company_requests::table.find(request.id))
                    .set(company_requests::status.eq(RequestStatus::resolved(payload.approved)))
                    .get_result(conn)?;

            if payload.approved {
                diesel::update(users::table.find(request.user_id))
                    .set((
                        users::company_id.eq(request.company_id),
                        users::system_role.eq(SystemRole::Employee),
                        users::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;
            }

            Ok(resolved)
        })
        .map_err(|_| ApiError::internal("Failed to resolve request", "RESOLVE_FAILED"))?;

    info!(
        request_id = %request.id,
        approved = payload.approved,
        "Resolved join request"
    );

    Ok(Json(resolved))
}

#[utoipa::path(
    post,
    path = "/companies/me/invitations",
    tag = "Companies",
    request_body = InviteMemberRequest,
    responses(
        (status = 200, description = "Invitation created", body = CompanyRequest),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "No user with that email", body = ApiError),
        (status = 409, description = "User already affiliated or invited", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<InviteMemberRequest>,
) -> ApiResult<Json<CompanyRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&user)?;

    let invitee: User = users::table
        .filter(users::email.eq(&payload.email))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    if invitee.company_id.is_some() {
        return Err(ApiError::conflict(
            "User already in a company",
            "ALREADY_IN_COMPANY",
        ));
    }

    let existing: Option<Uuid> = company_requests::table
        .filter(company_requests::user_id.eq(invitee.id))
        .filter(company_requests::company_id.eq(company_id))
        .filter(
            company_requests::status
                .eq(RequestStatus::Pending)
                .or(company_requests::status.eq(RequestStatus::Invited)),
        )
        .select(company_requests::id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Request already exists",
            "REQUEST_ALREADY_EXISTS",
        ));
    }

    let request: CompanyRequest = diesel::insert_into(company_requests::table)
        .values(&NewCompanyRequest {
            user_id: invitee.id,
            company_id,
            status: RequestStatus::Invited,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(invitee_id = %invitee.id, company_id = %company_id, "Invited member");

    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/users/me/invitations",
    tag = "Companies",
    responses(
        (status = 200, description = "Open invitations addressed to the caller", body = Vec<InvitationEntry>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_invitations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<InvitationEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let rows: Vec<(CompanyRequest, String)> = company_requests::table
        .inner_join(companies::table.on(companies::id.eq(company_requests::company_id)))
        .filter(company_requests::user_id.eq(caller.user_id))
        .filter(company_requests::status.eq(RequestStatus::Invited))
        .order(company_requests::created_at.desc())
        .select((CompanyRequest::as_select(), companies::name))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(request, company_name)| InvitationEntry {
            request,
            company_name,
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/users/me/invitations/{request_id}/accept",
    tag = "Companies",
    params(("request_id" = Uuid, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Invitation accepted, caller joins as employee", body = CompanyRequest),
        (status = 404, description = "Invitation not found or not addressed to the caller", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<CompanyRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let request: CompanyRequest = company_requests::table
        .find(request_id)
        .filter(company_requests::user_id.eq(caller.user_id))
        .filter(company_requests::status.eq(RequestStatus::Invited))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Invalid invitation", "INVALID_INVITATION"))?;

    let accepted = conn
        .transaction::<CompanyRequest, diesel::result::Error, _>(|conn| {
            let accepted: CompanyRequest =
                diesel::update(company_requests::table.find(request.id))
                    .set(company_requests::status.eq(RequestStatus::Approved))
                    .get_result(conn)?;

            diesel::update(users::table.find(caller.user_id))
                .set((
                    users::company_id.eq(request.company_id),
                    users::system_role.eq(SystemRole::Employee),
                    users::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

            Ok(accepted)
        })
        .map_err(|_| ApiError::internal("Failed to accept invitation", "ACCEPT_FAILED"))?;

    info!(user_id = %caller.user_id, company_id = %request.company_id, "Accepted invitation");

    Ok(Json(accepted))
}

#[utoipa::path(
    post,
    path = "/users/me/invitations/{request_id}/decline",
    tag = "Companies",
    params(("request_id" = Uuid, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Invitation declined", body = CompanyRequest),
        (status = 404, description = "Invitation not found or not addressed to the caller", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn decline_invitation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<CompanyRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let declined: CompanyRequest = diesel::update(
        company_requests::table
            .find(request_id)
            .filter(company_requests::user_id.eq(caller.user_id)),
    )
    .set(company_requests::status.eq(RequestStatus::Rejected))
    .get_result(&mut conn)
    .map_err(|_| ApiError::not_found("Invalid invitation", "INVALID_INVITATION"))?;

    Ok(Json(declined))
}

#[utoipa::path(
    post,
    path = "/companies/me/transfer-ownership",
    tag = "Companies",
    request_body = TransferOwnershipRequest,
    responses(
        (status = 200, description = "Ownership transferred", body = CompanyResponse),
        (status = 403, description = "Only the owner can transfer ownership", body = ApiError),
        (status = 404, description = "New owner is not a member", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn transfer_ownership(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<TransferOwnershipRequest>,
) -> ApiResult<Json<CompanyResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company = authz::require_owner(&mut conn, &user)?;

    let new_owner: User = users::table
        .find(payload.new_owner_id)
        .filter(users::company_id.eq(company.id))
        .first(&mut conn)
        .map_err(|_| {
            ApiError::not_found("New owner must be in the company", "NOT_A_MEMBER")
        })?;

    // The previous owner keeps their admin role.
    let company = conn
        .transaction::<Company, diesel::result::Error, _>(|conn| {
            let company: Company = diesel::update(companies::table.find(company.id))
                .set((
                    companies::owner_id.eq(new_owner.id),
                    companies::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result(conn)?;

            diesel::update(users::table.find(new_owner.id))
                .set(users::system_role.eq(SystemRole::Admin))
                .execute(conn)?;

            Ok(company)
        })
        .map_err(|_| ApiError::internal("Failed to transfer ownership", "TRANSFER_FAILED"))?;

    info!(company_id = %company.id, new_owner_id = %new_owner.id, "Transferred ownership");

    Ok(Json(CompanyResponse { company }))
}

#[utoipa::path(
    delete,
    path = "/companies/me",
    tag = "Companies",
    responses(
        (status = 204, description = "Company and all tenant data deleted"),
        (status = 403, description = "Only the owner can delete the company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_company(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company = authz::require_owner(&mut conn, &user)?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        purge_company_data(conn, company.id)?;

        diesel::update(users::table.filter(users::company_id.eq(company.id)))
            .set((
                users::company_id.eq(None::<Uuid>),
                users::system_role.eq(SystemRole::Employee),
                users::custom_role_id.eq(None::<Uuid>),
                users::department.eq(None::<String>),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        diesel::delete(companies::table.find(company.id)).execute(conn)?;
        Ok(())
    })
    .map_err(|_| ApiError::internal("Failed to delete company", "DELETE_FAILED"))?;

    info!(company_id = %company.id, "Deleted company and tenant data");

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes every tenant-scoped row belonging to a company. Users are handled
/// separately by the callers since reset and deletion treat them differently.
pub(crate) fn purge_company_data(
    conn: &mut PgConnection,
    company_id: Uuid,
) -> Result<(), diesel::result::Error> {
    let ticket_ids: Vec<Uuid> = tickets::table
        .filter(tickets::company_id.eq(company_id))
        .select(tickets::id)
        .load(conn)?;

    diesel::delete(ticket_timeline::table.filter(ticket_timeline::ticket_id.eq_any(&ticket_ids)))
        .execute(conn)?;
    diesel::delete(tickets::table.filter(tickets::company_id.eq(company_id))).execute(conn)?;
    diesel::delete(tasks::table.filter(tasks::company_id.eq(company_id))).execute(conn)?;
    diesel::delete(leads::table.filter(leads::company_id.eq(company_id))).execute(conn)?;
    diesel::delete(messages::table.filter(messages::company_id.eq(company_id))).execute(conn)?;
    diesel::delete(announcements::table.filter(announcements::company_id.eq(company_id)))
        .execute(conn)?;
    diesel::delete(assets::table.filter(assets::company_id.eq(company_id))).execute(conn)?;
    diesel::delete(workspace_access::table.filter(workspace_access::company_id.eq(company_id)))
        .execute(conn)?;
    diesel::delete(
        workspace_requests::table.filter(workspace_requests::company_id.eq(company_id)),
    )
    .execute(conn)?;
    diesel::delete(workspaces::table.filter(workspaces::company_id.eq(company_id)))
        .execute(conn)?;
    diesel::delete(role_requests::table.filter(role_requests::company_id.eq(company_id)))
        .execute(conn)?;
    diesel::delete(roles::table.filter(roles::company_id.eq(company_id))).execute(conn)?;
    diesel::delete(company_requests::table.filter(company_requests::company_id.eq(company_id)))
        .execute(conn)?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/companies/me/leave",
    tag = "Companies",
    responses(
        (status = 204, description = "Left the company"),
        (status = 422, description = "Owner cannot leave their own company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn leave_company(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let owner_id: Uuid = companies::table
        .find(company_id)
        .select(companies::owner_id)
        .first(&mut conn)
        .map_err(|_| ApiError::db_error())?;
    if owner_id == user.id {
        return Err(ApiError::invalid_state(
            "Owner cannot leave company. Delete company instead.",
            "OWNER_CANNOT_LEAVE",
        ));
    }

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(workspace_access::table.filter(workspace_access::user_id.eq(user.id)))
            .execute(conn)?;
        diesel::delete(workspace_requests::table.filter(workspace_requests::user_id.eq(user.id)))
            .execute(conn)?;
        // Approved rows stay behind as a membership audit trail.
        diesel::delete(
            company_requests::table
                .filter(company_requests::user_id.eq(user.id))
                .filter(company_requests::status.ne(RequestStatus::Approved)),
        )
        .execute(conn)?;

        diesel::update(users::table.find(user.id))
            .set((
                users::company_id.eq(None::<Uuid>),
                users::system_role.eq(None::<SystemRole>),
                users::custom_role_id.eq(None::<Uuid>),
                users::department.eq(None::<String>),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        Ok(())
    })
    .map_err(|_| ApiError::internal("Failed to leave company", "LEAVE_FAILED"))?;

    info!(user_id = %user.id, company_id = %company_id, "Left company");

    Ok(StatusCode::NO_CONTENT)
}
