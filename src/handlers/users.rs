//! User profile and directory handlers.
//!
//! Email changes never apply directly: they park the new address in
//! `pending_email` behind a short-lived 6-digit code dispatched through the
//! notification collaborator, and only `verify_email_change` promotes it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    authz,
    error::{get_db_conn, ApiError, ApiResult},
    identity::Caller,
    models::{NewUser, SystemRole, User},
    pagination::{PaginationMeta, PaginationParams},
    schema::{companies, role_requests, roles, users, workspace_access, workspace_requests},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub user: User,
    pub custom_role_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersListResponse {
    pub data: Vec<DirectoryEntry>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSelfRequest {
    pub name: Option<String>,
    #[schema(example = "new@example.com")]
    pub email: Option<String>,
    /// Opaque blob-storage reference of an uploaded avatar.
    pub image_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateSelfResponse {
    #[schema(example = "verification_required")]
    pub status: &'static str,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    #[schema(example = "482019")]
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub role: Option<SystemRole>,
    pub custom_role_id: Option<Uuid>,
    pub department: Option<String>,
}

fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Decides the outcome of a verification attempt against the caller's stored
/// pending-email state. Pure so the match/expiry/missing cases are testable.
fn check_verification_attempt(user: &User, code: &str, now: NaiveDateTime) -> ApiResult<()> {
    let (pending, stored) = match (&user.pending_email, &user.verification_code) {
        (Some(p), Some(s)) => (p, s),
        _ => {
            return Err(ApiError::invalid_state(
                "No pending email change found",
                "NO_PENDING_EMAIL",
            ))
        }
    };

    if let Some(expires_at) = user.verification_code_expires_at {
        if expires_at < now {
            return Err(ApiError::expired(
                "Verification code has expired. Please try again.",
                "CODE_EXPIRED",
            ));
        }
    }

    if stored != code {
        return Err(ApiError::bad_request(
            "Invalid verification code",
            "INVALID_CODE",
        ));
    }

    debug_assert!(!pending.is_empty());
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "The caller's user record", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn current_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    post,
    path = "/users/me/sync",
    tag = "Users",
    responses(
        (status = 200, description = "User row provisioned or refreshed", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn sync_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let existing: Option<User> = users::table
        .find(caller.user_id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    let user = match existing {
        None => {
            let new_user = NewUser {
                id: caller.user_id,
                name: caller.name.clone(),
                email: caller.email.clone(),
                image: caller.picture.clone(),
            };
            let user: User = diesel::insert_into(users::table)
                .values(&new_user)
                .get_result(&mut conn)
                .map_err(|_| ApiError::conflict("Failed to provision user", "SYNC_FAILED"))?;
            info!(user_id = %user.id, "Provisioned user from identity claims");
            user
        }
        Some(user) => {
            // Only fill missing fields so manual edits survive; the avatar
            // tracks the provider.
            let name = user.name.clone().or_else(|| caller.name.clone());
            let email = user.email.clone().or_else(|| caller.email.clone());
            let image = caller.picture.clone().or_else(|| user.image.clone());

            diesel::update(users::table.find(user.id))
                .set((
                    users::name.eq(&name),
                    users::email.eq(&email),
                    users::image.eq(&image),
                    users::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result(&mut conn)
                .map_err(|_| ApiError::db_error())?
        }
    };

    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    patch,
    path = "/users/me",
    tag = "Users",
    request_body = UpdateSelfRequest,
    responses(
        (status = 200, description = "Profile updated, or verification required for an email change", body = UpdateSelfResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 409, description = "Email already in use", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_self(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<UpdateSelfRequest>,
) -> ApiResult<Json<UpdateSelfResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let now = Utc::now().naive_utc();

    // Name and avatar apply immediately, independent of any email change.
    if let Some(name) = &payload.name {
        diesel::update(users::table.find(user.id))
            .set((users::name.eq(name), users::updated_at.eq(now)))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(image_ref) = &payload.image_ref {
        if let Some(url) = state.blobs.get_url(image_ref) {
            diesel::update(users::table.find(user.id))
                .set((users::image.eq(url), users::updated_at.eq(now)))
                .execute(&mut conn)
                .map_err(|_| ApiError::db_error())?;
        }
    }

    let new_email = match payload.email {
        Some(email) if Some(&email) != user.email.as_ref() => email,
        _ => return Ok(Json(UpdateSelfResponse { status: "success" })),
    };

    let taken: Option<Uuid> = users::table
        .filter(users::email.eq(&new_email))
        .select(users::id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;
    if taken.is_some() {
        return Err(ApiError::conflict(
            "This email address is already in use by another account",
            "EMAIL_IN_USE",
        ));
    }

    let code = generate_verification_code();
    let expires_at = now + Duration::minutes(state.verification_code_ttl_mins);

    diesel::update(users::table.find(user.id))
        .set((
            users::pending_email.eq(&new_email),
            users::verification_code.eq(&code),
            users::verification_code_expires_at.eq(expires_at),
            users::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    state.mailer.send(
        &new_email,
        "Verify your new email address",
        &format!(
            "Your verification code is {code}. It expires in {} minutes.",
            state.verification_code_ttl_mins
        ),
    );

    info!(user_id = %user.id, "Started email change verification");

    Ok(Json(UpdateSelfResponse {
        status: "verification_required",
    }))
}

#[utoipa::path(
    post,
    path = "/users/me/verify-email",
    tag = "Users",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email change applied", body = UserResponse),
        (status = 400, description = "Invalid verification code", body = ApiError),
        (status = 410, description = "Verification code expired", body = ApiError),
        (status = 422, description = "No pending email change", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_email_change(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<VerifyEmailRequest>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let now = Utc::now().naive_utc();

    check_verification_attempt(&user, &payload.code, now)?;

    let pending = user.pending_email.clone();
    let updated: User = diesel::update(users::table.find(user.id))
        .set((
            users::email.eq(&pending),
            users::pending_email.eq(None::<String>),
            users::verification_code.eq(None::<String>),
            users::verification_code_expires_at.eq(None::<NaiveDateTime>),
            users::email_verified_at.eq(now),
            users::updated_at.eq(now),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(user_id = %user.id, "Email change verified");

    Ok(Json(UserResponse { user: updated }))
}

#[utoipa::path(
    post,
    path = "/users/me/resend-verification",
    tag = "Users",
    responses(
        (status = 200, description = "New verification code dispatched", body = UpdateSelfResponse),
        (status = 422, description = "No pending email change", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resend_verification_code(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<UpdateSelfResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;

    let pending = user.pending_email.clone().ok_or_else(|| {
        ApiError::invalid_state("No pending email change found", "NO_PENDING_EMAIL")
    })?;

    let now = Utc::now().naive_utc();
    let code = generate_verification_code();
    let expires_at = now + Duration::minutes(state.verification_code_ttl_mins);

    diesel::update(users::table.find(user.id))
        .set((
            users::verification_code.eq(&code),
            users::verification_code_expires_at.eq(expires_at),
            users::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    state.mailer.send(
        &pending,
        "Verify your new email address",
        &format!(
            "Your verification code is {code}. It expires in {} minutes.",
            state.verification_code_ttl_mins
        ),
    );

    Ok(Json(UpdateSelfResponse {
        status: "verification_required",
    }))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated company directory", body = UsersListResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<UsersListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let total_count: i64 = users::table
        .filter(users::company_id.eq(company_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();

    let rows: Vec<(User, Option<String>)> = users::table
        .left_join(roles::table.on(roles::id.nullable().eq(users::custom_role_id)))
        .filter(users::company_id.eq(company_id))
        .order(users::created_at.asc())
        .limit(limit)
        .offset(offset)
        .select((User::as_select(), roles::name.nullable()))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(user, custom_role_name)| DirectoryEntry {
            user,
            custom_role_name,
        })
        .collect();

    Ok(Json(UsersListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "Target user ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Not an admin, or owner protection", body = ApiError),
        (status = 404, description = "User not found in company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let admin = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&admin)?;

    let target: User = users::table
        .find(user_id)
        .filter(users::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found in company", "USER_NOT_FOUND"))?;

    let owner_id: Uuid = companies::table
        .find(company_id)
        .select(companies::owner_id)
        .first(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if owner_id == target.id && admin.id != target.id {
        return Err(ApiError::forbidden(
            "Cannot modify the company owner",
            "CANNOT_MODIFY_OWNER",
        ));
    }
    if owner_id == target.id && matches!(payload.role, Some(r) if r != SystemRole::Admin) {
        return Err(ApiError::invalid_state(
            "The company owner cannot be demoted from the admin role",
            "OWNER_CANNOT_BE_DEMOTED",
        ));
    }

    if payload.role.is_none() && payload.custom_role_id.is_none() && payload.department.is_none() {
        return Err(ApiError::bad_request(
            "At least one field must be provided",
            "NO_FIELDS_TO_UPDATE",
        ));
    }

    let now = Utc::now().naive_utc();
    let updated: User = diesel::update(users::table.find(target.id))
        .set((
            payload.role.map(|r| users::system_role.eq(r)),
            payload.custom_role_id.map(|r| users::custom_role_id.eq(r)),
            payload.department.map(|d| users::department.eq(d)),
            users::updated_at.eq(now),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(admin_id = %admin.id, user_id = %target.id, "Updated user");

    Ok(Json(UserResponse { user: updated }))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "Target user ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Not an admin, self, or owner", body = ApiError),
        (status = 404, description = "User not found in company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let admin = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company_admin(&admin)?;

    if user_id == admin.id {
        return Err(ApiError::invalid_state(
            "Cannot delete yourself",
            "CANNOT_DELETE_SELF",
        ));
    }

    let target: User = users::table
        .find(user_id)
        .filter(users::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found in company", "USER_NOT_FOUND"))?;

    let owner_id: Uuid = companies::table
        .find(company_id)
        .select(companies::owner_id)
        .first(&mut conn)
        .map_err(|_| ApiError::db_error())?;
    if owner_id == target.id {
        return Err(ApiError::invalid_state(
            "Cannot delete the company owner",
            "CANNOT_DELETE_OWNER",
        ));
    }

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(workspace_access::table.filter(workspace_access::user_id.eq(target.id)))
            .execute(conn)?;
        diesel::delete(workspace_requests::table.filter(workspace_requests::user_id.eq(target.id)))
            .execute(conn)?;
        diesel::delete(role_requests::table.filter(role_requests::user_id.eq(target.id)))
            .execute(conn)?;
        diesel::delete(users::table.find(target.id)).execute(conn)?;
        Ok(())
    })
    .map_err(|_| ApiError::internal("Failed to delete user", "DELETE_FAILED"))?;

    info!(admin_id = %admin.id, user_id = %target.id, "Deleted user and dependent rows");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_pending(
        code: Option<&str>,
        pending: Option<&str>,
        expires_at: Option<NaiveDateTime>,
    ) -> User {
        let now = Utc::now().naive_utc();
        User {
            id: Uuid::new_v4(),
            name: None,
            email: Some("old@example.com".to_string()),
            image: None,
            system_role: None,
            custom_role_id: None,
            department: None,
            company_id: None,
            pending_email: pending.map(str::to_string),
            verification_code: code.map(str::to_string),
            verification_code_expires_at: expires_at,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn verification_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn verification_succeeds_with_matching_unexpired_code() {
        let now = Utc::now().naive_utc();
        let user = user_with_pending(
            Some("123456"),
            Some("new@example.com"),
            Some(now + Duration::minutes(5)),
        );
        assert!(check_verification_attempt(&user, "123456", now).is_ok());
    }

    #[test]
    fn verification_fails_without_pending_change() {
        let now = Utc::now().naive_utc();
        let user = user_with_pending(None, None, None);
        let err = check_verification_attempt(&user, "123456", now).unwrap_err();
        assert_eq!(err.1.code, "NO_PENDING_EMAIL");
    }

    #[test]
    fn verification_fails_when_code_expired() {
        let now = Utc::now().naive_utc();
        let user = user_with_pending(
            Some("123456"),
            Some("new@example.com"),
            Some(now - Duration::minutes(1)),
        );
        let err = check_verification_attempt(&user, "123456", now).unwrap_err();
        assert_eq!(err.1.code, "CODE_EXPIRED");
        assert_eq!(err.0, StatusCode::GONE);
    }

    #[test]
    fn verification_fails_on_code_mismatch() {
        let now = Utc::now().naive_utc();
        let user = user_with_pending(
            Some("123456"),
            Some("new@example.com"),
            Some(now + Duration::minutes(5)),
        );
        let err = check_verification_attempt(&user, "654321", now).unwrap_err();
        assert_eq!(err.1.code, "INVALID_CODE");
    }

    #[test]
    fn expiry_is_checked_before_code_match() {
        // An attacker should not learn whether a stale code was correct.
        let now = Utc::now().naive_utc();
        let user = user_with_pending(
            Some("123456"),
            Some("new@example.com"),
            Some(now - Duration::minutes(1)),
        );
        let err = check_verification_attempt(&user, "654321", now).unwrap_err();
        assert_eq!(err.1.code, "CODE_EXPIRED");
    }
}
