//! Shared authorization predicates.
//!
//! Every mutation resolves the caller's user row first, then checks one of a
//! small set of permission tiers. Keeping the checks here, typed against
//! [`SystemRole`] and [`WorkspaceRole`], stops individual handlers from
//! growing their own subtly different string comparisons.
//!
//! Tiers, weakest to strongest:
//! - company member: has a `company_id`
//! - workspace manager: company admin, or holds the `admin` workspace role
//! - company admin: system role `admin` within a company
//! - owner: `companies.owner_id` matches the caller

use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    identity::Caller,
    models::{Company, SystemRole, User, WorkspaceRole},
    schema::{companies, users, workspace_access},
};

/// Loads the caller's user record. A verified token whose subject has no user
/// row is treated the same as no token at all.
pub fn load_caller(conn: &mut PgConnection, caller: &Caller) -> ApiResult<User> {
    users::table
        .find(caller.user_id)
        .first::<User>(conn)
        .optional()
        .map_err(|_| ApiError::db_error())?
        .ok_or_else(ApiError::unauthenticated)
}

/// The caller must belong to a company; returns its id.
pub fn require_company(user: &User) -> ApiResult<Uuid> {
    user.company_id
        .ok_or_else(|| ApiError::forbidden("You are not part of a company", "NO_COMPANY"))
}

/// The caller must be a company admin; returns the company id.
pub fn require_company_admin(user: &User) -> ApiResult<Uuid> {
    let company_id = require_company(user)?;
    if user.system_role != Some(SystemRole::Admin) {
        return Err(ApiError::forbidden(
            "Administrator role required",
            "NOT_ADMIN",
        ));
    }
    Ok(company_id)
}

/// The caller must own their company; returns the company row.
pub fn require_owner(conn: &mut PgConnection, user: &User) -> ApiResult<Company> {
    let company_id = require_company(user)?;
    let company: Company = companies::table
        .find(company_id)
        .first(conn)
        .map_err(|_| ApiError::not_found("Company not found", "COMPANY_NOT_FOUND"))?;

    if company.owner_id != user.id {
        return Err(ApiError::forbidden(
            "Only the company owner may do this",
            "NOT_OWNER",
        ));
    }
    Ok(company)
}

/// Explicit workspace role from the access table, if any. Company admins have
/// implicit access that is not represented by a row; callers that need the
/// two-tier check should use [`require_workspace_manager`] or
/// [`effective_workspace_role`].
pub fn workspace_role(
    conn: &mut PgConnection,
    user_id: Uuid,
    workspace_id: Uuid,
) -> ApiResult<Option<WorkspaceRole>> {
    workspace_access::table
        .filter(workspace_access::user_id.eq(user_id))
        .filter(workspace_access::workspace_id.eq(workspace_id))
        .select(workspace_access::role)
        .first::<WorkspaceRole>(conn)
        .optional()
        .map_err(|_| ApiError::db_error())
}

/// The role a user effectively holds in a workspace: company admins are
/// always workspace admins, explicit grants otherwise.
pub fn effective_workspace_role(
    conn: &mut PgConnection,
    user: &User,
    workspace_id: Uuid,
) -> ApiResult<Option<WorkspaceRole>> {
    if user.is_company_admin() {
        return Ok(Some(WorkspaceRole::Admin));
    }
    workspace_role(conn, user.id, workspace_id)
}

/// Two-tier check used by workspace-member management: company admin OR
/// workspace admin. Looked up dynamically on every call, never cached.
pub fn require_workspace_manager(
    conn: &mut PgConnection,
    user: &User,
    workspace_id: Uuid,
) -> ApiResult<()> {
    match effective_workspace_role(conn, user, workspace_id)? {
        Some(WorkspaceRole::Admin) => Ok(()),
        _ => Err(ApiError::forbidden(
            "Insufficient permissions for this workspace",
            "NOT_WORKSPACE_ADMIN",
        )),
    }
}

/// Whether an explicit access row exists, regardless of role.
pub fn has_explicit_access(
    conn: &mut PgConnection,
    user_id: Uuid,
    workspace_id: Uuid,
) -> ApiResult<bool> {
    Ok(workspace_role(conn, user_id, workspace_id)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn user(company_id: Option<Uuid>, role: Option<SystemRole>) -> User {
        let now = chrono::Utc::now().naive_utc();
        User {
            id: Uuid::new_v4(),
            name: None,
            email: None,
            image: None,
            system_role: role,
            custom_role_id: None,
            department: None,
            company_id,
            pending_email: None,
            verification_code: None,
            verification_code_expires_at: None,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn require_company_rejects_unaffiliated_users() {
        let err = require_company(&user(None, Some(SystemRole::Admin))).unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);
        assert_eq!(err.1.code, "NO_COMPANY");
    }

    #[test]
    fn require_company_admin_rejects_employees() {
        let company = Uuid::new_v4();
        let err = require_company_admin(&user(Some(company), Some(SystemRole::Employee)))
            .unwrap_err();
        assert_eq!(err.1.code, "NOT_ADMIN");

        let err = require_company_admin(&user(Some(company), None)).unwrap_err();
        assert_eq!(err.1.code, "NOT_ADMIN");
    }

    #[test]
    fn require_company_admin_accepts_admins() {
        let company = Uuid::new_v4();
        let id = require_company_admin(&user(Some(company), Some(SystemRole::Admin))).unwrap();
        assert_eq!(id, company);
    }

    #[test]
    fn admin_without_company_is_rejected_before_role_check() {
        let err = require_company_admin(&user(None, Some(SystemRole::Admin))).unwrap_err();
        assert_eq!(err.1.code, "NO_COMPANY");
    }
}
