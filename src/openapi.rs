//! OpenAPI documentation configuration.
//!
//! Generates the OpenAPI specification with `utoipa` and serves it through
//! Swagger UI at `/swagger-ui`.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bridge API",
        version = "1.0.0",
        description = "Multi-tenant internal operations backend.\n\n\
        ## Features\n\
        - Company tenancy with owner, admin and employee tiers\n\
        - Custom roles and a role-request workflow\n\
        - Workspaces with per-feature toggles and access control\n\
        - Support tickets with a full closure lifecycle and timeline\n\
        - Kanban tasks, CRM leads, channel chat, announcements and assets\n\n\
        ## Authentication\n\
        All endpoints except health and the secret-gated reset require a\n\
        bearer token issued by the identity provider:\n\
        `Authorization: Bearer <token>`",
        contact(
            name = "Bridge API Support"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Users", description = "Profile, directory and email verification"),
        (name = "Companies", description = "Company tenancy, join requests and invitations"),
        (name = "Roles", description = "Custom roles and the role-request workflow"),
        (name = "Workspaces", description = "Workspaces, features and access control"),
        (name = "Tickets", description = "Support ticket lifecycle and timeline"),
        (name = "Tasks", description = "Kanban board tasks"),
        (name = "Leads", description = "CRM lead pipeline"),
        (name = "Chat", description = "Channel messaging"),
        (name = "Announcements", description = "Company announcement feed"),
        (name = "Assets", description = "Digital asset registry"),
        (name = "Admin", description = "Destructive maintenance endpoints")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,

        crate::handlers::users::current_user,
        crate::handlers::users::sync_profile,
        crate::handlers::users::update_self,
        crate::handlers::users::verify_email_change,
        crate::handlers::users::resend_verification_code,
        crate::handlers::users::list_users,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,

        crate::handlers::companies::create_company,
        crate::handlers::companies::list_companies,
        crate::handlers::companies::get_my_company,
        crate::handlers::companies::update_company,
        crate::handlers::companies::join_company,
        crate::handlers::companies::get_my_request,
        crate::handlers::companies::list_join_requests,
        crate::handlers::companies::resolve_join_request,
        crate::handlers::companies::invite_member,
        crate::handlers::companies::list_my_invitations,
        crate::handlers::companies::accept_invitation,
        crate::handlers::companies::decline_invitation,
        crate::handlers::companies::transfer_ownership,
        crate::handlers::companies::delete_company,
        crate::handlers::companies::leave_company,

        crate::handlers::roles::list_roles,
        crate::handlers::roles::create_role,
        crate::handlers::roles::update_role,
        crate::handlers::roles::delete_role,
        crate::handlers::roles::request_role,
        crate::handlers::roles::list_role_requests,
        crate::handlers::roles::resolve_role_request,

        crate::handlers::workspaces::create_workspace,
        crate::handlers::workspaces::list_workspaces,
        crate::handlers::workspaces::get_workspace,
        crate::handlers::workspaces::delete_workspace,
        crate::handlers::workspaces::update_features,
        crate::handlers::workspaces::request_access,
        crate::handlers::workspaces::list_my_access,
        crate::handlers::workspaces::list_my_requests,
        crate::handlers::workspaces::workspace_statuses,
        crate::handlers::workspaces::list_access_requests,
        crate::handlers::workspaces::resolve_access_request,
        crate::handlers::workspaces::grant_access,
        crate::handlers::workspaces::revoke_access,
        crate::handlers::workspaces::get_user_access,
        crate::handlers::workspaces::my_workspace_role,
        crate::handlers::workspaces::update_member_role,
        crate::handlers::workspaces::list_members,

        crate::handlers::tickets::list_tickets,
        crate::handlers::tickets::create_ticket,
        crate::handlers::tickets::update_ticket,
        crate::handlers::tickets::resolve_ticket,
        crate::handlers::tickets::initiate_close,
        crate::handlers::tickets::reopen_ticket,
        crate::handlers::tickets::finalize_close,
        crate::handlers::tickets::forward_ticket,
        crate::handlers::tickets::get_timeline,
        crate::handlers::tickets::add_timeline_entry,
        crate::handlers::tickets::delete_ticket,

        crate::handlers::tasks::list_tasks,
        crate::handlers::tasks::create_task,
        crate::handlers::tasks::update_task,
        crate::handlers::tasks::update_task_status,
        crate::handlers::tasks::delete_task,

        crate::handlers::leads::list_leads,
        crate::handlers::leads::create_lead,
        crate::handlers::leads::update_lead,
        crate::handlers::leads::delete_lead,

        crate::handlers::chat::list_messages,
        crate::handlers::chat::send_message,
        crate::handlers::chat::delete_message,

        crate::handlers::announcements::list_announcements,
        crate::handlers::announcements::create_announcement,

        crate::handlers::assets::create_upload_url,
        crate::handlers::assets::create_asset,
        crate::handlers::assets::list_assets,
        crate::handlers::assets::delete_asset,

        crate::handlers::admin::clear_data,
        crate::handlers::admin::reset_data,
    ),
    components(
        schemas(
            ApiError,
            PaginationMeta,

            crate::models::SystemRole,
            crate::models::WorkspaceRole,
            crate::models::RequestStatus,
            crate::models::TicketStatus,
            crate::models::TicketPriority,
            crate::models::TimelineEntryType,
            crate::models::TaskStatus,
            crate::models::WorkspaceFeatures,

            crate::models::User,
            crate::handlers::users::UserResponse,
            crate::handlers::users::DirectoryEntry,
            crate::handlers::users::UsersListResponse,
            crate::handlers::users::UpdateSelfRequest,
            crate::handlers::users::UpdateSelfResponse,
            crate::handlers::users::VerifyEmailRequest,
            crate::handlers::users::UpdateUserRequest,

            crate::models::Company,
            crate::models::CompanyRequest,
            crate::handlers::companies::CreateCompanyRequest,
            crate::handlers::companies::UpdateCompanyRequest,
            crate::handlers::companies::InviteMemberRequest,
            crate::handlers::companies::TransferOwnershipRequest,
            crate::handlers::companies::ResolveRequestBody,
            crate::handlers::companies::CompanyResponse,
            crate::handlers::companies::CompanyDirectoryEntry,
            crate::handlers::companies::CompaniesListResponse,
            crate::handlers::companies::JoinRequestEntry,
            crate::handlers::companies::InvitationEntry,

            crate::models::Role,
            crate::models::RoleRequest,
            crate::handlers::roles::CreateRoleRequest,
            crate::handlers::roles::UpdateRoleRequest,
            crate::handlers::roles::RequestRoleBody,
            crate::handlers::roles::ResolveRoleRequestBody,
            crate::handlers::roles::RoleResponse,
            crate::handlers::roles::RoleRequestEntry,

            crate::models::Workspace,
            crate::models::WorkspaceAccess,
            crate::models::WorkspaceRequest,
            crate::handlers::workspaces::CreateWorkspaceRequest,
            crate::handlers::workspaces::UpdateFeaturesRequest,
            crate::handlers::workspaces::GrantAccessRequest,
            crate::handlers::workspaces::UpdateMemberRoleRequest,
            crate::handlers::workspaces::ResolveAccessRequestBody,
            crate::handlers::workspaces::WorkspaceResponse,
            crate::handlers::workspaces::WorkspaceStatusEntry,
            crate::handlers::workspaces::AccessRequestEntry,
            crate::handlers::workspaces::WorkspaceMember,
            crate::handlers::workspaces::MyRoleResponse,

            crate::models::Ticket,
            crate::models::TimelineEntry,
            crate::handlers::tickets::CreateTicketRequest,
            crate::handlers::tickets::UpdateTicketRequest,
            crate::handlers::tickets::ResolveTicketRequest,
            crate::handlers::tickets::InitiateCloseRequest,
            crate::handlers::tickets::ForwardTicketRequest,
            crate::handlers::tickets::AddTimelineEntryRequest,
            crate::handlers::tickets::TicketResponse,
            crate::handlers::tickets::TicketListEntry,
            crate::handlers::tickets::TicketsListResponse,
            crate::handlers::tickets::TimelineEntryView,

            crate::models::Task,
            crate::handlers::tasks::CreateTaskRequest,
            crate::handlers::tasks::UpdateTaskRequest,
            crate::handlers::tasks::UpdateTaskStatusRequest,
            crate::handlers::tasks::TaskResponse,

            crate::models::Lead,
            crate::handlers::leads::CreateLeadRequest,
            crate::handlers::leads::UpdateLeadRequest,
            crate::handlers::leads::LeadResponse,

            crate::models::Message,
            crate::handlers::chat::SendMessageRequest,
            crate::handlers::chat::MessageEntry,
            crate::handlers::chat::MessageResponse,

            crate::models::Announcement,
            crate::handlers::announcements::CreateAnnouncementRequest,
            crate::handlers::announcements::AnnouncementEntry,
            crate::handlers::announcements::AnnouncementResponse,

            crate::models::Asset,
            crate::handlers::assets::CreateAssetRequest,
            crate::handlers::assets::UploadUrlResponse,
            crate::handlers::assets::AssetEntry,
            crate::handlers::assets::AssetResponse,

            crate::handlers::admin::ResetDataRequest,
            crate::handlers::admin::DataResetSummary,

            crate::handlers::health::HealthResponse,
            crate::handlers::health::ReadinessResponse,
            crate::handlers::health::ReadinessChecks,
            crate::handlers::health::ComponentStatus,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Bearer token issued by the identity provider.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates_with_expected_metadata() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Bridge API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn spec_documents_the_ticket_lifecycle() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/tickets"));
        assert!(paths.contains_key("/tickets/{ticket_id}/reopen"));
        assert!(paths.contains_key("/tickets/{ticket_id}/close"));
    }
}
