//! Database row types and the closed enums shared across handlers.

use std::io::Write;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::{Jsonb, Text};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// System-wide role a user holds within their company.
///
/// `admin` is never grantable through the role-request workflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    Admin,
    Employee,
    Client,
}

impl SystemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Admin => "admin",
            SystemRole::Employee => "employee",
            SystemRole::Client => "client",
        }
    }
}

impl ToSql<Text, Pg> for SystemRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for SystemRole {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "admin" => Ok(SystemRole::Admin),
            "employee" => Ok(SystemRole::Employee),
            "client" => Ok(SystemRole::Client),
            other => Err(format!("unknown system role: {other}").into()),
        }
    }
}

/// Role scoped to a single workspace, independent of the system role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceRole {
    Member,
    Admin,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Member => "member",
            WorkspaceRole::Admin => "admin",
        }
    }
}

impl ToSql<Text, Pg> for WorkspaceRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for WorkspaceRole {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "member" => Ok(WorkspaceRole::Member),
            "admin" => Ok(WorkspaceRole::Admin),
            other => Err(format!("unknown workspace role: {other}").into()),
        }
    }
}

/// Status shared by company requests, workspace requests and role requests.
/// `invited` only occurs on company requests (admin-initiated invitations).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Invited,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Invited => "invited",
        }
    }

    pub fn resolved(approved: bool) -> Self {
        if approved {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        }
    }
}

impl ToSql<Text, Pg> for RequestStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for RequestStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "invited" => Ok(RequestStatus::Invited),
            other => Err(format!("unknown request status: {other}").into()),
        }
    }
}

/// Ticket lifecycle state. Transitions go open -> pending_closure -> closed,
/// plus reopen back to open from any state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    PendingClosure,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::PendingClosure => "pending_closure",
            TicketStatus::Closed => "closed",
        }
    }
}

impl ToSql<Text, Pg> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TicketStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "open" => Ok(TicketStatus::Open),
            "pending_closure" => Ok(TicketStatus::PendingClosure),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("unknown ticket status: {other}").into()),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        TicketPriority::Medium
    }
}

impl ToSql<Text, Pg> for TicketPriority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TicketPriority {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "critical" => Ok(TicketPriority::Critical),
            other => Err(format!("unknown ticket priority: {other}").into()),
        }
    }
}

/// Kind of an immutable ticket timeline entry. `comment` and `commit` come
/// from users; the rest are written by lifecycle transitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEntryType {
    Comment,
    Commit,
    StatusChange,
    Assignment,
    Forward,
}

impl TimelineEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEntryType::Comment => "comment",
            TimelineEntryType::Commit => "commit",
            TimelineEntryType::StatusChange => "status_change",
            TimelineEntryType::Assignment => "assignment",
            TimelineEntryType::Forward => "forward",
        }
    }
}

impl ToSql<Text, Pg> for TimelineEntryType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TimelineEntryType {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "comment" => Ok(TimelineEntryType::Comment),
            "commit" => Ok(TimelineEntryType::Commit),
            "status_change" => Ok(TimelineEntryType::StatusChange),
            "assignment" => Ok(TimelineEntryType::Assignment),
            "forward" => Ok(TimelineEntryType::Forward),
            other => Err(format!("unknown timeline entry type: {other}").into()),
        }
    }
}

/// Kanban task stage. Advanced only through the explicit transition endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
pub enum TaskStatus {
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "review")]
    Review,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl ToSql<Text, Pg> for TaskStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TaskStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match std::str::from_utf8(value.as_bytes())? {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}").into()),
        }
    }
}

fn default_flag() -> bool {
    true
}

/// Per-workspace feature toggles, stored as Jsonb. Keys missing from the
/// stored document default to enabled, so a workspace starts fully featured
/// unless explicitly restricted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Jsonb)]
pub struct WorkspaceFeatures {
    #[serde(default = "default_flag")]
    pub chat: bool,
    #[serde(default = "default_flag")]
    pub files: bool,
    #[serde(default = "default_flag")]
    pub kanban: bool,
    #[serde(default = "default_flag")]
    pub crm: bool,
    #[serde(default = "default_flag")]
    pub analytics: bool,
    #[serde(default = "default_flag")]
    pub announcements: bool,
    #[serde(default = "default_flag")]
    pub support: bool,
}

impl Default for WorkspaceFeatures {
    fn default() -> Self {
        Self {
            chat: true,
            files: true,
            kanban: true,
            crm: true,
            analytics: true,
            announcements: true,
            support: true,
        }
    }
}

impl ToSql<Jsonb, Pg> for WorkspaceFeatures {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let value = serde_json::to_value(self)?;
        <serde_json::Value as ToSql<Jsonb, Pg>>::to_sql(&value, &mut out.reborrow())
    }
}

impl FromSql<Jsonb, Pg> for WorkspaceFeatures {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <serde_json::Value as FromSql<Jsonb, Pg>>::from_sql(value)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub system_role: Option<SystemRole>,
    pub custom_role_id: Option<Uuid>,
    pub department: Option<String>,
    pub company_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub pending_email: Option<String>,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub verification_code_expires_at: Option<NaiveDateTime>,
    pub email_verified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn is_company_admin(&self) -> bool {
        self.company_id.is_some() && self.system_role == Some(SystemRole::Admin)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::companies)]
pub struct Company {
    pub id: Uuid,
    #[schema(example = "Acme")]
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::companies)]
pub struct NewCompany {
    pub name: String,
    pub owner_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::roles)]
pub struct Role {
    pub id: Uuid,
    pub company_id: Uuid,
    #[schema(example = "Designer")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::roles)]
pub struct NewRole {
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::workspaces)]
pub struct Workspace {
    pub id: Uuid,
    pub company_id: Uuid,
    #[schema(example = "Growth")]
    pub name: String,
    #[schema(example = "growth")]
    pub kind: String,
    pub features: WorkspaceFeatures,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::workspaces)]
pub struct NewWorkspace {
    pub company_id: Uuid,
    pub name: String,
    pub kind: String,
    pub features: WorkspaceFeatures,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::workspace_access)]
pub struct WorkspaceAccess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub role: WorkspaceRole,
    pub company_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::workspace_access)]
pub struct NewWorkspaceAccess {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub role: WorkspaceRole,
    pub company_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::workspace_requests)]
pub struct WorkspaceRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub status: RequestStatus,
    pub company_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::workspace_requests)]
pub struct NewWorkspaceRequest {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub status: RequestStatus,
    pub company_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::company_requests)]
pub struct CompanyRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::company_requests)]
pub struct NewCompanyRequest {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub status: RequestStatus,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::role_requests)]
pub struct RoleRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub requested_role: Option<SystemRole>,
    pub custom_role_id: Option<Uuid>,
    pub status: RequestStatus,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::role_requests)]
pub struct NewRoleRequest {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub requested_role: Option<SystemRole>,
    pub custom_role_id: Option<Uuid>,
    pub status: RequestStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub company_id: Uuid,
    #[schema(example = "Login page broken on mobile")]
    pub subject: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub priority: TicketPriority,
    pub sentiment_score: Option<i32>,
    pub status: TicketStatus,
    pub assigned_workspace_id: Option<Uuid>,
    pub closing_statement: Option<String>,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<NaiveDateTime>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::tickets)]
pub struct NewTicket {
    pub company_id: Uuid,
    pub subject: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub priority: TicketPriority,
    pub sentiment_score: Option<i32>,
    pub status: TicketStatus,
    pub assigned_workspace_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::ticket_timeline)]
pub struct TimelineEntry {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub entry_type: TimelineEntryType,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::ticket_timeline)]
pub struct NewTimelineEntry {
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub entry_type: TimelineEntryType,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::tasks)]
pub struct Task {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub velocity_forecast: f64,
    pub is_locked: bool,
    pub assignee_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::tasks)]
pub struct NewTask {
    pub company_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub velocity_forecast: f64,
    pub is_locked: bool,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::leads)]
pub struct Lead {
    pub id: Uuid,
    pub company_id: Uuid,
    pub client_name: String,
    pub value: f64,
    pub stage: String,
    pub win_probability: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::leads)]
pub struct NewLead {
    pub company_id: Uuid,
    pub client_name: String,
    pub value: f64,
    pub stage: String,
    pub win_probability: f64,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::messages)]
pub struct Message {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    pub channel: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    pub channel: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::announcements)]
pub struct Announcement {
    pub id: Uuid,
    pub company_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    #[schema(example = "high")]
    pub priority: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::announcements)]
pub struct NewAnnouncement {
    pub company_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub priority: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::assets)]
pub struct Asset {
    pub id: Uuid,
    pub company_id: Uuid,
    pub uploader_id: Uuid,
    pub title: String,
    pub storage_ref: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::assets)]
pub struct NewAsset {
    pub company_id: Uuid,
    pub uploader_id: Uuid,
    pub title: String,
    pub storage_ref: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_features_default_to_enabled() {
        let features = WorkspaceFeatures::default();
        assert!(features.chat && features.files && features.kanban);
        assert!(features.crm && features.analytics);
        assert!(features.announcements && features.support);
    }

    #[test]
    fn workspace_features_missing_keys_default_to_true() {
        // Documents stored before a flag existed must read as enabled.
        let features: WorkspaceFeatures =
            serde_json::from_value(serde_json::json!({ "chat": false })).unwrap();
        assert!(!features.chat);
        assert!(features.files);
        assert!(features.support);
    }

    #[test]
    fn request_status_resolution() {
        assert_eq!(RequestStatus::resolved(true), RequestStatus::Approved);
        assert_eq!(RequestStatus::resolved(false), RequestStatus::Rejected);
    }

    #[test]
    fn task_status_uses_dashed_wire_name() {
        let status: TaskStatus = serde_json::from_value(serde_json::json!("in-progress")).unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(status.as_str(), "in-progress");
    }

    #[test]
    fn ticket_priority_defaults_to_medium() {
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
    }

    #[test]
    fn company_admin_requires_both_company_and_role() {
        let now = chrono::Utc::now().naive_utc();
        let mut user = User {
            id: Uuid::new_v4(),
            name: None,
            email: None,
            image: None,
            system_role: Some(SystemRole::Admin),
            custom_role_id: None,
            department: None,
            company_id: None,
            pending_email: None,
            verification_code: None,
            verification_code_expires_at: None,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        };
        // Admin role without a company does not confer tenant-admin powers.
        assert!(!user.is_company_admin());

        user.company_id = Some(Uuid::new_v4());
        assert!(user.is_company_admin());

        user.system_role = Some(SystemRole::Employee);
        assert!(!user.is_company_admin());
    }
}
