//! Kanban task handlers. The generic update endpoint never moves a task
//! between columns; that goes through the status transition endpoint.

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
    models::{NewTask, Task, TaskStatus},
    schema::tasks,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    #[schema(example = "Ship onboarding flow")]
    pub title: String,
    pub status: TaskStatus,
    pub velocity_forecast: f64,
    pub is_locked: bool,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub velocity_forecast: Option<f64>,
    pub is_locked: Option<bool>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub task: Task,
}

fn load_company_task(conn: &mut PgConnection, task_id: Uuid, company_id: Uuid) -> ApiResult<Task> {
    tasks::table
        .find(task_id)
        .filter(tasks::company_id.eq(company_id))
        .first(conn)
        .map_err(|_| ApiError::not_found("Task not found", "TASK_NOT_FOUND"))
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    responses(
        (status = 200, description = "Tasks in the company, newest first", body = Vec<Task>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Task>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let list: Vec<Task> = tasks::table
        .filter(tasks::company_id.eq(company_id))
        .order(tasks::created_at.desc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(list))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, description = "Task created", body = TaskResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let task: Task = diesel::insert_into(tasks::table)
        .values(&NewTask {
            company_id,
            title: payload.title,
            status: payload.status,
            velocity_forecast: payload.velocity_forecast,
            is_locked: payload.is_locked,
            assignee_id: payload.assignee_id,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(task_id = %task.id, company_id = %company_id, "Created task");

    Ok(Json(TaskResponse { task }))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task fields updated; status is never touched here", body = TaskResponse),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_task(&mut conn, task_id, company_id)?;

    if payload.title.is_none()
        && payload.velocity_forecast.is_none()
        && payload.is_locked.is_none()
        && payload.assignee_id.is_none()
    {
        return Err(ApiError::bad_request(
            "At least one field must be provided",
            "NO_FIELDS_TO_UPDATE",
        ));
    }

    let task: Task = diesel::update(tasks::table.find(task_id))
        .set((
            payload.title.map(|t| tasks::title.eq(t)),
            payload
                .velocity_forecast
                .map(|v| tasks::velocity_forecast.eq(v)),
            payload.is_locked.map(|l| tasks::is_locked.eq(l)),
            payload.assignee_id.map(|a| tasks::assignee_id.eq(a)),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(TaskResponse { task }))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}/status",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Task moved to another column", body = TaskResponse),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    load_company_task(&mut conn, task_id, company_id)?;

    let task: Task = diesel::update(tasks::table.find(task_id))
        .set(tasks::status.eq(payload.status))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(task_id = %task_id, status = payload.status.as_str(), "Moved task");

    Ok(Json(TaskResponse { task }))
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let deleted = diesel::delete(
        tasks::table
            .find(task_id)
            .filter(tasks::company_id.eq(company_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    if deleted == 0 {
        return Err(ApiError::not_found("Task not found", "TASK_NOT_FOUND"));
    }

    Ok(StatusCode::NO_CONTENT)
}
