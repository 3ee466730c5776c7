//! CRM lead pipeline handlers.

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
    models::{Lead, NewLead},
    schema::leads,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLeadRequest {
    #[schema(example = "Acme Corp")]
    pub client_name: String,
    pub value: f64,
    #[schema(example = "qualified")]
    pub stage: String,
    pub win_probability: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLeadRequest {
    pub client_name: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub win_probability: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeadResponse {
    pub lead: Lead,
}

#[utoipa::path(
    get,
    path = "/leads",
    tag = "Leads",
    responses(
        (status = 200, description = "Leads in the company, newest first", body = Vec<Lead>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_leads(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Lead>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let list: Vec<Lead> = leads::table
        .filter(leads::company_id.eq(company_id))
        .order(leads::created_at.desc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(list))
}

#[utoipa::path(
    post,
    path = "/leads",
    tag = "Leads",
    request_body = CreateLeadRequest,
    responses(
        (status = 200, description = "Lead created", body = LeadResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_lead(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateLeadRequest>,
) -> ApiResult<Json<LeadResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let lead: Lead = diesel::insert_into(leads::table)
        .values(&NewLead {
            company_id,
            client_name: payload.client_name,
            value: payload.value,
            stage: payload.stage,
            win_probability: payload.win_probability,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(lead_id = %lead.id, company_id = %company_id, "Created lead");

    Ok(Json(LeadResponse { lead }))
}

#[utoipa::path(
    patch,
    path = "/leads/{lead_id}",
    tag = "Leads",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    request_body = UpdateLeadRequest,
    responses(
        (status = 200, description = "Lead updated", body = LeadResponse),
        (status = 404, description = "Lead not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_lead(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<UpdateLeadRequest>,
) -> ApiResult<Json<LeadResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let _existing: Lead = leads::table
        .find(lead_id)
        .filter(leads::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Lead not found", "LEAD_NOT_FOUND"))?;

    if payload.client_name.is_none()
        && payload.value.is_none()
        && payload.stage.is_none()
        && payload.win_probability.is_none()
    {
        return Err(ApiError::bad_request(
            "At least one field must be provided",
            "NO_FIELDS_TO_UPDATE",
        ));
    }

    let lead: Lead = diesel::update(leads::table.find(lead_id))
        .set((
            payload.client_name.map(|c| leads::client_name.eq(c)),
            payload.value.map(|v| leads::value.eq(v)),
            payload.stage.map(|s| leads::stage.eq(s)),
            payload
                .win_probability
                .map(|w| leads::win_probability.eq(w)),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(LeadResponse { lead }))
}

#[utoipa::path(
    delete,
    path = "/leads/{lead_id}",
    tag = "Leads",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 404, description = "Lead not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_lead(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let deleted = diesel::delete(
        leads::table
            .find(lead_id)
            .filter(leads::company_id.eq(company_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    if deleted == 0 {
        return Err(ApiError::not_found("Lead not found", "LEAD_NOT_FOUND"));
    }

    Ok(StatusCode::NO_CONTENT)
}
