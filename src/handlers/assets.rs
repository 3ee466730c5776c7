//! Digital asset handlers.
//!
//! Uploads are two-phase: the client asks for an upload URL, pushes the bytes
//! to storage directly, then registers the returned reference as an asset row.

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
    models::{Asset, NewAsset},
    schema::assets,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssetRequest {
    #[schema(example = "Q3 brand deck")]
    pub title: String,
    pub storage_ref: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub storage_ref: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetEntry {
    #[serde(flatten)]
    pub asset: Asset,
    /// Resolved download URL, absent when the blob is gone from storage.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetResponse {
    pub asset: Asset,
}

#[utoipa::path(
    post,
    path = "/assets/upload-url",
    tag = "Assets",
    responses(
        (status = 200, description = "Short-lived upload URL", body = UploadUrlResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_upload_url(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<UploadUrlResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    authz::require_company(&user)?;

    let ticket = state.blobs.generate_upload_url();

    Ok(Json(UploadUrlResponse {
        upload_url: ticket.upload_url,
        storage_ref: ticket.storage_ref,
    }))
}

#[utoipa::path(
    post,
    path = "/assets",
    tag = "Assets",
    request_body = CreateAssetRequest,
    responses(
        (status = 200, description = "Asset registered", body = AssetResponse),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_asset(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateAssetRequest>,
) -> ApiResult<Json<AssetResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let asset: Asset = diesel::insert_into(assets::table)
        .values(&NewAsset {
            company_id,
            uploader_id: user.id,
            title: payload.title,
            storage_ref: payload.storage_ref,
            content_type: payload.content_type,
            size_bytes: payload.size_bytes,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(
        asset_id = %asset.id,
        company_id = %company_id,
        size_bytes = asset.size_bytes,
        "Registered asset"
    );

    Ok(Json(AssetResponse { asset }))
}

#[utoipa::path(
    get,
    path = "/assets",
    tag = "Assets",
    responses(
        (status = 200, description = "Assets in the company, newest first", body = Vec<AssetEntry>),
        (status = 403, description = "Not part of a company", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<AssetEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let rows: Vec<Asset> = assets::table
        .filter(assets::company_id.eq(company_id))
        .order(assets::created_at.desc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let entries = rows
        .into_iter()
        .map(|asset| AssetEntry {
            url: state.blobs.get_url(&asset.storage_ref),
            asset,
        })
        .collect();

    Ok(Json(entries))
}

#[utoipa::path(
    delete,
    path = "/assets/{asset_id}",
    tag = "Assets",
    params(("asset_id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset and its blob deleted"),
        (status = 404, description = "Asset not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(asset_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let user = authz::load_caller(&mut conn, &caller)?;
    let company_id = authz::require_company(&user)?;

    let asset: Asset = assets::table
        .find(asset_id)
        .filter(assets::company_id.eq(company_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Asset not found", "ASSET_NOT_FOUND"))?;

    // Blob first; an orphaned row is recoverable, an orphaned blob is not.
    state.blobs.delete(&asset.storage_ref);

    diesel::delete(assets::table.find(asset_id))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(asset_id = %asset_id, deleted_by = %user.id, "Deleted asset");

    Ok(StatusCode::NO_CONTENT)
}
