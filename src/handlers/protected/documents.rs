// handlers/protected/documents.rs - /api/documents metadata and content

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::document_service::{CreateDocument, DocumentListQuery, UpdateDocument};
use crate::services::DocumentService;
use crate::storage::SharedStore;

pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<DocumentListQuery>, QueryRejection>,
) -> ApiResult<Vec<Document>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(DocumentService::new(pool).list(&user, query).await?))
}

pub async fn get(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Document> {
    let Path(id) = id?;
    Ok(ApiResponse::success(DocumentService::new(pool).get(&user, id).await?))
}

pub async fn create(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateDocument>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(DocumentService::new(pool).create(&user, input).await?))
}

pub async fn update(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateDocument>, JsonRejection>,
) -> ApiResult<Document> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(ApiResponse::success(DocumentService::new(pool).update(&user, id, patch).await?))
}

pub async fn delete(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    Ok(ApiResponse::success(DocumentService::new(pool).delete(&user, id).await?))
}

/// PUT /api/documents/:id/content - raw body upload
pub async fn upload_content(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Extension(store): Extension<SharedStore>,
    id: Result<Path<Uuid>, PathRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Document> {
    let Path(id) = id?;
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let document = DocumentService::new(pool)
        .upload_content(&user, id, &body, mime_type, store.as_ref())
        .await?;
    Ok(ApiResponse::success(document))
}

/// GET /api/documents/:id/content - download as an attachment
pub async fn download_content(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Extension(store): Extension<SharedStore>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let content = DocumentService::new(pool).download_content(&user, id, store.as_ref()).await?;

    let headers = [
        (header::CONTENT_TYPE, content.mime_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", content.file_name()),
        ),
    ];
    Ok((headers, content.bytes).into_response())
}
