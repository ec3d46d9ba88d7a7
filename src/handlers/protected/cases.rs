// handlers/protected/cases.rs - /api/cases and its sub-resources

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{Case, Document, Hearing};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::case_service::{CaseListQuery, ChangeCaseStatus, CreateCase, UpdateCase};
use crate::services::CaseService;

pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<CaseListQuery>, QueryRejection>,
) -> ApiResult<Vec<Case>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(CaseService::new(pool).list(&user, query).await?))
}

pub async fn get(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Case> {
    let Path(id) = id?;
    Ok(ApiResponse::success(CaseService::new(pool).get(&user, id).await?))
}

pub async fn create(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateCase>, JsonRejection>,
) -> ApiResult<Case> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(CaseService::new(pool).create(&user, input).await?))
}

pub async fn update(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateCase>, JsonRejection>,
) -> ApiResult<Case> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(ApiResponse::success(CaseService::new(pool).update(&user, id, patch).await?))
}

pub async fn delete(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    Ok(ApiResponse::success(CaseService::new(pool).delete(&user, id).await?))
}

/// PUT /api/cases/:id/status
pub async fn change_status(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ChangeCaseStatus>, JsonRejection>,
) -> ApiResult<Case> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(ApiResponse::success(
        CaseService::new(pool).change_status(&user, id, request.status).await?,
    ))
}

/// GET /api/cases/:id/hearings
pub async fn hearings(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<Hearing>> {
    let Path(id) = id?;
    Ok(ApiResponse::success(CaseService::new(pool).hearings(&user, id).await?))
}

/// GET /api/cases/:id/documents
pub async fn documents(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<Document>> {
    let Path(id) = id?;
    Ok(ApiResponse::success(CaseService::new(pool).documents(&user, id).await?))
}
