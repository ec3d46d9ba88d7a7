// handlers/protected/hearings.rs - /api/hearings

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::Hearing;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::hearing_service::{AdjournHearing, Adjournment, CreateHearing, HearingListQuery, UpdateHearing};
use crate::services::HearingService;

pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<HearingListQuery>, QueryRejection>,
) -> ApiResult<Vec<Hearing>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(HearingService::new(pool).list(&user, query).await?))
}

pub async fn get(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Hearing> {
    let Path(id) = id?;
    Ok(ApiResponse::success(HearingService::new(pool).get(&user, id).await?))
}

pub async fn create(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateHearing>, JsonRejection>,
) -> ApiResult<Hearing> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(HearingService::new(pool).create(&user, input).await?))
}

pub async fn update(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateHearing>, JsonRejection>,
) -> ApiResult<Hearing> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(ApiResponse::success(HearingService::new(pool).update(&user, id, patch).await?))
}

pub async fn delete(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    Ok(ApiResponse::success(HearingService::new(pool).delete(&user, id).await?))
}

/// POST /api/hearings/:id/adjourn - adjourn and book the next date
pub async fn adjourn(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AdjournHearing>, JsonRejection>,
) -> ApiResult<Adjournment> {
    let Path(id) = id?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(HearingService::new(pool).adjourn(&user, id, input).await?))
}
