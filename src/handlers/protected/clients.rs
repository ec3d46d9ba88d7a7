// handlers/protected/clients.rs - /api/clients

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::Client;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::client_service::{ClientListQuery, CreateClient, UpdateClient};
use crate::services::ClientService;

pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<ClientListQuery>, QueryRejection>,
) -> ApiResult<Vec<Client>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(ClientService::new(pool).list(&user, query).await?))
}

pub async fn get(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Client> {
    let Path(id) = id?;
    Ok(ApiResponse::success(ClientService::new(pool).get(&user, id).await?))
}

pub async fn create(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateClient>, JsonRejection>,
) -> ApiResult<Client> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(ClientService::new(pool).create(&user, input).await?))
}

pub async fn update(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateClient>, JsonRejection>,
) -> ApiResult<Client> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(ApiResponse::success(ClientService::new(pool).update(&user, id, patch).await?))
}

pub async fn delete(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    Ok(ApiResponse::success(ClientService::new(pool).delete(&user, id).await?))
}
