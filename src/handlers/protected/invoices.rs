// handlers/protected/invoices.rs - /api/invoices

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::Invoice;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::invoice_service::{ChangeInvoiceStatus, CreateInvoice, InvoiceListQuery, UpdateInvoice};
use crate::services::InvoiceService;

pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<InvoiceListQuery>, QueryRejection>,
) -> ApiResult<Vec<Invoice>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(InvoiceService::new(pool).list(&user, query).await?))
}

pub async fn get(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Invoice> {
    let Path(id) = id?;
    Ok(ApiResponse::success(InvoiceService::new(pool).get(&user, id).await?))
}

pub async fn create(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateInvoice>, JsonRejection>,
) -> ApiResult<Invoice> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(InvoiceService::new(pool).create(&user, input).await?))
}

pub async fn update(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateInvoice>, JsonRejection>,
) -> ApiResult<Invoice> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(ApiResponse::success(InvoiceService::new(pool).update(&user, id, patch).await?))
}

pub async fn delete(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    Ok(ApiResponse::success(InvoiceService::new(pool).delete(&user, id).await?))
}

/// PUT /api/invoices/:id/status
pub async fn change_status(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ChangeInvoiceStatus>, JsonRejection>,
) -> ApiResult<Invoice> {
    let Path(id) = id?;
    let Json(request) = payload?;
    Ok(ApiResponse::success(
        InvoiceService::new(pool).change_status(&user, id, request.status).await?,
    ))
}

/// POST /api/invoices/:id/pay
pub async fn pay(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Invoice> {
    let Path(id) = id?;
    Ok(ApiResponse::success(InvoiceService::new(pool).pay(&user, id).await?))
}
