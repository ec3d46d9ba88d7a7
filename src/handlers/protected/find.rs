use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path,
    },
    Extension, Json,
};
use serde_json::Value;

use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::FindService;

/// POST /api/find/:resource - filtered find with the JSON query DSL
pub async fn find(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    resource: Result<Path<String>, PathRejection>,
    payload: Result<Json<FilterData>, JsonRejection>,
) -> ApiResult<Vec<Value>> {
    let Path(resource) = resource?;
    let Json(filter_data) = payload?;
    Ok(ApiResponse::success(FindService::new(pool).find(&user, &resource, filter_data).await?))
}
