use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::dashboard_service::DashboardSummary;
use crate::services::DashboardService;

/// GET /api/dashboard
pub async fn summary(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<DashboardSummary> {
    Ok(ApiResponse::success(DashboardService::new(pool).summary(&user).await?))
}
