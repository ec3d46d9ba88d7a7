// handlers/protected/auth.rs - the caller's own session and profile

use axum::{extract::rejection::JsonRejection, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::access::permissions_for;
use crate::handlers::public::auth::TokenResponse;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::database::models::User;
use crate::services::user_service::UpdateProfile;
use crate::services::UserService;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/auth/me - current user and what their role may do
pub async fn me(Extension(DbPool(pool)): Extension<DbPool>, Extension(user): Extension<CurrentUser>) -> ApiResult<Value> {
    let account = UserService::new(pool).current(&user).await?;

    let permissions: Map<String, Value> = permissions_for(user.role)
        .into_iter()
        .map(|(resource, actions)| (resource.as_str().to_string(), json!(actions)))
        .collect();

    Ok(ApiResponse::success(json!({
        "user": account,
        "permissions": permissions,
    })))
}

/// PUT /api/auth/me - name and phone of the caller's own account
pub async fn update_me(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<UpdateProfile>, JsonRejection>,
) -> ApiResult<User> {
    let Json(patch) = payload?;
    Ok(ApiResponse::success(UserService::new(pool).update_profile(&user, patch).await?))
}

/// PUT /api/auth/password
pub async fn change_password(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    UserService::new(pool)
        .change_password(&user, &request.current_password, &request.new_password)
        .await?;
    Ok(ApiResponse::success(json!({ "updated": true })))
}

/// POST /api/auth/refresh - new token for the current user
pub async fn refresh(Extension(DbPool(pool)): Extension<DbPool>, Extension(user): Extension<CurrentUser>) -> ApiResult<TokenResponse> {
    let account = UserService::new(pool).current(&user).await?;
    Ok(ApiResponse::success(TokenResponse::issue(account)?))
}
