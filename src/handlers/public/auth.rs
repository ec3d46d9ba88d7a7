// handlers/public/auth.rs - POST /auth/login, POST /auth/register

use axum::{extract::rejection::JsonRejection, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_jwt, Claims};
use crate::database::models::User;
use crate::database::DatabaseManager;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Token plus the account it was issued for
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

impl TokenResponse {
    pub fn issue(user: User) -> Result<Self, ApiError> {
        let claims = Claims::new(user.id, user.email.clone(), user.role.clone());
        let token = generate_jwt(&claims)?;
        Ok(Self {
            token,
            expires_in: claims.expires_in(),
            user,
        })
    }
}

/// POST /auth/login - exchange e-mail and password for a JWT
pub async fn login(payload: Result<Json<LoginRequest>, JsonRejection>) -> ApiResult<TokenResponse> {
    let Json(request) = payload?;

    let mut errors = FieldErrors::new();
    if request.email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()?;

    let pool = DatabaseManager::pool().await?;
    let user = UserService::new(pool).authenticate(&request.email, &request.password).await?;

    tracing::info!(user = %user.id, role = %user.role, "login succeeded");
    Ok(ApiResponse::success(TokenResponse::issue(user)?))
}

/// POST /auth/register - self-service client portal sign-up
pub async fn register(payload: Result<Json<RegisterRequest>, JsonRejection>) -> ApiResult<TokenResponse> {
    if !crate::config::config().api.allow_public_registration {
        return Err(ApiError::forbidden("Public registration is disabled"));
    }
    let Json(request) = payload?;

    let pool = DatabaseManager::pool().await?;
    let user = UserService::new(pool)
        .register(request.name, request.email, request.password, request.phone)
        .await?;

    Ok(ApiResponse::created(TokenResponse::issue(user)?))
}
