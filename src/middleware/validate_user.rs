use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::access::{is_allowed, AccessScope, Action, Resource, Role};
use crate::database::models::User;
use crate::database::DatabaseManager;
use crate::error::ApiError;

/// Request-scoped handle on the shared pool
#[derive(Clone)]
pub struct DbPool(pub PgPool);

/// The caller, re-read from the users table, with their row scope resolved
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub scope: AccessScope,
}

impl CurrentUser {
    /// 403 unless the role may perform `action` on `resource`
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), ApiError> {
        if is_allowed(self.role, resource, action) {
            Ok(())
        } else {
            tracing::debug!(user = %self.id, role = %self.role, resource = resource.as_str(), action = action.as_str(), "permission denied");
            Err(ApiError::forbidden(format!(
                "Role '{}' cannot {} {}",
                self.role,
                action.as_str(),
                resource.as_str()
            )))
        }
    }

    pub fn scope_for(&self, resource: Resource) -> Option<Value> {
        self.scope.where_for(resource)
    }
}

/// Ensures the token's user still exists, is active and holds the role the token claims
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let pool = DatabaseManager::pool().await?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(auth_user.user_id)
        .fetch_optional(&pool)
        .await?;

    let user = user.ok_or_else(|| {
        tracing::warn!(user_id = %auth_user.user_id, "token presented for unknown or deleted user");
        ApiError::unauthorized("User no longer exists")
    })?;

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "inactive user rejected");
        return Err(ApiError::forbidden("Account is disabled"));
    }

    if user.role != auth_user.role {
        tracing::warn!(user_id = %user.id, token_role = %auth_user.role, role = %user.role, "role changed since token was issued");
        return Err(ApiError::unauthorized("Token is out of date, please sign in again"));
    }

    let role = user.role()?;
    let scope = AccessScope::resolve(&pool, user.id, role).await?;

    let current_user = CurrentUser {
        id: user.id,
        name: user.name,
        email: user.email,
        role,
        scope,
    };

    tracing::debug!(user = %current_user.id, role = %current_user.role, "user validated");

    request.extensions_mut().insert(current_user);
    request.extensions_mut().insert(DbPool(pool));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role,
            scope: AccessScope::Unrestricted,
        }
    }

    #[test]
    fn require_maps_to_forbidden() {
        let err = user(Role::Client).require(Resource::Cases, Action::Create).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "Role 'client' cannot create cases");
        assert!(user(Role::Staff).require(Resource::Cases, Action::Create).is_ok());
    }

    #[test]
    fn unrestricted_users_get_no_scope_condition() {
        assert!(user(Role::Admin).scope_for(Resource::Invoices).is_none());
        assert!(user(Role::Staff).scope_for(Resource::Clients).is_none());
    }
}
