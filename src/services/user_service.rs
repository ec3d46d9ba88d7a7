use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{eq_condition, is_valid_email, non_blank, nullable, search_condition, PageQuery};
use crate::access::{Action, Resource, Role};
use crate::auth::password::{hash_password_async, validate_password_strength, verify_password_async};
use crate::database::models::User;
use crate::database::Repository;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::CurrentUser;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Fields a user may change on their own account
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> Repository<User> {
        Repository::new(self.pool.clone())
    }

    pub async fn list(&self, actor: &CurrentUser, query: UserListQuery) -> Result<Vec<User>, ApiError> {
        actor.require(Resource::Users, Action::Read)?;

        let conditions = [
            eq_condition("role", query.role),
            eq_condition("is_active", query.is_active),
            query.search.as_deref().and_then(|s| search_condition(s, &["name", "email"])),
        ]
        .into_iter()
        .flatten()
        .collect();

        let page = PageQuery {
            limit: query.limit,
            offset: query.offset,
            order: query.order,
        };
        let filter = page.into_filter(conditions, "name asc", actor.scope_for(Resource::Users));
        Ok(self.repo().select_any(filter).await?)
    }

    pub async fn get(&self, actor: &CurrentUser, id: Uuid) -> Result<User, ApiError> {
        actor.require(Resource::Users, Action::Read)?;
        Ok(self.repo().select_id(id, actor.scope_for(Resource::Users)).await?)
    }

    /// Active or inactive account by e-mail, ignoring case
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Loads the account behind a validated token, bypassing row scope
    pub async fn current(&self, actor: &CurrentUser) -> Result<User, ApiError> {
        Ok(self.repo().select_id(actor.id, None).await?)
    }

    pub async fn create(&self, actor: &CurrentUser, input: CreateUser) -> Result<User, ApiError> {
        actor.require(Resource::Users, Action::Create)?;
        let user = self.insert(input).await?;
        crate::audit!(actor = %actor.id, user = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Self-service sign-up; always creates a client portal account
    pub async fn register(&self, name: String, email: String, password: String, phone: Option<String>) -> Result<User, ApiError> {
        let user = self
            .insert(CreateUser {
                name,
                email,
                password,
                role: Role::Client,
                phone,
            })
            .await?;
        crate::audit!(user = %user.id, "client account registered");
        Ok(user)
    }

    /// Validate, hash and insert without a permission check; used by the CLI bootstrap
    pub async fn insert(&self, input: CreateUser) -> Result<User, ApiError> {
        let mut errors = FieldErrors::new();
        let name = input.name.trim().to_string();
        let email = input.email.trim().to_lowercase();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        if !is_valid_email(&email) {
            errors.add("email", "Invalid email format");
        }
        if let Err(e) = validate_password_strength(&input.password) {
            errors.add("password", e.to_string());
        }
        errors.into_result()?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let password_hash = hash_password_async(&input.password).await?;
        let user = sqlx::query_as(
            "INSERT INTO users (id, name, email, password_hash, role, phone, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(input.role.as_str())
        .bind(non_blank(input.phone))
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn update(&self, actor: &CurrentUser, id: Uuid, patch: UpdateUser) -> Result<User, ApiError> {
        actor.require(Resource::Users, Action::Update)?;
        let mut user = self.repo().select_id(id, actor.scope_for(Resource::Users)).await?;

        if user.id == actor.id {
            if patch.role.is_some_and(|role| role != Role::Admin) {
                return Err(ApiError::bad_request("You cannot change your own role"));
            }
            if patch.is_active == Some(false) {
                return Err(ApiError::bad_request("You cannot deactivate your own account"));
            }
        }

        let mut errors = FieldErrors::new();
        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                errors.add("name", "Name is required");
            }
            user.name = name;
        }
        if let Some(phone) = patch.phone {
            user.phone = non_blank(phone);
        }
        if let Some(role) = patch.role {
            user.role = role.as_str().to_string();
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        if let Some(password) = &patch.password {
            if let Err(e) = validate_password_strength(password) {
                errors.add("password", e.to_string());
            }
        }
        errors.into_result()?;

        if let Some(password) = &patch.password {
            user.password_hash = hash_password_async(password).await?;
        }

        let updated: User = sqlx::query_as(
            "UPDATE users SET name = $2, phone = $3, role = $4, is_active = $5, password_hash = $6, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        crate::audit!(actor = %actor.id, user = %updated.id, role = %updated.role, active = updated.is_active, "user updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &CurrentUser, id: Uuid) -> Result<Value, ApiError> {
        actor.require(Resource::Users, Action::Delete)?;
        if id == actor.id {
            return Err(ApiError::bad_request("You cannot delete your own account"));
        }
        let user = self.repo().select_id(id, actor.scope_for(Resource::Users)).await?;

        sqlx::query("UPDATE users SET deleted_at = now(), is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        crate::audit!(actor = %actor.id, user = %user.id, "user deleted");
        Ok(json!({ "id": user.id, "deleted": true }))
    }

    /// Check credentials for login. Unknown e-mail and wrong password are indistinguishable.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let invalid = || ApiError::unauthorized("Invalid email or password");

        let user = self.find_by_email(email).await?.ok_or_else(invalid)?;
        if !verify_password_async(password, &user.password_hash).await? {
            tracing::info!(user = %user.id, "login failed: wrong password");
            return Err(invalid());
        }
        if !user.is_active {
            return Err(ApiError::forbidden("Account is disabled"));
        }

        let user: User = sqlx::query_as("UPDATE users SET last_login_at = $2 WHERE id = $1 RETURNING *")
            .bind(user.id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        crate::audit!(user = %user.id, "login");
        Ok(user)
    }

    /// Name and phone of the caller's own account; no role check applies
    pub async fn update_profile(&self, actor: &CurrentUser, patch: UpdateProfile) -> Result<User, ApiError> {
        let mut user = self.current(actor).await?;

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::field("name", "Name is required"));
            }
            user.name = name;
        }
        if let Some(phone) = patch.phone {
            user.phone = non_blank(phone);
        }

        let updated: User = sqlx::query_as(
            "UPDATE users SET name = $2, phone = $3, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn change_password(&self, actor: &CurrentUser, current: &str, new_password: &str) -> Result<(), ApiError> {
        let user = self.current(actor).await?;
        if !verify_password_async(current, &user.password_hash).await? {
            return Err(ApiError::field("current_password", "Current password is incorrect"));
        }
        validate_password_strength(new_password)?;

        let password_hash = hash_password_async(new_password).await?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user.id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        crate::audit!(user = %user.id, "password changed");
        Ok(())
    }

    /// Active user with role `lawyer`, for case assignment
    pub async fn require_lawyer(&self, id: Uuid) -> Result<User, ApiError> {
        let user: Option<User> = sqlx::query_as(
            "SELECT * FROM users WHERE id = $1 AND role = 'lawyer' AND is_active AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        user.ok_or_else(|| ApiError::field("lawyer_id", "Assigned user must be an active lawyer"))
    }

    /// Active user with role `client`, for linking a portal account to a client record
    pub async fn require_portal_account(&self, id: Uuid) -> Result<User, ApiError> {
        let user: Option<User> = sqlx::query_as(
            "SELECT * FROM users WHERE id = $1 AND role = 'client' AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        user.ok_or_else(|| ApiError::field("user_id", "Linked account must be a user with role 'client'"))
    }
}
