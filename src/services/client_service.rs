use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{eq_condition, is_valid_email, non_blank, nullable, search_condition, PageQuery, UserService};
use crate::access::{Action, Resource};
use crate::database::models::{Client, ClientType};
use crate::database::{next_number, NumberKind, Repository};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::CurrentUser;

#[derive(Debug, Default, Deserialize)]
pub struct ClientListQuery {
    pub search: Option<String>,
    pub client_type: Option<ClientType>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClient {
    #[serde(default = "default_client_type")]
    pub client_type: ClientType,
    pub name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
}

fn default_client_type() -> ClientType {
    ClientType::Individual
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClient {
    pub client_type: Option<ClientType>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub company_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub user_id: Option<Option<Uuid>>,
}

pub struct ClientService {
    pool: PgPool,
}

impl ClientService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> Repository<Client> {
        Repository::new(self.pool.clone())
    }

    pub async fn list(&self, actor: &CurrentUser, query: ClientListQuery) -> Result<Vec<Client>, ApiError> {
        actor.require(Resource::Clients, Action::Read)?;

        let conditions = [
            eq_condition("client_type", query.client_type),
            query
                .search
                .as_deref()
                .and_then(|s| search_condition(s, &["name", "email", "company_name", "client_number"])),
        ]
        .into_iter()
        .flatten()
        .collect();

        let page = PageQuery {
            limit: query.limit,
            offset: query.offset,
            order: query.order,
        };
        let filter = page.into_filter(conditions, "name asc", actor.scope_for(Resource::Clients));
        Ok(self.repo().select_any(filter).await?)
    }

    pub async fn get(&self, actor: &CurrentUser, id: Uuid) -> Result<Client, ApiError> {
        actor.require(Resource::Clients, Action::Read)?;
        self.visible(actor, id).await
    }

    /// The client if the caller's scope covers it, otherwise 404
    pub async fn visible(&self, actor: &CurrentUser, id: Uuid) -> Result<Client, ApiError> {
        Ok(self.repo().select_id(id, actor.scope_for(Resource::Clients)).await?)
    }

    pub async fn create(&self, actor: &CurrentUser, input: CreateClient) -> Result<Client, ApiError> {
        actor.require(Resource::Clients, Action::Create)?;

        let name = input.name.trim().to_string();
        let company_name = non_blank(input.company_name);
        let email = non_blank(input.email).map(|e| e.to_lowercase());
        validate(&name, input.client_type, company_name.as_deref(), email.as_deref())?;

        if let Some(user_id) = input.user_id {
            UserService::new(self.pool.clone()).require_portal_account(user_id).await?;
        }

        let mut tx = self.pool.begin().await?;
        let client_number = next_number(&mut tx, NumberKind::Client, Utc::now().date_naive()).await?;
        let client: Client = sqlx::query_as(
            "INSERT INTO clients (id, client_number, client_type, name, company_name, email, phone, address, notes, user_id, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&client_number)
        .bind(input.client_type.as_str())
        .bind(&name)
        .bind(&company_name)
        .bind(&email)
        .bind(non_blank(input.phone))
        .bind(non_blank(input.address))
        .bind(non_blank(input.notes))
        .bind(input.user_id)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(client = %client.id, number = %client.client_number, "client created");
        Ok(client)
    }

    pub async fn update(&self, actor: &CurrentUser, id: Uuid, patch: UpdateClient) -> Result<Client, ApiError> {
        actor.require(Resource::Clients, Action::Update)?;
        let mut client = self.visible(actor, id).await?;

        if let Some(client_type) = patch.client_type {
            client.client_type = client_type.as_str().to_string();
        }
        if let Some(name) = patch.name {
            client.name = name.trim().to_string();
        }
        if let Some(company_name) = patch.company_name {
            client.company_name = non_blank(company_name);
        }
        if let Some(email) = patch.email {
            client.email = non_blank(email).map(|e| e.to_lowercase());
        }
        if let Some(phone) = patch.phone {
            client.phone = non_blank(phone);
        }
        if let Some(address) = patch.address {
            client.address = non_blank(address);
        }
        if let Some(notes) = patch.notes {
            client.notes = non_blank(notes);
        }
        if let Some(user_id) = patch.user_id {
            if let Some(user_id) = user_id {
                UserService::new(self.pool.clone()).require_portal_account(user_id).await?;
            }
            client.user_id = user_id;
        }

        let client_type: ClientType = client.client_type.parse()?;
        validate(&client.name, client_type, client.company_name.as_deref(), client.email.as_deref())?;

        let updated = sqlx::query_as(
            "UPDATE clients SET client_type = $2, name = $3, company_name = $4, email = $5, phone = $6,
                 address = $7, notes = $8, user_id = $9, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(client.id)
        .bind(&client.client_type)
        .bind(&client.name)
        .bind(&client.company_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.notes)
        .bind(client.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn delete(&self, actor: &CurrentUser, id: Uuid) -> Result<Value, ApiError> {
        actor.require(Resource::Clients, Action::Delete)?;
        let client = self.visible(actor, id).await?;

        let open_cases: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cases WHERE client_id = $1 AND deleted_at IS NULL")
                .bind(client.id)
                .fetch_one(&self.pool)
                .await?;
        if open_cases > 0 {
            return Err(ApiError::conflict(format!(
                "Client {} still has {} case(s)",
                client.client_number, open_cases
            )));
        }

        sqlx::query("UPDATE clients SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(client.id)
            .execute(&self.pool)
            .await?;

        crate::audit!(actor = %actor.id, client = %client.id, "client deleted");
        Ok(json!({ "id": client.id, "deleted": true }))
    }
}

fn validate(name: &str, client_type: ClientType, company_name: Option<&str>, email: Option<&str>) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    if client_type == ClientType::Corporate && company_name.is_none() {
        errors.add("company_name", "Corporate clients require a company name");
    }
    if let Some(email) = email {
        if !is_valid_email(email) {
            errors.add("email", "Invalid email format");
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corporate_clients_need_company_name() {
        let err = validate("Acme", ClientType::Corporate, None, None).unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["company_name"], "Corporate clients require a company name");
        assert!(validate("Acme", ClientType::Corporate, Some("Acme Pvt Ltd"), None).is_ok());
        assert!(validate("Ravi", ClientType::Individual, None, None).is_ok());
    }

    #[test]
    fn reports_every_bad_field() {
        let err = validate("  ", ClientType::Individual, None, Some("nope")).unwrap_err();
        let body = err.to_json();
        assert!(body["field_errors"].get("name").is_some());
        assert!(body["field_errors"].get("email").is_some());
    }

    #[test]
    fn create_defaults_to_individual() {
        let input: CreateClient = serde_json::from_value(json!({ "name": "Ravi" })).unwrap();
        assert_eq!(input.client_type, ClientType::Individual);
    }
}
