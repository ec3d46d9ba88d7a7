use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{eq_condition, non_blank, nullable, search_condition, ClientService, PageQuery, UserService};
use crate::access::{Action, Resource, Role};
use crate::database::models::{Case, CasePriority, CaseStatus, Document, Hearing};
use crate::database::{next_number, NumberKind, Repository};
use crate::error::{ApiError, FieldErrors};
use crate::filter::FilterData;
use crate::middleware::CurrentUser;

#[derive(Debug, Default, Deserialize)]
pub struct CaseListQuery {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub client_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCase {
    pub title: String,
    pub client_id: Uuid,
    pub description: Option<String>,
    pub case_type: Option<String>,
    pub priority: Option<CasePriority>,
    pub court_name: Option<String>,
    pub judge_name: Option<String>,
    pub opposing_party: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub lawyer_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCase {
    pub title: Option<String>,
    pub client_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub case_type: Option<Option<String>>,
    pub priority: Option<CasePriority>,
    #[serde(default, deserialize_with = "nullable")]
    pub court_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub judge_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub opposing_party: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub filing_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub lawyer_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeCaseStatus {
    pub status: CaseStatus,
}

pub struct CaseService {
    pool: PgPool,
}

impl CaseService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> Repository<Case> {
        Repository::new(self.pool.clone())
    }

    pub async fn list(&self, actor: &CurrentUser, query: CaseListQuery) -> Result<Vec<Case>, ApiError> {
        actor.require(Resource::Cases, Action::Read)?;

        let conditions = [
            eq_condition("status", query.status),
            eq_condition("priority", query.priority),
            eq_condition("client_id", query.client_id),
            eq_condition("lawyer_id", query.lawyer_id),
            query
                .search
                .as_deref()
                .and_then(|s| search_condition(s, &["title", "case_number", "court_name", "opposing_party"])),
        ]
        .into_iter()
        .flatten()
        .collect();

        let page = PageQuery {
            limit: query.limit,
            offset: query.offset,
            order: query.order,
        };
        let filter = page.into_filter(conditions, "created_at desc", actor.scope_for(Resource::Cases));
        Ok(self.repo().select_any(filter).await?)
    }

    pub async fn get(&self, actor: &CurrentUser, id: Uuid) -> Result<Case, ApiError> {
        actor.require(Resource::Cases, Action::Read)?;
        self.visible(actor, id).await
    }

    /// The case if the caller's scope covers it, otherwise 404
    pub async fn visible(&self, actor: &CurrentUser, id: Uuid) -> Result<Case, ApiError> {
        Ok(self.repo().select_id(id, actor.scope_for(Resource::Cases)).await?)
    }

    pub async fn create(&self, actor: &CurrentUser, input: CreateCase) -> Result<Case, ApiError> {
        actor.require(Resource::Cases, Action::Create)?;

        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::field("title", "Title is required"));
        }

        let client = ClientService::new(self.pool.clone()).visible(actor, input.client_id).await?;
        let lawyer_id = self.resolve_lawyer(actor, input.lawyer_id).await?;
        let priority = input.priority.unwrap_or(CasePriority::Medium);

        let mut tx = self.pool.begin().await?;
        let case_number = next_number(&mut tx, NumberKind::Case, Utc::now().date_naive()).await?;
        let case: Case = sqlx::query_as(
            "INSERT INTO cases (id, case_number, title, description, case_type, status, priority, court_name,
                 judge_name, opposing_party, filing_date, client_id, lawyer_id, created_by)
             VALUES ($1, $2, $3, $4, $5, 'open', $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&case_number)
        .bind(&title)
        .bind(non_blank(input.description))
        .bind(non_blank(input.case_type))
        .bind(priority.as_str())
        .bind(non_blank(input.court_name))
        .bind(non_blank(input.judge_name))
        .bind(non_blank(input.opposing_party))
        .bind(input.filing_date)
        .bind(client.id)
        .bind(lawyer_id)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(case = %case.id, number = %case.case_number, "case opened");
        Ok(case)
    }

    /// Named lawyer must be an active lawyer; a lawyer opening a case defaults to themselves
    async fn resolve_lawyer(&self, actor: &CurrentUser, requested: Option<Uuid>) -> Result<Option<Uuid>, ApiError> {
        match requested {
            Some(id) if id == actor.id && actor.role == Role::Lawyer => Ok(Some(id)),
            Some(id) => Ok(Some(UserService::new(self.pool.clone()).require_lawyer(id).await?.id)),
            None if actor.role == Role::Lawyer => Ok(Some(actor.id)),
            None => Ok(None),
        }
    }

    pub async fn update(&self, actor: &CurrentUser, id: Uuid, patch: UpdateCase) -> Result<Case, ApiError> {
        actor.require(Resource::Cases, Action::Update)?;
        let mut case = self.visible(actor, id).await?;

        let mut errors = FieldErrors::new();
        if let Some(title) = patch.title {
            case.title = title.trim().to_string();
            if case.title.is_empty() {
                errors.add("title", "Title is required");
            }
        }
        errors.into_result()?;

        if let Some(client_id) = patch.client_id {
            case.client_id = ClientService::new(self.pool.clone()).visible(actor, client_id).await?.id;
        }
        if let Some(lawyer_id) = patch.lawyer_id {
            case.lawyer_id = match lawyer_id {
                Some(lawyer_id) => Some(UserService::new(self.pool.clone()).require_lawyer(lawyer_id).await?.id),
                None => None,
            };
        }
        if let Some(description) = patch.description {
            case.description = non_blank(description);
        }
        if let Some(case_type) = patch.case_type {
            case.case_type = non_blank(case_type);
        }
        if let Some(priority) = patch.priority {
            case.priority = priority.as_str().to_string();
        }
        if let Some(court_name) = patch.court_name {
            case.court_name = non_blank(court_name);
        }
        if let Some(judge_name) = patch.judge_name {
            case.judge_name = non_blank(judge_name);
        }
        if let Some(opposing_party) = patch.opposing_party {
            case.opposing_party = non_blank(opposing_party);
        }
        if let Some(filing_date) = patch.filing_date {
            case.filing_date = filing_date;
        }

        let updated = sqlx::query_as(
            "UPDATE cases SET title = $2, description = $3, case_type = $4, priority = $5, court_name = $6,
                 judge_name = $7, opposing_party = $8, filing_date = $9, client_id = $10, lawyer_id = $11,
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(case.id)
        .bind(&case.title)
        .bind(&case.description)
        .bind(&case.case_type)
        .bind(&case.priority)
        .bind(&case.court_name)
        .bind(&case.judge_name)
        .bind(&case.opposing_party)
        .bind(case.filing_date)
        .bind(case.client_id)
        .bind(case.lawyer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn change_status(&self, actor: &CurrentUser, id: Uuid, next: CaseStatus) -> Result<Case, ApiError> {
        actor.require(Resource::Cases, Action::Update)?;
        let case = self.visible(actor, id).await?;
        let current = case.status()?;

        if !current.can_transition_to(next) {
            return Err(ApiError::invalid_transition(current.as_str(), next.as_str()));
        }

        // closed_at tracks the latest closure; reopening clears it
        let updated: Case = sqlx::query_as(
            "UPDATE cases SET status = $2,
                 closed_at = CASE WHEN $2 = 'closed' THEN now() ELSE NULL END,
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(case.id)
        .bind(next.as_str())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(case = %updated.id, from = %current, to = %next, "case status changed");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &CurrentUser, id: Uuid) -> Result<Value, ApiError> {
        actor.require(Resource::Cases, Action::Delete)?;
        let case = self.visible(actor, id).await?;

        sqlx::query("UPDATE cases SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(case.id)
            .execute(&self.pool)
            .await?;

        crate::audit!(actor = %actor.id, case = %case.id, number = %case.case_number, "case deleted");
        Ok(json!({ "id": case.id, "deleted": true }))
    }

    pub async fn hearings(&self, actor: &CurrentUser, id: Uuid) -> Result<Vec<Hearing>, ApiError> {
        actor.require(Resource::Hearings, Action::Read)?;
        let case = self.visible(actor, id).await?;
        let filter = FilterData {
            where_clause: Some(json!({ "case_id": case.id })),
            order: Some(json!("hearing_date asc")),
            ..Default::default()
        };
        Ok(Repository::<Hearing>::new(self.pool.clone()).select_any(filter).await?)
    }

    pub async fn documents(&self, actor: &CurrentUser, id: Uuid) -> Result<Vec<Document>, ApiError> {
        actor.require(Resource::Documents, Action::Read)?;
        let case = self.visible(actor, id).await?;
        let filter = FilterData {
            where_clause: Some(json!({ "case_id": case.id })),
            order: Some(json!("created_at desc")),
            ..Default::default()
        };
        Ok(Repository::<Document>::new(self.pool.clone()).select_any(filter).await?)
    }
}
