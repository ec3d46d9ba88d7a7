use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{eq_condition, non_blank, nullable, CaseService, PageQuery};
use crate::access::{Action, Resource};
use crate::database::models::{Hearing, HearingStatus};
use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

pub const DEFAULT_UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Default, Deserialize)]
pub struct HearingListQuery {
    pub case_id: Option<Uuid>,
    pub status: Option<HearingStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub upcoming: bool,
    pub days: Option<i64>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHearing {
    pub case_id: Uuid,
    pub hearing_date: DateTime<Utc>,
    pub court_name: Option<String>,
    pub courtroom: Option<String>,
    pub judge_name: Option<String>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateHearing {
    pub hearing_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub court_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub courtroom: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub judge_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub purpose: Option<Option<String>>,
    pub status: Option<HearingStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub outcome: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AdjournHearing {
    pub next_date: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Adjournment {
    pub adjourned: Hearing,
    pub next_hearing: Hearing,
}

pub struct HearingService {
    pool: PgPool,
}

impl HearingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> Repository<Hearing> {
        Repository::new(self.pool.clone())
    }

    pub async fn list(&self, actor: &CurrentUser, query: HearingListQuery) -> Result<Vec<Hearing>, ApiError> {
        actor.require(Resource::Hearings, Action::Read)?;

        let mut conditions: Vec<Value> = [
            eq_condition("case_id", query.case_id),
            eq_condition("status", query.status),
            query.from.map(|from| json!({ "hearing_date": { "$gte": from } })),
            query.to.map(|to| json!({ "hearing_date": { "$lte": to } })),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut order = query.order;
        if query.upcoming {
            let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS).clamp(0, 366);
            conditions.push(upcoming_condition(Utc::now(), days));
            order = order.or_else(|| Some("hearing_date asc".to_string()));
        }

        let page = PageQuery {
            limit: query.limit,
            offset: query.offset,
            order,
        };
        let filter = page.into_filter(conditions, "hearing_date desc", actor.scope_for(Resource::Hearings));
        Ok(self.repo().select_any(filter).await?)
    }

    pub async fn get(&self, actor: &CurrentUser, id: Uuid) -> Result<Hearing, ApiError> {
        actor.require(Resource::Hearings, Action::Read)?;
        self.visible(actor, id).await
    }

    async fn visible(&self, actor: &CurrentUser, id: Uuid) -> Result<Hearing, ApiError> {
        Ok(self.repo().select_id(id, actor.scope_for(Resource::Hearings)).await?)
    }

    pub async fn create(&self, actor: &CurrentUser, input: CreateHearing) -> Result<Hearing, ApiError> {
        actor.require(Resource::Hearings, Action::Create)?;
        let case = CaseService::new(self.pool.clone()).visible(actor, input.case_id).await?;

        // Court and judge default to the case's
        let court_name = non_blank(input.court_name).or(case.court_name);
        let judge_name = non_blank(input.judge_name).or(case.judge_name);

        let hearing: Hearing = sqlx::query_as(
            "INSERT INTO hearings (id, case_id, hearing_date, court_name, courtroom, judge_name, purpose, status, notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled', $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(case.id)
        .bind(input.hearing_date)
        .bind(court_name)
        .bind(non_blank(input.courtroom))
        .bind(judge_name)
        .bind(non_blank(input.purpose))
        .bind(non_blank(input.notes))
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(hearing = %hearing.id, case = %case.case_number, date = %hearing.hearing_date, "hearing scheduled");
        Ok(hearing)
    }

    pub async fn update(&self, actor: &CurrentUser, id: Uuid, patch: UpdateHearing) -> Result<Hearing, ApiError> {
        actor.require(Resource::Hearings, Action::Update)?;
        let mut hearing = self.visible(actor, id).await?;

        if let Some(hearing_date) = patch.hearing_date {
            hearing.hearing_date = hearing_date;
        }
        if let Some(court_name) = patch.court_name {
            hearing.court_name = non_blank(court_name);
        }
        if let Some(courtroom) = patch.courtroom {
            hearing.courtroom = non_blank(courtroom);
        }
        if let Some(judge_name) = patch.judge_name {
            hearing.judge_name = non_blank(judge_name);
        }
        if let Some(purpose) = patch.purpose {
            hearing.purpose = non_blank(purpose);
        }
        if let Some(outcome) = patch.outcome {
            hearing.outcome = non_blank(outcome);
        }
        if let Some(notes) = patch.notes {
            hearing.notes = non_blank(notes);
        }

        let current = hearing.status()?;
        if let Some(next) = patch.status.filter(|next| *next != current) {
            check_transition(current, next, hearing.outcome.as_deref())?;
            hearing.status = next.as_str().to_string();
        }

        let updated = sqlx::query_as(
            "UPDATE hearings SET hearing_date = $2, court_name = $3, courtroom = $4, judge_name = $5, purpose = $6,
                 status = $7, outcome = $8, notes = $9, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(hearing.id)
        .bind(hearing.hearing_date)
        .bind(&hearing.court_name)
        .bind(&hearing.courtroom)
        .bind(&hearing.judge_name)
        .bind(&hearing.purpose)
        .bind(&hearing.status)
        .bind(&hearing.outcome)
        .bind(&hearing.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Adjourn a scheduled hearing and book its follow-up in one transaction
    pub async fn adjourn(&self, actor: &CurrentUser, id: Uuid, input: AdjournHearing) -> Result<Adjournment, ApiError> {
        actor.require(Resource::Hearings, Action::Update)?;
        actor.require(Resource::Hearings, Action::Create)?;
        let hearing = self.visible(actor, id).await?;

        check_transition(hearing.status()?, HearingStatus::Adjourned, None)?;
        if input.next_date <= hearing.hearing_date {
            return Err(ApiError::field(
                "next_date",
                "Next hearing must be after the adjourned hearing",
            ));
        }

        let notes = adjournment_notes(hearing.notes.as_deref(), non_blank(input.reason).as_deref(), input.next_date);

        let mut tx = self.pool.begin().await?;
        let adjourned: Hearing = sqlx::query_as(
            "UPDATE hearings SET status = 'adjourned', notes = $2, updated_at = now()
             WHERE id = $1 AND status = 'scheduled' AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(hearing.id)
        .bind(&notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::conflict("Hearing was changed by another request"))?;

        let next_hearing: Hearing = sqlx::query_as(
            "INSERT INTO hearings (id, case_id, hearing_date, court_name, courtroom, judge_name, purpose, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled', $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(hearing.case_id)
        .bind(input.next_date)
        .bind(&hearing.court_name)
        .bind(&hearing.courtroom)
        .bind(&hearing.judge_name)
        .bind(&hearing.purpose)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(hearing = %adjourned.id, next = %next_hearing.id, date = %next_hearing.hearing_date, "hearing adjourned");
        Ok(Adjournment { adjourned, next_hearing })
    }

    pub async fn delete(&self, actor: &CurrentUser, id: Uuid) -> Result<Value, ApiError> {
        actor.require(Resource::Hearings, Action::Delete)?;
        let hearing = self.visible(actor, id).await?;

        sqlx::query("UPDATE hearings SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(hearing.id)
            .execute(&self.pool)
            .await?;

        crate::audit!(actor = %actor.id, hearing = %hearing.id, "hearing deleted");
        Ok(json!({ "id": hearing.id, "deleted": true }))
    }
}

/// Scheduled hearings between `now` and `now + days`
pub fn upcoming_condition(now: DateTime<Utc>, days: i64) -> Value {
    json!({
        "status": HearingStatus::Scheduled,
        "hearing_date": { "$between": [now, now + Duration::days(days)] }
    })
}

fn check_transition(current: HearingStatus, next: HearingStatus, outcome: Option<&str>) -> Result<(), ApiError> {
    if !current.can_transition_to(next) {
        return Err(ApiError::invalid_transition(current.as_str(), next.as_str()));
    }
    if next == HearingStatus::Completed && outcome.map_or(true, |o| o.trim().is_empty()) {
        return Err(ApiError::field("outcome", "An outcome is required to complete a hearing"));
    }
    Ok(())
}

fn adjournment_notes(existing: Option<&str>, reason: Option<&str>, next_date: DateTime<Utc>) -> String {
    let line = match reason {
        Some(reason) => format!("Adjourned to {}: {}", next_date.format("%Y-%m-%d %H:%M UTC"), reason),
        None => format!("Adjourned to {}", next_date.format("%Y-%m-%d %H:%M UTC")),
    };
    match existing {
        Some(existing) if !existing.trim().is_empty() => format!("{}\n{}", existing, line),
        _ => line,
    }
}
