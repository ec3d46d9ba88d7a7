use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use super::hearing_service::{upcoming_condition, DEFAULT_UPCOMING_DAYS};
use crate::access::{Action, Resource};
use crate::database::models::{Case, CaseStatus, Client, Hearing, Invoice, InvoiceStatus};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub clients: i64,
    pub open_cases: i64,
    pub cases_by_status: BTreeMap<&'static str, i64>,
    pub upcoming_hearings: Vec<Hearing>,
    pub outstanding_amount: Decimal,
    pub overdue_invoices: i64,
}

pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Headline numbers, all within the caller's scope
    pub async fn summary(&self, actor: &CurrentUser) -> Result<DashboardSummary, ApiError> {
        for resource in [Resource::Clients, Resource::Cases, Resource::Hearings, Resource::Invoices] {
            actor.require(resource, Action::Read)?;
        }

        let scoped = |resource: Resource, condition: Option<serde_json::Value>| {
            FilterData {
                where_clause: condition,
                ..Default::default()
            }
            .and_where(actor.scope_for(resource))
        };

        let clients = Repository::<Client>::new(self.pool.clone())
            .count(scoped(Resource::Clients, None))
            .await?;

        let cases = Repository::<Case>::new(self.pool.clone());
        let mut cases_by_status = BTreeMap::new();
        for status in CaseStatus::ALL.iter().filter(|s| s.is_active()) {
            let count = cases
                .count(scoped(Resource::Cases, Some(json!({ "status": status }))))
                .await?;
            cases_by_status.insert(status.as_str(), count);
        }
        let open_cases: i64 = cases_by_status.values().sum();

        let upcoming_hearings = Repository::<Hearing>::new(self.pool.clone())
            .select_any(FilterData {
                order: Some(json!("hearing_date asc")),
                ..scoped(
                    Resource::Hearings,
                    Some(upcoming_condition(Utc::now(), DEFAULT_UPCOMING_DAYS)),
                )
            })
            .await?;

        let outstanding = Repository::<Invoice>::new(self.pool.clone())
            .select_any(scoped(
                Resource::Invoices,
                Some(json!({ "status": { "$in": [InvoiceStatus::Sent, InvoiceStatus::Overdue] } })),
            ))
            .await?;
        let outstanding_amount = outstanding.iter().map(|invoice| invoice.total).sum();
        let overdue_invoices = outstanding
            .iter()
            .filter(|invoice| invoice.status == InvoiceStatus::Overdue.as_str())
            .count() as i64;

        Ok(DashboardSummary {
            clients,
            open_cases,
            cases_by_status,
            upcoming_hearings,
            outstanding_amount,
            overdue_invoices,
        })
    }
}
