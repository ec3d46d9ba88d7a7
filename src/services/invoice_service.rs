use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{eq_condition, non_blank, nullable, CaseService, ClientService, PageQuery};
use crate::access::{Action, Resource};
use crate::database::models::invoice::{max_amount, InvoiceTotals};
use crate::database::models::{Invoice, InvoiceItem, InvoiceStatus};
use crate::database::{next_number, NumberKind, Repository};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::CurrentUser;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub case_id: Option<Uuid>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub case_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvoice {
    #[serde(default, deserialize_with = "nullable")]
    pub case_id: Option<Option<Uuid>>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Option<Vec<InvoiceItem>>,
    pub tax_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl UpdateInvoice {
    /// Fields that change what is billed
    fn touches_billing(&self) -> bool {
        self.case_id.is_some()
            || self.issue_date.is_some()
            || self.due_date.is_some()
            || self.items.is_some()
            || self.tax_rate.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeInvoiceStatus {
    pub status: InvoiceStatus,
}

pub struct InvoiceService {
    pool: PgPool,
}

impl InvoiceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> Repository<Invoice> {
        Repository::new(self.pool.clone())
    }

    pub async fn list(&self, actor: &CurrentUser, query: InvoiceListQuery) -> Result<Vec<Invoice>, ApiError> {
        actor.require(Resource::Invoices, Action::Read)?;

        let conditions = [
            eq_condition("status", query.status),
            eq_condition("client_id", query.client_id),
            eq_condition("case_id", query.case_id),
        ]
        .into_iter()
        .flatten()
        .collect();

        let page = PageQuery {
            limit: query.limit,
            offset: query.offset,
            order: query.order,
        };
        let filter = page.into_filter(conditions, "issue_date desc", actor.scope_for(Resource::Invoices));
        Ok(self.repo().select_any(filter).await?)
    }

    pub async fn get(&self, actor: &CurrentUser, id: Uuid) -> Result<Invoice, ApiError> {
        actor.require(Resource::Invoices, Action::Read)?;
        self.visible(actor, id).await
    }

    async fn visible(&self, actor: &CurrentUser, id: Uuid) -> Result<Invoice, ApiError> {
        Ok(self.repo().select_id(id, actor.scope_for(Resource::Invoices)).await?)
    }

    /// Case must be visible and belong to the invoiced client
    async fn check_case(&self, actor: &CurrentUser, case_id: Uuid, client_id: Uuid) -> Result<(), ApiError> {
        let case = CaseService::new(self.pool.clone()).visible(actor, case_id).await?;
        if case.client_id != client_id {
            return Err(ApiError::field("case_id", "Case belongs to a different client"));
        }
        Ok(())
    }

    pub async fn create(&self, actor: &CurrentUser, input: CreateInvoice) -> Result<Invoice, ApiError> {
        actor.require(Resource::Invoices, Action::Create)?;

        let invoicing = &crate::config::config().invoices;
        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or_else(|| issue_date + Duration::days(invoicing.default_due_days));
        let tax_rate = input.tax_rate.unwrap_or(invoicing.default_tax_rate);
        let mut items = input.items;
        validate_billing(&items, tax_rate, issue_date, due_date)?;
        let totals = InvoiceTotals::compute(&mut items, tax_rate)?;

        let client = ClientService::new(self.pool.clone()).visible(actor, input.client_id).await?;
        if let Some(case_id) = input.case_id {
            self.check_case(actor, case_id, client.id).await?;
        }

        let mut tx = self.pool.begin().await?;
        let invoice_number = next_number(&mut tx, NumberKind::Invoice, issue_date).await?;
        let invoice: Invoice = sqlx::query_as(
            "INSERT INTO invoices (id, invoice_number, client_id, case_id, issue_date, due_date, items, subtotal,
                 tax_rate, tax_amount, total, status, notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'draft', $12, $13)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&invoice_number)
        .bind(client.id)
        .bind(input.case_id)
        .bind(issue_date)
        .bind(due_date)
        .bind(Json(&items))
        .bind(totals.subtotal)
        .bind(tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(non_blank(input.notes))
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(invoice = %invoice.id, number = %invoice.invoice_number, total = %invoice.total, "invoice drafted");
        Ok(invoice)
    }

    pub async fn update(&self, actor: &CurrentUser, id: Uuid, patch: UpdateInvoice) -> Result<Invoice, ApiError> {
        actor.require(Resource::Invoices, Action::Update)?;
        let mut invoice = self.visible(actor, id).await?;
        let status = invoice.status()?;

        if patch.touches_billing() && status != InvoiceStatus::Draft {
            return Err(ApiError::unprocessable_entity(
                format!("Only draft invoices can be edited; this invoice is '{}'", status),
                Default::default(),
            ));
        }

        if let Some(case_id) = patch.case_id {
            if let Some(case_id) = case_id {
                self.check_case(actor, case_id, invoice.client_id).await?;
            }
            invoice.case_id = case_id;
        }
        if let Some(issue_date) = patch.issue_date {
            invoice.issue_date = issue_date;
        }
        if let Some(due_date) = patch.due_date {
            invoice.due_date = due_date;
        }
        if let Some(items) = patch.items {
            invoice.items = Json(items);
        }
        if let Some(tax_rate) = patch.tax_rate {
            invoice.tax_rate = tax_rate;
        }
        if let Some(notes) = patch.notes {
            invoice.notes = non_blank(notes);
        }

        validate_billing(&invoice.items.0, invoice.tax_rate, invoice.issue_date, invoice.due_date)?;
        let totals = InvoiceTotals::compute(&mut invoice.items.0, invoice.tax_rate)?;

        let updated = sqlx::query_as(
            "UPDATE invoices SET case_id = $2, issue_date = $3, due_date = $4, items = $5, subtotal = $6,
                 tax_rate = $7, tax_amount = $8, total = $9, notes = $10, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(invoice.id)
        .bind(invoice.case_id)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(&invoice.items)
        .bind(totals.subtotal)
        .bind(invoice.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(&invoice.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn change_status(&self, actor: &CurrentUser, id: Uuid, next: InvoiceStatus) -> Result<Invoice, ApiError> {
        actor.require(Resource::Invoices, Action::Update)?;
        let invoice = self.visible(actor, id).await?;
        let current = invoice.status()?;

        if !current.can_transition_to(next) {
            return Err(ApiError::invalid_transition(current.as_str(), next.as_str()));
        }

        let updated: Invoice = sqlx::query_as(
            "UPDATE invoices SET status = $2,
                 paid_at = CASE WHEN $2 = 'paid' THEN now() ELSE paid_at END,
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(invoice.id)
        .bind(next.as_str())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(invoice = %updated.id, from = %current, to = %next, "invoice status changed");
        Ok(updated)
    }

    pub async fn pay(&self, actor: &CurrentUser, id: Uuid) -> Result<Invoice, ApiError> {
        self.change_status(actor, id, InvoiceStatus::Paid).await
    }

    pub async fn delete(&self, actor: &CurrentUser, id: Uuid) -> Result<Value, ApiError> {
        actor.require(Resource::Invoices, Action::Delete)?;
        let invoice = self.visible(actor, id).await?;
        let status = invoice.status()?;

        if !matches!(status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
            return Err(ApiError::unprocessable_entity(
                format!("Only draft or cancelled invoices can be deleted; this invoice is '{}'", status),
                Default::default(),
            ));
        }

        sqlx::query("UPDATE invoices SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(invoice.id)
            .execute(&self.pool)
            .await?;

        crate::audit!(actor = %actor.id, invoice = %invoice.id, number = %invoice.invoice_number, "invoice deleted");
        Ok(json!({ "id": invoice.id, "deleted": true }))
    }
}

/// Mark sent invoices due before `today` as overdue; returns how many changed
pub async fn mark_overdue(pool: &PgPool, today: NaiveDate) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE invoices SET status = 'overdue', updated_at = now()
         WHERE status = 'sent' AND due_date < $1 AND deleted_at IS NULL",
    )
    .bind(today)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Run [`mark_overdue`] every `every` until the process exits
pub fn spawn_overdue_sweeper(pool: PgPool, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match mark_overdue(&pool, Utc::now().date_naive()).await {
                Ok(0) => tracing::debug!("overdue sweep: nothing to mark"),
                Ok(n) => tracing::info!(count = n, "overdue sweep marked invoices overdue"),
                Err(e) => tracing::warn!(error = %e, "overdue sweep failed"),
            }
        }
    })
}

fn validate_billing(items: &[InvoiceItem], tax_rate: Decimal, issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    for (i, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            errors.add(&format!("items[{}].description", i), "Description is required");
        }
        if item.quantity <= Decimal::ZERO {
            errors.add(&format!("items[{}].quantity", i), "Quantity must be greater than zero");
        }
        if item.quantity > max_amount() {
            errors.add(&format!("items[{}].quantity", i), format!("Quantity cannot exceed {}", max_amount()));
        }
        if item.unit_price < Decimal::ZERO {
            errors.add(&format!("items[{}].unit_price", i), "Unit price cannot be negative");
        }
        if item.unit_price > max_amount() {
            errors.add(&format!("items[{}].unit_price", i), format!("Unit price cannot exceed {}", max_amount()));
        }
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        errors.add("tax_rate", "Tax rate must be between 0 and 100");
    } else if tax_rate.normalize().scale() > 2 {
        // The column keeps two places; a finer rate would be rounded after tax was computed
        errors.add("tax_rate", "Tax rate allows at most 2 decimal places");
    }
    if due_date < issue_date {
        errors.add("due_date", "Due date cannot be before the issue date");
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(description: &str, quantity: &str, unit_price: &str) -> InvoiceItem {
        InvoiceItem {
            description: description.to_string(),
            quantity: Decimal::from_str(quantity).unwrap(),
            unit_price: Decimal::from_str(unit_price).unwrap(),
            amount: Decimal::ZERO,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn accepts_sane_billing() {
        let items = vec![item("Drafting", "3", "2500")];
        assert!(validate_billing(&items, Decimal::from(18), date("2025-03-01"), date("2025-03-31")).is_ok());
        assert!(validate_billing(&[], Decimal::ZERO, date("2025-03-01"), date("2025-03-01")).is_ok());
    }

    #[test]
    fn rejects_bad_lines_and_dates() {
        let items = vec![item("", "0", "-1")];
        let err = validate_billing(&items, Decimal::from(101), date("2025-03-10"), date("2025-03-01")).unwrap_err();
        let fields = &err.to_json()["field_errors"];
        for key in ["items[0].description", "items[0].quantity", "items[0].unit_price", "tax_rate", "due_date"] {
            assert!(fields.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn tax_rate_is_limited_to_two_places() {
        let items = vec![item("Retainer", "1", "1000.00")];
        let err = validate_billing(&items, Decimal::from_str("18.555").unwrap(), date("2025-03-01"), date("2025-03-31"))
            .unwrap_err();
        assert!(err.to_json()["field_errors"].get("tax_rate").is_some());

        // Trailing zeros do not count
        assert!(validate_billing(&items, Decimal::from_str("18.500").unwrap(), date("2025-03-01"), date("2025-03-31")).is_ok());

        let mut items = items;
        let rate = Decimal::from_str("18.56").unwrap();
        assert!(validate_billing(&items, rate, date("2025-03-01"), date("2025-03-31")).is_ok());
        let totals = InvoiceTotals::compute(&mut items, rate).unwrap();
        assert_eq!(totals.tax_amount, Decimal::from_str("185.60").unwrap());
    }

    #[test]
    fn oversized_lines_are_rejected_before_pricing() {
        let items = vec![item("Everything", "10000000000", "10000000000")];
        let err = validate_billing(&items, Decimal::ZERO, date("2025-03-01"), date("2025-03-31")).unwrap_err();
        let fields = &err.to_json()["field_errors"];
        assert!(fields.get("items[0].quantity").is_some());
        assert!(fields.get("items[0].unit_price").is_some());
    }

    #[test]
    fn notes_alone_do_not_touch_billing() {
        let patch: UpdateInvoice = serde_json::from_value(json!({ "notes": "Paid by cheque" })).unwrap();
        assert!(!patch.touches_billing());
        let patch: UpdateInvoice = serde_json::from_value(json!({ "tax_rate": "18" })).unwrap();
        assert!(patch.touches_billing());
        let patch: UpdateInvoice = serde_json::from_value(json!({ "case_id": null })).unwrap();
        assert!(patch.touches_billing());
    }
}
