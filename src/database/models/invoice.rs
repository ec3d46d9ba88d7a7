use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::Model;
use crate::error::{ApiError, FieldErrors};
use crate::filter::{ColumnType, ColumnTypes};

text_enum!(InvoiceStatus, "status" {
    Draft => "draft",
    Sent => "sent",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

impl InvoiceStatus {
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Sent, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }

    /// Money is still owed on the invoice
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub amount: Decimal,
}

impl InvoiceItem {
    /// `quantity × unit_price` to the cent; None on overflow
    pub fn line_amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price).map(round_money)
    }
}

/// Largest value the NUMERIC(12, 2) money columns hold
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Invoice money columns derived from the line items and tax rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    /// Fills each item's `amount` and sums the invoice.
    ///
    /// Amounts that would not fit the money columns are field errors.
    pub fn compute(items: &mut [InvoiceItem], tax_rate: Decimal) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();
        let mut subtotal = Some(Decimal::ZERO);
        for (i, item) in items.iter_mut().enumerate() {
            match item.line_amount().filter(|amount| *amount <= max_amount()) {
                Some(amount) => {
                    item.amount = amount;
                    subtotal = subtotal.and_then(|sum| sum.checked_add(amount));
                }
                None => errors.add(&format!("items[{}].amount", i), format!("Line amount cannot exceed {}", max_amount())),
            }
        }
        errors.into_result()?;

        let totals = subtotal.and_then(|subtotal| {
            let tax_amount = round_money(subtotal.checked_mul(tax_rate)?.checked_div(Decimal::ONE_HUNDRED)?);
            Some(Self {
                subtotal,
                tax_amount,
                total: subtotal.checked_add(tax_amount)?,
            })
        });
        match totals {
            Some(totals) if totals.total <= max_amount() => Ok(totals),
            _ => Err(ApiError::field("items", format!("Invoice total cannot exceed {}", max_amount()))),
        }
    }
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub case_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Json<Vec<InvoiceItem>>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn status(&self) -> Result<InvoiceStatus, super::InvalidEnum> {
        self.status.parse()
    }
}

impl Model for Invoice {
    const TABLE: &'static str = "invoices";
    const LABEL: &'static str = "Invoice";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "invoice_number",
        "client_id",
        "case_id",
        "issue_date",
        "due_date",
        "items",
        "subtotal",
        "tax_rate",
        "tax_amount",
        "total",
        "status",
        "paid_at",
        "notes",
        "created_by",
        "created_at",
        "updated_at",
    ];
    const COLUMN_TYPES: ColumnTypes = &[
        ("id", ColumnType::Uuid),
        ("client_id", ColumnType::Uuid),
        ("case_id", ColumnType::Uuid),
        ("issue_date", ColumnType::Date),
        ("due_date", ColumnType::Date),
        ("items", ColumnType::Jsonb),
        ("subtotal", ColumnType::Numeric),
        ("tax_rate", ColumnType::Numeric),
        ("tax_amount", ColumnType::Numeric),
        ("total", ColumnType::Numeric),
        ("paid_at", ColumnType::Timestamp),
        ("created_by", ColumnType::Uuid),
        ("created_at", ColumnType::Timestamp),
        ("updated_at", ColumnType::Timestamp),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(quantity: &str, unit_price: &str) -> InvoiceItem {
        InvoiceItem {
            description: "Consultation".to_string(),
            quantity: dec(quantity),
            unit_price: dec(unit_price),
            amount: Decimal::ZERO,
        }
    }

    #[test]
    fn totals_sum_items_and_tax() {
        let mut items = vec![item("2", "1500.00"), item("1.5", "200")];
        let totals = InvoiceTotals::compute(&mut items, dec("18")).unwrap();
        assert_eq!(items[0].amount, dec("3000.00"));
        assert_eq!(items[1].amount, dec("300.00"));
        assert_eq!(totals.subtotal, dec("3300.00"));
        assert_eq!(totals.tax_amount, dec("594.00"));
        assert_eq!(totals.total, dec("3894.00"));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        // 0.333 * 1.5 = 0.4995 -> 0.50
        let mut items = vec![item("0.333", "1.5")];
        let totals = InvoiceTotals::compute(&mut items, Decimal::ZERO).unwrap();
        assert_eq!(totals.subtotal, dec("0.50"));
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.355")), dec("2.36"));
    }

    #[test]
    fn empty_invoice_is_zero() {
        let totals = InvoiceTotals::compute(&mut [], dec("10")).unwrap();
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn decimal_overflow_is_a_field_error() {
        let mut items = vec![item("79228162514264337593543950335", "2")];
        let err = InvoiceTotals::compute(&mut items, Decimal::ZERO).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_json()["field_errors"].get("items[0].amount").is_some());
    }

    #[test]
    fn totals_must_fit_the_money_columns() {
        // 1e8 × 1000 = 1e11, past NUMERIC(12, 2)
        let mut items = vec![item("100000000", "1000")];
        assert!(InvoiceTotals::compute(&mut items, Decimal::ZERO).is_err());

        // Each line fits but tax pushes the total over
        let mut items = vec![item("1", "9999999999.99")];
        let err = InvoiceTotals::compute(&mut items, dec("18")).unwrap_err();
        assert!(err.to_json()["field_errors"].get("items").is_some());

        let mut items = vec![item("1", "9999999999.99")];
        assert_eq!(InvoiceTotals::compute(&mut items, Decimal::ZERO).unwrap().total, max_amount());
    }

    #[test]
    fn status_machine() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition_to(Sent));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(!Draft.can_transition_to(Paid));
        assert!(Sent.can_transition_to(Overdue));
        assert!(Overdue.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Sent));
        assert!(!Cancelled.can_transition_to(Draft));
        assert!(Sent.is_outstanding() && Overdue.is_outstanding());
        assert!(!Paid.is_outstanding());
    }

    #[test]
    fn items_accept_numbers_or_strings() {
        let parsed: InvoiceItem =
            serde_json::from_value(serde_json::json!({"description": "Filing", "quantity": 1, "unit_price": "250.50"}))
                .unwrap();
        assert_eq!(parsed.line_amount(), Some(dec("250.50")));
    }
}
