use chrono::{Datelike, NaiveDate};
use sqlx::{Postgres, Transaction};

use crate::database::manager::DatabaseError;

/// Kinds of human-facing reference numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Case,
    Client,
    Invoice,
}

impl NumberKind {
    fn key(&self) -> &'static str {
        match self {
            NumberKind::Case => "case",
            NumberKind::Client => "client",
            NumberKind::Invoice => "invoice",
        }
    }

    /// `CS/2025/001`, `CLT-2025-001`, `INV-2025-001`; the counter widens past 999
    pub fn format(&self, year: i32, value: i32) -> String {
        match self {
            NumberKind::Case => format!("CS/{}/{:03}", year, value),
            NumberKind::Client => format!("CLT-{}-{:03}", year, value),
            NumberKind::Invoice => format!("INV-{}-{:03}", year, value),
        }
    }
}

/// Allocate the next number for `kind` in the year of `on`.
///
/// The counter row is upserted and incremented in one statement, so the row
/// lock serializes concurrent allocations. Run it inside the transaction that
/// inserts the numbered record: a rollback then returns the number.
pub async fn next_number(
    tx: &mut Transaction<'_, Postgres>,
    kind: NumberKind,
    on: NaiveDate,
) -> Result<String, DatabaseError> {
    let year = on.year();
    let value: i32 = sqlx::query_scalar(
        "INSERT INTO number_sequences (kind, year, value) VALUES ($1, $2, 1)
         ON CONFLICT (kind, year) DO UPDATE SET value = number_sequences.value + 1
         RETURNING value",
    )
    .bind(kind.key())
    .bind(year)
    .fetch_one(&mut **tx)
    .await?;

    let number = kind.format(year, value);
    tracing::debug!(kind = kind.key(), %number, "allocated reference number");
    Ok(number)
}
