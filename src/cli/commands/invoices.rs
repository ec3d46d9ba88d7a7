use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::database::DatabaseManager;
use crate::services::invoice_service::mark_overdue;

#[derive(Subcommand)]
pub enum InvoiceCommands {
    #[command(about = "Mark sent invoices past their due date as overdue")]
    SweepOverdue,
}

pub async fn handle(cmd: InvoiceCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        InvoiceCommands::SweepOverdue => {
            let pool = DatabaseManager::pool().await?;
            let today = Utc::now().date_naive();
            let marked = mark_overdue(&pool, today).await?;
            DatabaseManager::close().await;

            utils::output_success(
                &output_format,
                &format!("Marked {} invoice(s) overdue", marked),
                Some(json!({ "marked": marked, "as_of": today })),
            )
        }
    }
}
