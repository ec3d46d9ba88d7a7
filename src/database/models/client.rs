use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Model;
use crate::filter::{ColumnType, ColumnTypes};

text_enum!(ClientType, "client_type" {
    Individual => "individual",
    Corporate => "corporate",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub client_number: String,
    pub client_type: String,
    pub name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Model for Client {
    const TABLE: &'static str = "clients";
    const LABEL: &'static str = "Client";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "client_number",
        "client_type",
        "name",
        "company_name",
        "email",
        "phone",
        "address",
        "notes",
        "user_id",
        "created_by",
        "created_at",
        "updated_at",
    ];
    const COLUMN_TYPES: ColumnTypes = &[
        ("id", ColumnType::Uuid),
        ("user_id", ColumnType::Uuid),
        ("created_by", ColumnType::Uuid),
        ("created_at", ColumnType::Timestamp),
        ("updated_at", ColumnType::Timestamp),
    ];
}
