use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Model;
use crate::filter::{ColumnType, ColumnTypes};

text_enum!(
    /// Account role; drives both the permission matrix and row scoping
    Role, "role" {
        Admin => "admin",
        Lawyer => "lawyer",
        Staff => "staff",
        Client => "client",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Result<Role, super::InvalidEnum> {
        self.role.parse()
    }
}

impl Model for User {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "User";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "role",
        "phone",
        "is_active",
        "last_login_at",
        "created_at",
        "updated_at",
    ];
    const COLUMN_TYPES: ColumnTypes = &[
        ("id", ColumnType::Uuid),
        ("is_active", ColumnType::Boolean),
        ("last_login_at", ColumnType::Timestamp),
        ("created_at", ColumnType::Timestamp),
        ("updated_at", ColumnType::Timestamp),
    ];
}
