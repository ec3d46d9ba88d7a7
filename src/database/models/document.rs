use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Model;
use crate::filter::{ColumnType, ColumnTypes};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub case_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub checksum: Option<String>,
    #[serde(skip_serializing)]
    pub storage_key: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn has_content(&self) -> bool {
        self.storage_key.is_some()
    }
}

impl Model for Document {
    const TABLE: &'static str = "documents";
    const LABEL: &'static str = "Document";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "case_id",
        "title",
        "description",
        "category",
        "file_name",
        "mime_type",
        "file_size",
        "checksum",
        "uploaded_by",
        "created_at",
        "updated_at",
    ];
    const COLUMN_TYPES: ColumnTypes = &[
        ("id", ColumnType::Uuid),
        ("case_id", ColumnType::Uuid),
        ("file_size", ColumnType::BigInt),
        ("uploaded_by", ColumnType::Uuid),
        ("created_at", ColumnType::Timestamp),
        ("updated_at", ColumnType::Timestamp),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_follows_the_storage_key() {
        let now = Utc::now();
        let mut document = Document {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            title: "Vakalatnama".to_string(),
            description: None,
            category: None,
            file_name: None,
            mime_type: None,
            file_size: None,
            checksum: None,
            storage_key: None,
            uploaded_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(!document.has_content());

        document.storage_key = Some(document.id.to_string());
        assert!(document.has_content());
    }
}
