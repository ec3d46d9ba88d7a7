use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Model;
use crate::filter::{ColumnType, ColumnTypes};

text_enum!(HearingStatus, "status" {
    Scheduled => "scheduled",
    Completed => "completed",
    Adjourned => "adjourned",
    Cancelled => "cancelled",
});

impl HearingStatus {
    pub fn can_transition_to(&self, next: HearingStatus) -> bool {
        use HearingStatus::*;
        matches!(
            (self, next),
            (Scheduled, Completed) | (Scheduled, Adjourned) | (Scheduled, Cancelled) | (Adjourned, Scheduled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hearing {
    pub id: Uuid,
    pub case_id: Uuid,
    pub hearing_date: DateTime<Utc>,
    pub court_name: Option<String>,
    pub courtroom: Option<String>,
    pub judge_name: Option<String>,
    pub purpose: Option<String>,
    pub status: String,
    pub outcome: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Hearing {
    pub fn status(&self) -> Result<HearingStatus, super::InvalidEnum> {
        self.status.parse()
    }
}

impl Model for Hearing {
    const TABLE: &'static str = "hearings";
    const LABEL: &'static str = "Hearing";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "case_id",
        "hearing_date",
        "court_name",
        "courtroom",
        "judge_name",
        "purpose",
        "status",
        "outcome",
        "notes",
        "created_by",
        "created_at",
        "updated_at",
    ];
    const COLUMN_TYPES: ColumnTypes = &[
        ("id", ColumnType::Uuid),
        ("case_id", ColumnType::Uuid),
        ("hearing_date", ColumnType::Timestamp),
        ("created_by", ColumnType::Uuid),
        ("created_at", ColumnType::Timestamp),
        ("updated_at", ColumnType::Timestamp),
    ];
}

#[cfg(test)]
mod tests {
    use super::HearingStatus::*;

    #[test]
    fn scheduled_hearings_resolve_once() {
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Adjourned));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(Scheduled));
    }

    #[test]
    fn adjourned_can_be_rescheduled() {
        assert!(Adjourned.can_transition_to(Scheduled));
        assert!(!Adjourned.can_transition_to(Completed));
    }
}
