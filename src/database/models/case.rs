use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Model;
use crate::filter::{ColumnType, ColumnTypes};

text_enum!(CaseStatus, "status" {
    Open => "open",
    InProgress => "in_progress",
    OnHold => "on_hold",
    Closed => "closed",
});

text_enum!(CasePriority, "priority" {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl CaseStatus {
    /// Active states move freely among themselves; any of them may close,
    /// and a closed case can only be reopened.
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        use CaseStatus::*;
        match (self, next) {
            (from, to) if *from == to => false,
            (Closed, Open) => true,
            (Closed, _) => false,
            (_, _) => true,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, CaseStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Case {
    pub id: Uuid,
    pub case_number: String,
    pub title: String,
    pub description: Option<String>,
    pub case_type: Option<String>,
    pub status: String,
    pub priority: String,
    pub court_name: Option<String>,
    pub judge_name: Option<String>,
    pub opposing_party: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub closed_at: Option<DateTime<Utc>>,
    pub client_id: Uuid,
    pub lawyer_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Case {
    pub fn status(&self) -> Result<CaseStatus, super::InvalidEnum> {
        self.status.parse()
    }
}

impl Model for Case {
    const TABLE: &'static str = "cases";
    const LABEL: &'static str = "Case";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "case_number",
        "title",
        "description",
        "case_type",
        "status",
        "priority",
        "court_name",
        "judge_name",
        "opposing_party",
        "filing_date",
        "closed_at",
        "client_id",
        "lawyer_id",
        "created_by",
        "created_at",
        "updated_at",
    ];
    const COLUMN_TYPES: ColumnTypes = &[
        ("id", ColumnType::Uuid),
        ("filing_date", ColumnType::Date),
        ("closed_at", ColumnType::Timestamp),
        ("client_id", ColumnType::Uuid),
        ("lawyer_id", ColumnType::Uuid),
        ("created_by", ColumnType::Uuid),
        ("created_at", ColumnType::Timestamp),
        ("updated_at", ColumnType::Timestamp),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use CaseStatus::*;

    #[test]
    fn active_states_interchange() {
        assert!(Open.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(OnHold));
        assert!(OnHold.can_transition_to(Open));
        assert!(InProgress.can_transition_to(Open));
    }

    #[test]
    fn anything_active_can_close() {
        for status in [Open, InProgress, OnHold] {
            assert!(status.can_transition_to(Closed));
        }
    }

    #[test]
    fn closed_only_reopens() {
        assert!(Closed.can_transition_to(Open));
        assert!(!Closed.can_transition_to(InProgress));
        assert!(!Closed.can_transition_to(OnHold));
        assert!(!Closed.can_transition_to(Closed));
    }

    #[test]
    fn same_state_is_not_a_transition() {
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn text_forms() {
        assert_eq!("in_progress".parse::<CaseStatus>().unwrap(), InProgress);
        assert_eq!(CasePriority::Urgent.to_string(), "urgent");
        assert!("pending".parse::<CaseStatus>().is_err());
    }
}
