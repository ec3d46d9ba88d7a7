pub mod case_service;
pub mod client_service;
pub mod dashboard_service;
pub mod document_service;
pub mod find_service;
pub mod hearing_service;
pub mod invoice_service;
pub mod user_service;

pub use case_service::CaseService;
pub use client_service::ClientService;
pub use dashboard_service::DashboardService;
pub use document_service::DocumentService;
pub use find_service::FindService;
pub use hearing_service::HearingService;
pub use invoice_service::InvoiceService;
pub use user_service::UserService;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::filter::FilterData;

/// Paging and ordering shared by every list endpoint
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

impl PageQuery {
    /// Build list filter data from equality/search conditions, ANDed with `scope`
    pub fn into_filter(self, conditions: Vec<Value>, default_order: &str, scope: Option<Value>) -> FilterData {
        let where_clause = match conditions.len() {
            0 => None,
            1 => conditions.into_iter().next(),
            _ => Some(json!({ "$and": conditions })),
        };

        FilterData {
            select: None,
            where_clause,
            order: Some(Value::String(self.order.unwrap_or_else(|| default_order.to_string()))),
            limit: Some(self.limit.unwrap_or(crate::config::config().filter.default_limit)),
            offset: self.offset,
        }
        .and_where(scope)
    }
}

/// Case-insensitive substring match across `columns`
pub fn search_condition(term: &str, columns: &[&str]) -> Option<Value> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let pattern = format!("%{}%", escape_like(term));
    let alternatives: Vec<Value> = columns
        .iter()
        .map(|column| json!({ *column: { "$ilike": pattern } }))
        .collect();
    Some(json!({ "$or": alternatives }))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Equality condition when the query parameter is present
pub fn eq_condition<T: serde::Serialize>(column: &str, value: Option<T>) -> Option<Value> {
    value.map(|v| json!({ column: v }))
}

/// One `@`, a non-empty local part and a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !email.chars().any(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in partial updates.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed value, or None when blank
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_where::FilterWhere;
    use crate::filter::FilterWhereOptions;

    #[test]
    fn email_rules() {
        assert!(is_valid_email("asha@firm.in"));
        assert!(is_valid_email("a.b+c@law.example.com"));
        assert!(!is_valid_email("asha"));
        assert!(!is_valid_email("@firm.in"));
        assert!(!is_valid_email("asha@firm"));
        assert!(!is_valid_email("a@b@firm.in"));
        assert!(!is_valid_email("asha @firm.in"));
        assert!(!is_valid_email("asha@.in"));
    }

    #[test]
    fn search_escapes_wildcards() {
        let condition = search_condition(" 50%_off ", &["name"]).unwrap();
        assert_eq!(condition, json!({ "$or": [{ "name": { "$ilike": "%50\\%\\_off%" } }] }));
        assert!(search_condition("   ", &["name"]).is_none());
    }

    #[test]
    fn page_defaults_apply() {
        let filter = PageQuery::default().into_filter(vec![], "created_at desc", None);
        assert_eq!(filter.limit, Some(crate::config::config().filter.default_limit));
        assert_eq!(filter.order, Some(json!("created_at desc")));
        assert!(filter.where_clause.is_none());
    }

    #[test]
    fn conditions_and_scope_combine() {
        let filter = PageQuery::default().into_filter(
            vec![json!({ "status": "open" }), json!({ "priority": "high" })],
            "created_at desc",
            Some(json!({ "lawyer_id": "x" })),
        );
        let (sql, params) =
            FilterWhere::generate(filter.where_clause.as_ref().unwrap(), None, &FilterWhereOptions::default()).unwrap();
        assert!(sql.contains("\"status\" = $1"));
        assert!(sql.contains("\"priority\" = $2"));
        assert!(sql.contains("\"lawyer_id\" = $3"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn nullable_tells_null_from_absent() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "nullable")]
            phone: Option<Option<String>>,
        }
        let absent: Patch = serde_json::from_value(json!({})).unwrap();
        let cleared: Patch = serde_json::from_value(json!({ "phone": null })).unwrap();
        let set: Patch = serde_json::from_value(json!({ "phone": "555" })).unwrap();
        assert_eq!(absent.phone, None);
        assert_eq!(cleared.phone, Some(None));
        assert_eq!(set.phone, Some(Some("555".to_string())));
    }
}
