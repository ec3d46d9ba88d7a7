use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NIn,
    Between,
    Null,
}

impl FilterOp {
    pub fn parse(op_key: &str) -> Option<Self> {
        Some(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Neq,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$null" => FilterOp::Null,
            _ => return None,
        })
    }

    /// SQL operator for the simple binary comparisons
    pub fn sql(&self) -> Option<&'static str> {
        Some(match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
            FilterOp::ILike => "ILIKE",
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl FilterData {
    /// AND an additional condition onto whatever WHERE data is already present
    pub fn and_where(mut self, condition: Option<Value>) -> Self {
        self.where_clause = match (self.where_clause.take(), condition) {
            (None, extra) => extra,
            (existing, None) => existing,
            (Some(existing), Some(extra)) => Some(serde_json::json!({ "$and": [existing, extra] })),
        };
        self
    }
}

/// Postgres type of a filterable column. Anything not listed is TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Uuid,
    BigInt,
    Numeric,
    Boolean,
    Date,
    Timestamp,
    Jsonb,
}

impl ColumnType {
    /// Cast applied to parameters compared against this column
    pub fn cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::Text => None,
            ColumnType::Uuid => Some("uuid"),
            ColumnType::BigInt => Some("bigint"),
            ColumnType::Numeric => Some("numeric"),
            ColumnType::Boolean => Some("boolean"),
            ColumnType::Date => Some("date"),
            ColumnType::Timestamp => Some("timestamptz"),
            ColumnType::Jsonb => Some("jsonb"),
        }
    }
}

pub type ColumnTypes = &'static [(&'static str, ColumnType)];

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    /// Non-TEXT columns of the table being filtered
    pub column_types: ColumnTypes,
}

impl FilterWhereOptions {
    pub fn column_type(&self, column: &str) -> ColumnType {
        self.column_types
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
            .unwrap_or(ColumnType::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_where_combines_conditions() {
        let data = FilterData { where_clause: Some(json!({"status": "open"})), ..Default::default() }
            .and_where(Some(json!({"lawyer_id": "abc"})));
        assert_eq!(
            data.where_clause,
            Some(json!({"$and": [{"status": "open"}, {"lawyer_id": "abc"}]}))
        );

        let data = FilterData::default().and_where(Some(json!({"a": 1})));
        assert_eq!(data.where_clause, Some(json!({"a": 1})));

        let data = FilterData { where_clause: Some(json!({"a": 1})), ..Default::default() }.and_where(None);
        assert_eq!(data.where_clause, Some(json!({"a": 1})));
    }

    #[test]
    fn unlisted_columns_are_text() {
        static TYPES: &[(&str, ColumnType)] = &[("total", ColumnType::Numeric)];
        let options = FilterWhereOptions { column_types: TYPES };
        assert_eq!(options.column_type("total"), ColumnType::Numeric);
        assert_eq!(options.column_type("notes"), ColumnType::Text);
        assert_eq!(ColumnType::Text.cast(), None);
        assert_eq!(ColumnType::Timestamp.cast(), Some("timestamptz"));
    }

    #[test]
    fn where_key_deserializes() {
        let data: FilterData = serde_json::from_value(json!({"where": {"status": "open"}, "limit": 5})).unwrap();
        assert_eq!(data.where_clause, Some(json!({"status": "open"})));
        assert_eq!(data.limit, Some(5));
    }
}
