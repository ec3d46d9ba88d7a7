use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{ColumnTypes, FilterData, FilterOrderInfo, FilterWhereOptions, SqlResult};

pub struct Filter {
    table_name: String,
    allowed_columns: Option<&'static [&'static str]>,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    options: FilterWhereOptions,
}

/// Identifiers are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` passes
pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name)))
    }
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)))?;
        Ok(Self {
            table_name,
            allowed_columns: None,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            options: FilterWhereOptions::default(),
        })
    }

    /// Restrict every column reference to the given allow-list
    pub fn with_columns(mut self, columns: &'static [&'static str]) -> Self {
        self.allowed_columns = Some(columns);
        self
    }

    /// Types of the non-TEXT columns, used to cast filter parameters
    pub fn with_column_types(mut self, column_types: ColumnTypes) -> Self {
        self.options.column_types = column_types;
        self
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select {
            self.select(select)?;
        }
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if let Some(limit) = data.limit {
            self.limit(limit, data.offset)?;
        } else if let Some(offset) = data.offset {
            if offset < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
            self.offset = Some(offset);
        }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column == "*" {
                continue;
            }
            self.check_column(column)?;
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        let order_info = FilterOrder::validate_and_parse(&order_spec)?;
        FilterOrder::validate_columns(&order_info, self.allowed_columns)?;
        self.order_data = order_info;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let select_clause = self.build_select_clause();
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    /// Same query with each row folded into a JSON object
    pub fn to_json_sql(&self) -> Result<SqlResult, FilterError> {
        let inner = self.to_sql()?;
        Ok(SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner.query),
            params: inner.params,
        })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = match &self.where_data {
            Some(where_data) => FilterWhere::generate(where_data, self.allowed_columns, &self.options)?,
            None => FilterWhere::generate_empty(),
        };
        Ok(SqlResult { query: where_clause, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        Ok(SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.table_name, where_result.query
            ),
            params: where_result.params,
        })
    }

    fn check_column(&self, column: &str) -> Result<(), FilterError> {
        validate_identifier(column)?;
        if let Some(allowed) = self.allowed_columns {
            if !allowed.contains(&column) {
                return Err(FilterError::InvalidColumn(format!("Unknown column: {}", column)));
            }
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_full_select() {
        let mut filter = Filter::new("cases").unwrap();
        filter
            .assign(FilterData {
                select: None,
                where_clause: Some(json!({"status": "open"})),
                order: Some(json!("created_at desc")),
                limit: Some(10),
                offset: Some(20),
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"cases\" WHERE \"deleted_at\" IS NULL AND \"status\" = $1 ORDER BY \"created_at\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.params, vec![json!("open")]);
    }

    #[test]
    fn allow_list_limits_select() {
        static COLUMNS: &[&str] = &["id", "name"];
        let mut filter = Filter::new("users").unwrap().with_columns(COLUMNS);
        assert!(filter.select(vec!["password_hash".to_string()]).is_err());

        filter.select(vec!["id".to_string(), "name".to_string()]).unwrap();
        let sql = filter.to_sql().unwrap();
        assert!(sql.query.starts_with("SELECT \"id\", \"name\" FROM \"users\""));
    }

    #[test]
    fn count_sql_has_no_order_or_limit() {
        let mut filter = Filter::new("invoices").unwrap();
        filter.order(json!("total desc")).unwrap();
        filter.limit(5, None).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"invoices\" WHERE \"deleted_at\" IS NULL");
    }

    #[test]
    fn json_sql_wraps_query() {
        let filter = Filter::new("clients").unwrap();
        let sql = filter.to_json_sql().unwrap();
        assert!(sql.query.starts_with("SELECT row_to_json(t) AS row FROM (SELECT * FROM \"clients\""));
        assert!(sql.query.ends_with(") t"));
    }

    #[test]
    fn limit_is_capped_by_config() {
        let mut filter = Filter::new("cases").unwrap();
        filter.limit(i32::MAX, None).unwrap();
        let max = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        assert!(filter.to_sql().unwrap().query.ends_with(&format!("LIMIT {}", max)));
        assert!(filter.limit(-1, None).is_err());
    }

    #[test]
    fn validates_table_names() {
        assert!(Filter::new("cases").is_ok());
        assert!(Filter::new("").is_err());
        assert!(Filter::new("1cases").is_err());
        assert!(Filter::new("cases; DROP TABLE users").is_err());
    }

    #[test]
    fn typed_columns_cast_their_parameters() {
        use crate::filter::ColumnType;
        static TYPES: &[(&str, ColumnType)] = &[("total", ColumnType::Numeric)];
        let mut filter = Filter::new("invoices").unwrap().with_column_types(TYPES);
        filter.where_clause(json!({"total": {"$gte": "100.50"}, "status": "sent"})).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert!(sql.query.contains("\"total\" >= $1::numeric"), "{}", sql.query);
        assert!(sql.query.contains("\"status\" = $2"), "{}", sql.query);
    }
}
