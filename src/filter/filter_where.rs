use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{ColumnType, FilterOp, FilterWhereOptions};

/// Compiles the JSON WHERE dialect into a parameterized SQL predicate.
///
/// Placeholders are numbered `$1..$n` in the order parameters are pushed, so
/// nested `$and` / `$or` / `$not` groups share one parameter list. Parameters
/// travel as text and are cast to the column's type in the SQL, e.g.
/// `"total" > $1::numeric`.
pub struct FilterWhere<'a> {
    param_values: Vec<Value>,
    allowed_columns: Option<&'a [&'a str]>,
    options: &'a FilterWhereOptions,
}

impl<'a> FilterWhere<'a> {
    fn new(allowed_columns: Option<&'a [&'a str]>, options: &'a FilterWhereOptions) -> Self {
        Self {
            param_values: vec![],
            allowed_columns,
            options,
        }
    }

    pub fn generate(
        where_data: &Value,
        allowed_columns: Option<&'a [&'a str]>,
        options: &'a FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(allowed_columns, options);
        let mut conditions = vec![Self::SOFT_DELETE.to_string()];
        if let Some(sql) = filter_where.build(where_data)? {
            conditions.push(sql);
        }
        Ok((conditions.join(" AND "), filter_where.param_values))
    }

    pub fn generate_empty() -> (String, Vec<Value>) {
        (Self::SOFT_DELETE.to_string(), vec![])
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    const SOFT_DELETE: &'static str = "\"deleted_at\" IS NULL";

    /// Returns None when the data imposes no restriction
    fn build(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        match where_data {
            Value::Null => Ok(None),
            Value::Object(obj) => self.build_object(obj),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build_object(&mut self, obj: &Map<String, Value>) -> Result<Option<String>, FilterError> {
        let mut parts = vec![];
        for (key, value) in obj {
            let sql = if key.starts_with('$') {
                self.build_logical(key, value)?
            } else {
                self.build_field(key, value)?
            };
            parts.push(sql);
        }
        Ok(if parts.is_empty() { None } else { Some(parts.join(" AND ")) })
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut parts = vec![];
                for v in arr {
                    if let Some(sql) = self.build(v)? {
                        parts.push(format!("({})", sql));
                    }
                }
                if parts.is_empty() {
                    // Empty AND is vacuously true, empty OR matches nothing
                    return Ok(if op == "$and" { "1=1".to_string() } else { "1=0".to_string() });
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", parts.join(joiner)))
            }
            "$not" => match self.build(value)? {
                Some(sql) => Ok(format!("NOT ({})", sql)),
                None => Ok("1=0".to_string()),
            },
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn build_field(&mut self, field: &str, value: &Value) -> Result<String, FilterError> {
        self.check_column(field)?;

        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                let mut parts = vec![];
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    parts.push(self.build_condition(field, operator, op_val)?);
                }
                Ok(parts.join(" AND "))
            }
            // Implicit equality: { field: value }
            _ => self.build_condition(field, FilterOp::Eq, value),
        }
    }

    fn build_condition(&mut self, field: &str, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", field);
        let column_type = self.options.column_type(field);

        match operator {
            FilterOp::Eq if data.is_null() => Ok(format!("{} IS NULL", quoted_column)),
            FilterOp::Neq if data.is_null() => Ok(format!("{} IS NOT NULL", quoted_column)),
            FilterOp::Null => match data {
                Value::Bool(true) => Ok(format!("{} IS NULL", quoted_column)),
                Value::Bool(false) => Ok(format!("{} IS NOT NULL", quoted_column)),
                _ => Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if operator == FilterOp::In { "1=0".to_string() } else { "1=1".to_string() });
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v, column_type)).collect();
                let keyword = if operator == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(values[0].clone(), column_type),
                    self.param(values[1].clone(), column_type)
                )),
                _ => Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
            _ => {
                if matches!(data, Value::Array(_) | Value::Object(_)) {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "Operator on '{}' requires a scalar value",
                        field
                    )));
                }
                // sql() covers every remaining operator
                let sql_op = operator
                    .sql()
                    .ok_or_else(|| FilterError::UnsupportedOperator(format!("{:?}", operator)))?;
                if matches!(operator, FilterOp::Like | FilterOp::ILike) {
                    // Pattern matching compares text, whatever the column type
                    let column = match column_type {
                        ColumnType::Text => quoted_column,
                        _ => format!("{}::text", quoted_column),
                    };
                    return Ok(format!("{} {} {}", column, sql_op, self.param(data.clone(), ColumnType::Text)));
                }
                Ok(format!("{} {} {}", quoted_column, sql_op, self.param(data.clone(), column_type)))
            }
        }
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

    fn param(&mut self, value: Value, column_type: ColumnType) -> String {
        self.param_values.push(value);
        match column_type.cast() {
            Some(cast) => format!("${}::{}", self.param_values.len(), cast),
            None => format!("${}", self.param_values.len()),
        }
    }
}
