use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // ["created_at desc", {"name": "asc"}]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        Value::Object(obj) => out.extend(Self::parse_order_object(obj)?),
                        other => return Err(FilterError::InvalidOrder(format!("Unexpected order entry: {}", other))),
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => Self::parse_order_object(obj),
            other => Err(FilterError::InvalidOrder(format!("Unsupported order format: {}", other))),
        }
    }

    /// `{ "total": "desc", "created_at": "asc" }`, in the caller's key order
    fn parse_order_object(obj: &Map<String, Value>) -> Result<Vec<FilterOrderInfo>, FilterError> {
        obj.iter()
            .map(|(column, direction)| {
                let direction = direction.as_str().ok_or_else(|| {
                    FilterError::InvalidOrder(format!("Sort direction for '{}' must be \"asc\" or \"desc\"", column))
                })?;
                Ok(FilterOrderInfo {
                    column: column.clone(),
                    sort: Self::parse_direction(direction)?,
                })
            })
            .collect()
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        // split on commas, then each token into column and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
                if it.next().is_some() {
                    return Err(FilterError::InvalidOrder(format!("Unexpected tokens in '{}'", trimmed)));
                }
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOrder(format!("Unknown sort direction '{}'", dir)))
        }
    }

    pub fn validate_columns(infos: &[FilterOrderInfo], allowed: Option<&[&str]>) -> Result<(), FilterError> {
        for info in infos {
            validate_identifier(&info.column)?;
            if let Some(allowed) = allowed {
                if !allowed.contains(&info.column.as_str()) {
                    return Err(FilterError::InvalidColumn(format!("Unknown column: {}", info.column)));
                }
            }
        }
        Ok(())
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_forms() {
        let infos = FilterOrder::validate_and_parse(&json!("created_at desc, name")).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"created_at\" DESC, \"name\" ASC");
    }

    #[test]
    fn parses_array_and_object_forms() {
        let infos = FilterOrder::validate_and_parse(&json!(["hearing_date asc"])).unwrap();
        assert_eq!(infos[0].sort, SortDirection::Asc);

        let infos = FilterOrder::validate_and_parse(&json!({"total": "DESC"})).unwrap();
        assert_eq!(infos[0].column, "total");
        assert_eq!(infos[0].sort, SortDirection::Desc);
    }

    #[test]
    fn object_keys_keep_their_precedence() {
        let order: Value = serde_json::from_str(r#"{"total": "desc", "created_at": "asc"}"#).unwrap();
        let infos = FilterOrder::validate_and_parse(&order).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"total\" DESC, \"created_at\" ASC");

        let infos = FilterOrder::validate_and_parse(&json!([{"status": "asc"}, "due_date desc"])).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"status\" ASC, \"due_date\" DESC");
    }

    #[test]
    fn non_string_directions_are_rejected() {
        let err = FilterOrder::validate_and_parse(&json!({"total": 1}));
        assert!(matches!(err, Err(FilterError::InvalidOrder(_))));
        assert!(FilterOrder::validate_and_parse(&json!({"total": null})).is_err());
    }

    #[test]
    fn rejects_bad_direction_and_injection() {
        assert!(FilterOrder::validate_and_parse(&json!("name sideways")).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("name asc; drop")).is_err());

        let infos = FilterOrder::validate_and_parse(&json!("\"name\"")).unwrap();
        assert!(FilterOrder::validate_columns(&infos, None).is_err());

        let infos = FilterOrder::validate_and_parse(&json!("password_hash")).unwrap();
        assert!(FilterOrder::validate_columns(&infos, Some(&["id", "name"])).is_err());
    }

    #[test]
    fn empty_order_generates_nothing() {
        assert_eq!(FilterOrder::generate(&[]), "");
    }
}
