use serde_json::{json, Value};
use sqlx::{self, postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::Model;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;

/// Filtered reads over one model's table
pub struct Repository<T> {
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: Model + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    fn builder(&self) -> Result<QueryBuilder<T>, DatabaseError> {
        Ok(QueryBuilder::<T>::new(T::TABLE)?.columns(T::COLUMNS, T::COLUMN_TYPES))
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        // Typed rows need every column, so any client-provided select is dropped
        let filter_data = FilterData { select: None, ..filter_data };
        self.builder()?.filter(filter_data)?.select_all(&self.pool).await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        let filter_data = FilterData { select: None, ..filter_data };
        self.builder()?.filter(filter_data)?.select_optional(&self.pool).await
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, DatabaseError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", T::LABEL)))
    }

    /// Fetch one row by id, ANDed with an optional scope condition
    pub async fn select_id(&self, id: Uuid, scope: Option<Value>) -> Result<T, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(json!({ "id": id })),
            ..Default::default()
        }
        .and_where(scope);
        self.select_404(filter).await
    }

    /// Rows as JSON objects, honouring the caller's select list.
    ///
    /// A missing or `*` select expands to the model's public columns so hidden
    /// columns such as `password_hash` never leave the database.
    pub async fn select_json(&self, filter_data: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let select = match filter_data.select {
            Some(columns) if !columns.iter().any(|c| c == "*") => columns,
            _ => T::COLUMNS.iter().map(|c| c.to_string()).collect(),
        };
        let filter_data = FilterData {
            select: Some(select),
            ..filter_data
        };
        self.builder()?.filter(filter_data)?.select_json(&self.pool).await
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        self.builder()?.filter(filter_data)?.count(&self.pool).await
    }
}
