use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::access::{Action, Resource};
use crate::database::models::{Case, Client, Document, Hearing, Invoice, Model, User};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;

/// `POST /api/find/:resource`: the filter DSL over one resource, inside the caller's scope
pub struct FindService {
    pool: PgPool,
}

impl FindService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, actor: &CurrentUser, resource: &str, data: FilterData) -> Result<Vec<Value>, ApiError> {
        let resource = Resource::from_path(resource)
            .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", resource)))?;
        actor.require(resource, Action::Read)?;

        let data = FilterData {
            limit: data.limit.or(Some(crate::config::config().filter.default_limit)),
            ..data
        }
        .and_where(actor.scope_for(resource));

        match resource {
            Resource::Users => self.run::<User>(data).await,
            Resource::Clients => self.run::<Client>(data).await,
            Resource::Cases => self.run::<Case>(data).await,
            Resource::Hearings => self.run::<Hearing>(data).await,
            Resource::Invoices => self.run::<Invoice>(data).await,
            Resource::Documents => self.run::<Document>(data).await,
        }
    }

    async fn run<T>(&self, data: FilterData) -> Result<Vec<Value>, ApiError>
    where
        T: Model + for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        Ok(Repository::<T>::new(self.pool.clone()).select_json(data).await?)
    }
}
