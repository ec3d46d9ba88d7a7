use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{eq_condition, non_blank, nullable, search_condition, CaseService, PageQuery};
use crate::access::{Action, Resource};
use crate::database::models::Document;
use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::storage::DocumentStore;

#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub case_id: Option<Uuid>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub case_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocument {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub file_name: Option<Option<String>>,
}

/// Downloaded content with the metadata needed for response headers
pub struct DocumentContent {
    pub document: Document,
    pub bytes: Vec<u8>,
}

impl DocumentContent {
    pub fn mime_type(&self) -> &str {
        self.document.mime_type.as_deref().unwrap_or("application/octet-stream")
    }

    /// File name safe to place inside a quoted `Content-Disposition` parameter
    pub fn file_name(&self) -> String {
        let name = self
            .document
            .file_name
            .as_deref()
            .unwrap_or(&self.document.title)
            .chars()
            .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
            .collect::<String>();
        if name.trim().is_empty() {
            self.document.id.to_string()
        } else {
            name
        }
    }
}

pub struct DocumentService {
    pool: PgPool,
}

impl DocumentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> Repository<Document> {
        Repository::new(self.pool.clone())
    }

    pub async fn list(&self, actor: &CurrentUser, query: DocumentListQuery) -> Result<Vec<Document>, ApiError> {
        actor.require(Resource::Documents, Action::Read)?;

        let conditions = [
            eq_condition("case_id", query.case_id),
            eq_condition("category", non_blank(query.category)),
            query
                .search
                .as_deref()
                .and_then(|s| search_condition(s, &["title", "description", "file_name"])),
        ]
        .into_iter()
        .flatten()
        .collect();

        let page = PageQuery {
            limit: query.limit,
            offset: query.offset,
            order: query.order,
        };
        let filter = page.into_filter(conditions, "created_at desc", actor.scope_for(Resource::Documents));
        Ok(self.repo().select_any(filter).await?)
    }

    pub async fn get(&self, actor: &CurrentUser, id: Uuid) -> Result<Document, ApiError> {
        actor.require(Resource::Documents, Action::Read)?;
        self.visible(actor, id).await
    }

    async fn visible(&self, actor: &CurrentUser, id: Uuid) -> Result<Document, ApiError> {
        Ok(self.repo().select_id(id, actor.scope_for(Resource::Documents)).await?)
    }

    pub async fn create(&self, actor: &CurrentUser, input: CreateDocument) -> Result<Document, ApiError> {
        actor.require(Resource::Documents, Action::Create)?;
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::field("title", "Title is required"));
        }
        let case = CaseService::new(self.pool.clone()).visible(actor, input.case_id).await?;

        let document = sqlx::query_as(
            "INSERT INTO documents (id, case_id, title, description, category, file_name, uploaded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(case.id)
        .bind(&title)
        .bind(non_blank(input.description))
        .bind(non_blank(input.category))
        .bind(non_blank(input.file_name))
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(document)
    }

    pub async fn update(&self, actor: &CurrentUser, id: Uuid, patch: UpdateDocument) -> Result<Document, ApiError> {
        actor.require(Resource::Documents, Action::Update)?;
        let mut document = self.visible(actor, id).await?;

        if let Some(title) = patch.title {
            document.title = title.trim().to_string();
            if document.title.is_empty() {
                return Err(ApiError::field("title", "Title is required"));
            }
        }
        if let Some(description) = patch.description {
            document.description = non_blank(description);
        }
        if let Some(category) = patch.category {
            document.category = non_blank(category);
        }
        if let Some(file_name) = patch.file_name {
            document.file_name = non_blank(file_name);
        }

        let updated = sqlx::query_as(
            "UPDATE documents SET title = $2, description = $3, category = $4, file_name = $5, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.category)
        .bind(&document.file_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn delete(&self, actor: &CurrentUser, id: Uuid) -> Result<Value, ApiError> {
        actor.require(Resource::Documents, Action::Delete)?;
        let document = self.visible(actor, id).await?;

        sqlx::query("UPDATE documents SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(document.id)
            .execute(&self.pool)
            .await?;

        crate::audit!(actor = %actor.id, document = %document.id, "document deleted");
        Ok(json!({ "id": document.id, "deleted": true }))
    }

    /// Store the raw body as the document's content, replacing any earlier upload
    pub async fn upload_content(
        &self,
        actor: &CurrentUser,
        id: Uuid,
        bytes: &[u8],
        mime_type: Option<String>,
        store: &dyn DocumentStore,
    ) -> Result<Document, ApiError> {
        actor.require(Resource::Documents, Action::Update)?;
        let document = self.visible(actor, id).await?;

        if bytes.is_empty() {
            return Err(ApiError::bad_request("Document content is empty"));
        }

        let replacing = document.has_content();
        let key = document.storage_key.clone().unwrap_or_else(|| document.id.to_string());
        let stored = store.put(&key, bytes).await?;

        let recorded: Result<Document, sqlx::Error> = sqlx::query_as(
            "UPDATE documents SET storage_key = $2, file_size = $3, checksum = $4,
                 mime_type = COALESCE($5, mime_type), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(document.id)
        .bind(&stored.key)
        .bind(stored.size)
        .bind(&stored.checksum)
        .bind(non_blank(mime_type))
        .fetch_one(&self.pool)
        .await;

        let updated = match recorded {
            Ok(updated) => updated,
            Err(e) => {
                // A first upload that was never recorded leaves no orphan behind
                if !replacing {
                    if let Err(cleanup) = store.remove(&stored.key).await {
                        tracing::warn!(key = %stored.key, error = %cleanup, "could not remove unrecorded upload");
                    }
                }
                return Err(e.into());
            }
        };

        tracing::info!(document = %updated.id, size = stored.size, checksum = %stored.checksum, "document content stored");
        Ok(updated)
    }

    pub async fn download_content(
        &self,
        actor: &CurrentUser,
        id: Uuid,
        store: &dyn DocumentStore,
    ) -> Result<DocumentContent, ApiError> {
        actor.require(Resource::Documents, Action::Read)?;
        let document = self.visible(actor, id).await?;

        let key = document
            .storage_key
            .as_deref()
            .ok_or_else(|| ApiError::not_found("Document has no uploaded content"))?;
        let bytes = store.get(key).await?;

        Ok(DocumentContent { document, bytes })
    }
}
