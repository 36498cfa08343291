use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::features::access::collaborators::{DocumentStore, ListQuery, StoreError, WriteMode};

/// Postgres-backed document store over the `documents` table.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ensure_object(collection: &str, id: &str, data: &Value) -> Result<(), StoreError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let data = sqlx::query_scalar::<_, Value>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read document {}/{}: {:?}", collection, id, e);
            StoreError::Database(e)
        })?;

        Ok(data)
    }

    async fn list_documents(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, i64), StoreError> {
        let (field, value) = match &query.field_equals {
            Some((field, value)) => (Some(field.as_str()), Some(value.as_str())),
            None => (None, None),
        };

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM documents
            WHERE collection = $1
              AND ($2::text IS NULL OR data ->> $2 = $3)
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count documents in {}: {:?}", collection, e);
            StoreError::Database(e)
        })?;

        let rows = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT data
            FROM documents
            WHERE collection = $1
              AND ($2::text IS NULL OR data ->> $2 = $3)
            ORDER BY id
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .bind(query.offset)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list documents in {}: {:?}", collection, e);
            StoreError::Database(e)
        })?;

        Ok((rows, total))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        ensure_object(collection, id, &data)?;

        let sql = match mode {
            WriteMode::Replace => {
                r#"
                INSERT INTO documents (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id)
                DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
                "#
            }
            // Top-level merge-patch: patch keys overwrite, null-valued keys are removed.
            WriteMode::Merge => {
                r#"
                INSERT INTO documents (collection, id, data)
                VALUES (
                    $1, $2,
                    $3::jsonb - ARRAY(SELECT key FROM jsonb_each($3::jsonb) WHERE value = 'null'::jsonb)
                )
                ON CONFLICT (collection, id)
                DO UPDATE SET
                    data = (documents.data || $3::jsonb)
                        - ARRAY(SELECT key FROM jsonb_each($3::jsonb) WHERE value = 'null'::jsonb),
                    updated_at = NOW()
                "#
            }
        };

        sqlx::query(sql)
            .bind(collection)
            .bind(id)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to write document {}/{}: {:?}", collection, id, e);
                StoreError::Database(e)
            })?;

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete document {}/{}: {:?}", collection, id, e);
                StoreError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }
}
