use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use siphon_core::DataSchema;

use crate::traits::DataSchemaStore;

#[derive(Clone)]
pub struct PgDataSchemaStore {
    pool: PgPool,
}

impl PgDataSchemaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSchemaStore for PgDataSchemaStore {
    async fn find(&self, schema_id: Uuid) -> Result<Option<DataSchema>> {
        let schema = sqlx::query_as::<_, DataSchema>(
            r#"
            SELECT id, tenant_id, name, description, document, file_type,
                   delimiter, created_at, updated_at
            FROM data_schema
            WHERE id = $1
            "#,
        )
        .bind(schema_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching data schema")?;
        Ok(schema)
    }
}
