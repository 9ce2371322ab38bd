use sqlx::PgPool;

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};

/// Create the pgvector extension, the documents table, and the vector
/// indexes. Idempotent: running it multiple times is safe.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await?;

    // A table declared with a different dimension would silently reject every
    // new vector, so refuse up front and direct the operator to clear first.
    if let Some(existing) = declared_dims(&pool).await? {
        if existing != config.embedding.dims as i32 {
            pool.close().await;
            return Err(Error::Validation(format!(
                "documents table declares vector({}) but config sets embedding.dims = {}; \
                 clear the stored vectors and drop the table before re-running init",
                existing, config.embedding.dims
            )));
        }
    }

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            file_path TEXT NOT NULL UNIQUE,
            title TEXT,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            embedding vector({dims}),
            embedding_alt vector({dims}),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        dims = config.embedding.dims
    ))
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_embedding
         ON documents USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_embedding_alt
         ON documents USING hnsw (embedding_alt vector_cosine_ops)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}

/// Declared dimensionality of the existing embedding column, if the table
/// exists. For vector columns atttypmod holds the dimension directly.
async fn declared_dims(pool: &PgPool) -> Result<Option<i32>> {
    let dims: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT a.atttypmod
        FROM pg_attribute a
        JOIN pg_class c ON a.attrelid = c.oid
        WHERE c.relname = 'documents' AND a.attname = 'embedding'
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(dims)
}
