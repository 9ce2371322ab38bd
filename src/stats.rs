//! Aggregate counts over the documents table.

use sqlx::{PgPool, Row};

use crate::config::Config;
use crate::db;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Stats {
    pub documents: i64,
    pub with_embedding: i64,
    pub with_embedding_alt: i64,
}

pub async fn collect_stats(pool: &PgPool) -> Result<Stats> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS documents,
               COUNT(embedding) AS with_embedding,
               COUNT(embedding_alt) AS with_embedding_alt
        FROM documents
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Stats {
        documents: row.get("documents"),
        with_embedding: row.get("with_embedding"),
        with_embedding_alt: row.get("with_embedding_alt"),
    })
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await;
    pool.close().await;
    let stats = stats?;

    println!("documents:          {}", stats.documents);
    println!("with embedding:     {}", stats.with_embedding);
    println!("with embedding_alt: {}", stats.with_embedding_alt);

    Ok(())
}
