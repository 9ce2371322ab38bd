//! Document retrieval by relative path.
//!
//! Fetches a document's full stored state for inspection. Used by the
//! `sdx get` CLI command.

use sqlx::PgPool;

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::models::Document;

pub async fn get_document(pool: &PgPool, relative_path: &str) -> Result<Document> {
    let document = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, file_path, title, content, content_hash,
               embedding, embedding_alt, created_at, updated_at
        FROM documents
        WHERE file_path = $1
        "#,
    )
    .bind(relative_path)
    .fetch_optional(pool)
    .await?;

    document.ok_or_else(|| Error::NotFound(format!("document: {}", relative_path)))
}

/// CLI entry point — fetches the document and prints it to stdout.
pub async fn run_get(config: &Config, relative_path: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let document = get_document(&pool, relative_path).await;
    pool.close().await;
    let document = document?;

    println!("--- Document ---");
    println!("path:          {}", document.file_path);
    println!("id:            {}", document.id);
    println!(
        "title:         {}",
        document.title.as_deref().unwrap_or("(untitled)")
    );
    println!("content_hash:  {}", document.content_hash);
    println!("embedding:     {}", describe_vector(&document.embedding));
    println!("embedding_alt: {}", describe_vector(&document.embedding_alt));
    println!(
        "created_at:    {}",
        document.created_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!(
        "updated_at:    {}",
        document.updated_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!();
    println!("--- Content ---");
    println!("{}", document.content);

    Ok(())
}

fn describe_vector(vector: &Option<pgvector::Vector>) -> String {
    match vector {
        Some(v) => format!("present ({} dims)", v.as_slice().len()),
        None => "absent".to_string(),
    }
}
