//! Bilingual semantic search.
//!
//! Embeds the query once, then pulls nearest-neighbor candidates
//! independently from the primary and translated embedding columns using the
//! storage engine's cosine-distance operator. The two pools are merged by
//! document identity, scoring each document with the minimum of its two
//! distances, sorted ascending, and truncated to the requested limit.
//!
//! Equal-distance ties keep whatever order the merge produced; no secondary
//! sort key is defined.

use pgvector::Vector;
use sqlx::{PgPool, Row};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::error::{Error, Result};
use crate::models::SearchHit;

/// Maximum snippet length in characters.
const SNIPPET_CHARS: usize = 200;

/// Search both embedding columns and return a ranked, deduplicated top-K.
///
/// `max_distance`, when given, discards candidates whose distance is not
/// strictly below the cutoff, independently on both pools.
pub async fn search(
    pool: &PgPool,
    embedder: &dyn Embedder,
    query: &str,
    limit: i64,
    max_distance: Option<f64>,
) -> Result<Vec<SearchHit>> {
    validate_query(query, limit)?;

    let query_vec = Vector::from(embedder.embed(query).await?);

    let primary = fetch_candidates(pool, "embedding", &query_vec, limit, max_distance).await?;
    let alt = fetch_candidates(pool, "embedding_alt", &query_vec, limit, max_distance).await?;

    Ok(merge_candidates(primary, alt, limit as usize))
}

fn validate_query(query: &str, limit: i64) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::Validation("query is empty".to_string()));
    }
    if limit < 1 {
        return Err(Error::Validation(format!(
            "limit must be >= 1, got {}",
            limit
        )));
    }
    Ok(())
}

/// Nearest neighbors from one vector column, nulls excluded.
async fn fetch_candidates(
    pool: &PgPool,
    column: &str,
    query_vec: &Vector,
    limit: i64,
    max_distance: Option<f64>,
) -> Result<Vec<SearchHit>> {
    // `column` is one of two fixed identifiers, never caller input.
    let sql = format!(
        r#"
        SELECT id, file_path, title, content, ({column} <=> $1) AS distance
        FROM documents
        WHERE {column} IS NOT NULL
          AND ($3::float8 IS NULL OR ({column} <=> $1) < $3)
        ORDER BY {column} <=> $1
        LIMIT $2
        "#,
        column = column
    );

    let rows = sqlx::query(&sql)
        .bind(query_vec)
        .bind(limit)
        .bind(max_distance)
        .fetch_all(pool)
        .await?;

    let candidates = rows
        .iter()
        .map(|row| {
            let content: String = row.get("content");
            SearchHit {
                id: row.get("id"),
                file_path: row.get("file_path"),
                title: row.get("title"),
                snippet: snippet(&content),
                distance: row.get("distance"),
            }
        })
        .collect();

    Ok(candidates)
}

/// Merge the two candidate pools: per document the minimum of its distances,
/// each document at most once, ascending by distance, truncated to `limit`.
fn merge_candidates(
    primary: Vec<SearchHit>,
    alt: Vec<SearchHit>,
    limit: usize,
) -> Vec<SearchHit> {
    let mut best: HashMap<Uuid, SearchHit> = HashMap::new();

    for hit in primary.into_iter().chain(alt) {
        match best.entry(hit.id) {
            Entry::Occupied(mut entry) => {
                if hit.distance < entry.get().distance {
                    entry.insert(hit);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(hit);
            }
        }
    }

    let mut merged: Vec<SearchHit> = best.into_values().collect();
    merged.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(limit);
    merged
}

/// First 200 characters of the content, `...`-suffixed if truncated.
fn snippet(content: &str) -> String {
    let mut taken: String = content.chars().take(SNIPPET_CHARS).collect();
    if taken.len() < content.len() {
        taken.push_str("...");
    }
    taken
}

/// `sdx search` — run a query and print ranked results.
pub async fn run_search(
    config: &Config,
    query: &str,
    limit: i64,
    max_distance: Option<f64>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let embedder = HttpEmbedder::new(&config.embedding)?;
    let hits = search(&pool, &embedder, query, limit, max_distance).await;
    pool.close().await;
    let hits = hits?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = hit.title.as_deref().unwrap_or("(untitled)");
        println!("{}. [{:.4}] {} / {}", i + 1, hit.distance, hit.file_path, title);
        println!(
            "    excerpt: \"{}\"",
            hit.snippet.replace('\n', " ").trim()
        );
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}
