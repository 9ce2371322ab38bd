//! Document import pipeline.
//!
//! Walks a directory tree for matching markdown files, fingerprints each
//! file's content with SHA-256, and decides add/update/skip before calling
//! the embedding provider. A per-file failure is captured into the batch
//! report and never aborts the remaining walk.
//!
//! Primary-language imports own the `content`, `content_hash`, `title`, and
//! `embedding` columns. Translated-variant imports only ever attach
//! `embedding_alt` to an existing row; the translated text itself is never
//! persisted.

use globset::{Glob, GlobSet, GlobSetBuilder};
use pgvector::Vector;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{Config, ImportConfig};
use crate::db;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::error::{Error, Result};
use crate::models::{ImportLanguage, ImportOutcome, ImportReport};
use crate::translate::TranslationClient;

/// Import every matching file under `root`.
///
/// With [`ImportLanguage::Translated`], files are translated renderings
/// sharing relative paths with the primary tree; each must already have a
/// primary document row.
pub async fn import_all(
    pool: &PgPool,
    embedder: &dyn Embedder,
    config: &Config,
    root: &Path,
    language: ImportLanguage,
) -> Result<ImportReport> {
    let files = collect_files(&config.import, root)?;

    let mut report = ImportReport::default();
    for (abs, rel) in &files {
        match import_one(pool, embedder, None, config, abs, rel, language, false).await {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                warn!(path = %rel, error = %e, "import failed");
                report.errors.push(format!("{}: {}", rel, e));
            }
        }
    }

    Ok(report)
}

/// Import a single file.
///
/// The stored relative path comes from `root_hint` when given, otherwise the
/// file's name. With `translate_variant`, the primary content is translated
/// in memory and the translation embedded into `embedding_alt`; the text is
/// discarded afterwards.
#[allow(clippy::too_many_arguments)]
pub async fn import_file(
    pool: &PgPool,
    embedder: &dyn Embedder,
    translator: Option<&TranslationClient>,
    config: &Config,
    path: &Path,
    language: ImportLanguage,
    root_hint: Option<&Path>,
    translate_variant: bool,
) -> Result<ImportOutcome> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("file: {}", path.display())));
    }
    let rel = relative_key(path, root_hint)?;
    import_one(
        pool,
        embedder,
        translator,
        config,
        path,
        &rel,
        language,
        translate_variant,
    )
    .await
}

/// Delete a document by exact relative path. Returns whether a row existed.
pub async fn delete_document(pool: &PgPool, relative_path: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE file_path = $1")
        .bind(relative_path)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[allow(clippy::too_many_arguments)]
async fn import_one(
    pool: &PgPool,
    embedder: &dyn Embedder,
    translator: Option<&TranslationClient>,
    config: &Config,
    abs: &Path,
    rel: &str,
    language: ImportLanguage,
    translate_variant: bool,
) -> Result<ImportOutcome> {
    let content = std::fs::read_to_string(abs)?;

    match language {
        ImportLanguage::Primary => {
            let hash = hash_content(&content);
            let existing: Option<String> =
                sqlx::query_scalar("SELECT content_hash FROM documents WHERE file_path = $1")
                    .bind(rel)
                    .fetch_optional(pool)
                    .await?;

            let outcome = classify_change(existing.as_deref(), &hash);
            match outcome {
                ImportOutcome::Added => {
                    let vector = Vector::from(embedder.embed(&content).await?);
                    sqlx::query(
                        r#"
                        INSERT INTO documents (file_path, title, content, content_hash, embedding)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(rel)
                    .bind(extract_title(&content))
                    .bind(&content)
                    .bind(&hash)
                    .bind(&vector)
                    .execute(pool)
                    .await?;
                }
                ImportOutcome::Updated => {
                    let vector = Vector::from(embedder.embed(&content).await?);
                    sqlx::query(
                        r#"
                        UPDATE documents
                        SET title = $2, content = $3, content_hash = $4, embedding = $5,
                            updated_at = now()
                        WHERE file_path = $1
                        "#,
                    )
                    .bind(rel)
                    .bind(extract_title(&content))
                    .bind(&content)
                    .bind(&hash)
                    .bind(&vector)
                    .execute(pool)
                    .await?;
                }
                ImportOutcome::Skipped => {}
            }

            if translate_variant {
                attach_translated(pool, embedder, translator, config, rel, &content).await?;
                // An explicit translate request mutates the row even when the
                // primary content was unchanged.
                if outcome == ImportOutcome::Skipped {
                    return Ok(ImportOutcome::Updated);
                }
            }

            Ok(outcome)
        }
        ImportLanguage::Translated => {
            let existing: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM documents WHERE file_path = $1")
                    .bind(rel)
                    .fetch_optional(pool)
                    .await?;
            if existing.is_none() {
                return Err(Error::NotFound(format!(
                    "no primary document for '{}'; import the primary language first",
                    rel
                )));
            }

            let vector = Vector::from(embedder.embed(&content).await?);
            sqlx::query(
                "UPDATE documents SET embedding_alt = $2, updated_at = now() WHERE file_path = $1",
            )
            .bind(rel)
            .bind(&vector)
            .execute(pool)
            .await?;

            Ok(ImportOutcome::Updated)
        }
    }
}

/// Translate the primary content in memory, embed the translation, and store
/// the vector. The translated text is dropped after embedding.
async fn attach_translated(
    pool: &PgPool,
    embedder: &dyn Embedder,
    translator: Option<&TranslationClient>,
    config: &Config,
    rel: &str,
    content: &str,
) -> Result<()> {
    let translator = translator.ok_or_else(|| {
        Error::Validation("translation client is not configured".to_string())
    })?;

    let translated = translator
        .translate(
            content,
            &config.import.translated_language,
            Some(&config.import.primary_language),
        )
        .await?;
    let vector = Vector::from(embedder.embed(&translated).await?);

    sqlx::query(
        "UPDATE documents SET embedding_alt = $2, updated_at = now() WHERE file_path = $1",
    )
    .bind(rel)
    .bind(&vector)
    .execute(pool)
    .await?;

    Ok(())
}

/// Walk `root` and return `(absolute, relative)` paths of matching files,
/// sorted by relative path for deterministic ordering.
pub fn collect_files(config: &ImportConfig, root: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !root.is_dir() {
        return Err(Error::NotFound(format!("directory: {}", root.display())));
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push((path.to_path_buf(), rel_str));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| Error::Validation(format!("invalid glob '{}': {}", pattern, e)))?,
        );
    }
    builder
        .build()
        .map_err(|e| Error::Validation(format!("invalid glob set: {}", e)))
}

/// SHA-256 hex fingerprint of document content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First line beginning with the level-1 heading marker, single pass.
fn extract_title(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

fn classify_change(existing_hash: Option<&str>, new_hash: &str) -> ImportOutcome {
    match existing_hash {
        None => ImportOutcome::Added,
        Some(hash) if hash == new_hash => ImportOutcome::Skipped,
        Some(_) => ImportOutcome::Updated,
    }
}

/// Relative path stored for a single-file import: relative to `root_hint`
/// when given, otherwise the file's name.
fn relative_key(path: &Path, root_hint: Option<&Path>) -> Result<String> {
    match root_hint {
        Some(root) => {
            let relative = path.strip_prefix(root).map_err(|_| {
                Error::Validation(format!(
                    "'{}' is not under root '{}'",
                    path.display(),
                    root.display()
                ))
            })?;
            Ok(relative.to_string_lossy().to_string())
        }
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| Error::Validation(format!("'{}' has no file name", path.display()))),
    }
}

/// Resolve a CLI language tag against the configured language pair.
/// An absent tag means the primary language.
pub fn resolve_language(config: &ImportConfig, tag: Option<&str>) -> Result<ImportLanguage> {
    match tag {
        None => Ok(ImportLanguage::Primary),
        Some(tag) if tag == config.primary_language => Ok(ImportLanguage::Primary),
        Some(tag) if tag == config.translated_language => Ok(ImportLanguage::Translated),
        Some(other) => Err(Error::Validation(format!(
            "unknown language '{}'; configured languages are '{}' and '{}'",
            other, config.primary_language, config.translated_language
        ))),
    }
}

// ============ CLI wrappers ============

/// `sdx import` — walk a tree, print the report.
pub async fn run_import(
    config: &Config,
    root: &Path,
    language: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let language = resolve_language(&config.import, language)?;

    if dry_run {
        let files = collect_files(&config.import, root)?;
        println!("import {} (dry-run)", root.display());
        println!("  files matched: {}", files.len());
        for (_, rel) in &files {
            println!("  {}", rel);
        }
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let embedder = HttpEmbedder::new(&config.embedding)?;
    let report = import_all(&pool, &embedder, config, root, language).await?;
    pool.close().await;

    println!("import {}", root.display());
    println!("  added: {}", report.added);
    println!("  updated: {}", report.updated);
    println!("  skipped: {}", report.skipped);
    if !report.errors.is_empty() {
        println!("  errors: {}", report.errors.len());
        for error in &report.errors {
            println!("    {}", error);
        }
    }
    println!("ok");

    Ok(())
}

/// `sdx import-file` — import one file, optionally with a translated-variant
/// embedding.
pub async fn run_import_file(
    config: &Config,
    path: &Path,
    language: Option<&str>,
    root_hint: Option<&Path>,
    translate_variant: bool,
) -> Result<()> {
    let language = resolve_language(&config.import, language)?;

    let translator = if translate_variant {
        Some(TranslationClient::new(&config.translation)?)
    } else {
        None
    };

    let pool = db::connect(config).await?;
    let embedder = HttpEmbedder::new(&config.embedding)?;
    let outcome = import_file(
        &pool,
        &embedder,
        translator.as_ref(),
        config,
        path,
        language,
        root_hint,
        translate_variant,
    )
    .await;
    pool.close().await;

    match outcome? {
        ImportOutcome::Added => println!("added {}", path.display()),
        ImportOutcome::Updated => println!("updated {}", path.display()),
        ImportOutcome::Skipped => println!("skipped {} (content unchanged)", path.display()),
    }

    Ok(())
}

/// `sdx delete` — remove a document by relative path.
pub async fn run_delete(config: &Config, relative_path: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let existed = delete_document(&pool, relative_path).await;
    pool.close().await;

    if existed? {
        println!("deleted {}", relative_path);
    } else {
        println!("no document for {}", relative_path);
    }

    Ok(())
}
