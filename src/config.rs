use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection URL. The database must have the pgvector
    /// extension available; `sdx init` creates it.
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding endpoint; requests go to `{url}/embeddings`.
    pub url: String,
    pub model: String,
    /// Vector dimensionality. Changing it invalidates all stored vectors.
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Base URL of the translation endpoint; requests go to `{url}/translate`.
    #[serde(default = "default_translation_url")]
    pub url: String,
    /// Region header sent alongside the subscription key, if the provider
    /// issues regional keys.
    #[serde(default)]
    pub region: Option<String>,
    /// Character budget per trailing one-minute window.
    #[serde(default = "default_chars_per_minute")]
    pub chars_per_minute: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            url: default_translation_url(),
            region: None,
            chars_per_minute: default_chars_per_minute(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Language tag of the documents themselves.
    #[serde(default = "default_primary_language")]
    pub primary_language: String,
    /// Language tag of the translated variant stored in `embedding_alt`.
    #[serde(default = "default_translated_language")]
    pub translated_language: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            primary_language: default_primary_language(),
            translated_language: default_translated_language(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_translation_url() -> String {
    "https://api.cognitive.microsofttranslator.com".to_string()
}
fn default_chars_per_minute() -> usize {
    33_000
}
fn default_primary_language() -> String {
    "en".to_string()
}
fn default_translated_language() -> String {
    "cs".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.is_empty() {
        anyhow::bail!("embedding.model must be set");
    }
    if config.translation.chars_per_minute == 0 {
        anyhow::bail!("translation.chars_per_minute must be > 0");
    }
    if config.import.primary_language.is_empty() || config.import.translated_language.is_empty() {
        anyhow::bail!("import.primary_language and import.translated_language must be set");
    }
    if config.import.primary_language == config.import.translated_language {
        anyhow::bail!("import.primary_language and import.translated_language must differ");
    }

    Ok(config)
}
