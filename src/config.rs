use std::env;

use clap::ValueEnum;

use crate::error::ConfigError;
use crate::rag::splitter::LanguageProfile;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub embedding_api_key: String,
    pub embedding_base_url: Option<String>,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub http_timeout_ms: u64,
    pub indexing: IndexingConfig,
    pub shallow_clone: bool,
}

/// Settings that shape the knowledge base; needed even without credentials
/// for the offline `tree`/`chunks` commands.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub splitter_language: LanguageProfile,
    pub top_k: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            splitter_language: LanguageProfile::Python,
            top_k: 4,
        }
    }
}

impl AppConfig {
    const EMBEDDING_KEY_VARS: [&'static str; 2] = ["OPENAI_API_KEY", "REPO_BUDDY_EMBEDDING_API_KEY"];
    const EMBEDDING_BASE_URL_VARS: [&'static str; 2] =
        ["REPO_BUDDY_EMBEDDING_BASE_URL", "OPENAI_BASE_URL"];
    const EMBEDDING_MODEL_VARS: [&'static str; 1] = ["REPO_BUDDY_EMBEDDING_MODEL"];
    const EMBEDDING_BATCH_VARS: [&'static str; 1] = ["REPO_BUDDY_EMBEDDING_BATCH_SIZE"];
    const LLM_KEY_VARS: [&'static str; 2] = ["OPENROUTER_API_KEY", "REPO_BUDDY_LLM_API_KEY"];
    const LLM_BASE_URL_VARS: [&'static str; 2] = ["OPENROUTER_BASE_URL", "REPO_BUDDY_LLM_BASE_URL"];
    const LLM_MODEL_VARS: [&'static str; 1] = ["REPO_BUDDY_LLM_MODEL"];
    const LLM_TEMPERATURE_VARS: [&'static str; 1] = ["REPO_BUDDY_LLM_TEMPERATURE"];
    const TIMEOUT_VARS: [&'static str; 1] = ["REPO_BUDDY_HTTP_TIMEOUT_MS"];
    const SHALLOW_VARS: [&'static str; 1] = ["REPO_BUDDY_SHALLOW_CLONE"];

    pub const DEFAULT_LLM_BASE_URL: &'static str = "https://openrouter.ai/api/v1";
    pub const DEFAULT_LLM_MODEL: &'static str = "anthropic/claude-3.5-sonnet";
    pub const DEFAULT_EMBEDDING_MODEL: &'static str = "text-embedding-3-small";
    pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 200;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves every setting through `lookup`; both API keys are checked
    /// before anything else so the caller can refuse to start early.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |candidates: &[&'static str]| read_first(&lookup, candidates);

        let embedding_api_key = read(&Self::EMBEDDING_KEY_VARS);
        let llm_api_key = read(&Self::LLM_KEY_VARS);

        let mut missing = Vec::new();
        if embedding_api_key.is_none() {
            missing.push(Self::EMBEDDING_KEY_VARS[0]);
        }
        if llm_api_key.is_none() {
            missing.push(Self::LLM_KEY_VARS[0]);
        }
        let (Some(embedding_api_key), Some(llm_api_key)) = (embedding_api_key, llm_api_key) else {
            return Err(ConfigError::MissingCredentials(missing));
        };

        Ok(Self {
            embedding_api_key,
            embedding_base_url: read(&Self::EMBEDDING_BASE_URL_VARS),
            embedding_model: read(&Self::EMBEDDING_MODEL_VARS)
                .unwrap_or_else(|| Self::DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_batch_size: read(&Self::EMBEDDING_BATCH_VARS)
                .and_then(|value| value.parse().ok())
                .filter(|size: &usize| *size > 0)
                .unwrap_or(Self::DEFAULT_EMBEDDING_BATCH_SIZE),
            llm_api_key,
            llm_base_url: read(&Self::LLM_BASE_URL_VARS)
                .unwrap_or_else(|| Self::DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: read(&Self::LLM_MODEL_VARS)
                .unwrap_or_else(|| Self::DEFAULT_LLM_MODEL.to_string()),
            llm_temperature: read(&Self::LLM_TEMPERATURE_VARS)
                .and_then(|value| value.parse().ok())
                .unwrap_or(0.1),
            http_timeout_ms: read(&Self::TIMEOUT_VARS)
                .and_then(|value| value.parse().ok())
                .unwrap_or(120_000),
            indexing: IndexingConfig::from_lookup(&lookup),
            shallow_clone: read(&Self::SHALLOW_VARS)
                .map(|value| parse_flag(&value))
                .unwrap_or(true),
        })
    }
}

impl IndexingConfig {
    const CHUNK_SIZE_VARS: [&'static str; 1] = ["REPO_BUDDY_CHUNK_SIZE"];
    const CHUNK_OVERLAP_VARS: [&'static str; 1] = ["REPO_BUDDY_CHUNK_OVERLAP"];
    const LANGUAGE_VARS: [&'static str; 1] = ["REPO_BUDDY_SPLITTER_LANGUAGE"];
    const TOP_K_VARS: [&'static str; 1] = ["REPO_BUDDY_TOP_K"];

    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |candidates: &[&'static str]| read_first(lookup, candidates);

        let chunk_size = read(&Self::CHUNK_SIZE_VARS)
            .and_then(|value| value.parse().ok())
            .filter(|size: &usize| *size > 0)
            .unwrap_or(defaults.chunk_size);
        let chunk_overlap = read(&Self::CHUNK_OVERLAP_VARS)
            .and_then(|value| value.parse().ok())
            .filter(|overlap: &usize| *overlap < chunk_size)
            .unwrap_or_else(|| defaults.chunk_overlap.min(chunk_size / 2));
        let splitter_language = read(&Self::LANGUAGE_VARS)
            .and_then(|value| LanguageProfile::from_str(&value, true).ok())
            .unwrap_or(defaults.splitter_language);
        let top_k = read(&Self::TOP_K_VARS)
            .and_then(|value| value.parse().ok())
            .filter(|k: &usize| *k > 0)
            .unwrap_or(defaults.top_k);

        Self {
            chunk_size,
            chunk_overlap,
            splitter_language,
            top_k,
        }
    }
}

fn read_first(
    lookup: &impl Fn(&str) -> Option<String>,
    candidates: &[&'static str],
) -> Option<String> {
    candidates
        .iter()
        .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_keys_are_reported_together() {
        let err = AppConfig::from_lookup(lookup_from(&[])).expect_err("keys are required");
        let ConfigError::MissingCredentials(keys) = err;
        assert_eq!(keys, vec!["OPENAI_API_KEY", "OPENROUTER_API_KEY"]);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENROUTER_API_KEY", "  "),
        ]))
        .expect_err("blank key");
        let ConfigError::MissingCredentials(keys) = err;
        assert_eq!(keys, vec!["OPENROUTER_API_KEY"]);
    }

    #[test]
    fn defaults_apply_when_only_keys_are_set() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-embed"),
            ("OPENROUTER_API_KEY", "sk-route"),
        ]))
        .expect("config");

        assert_eq!(config.llm_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.llm_model, "anthropic/claude-3.5-sonnet");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.embedding_batch_size, 200);
        assert_eq!(config.indexing, IndexingConfig::default());
        assert!(config.shallow_clone);
        assert!(config.embedding_base_url.is_none());
    }

    #[test]
    fn overrides_are_parsed_and_invalid_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("REPO_BUDDY_EMBEDDING_API_KEY", "sk-embed"),
            ("REPO_BUDDY_LLM_API_KEY", "sk-route"),
            ("REPO_BUDDY_LLM_BASE_URL", "http://localhost:8080/v1"),
            ("REPO_BUDDY_EMBEDDING_BATCH_SIZE", "0"),
            ("REPO_BUDDY_CHUNK_SIZE", "500"),
            ("REPO_BUDDY_CHUNK_OVERLAP", "900"),
            ("REPO_BUDDY_SPLITTER_LANGUAGE", "Rust"),
            ("REPO_BUDDY_TOP_K", "abc"),
            ("REPO_BUDDY_SHALLOW_CLONE", "false"),
        ]))
        .expect("config");

        assert_eq!(config.llm_base_url, "http://localhost:8080/v1");
        assert_eq!(config.embedding_batch_size, 200);
        assert_eq!(config.indexing.chunk_size, 500);
        assert_eq!(config.indexing.chunk_overlap, 200);
        assert_eq!(config.indexing.splitter_language, LanguageProfile::Rust);
        assert_eq!(config.indexing.top_k, 4);
        assert!(!config.shallow_clone);
    }
}
