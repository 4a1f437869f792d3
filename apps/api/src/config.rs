use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid constraint, budget or provider configuration. Always raised before any provider call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Chunker parameters. Both values count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "must be at least 1"));
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::invalid(
                "overlap",
                format!(
                    "must be smaller than chunk_size ({} >= {})",
                    self.overlap, self.chunk_size
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Matches fetched from the index per query.
    pub k: usize,
    /// Minimum cosine similarity a match must reach to enter the context.
    pub threshold: f32,
    /// Maximum total characters of chunk text assembled into one context.
    pub context_budget: usize,
    /// Same-source spans overlapping by more than this share of the shorter span are near-duplicates.
    pub dedup_overlap_ratio: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 10,
            threshold: 0.3,
            context_budget: 8000,
            dedup_overlap_ratio: 0.5,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::invalid("k", "must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::invalid(
                "threshold",
                format!("must lie in [-1, 1], got {}", self.threshold),
            ));
        }
        if self.context_budget == 0 {
            return Err(ConfigError::invalid("context_budget", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.dedup_overlap_ratio) {
            return Err(ConfigError::invalid(
                "dedup_overlap_ratio",
                format!("must lie in [0, 1], got {}", self.dedup_overlap_ratio),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Sampling temperature sent with every generation call. Kept low and fixed.
    pub temperature: f32,
    /// Default attempt budget for the retry controller.
    pub max_retries: u32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_retries: 3,
            max_tokens: 2000,
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_max_retries(self.max_retries)?;
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("must lie in [0, 1], got {}", self.temperature),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid("max_tokens", "must be at least 1"));
        }
        Ok(())
    }
}

pub fn validate_max_retries(max_retries: u32) -> Result<(), ConfigError> {
    if max_retries < 1 {
        return Err(ConfigError::invalid("max_retries", "must be at least 1"));
    }
    Ok(())
}

/// The pipeline configuration object. Built once at startup and passed by reference.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.generation.validate()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    /// Upper bound on every single provider call (embedding or generation).
    pub provider_timeout: Duration,
    pub embed_batch_size: usize,
    pub settings: Settings,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Settings::default();
        let settings = Settings {
            chunking: ChunkingSettings {
                chunk_size: env_or("CHUNK_SIZE", defaults.chunking.chunk_size)?,
                overlap: env_or("CHUNK_OVERLAP", defaults.chunking.overlap)?,
            },
            retrieval: RetrievalSettings {
                k: env_or("RETRIEVAL_K", defaults.retrieval.k)?,
                threshold: env_or("SCORE_THRESHOLD", defaults.retrieval.threshold)?,
                context_budget: env_or("CONTEXT_BUDGET", defaults.retrieval.context_budget)?,
                dedup_overlap_ratio: defaults.retrieval.dedup_overlap_ratio,
            },
            generation: GenerationSettings {
                temperature: env_or("GENERATION_TEMPERATURE", defaults.generation.temperature)?,
                max_retries: env_or("MAX_RETRIES", defaults.generation.max_retries)?,
                max_tokens: defaults.generation.max_tokens,
            },
        };
        settings.validate()?;

        let embed_batch_size = env_or("EMBED_BATCH_SIZE", 64usize)?;
        if embed_batch_size == 0 {
            return Err(ConfigError::invalid("embed_batch_size", "must be at least 1").into());
        }

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            generation_model: std::env::var("GENERATION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            provider_timeout: Duration::from_secs(env_or("PROVIDER_TIMEOUT_SECS", 60u64)?),
            embed_batch_size,
            settings,
            port: env_or("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let chunking = ChunkingSettings {
            chunk_size: 100,
            overlap: 100,
        };
        let err = chunking.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let chunking = ChunkingSettings {
            chunk_size: 0,
            overlap: 0,
        };
        assert!(chunking.validate().is_err());
    }

    #[test]
    fn test_max_retries_below_one_rejected() {
        assert!(validate_max_retries(0).is_err());
        assert!(validate_max_retries(1).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let retrieval = RetrievalSettings {
            threshold: 1.5,
            ..RetrievalSettings::default()
        };
        assert!(retrieval.validate().is_err());
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let generation = GenerationSettings {
            temperature: 1.7,
            ..GenerationSettings::default()
        };
        assert!(generation.validate().is_err());
    }
}
