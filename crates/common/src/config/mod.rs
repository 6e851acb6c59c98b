//! Configuration management for SAMAY
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values
//!
//! Every section carries serde defaults, so an empty configuration is valid.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation (LLM) service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval policy
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer pipeline toggles
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Snapshot and source data locations
    #[serde(default)]
    pub data: DataConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints such as a local Ollama)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Generation provider: openai (any OpenAI-compatible chat endpoint)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (empty for local servers)
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// Where the retriever draws its candidate pool from
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidatePool {
    /// Score every passage in the corpus
    FullCorpus,
    /// Diversity-aware pool from max-marginal-relevance search
    Mmr {
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    },
}

impl Default for CandidatePool {
    fn default() -> Self {
        CandidatePool::FullCorpus
    }
}

impl CandidatePool {
    /// MMR pool with the parameters the chat front end used
    pub fn mmr() -> Self {
        CandidatePool::Mmr {
            k: 30,
            fetch_k: 50,
            lambda_mult: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Weight of the semantic score in fusion; lexical gets `1 - alpha`
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Candidates kept after fusion
    #[serde(default = "default_k_initial")]
    pub k_initial: usize,

    /// Candidates returned after re-ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default)]
    pub candidate_pool: CandidatePool,

    /// Keep only candidates sharing a word with the query
    #[serde(default = "default_enabled")]
    pub keyword_filter: bool,

    /// Minimum cosine similarity between query and candidate embeddings
    pub similarity_threshold: Option<f32>,

    /// Contract candidates through the relation graph when one is loaded
    #[serde(default = "default_enabled")]
    pub graph_contraction: bool,

    /// Hop cutoff for relation graph contraction
    #[serde(default = "default_graph_cutoff")]
    pub graph_cutoff: usize,

    #[serde(default)]
    pub rerank: RerankConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    /// Score each candidate with the generation service
    #[serde(default)]
    pub enabled: bool,

    /// Maximum in-flight scoring calls
    #[serde(default = "default_rerank_concurrency")]
    pub concurrency: usize,

    /// Per-call timeout in seconds; a timed out candidate scores 0
    #[serde(default = "default_rerank_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Ask the generation service whether the query is in domain
    #[serde(default = "default_enabled")]
    pub flag_check: bool,

    /// Rewrite the query before retrieval
    #[serde(default = "default_enabled")]
    pub rewrite_query: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Corpus snapshot (records + embeddings)
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// Relation graph snapshot; retrieval runs without graph contraction when absent
    #[serde(default = "default_graph_path")]
    pub graph_path: String,

    /// Verse rows consumed by the offline indexer
    #[serde(default = "default_source_path")]
    pub source_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 32 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_endpoint() -> String { "http://localhost:11434/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "llama3.2".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> usize { 1024 }
fn default_alpha() -> f32 { 0.3 }
fn default_k_initial() -> usize { 15 }
fn default_top_n() -> usize { 5 }
fn default_graph_cutoff() -> usize { 2 }
fn default_rerank_concurrency() -> usize { 4 }
fn default_rerank_timeout() -> u64 { 20 }
fn default_corpus_path() -> String { "data/corpus.json".to_string() }
fn default_graph_path() -> String { "data/graph.json".to_string() }
fn default_source_path() -> String { "data/verses.json".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "samay".to_string() }
fn default_enabled() -> bool { true }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            k_initial: default_k_initial(),
            top_n: default_top_n(),
            candidate_pool: CandidatePool::default(),
            keyword_filter: default_enabled(),
            similarity_threshold: None,
            graph_contraction: default_enabled(),
            graph_cutoff: default_graph_cutoff(),
            rerank: RerankConfig::default(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            concurrency: default_rerank_concurrency(),
            timeout_secs: default_rerank_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flag_check: default_enabled(),
            rewrite_query: default_enabled(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            graph_path: default_graph_path(),
            source_path: default_source_path(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            service_name: default_service_name(),
        }
    }
}

impl RetrievalConfig {
    /// Plain fused top-k: no filters, no graph, no re-ranking
    pub fn fused_only() -> Self {
        Self {
            keyword_filter: false,
            similarity_threshold: None,
            graph_contraction: false,
            rerank: RerankConfig::default(),
            ..Self::default()
        }
    }

    /// Reject parameter combinations the retriever cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::Message(format!(
                "retrieval.alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if self.k_initial == 0 {
            return Err(ConfigError::Message("retrieval.k_initial must be positive".into()));
        }
        if self.rerank.enabled && self.top_n == 0 {
            return Err(ConfigError::Message("retrieval.top_n must be positive".into()));
        }
        if self.rerank.concurrency == 0 {
            return Err(ConfigError::Message("retrieval.rerank.concurrency must be positive".into()));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Message(format!(
                    "retrieval.similarity_threshold must be a cosine in [-1, 1], got {}",
                    threshold
                )));
            }
        }
        if let CandidatePool::Mmr { k, fetch_k, lambda_mult } = self.candidate_pool {
            if k == 0 || fetch_k < k {
                return Err(ConfigError::Message(
                    "retrieval.candidate_pool requires 0 < k <= fetch_k".into(),
                ));
            }
            if !(0.0..=1.0).contains(&lambda_mult) {
                return Err(ConfigError::Message(
                    "retrieval.candidate_pool.lambda_mult must be within [0, 1]".into(),
                ));
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__ALPHA=0.5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.retrieval.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.retrieval.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.k_initial, 15);
        assert_eq!(config.retrieval.top_n, 5);
        assert!((config.retrieval.alpha - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.candidate_pool, CandidatePool::FullCorpus);
        assert!(!config.retrieval.rerank.enabled);
        assert!(config.pipeline.flag_check);
        assert_eq!(config.embedding.dimension, 384);
        assert!(config.retrieval.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
            [retrieval]
            alpha = 0.5
            similarity_threshold = 0.6

            [retrieval.candidate_pool]
            kind = "mmr"
            k = 30
            fetch_k = 50
            lambda_mult = 0.9

            [retrieval.rerank]
            enabled = true
        "#;

        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!((config.retrieval.alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.similarity_threshold, Some(0.6));
        assert_eq!(config.retrieval.candidate_pool, CandidatePool::mmr());
        assert!(config.retrieval.rerank.enabled);
        assert_eq!(config.retrieval.rerank.concurrency, 4);
        assert_eq!(config.retrieval.k_initial, 15);
        assert_eq!(config.llm.model, "llama3.2");
    }

    #[test]
    fn test_graph_contraction_can_be_switched_off() {
        assert!(RetrievalConfig::default().graph_contraction);

        let toml = r#"
            [retrieval]
            graph_contraction = false
            graph_cutoff = 3
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(!config.retrieval.graph_contraction);
        assert_eq!(config.retrieval.graph_cutoff, 3);
        assert!(config.retrieval.keyword_filter);
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let config = RetrievalConfig {
            alpha: 1.5,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_mmr_pool_rejected() {
        let config = RetrievalConfig {
            candidate_pool: CandidatePool::Mmr { k: 50, fetch_k: 10, lambda_mult: 0.5 },
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fused_only_disables_optional_steps() {
        let config = RetrievalConfig::fused_only();
        assert!(!config.keyword_filter);
        assert!(!config.graph_contraction);
        assert!(config.similarity_threshold.is_none());
        assert!(!config.rerank.enabled);
    }
}
