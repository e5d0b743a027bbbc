//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion-service configuration
    #[serde(default)]
    pub llm: LlmSettings,

    /// RAG pipeline configuration
    #[serde(default)]
    pub rag: RagConfig,

    /// Identity-service configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Vector index configuration
    #[serde(default)]
    pub qdrant: QdrantConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Allowed CORS origins; empty means localhost-only
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_seconds: default_timeout_seconds(),
            cors_origins: Vec::new(),
            log_json: false,
            log_level: default_log_level(),
        }
    }
}

/// Completion-service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Model name/ID
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// OpenAI-compatible API endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (optional; also read from WEEKLOG__LLM__API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_model() -> String {
    "gpt-4".to_string()
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_max_tokens() -> usize {
    500
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            endpoint: default_llm_endpoint(),
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_seconds: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,
}

fn default_qdrant_endpoint() -> String {
    "http://localhost:6334".to_string()
}

fn default_vector_dim() -> usize {
    384
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            api_key: None,
            vector_dim: default_vector_dim(),
        }
    }
}

/// Identity-service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity service base URL; when unset, the static dev verifier
    /// is used
    #[serde(default)]
    pub identity_endpoint: Option<String>,

    #[serde(default = "default_auth_timeout")]
    pub timeout_seconds: u64,
}

fn default_auth_timeout() -> u64 {
    5
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_endpoint: None,
            timeout_seconds: default_auth_timeout(),
        }
    }
}

/// RAG pipeline configuration.
///
/// Loaded once at startup and shared read-only across all request
/// flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Retrieval fan-out (top-k)
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    /// Temperature for classification calls
    #[serde(default = "default_classification_temperature")]
    pub classification_temperature: f32,

    /// Temperature for generation calls
    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    /// Minimum question length (chars after trimming)
    #[serde(default = "default_min_question_length")]
    pub min_question_length: usize,

    /// Maximum question length (chars after trimming)
    #[serde(default = "default_max_question_length")]
    pub max_question_length: usize,

    /// Retained for config compatibility; the classifier makes a single
    /// attempt and no retry loop reads this value
    #[serde(default = "default_classification_retries")]
    pub classification_retries: u32,

    /// Pipeline/vector-store cache TTL in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Inter-fragment delay in streaming mode, milliseconds
    #[serde(default = "default_streaming_delay_ms")]
    pub streaming_delay_ms: u64,

    /// Maximum concurrent streaming requests
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,

    /// Re-execute an unfiltered search when the filtered search returns
    /// nothing
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,

    /// Prompt template for question classification
    #[serde(default = "default_classification_prompt")]
    pub classification_prompt: String,

    /// Prompt template for answer generation
    #[serde(default = "default_generation_prompt")]
    pub generation_prompt: String,
}

fn default_retrieval_k() -> usize {
    8
}

fn default_classification_temperature() -> f32 {
    0.0
}

fn default_generation_temperature() -> f32 {
    0.1
}

fn default_min_question_length() -> usize {
    8
}

fn default_max_question_length() -> usize {
    350
}

fn default_classification_retries() -> u32 {
    2
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_streaming_delay_ms() -> u64 {
    100
}

fn default_max_concurrent_streams() -> usize {
    10
}

fn default_allow_fallback() -> bool {
    true
}

fn default_classification_prompt() -> String {
    r#"Classify the following user question into one or more of these categories: work, health, personal, reflection

Guidelines:
- work: Job tasks, meetings, deadlines, career, professional development
- health: Exercise, nutrition, medical, fitness, sports, wellness
- personal: Family, friends, home, hobbies, social activities, daily tasks
- reflection: Emotions, thoughts, self-analysis, mood, feelings, introspection

Respond with ONLY a JSON array of category names, e.g. ["work"] or ["health", "reflection"]."#
        .to_string()
}

fn default_generation_prompt() -> String {
    r#"You are an intelligent personal assistant helping a user with questions about their life, work, health, and personal goals.

The context below comes from the user's personal documents, tagged with file types:
- work: Professional tasks, meetings, career-related content
- health: Fitness, nutrition, medical information, wellness
- personal: Family, friends, hobbies, daily life, social activities
- reflection: Thoughts, emotions, self-analysis, mood tracking

If no relevant context is found, politely explain that you don't have enough information in their personal knowledge base to answer the question, and suggest they might want to add more relevant documents.

Context:
{context}

Recent conversation:
{chat_history}

Please provide a helpful, personalized answer based on the context above. If the context is insufficient, be honest about the limitations."#
        .to_string()
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval_k: default_retrieval_k(),
            classification_temperature: default_classification_temperature(),
            generation_temperature: default_generation_temperature(),
            min_question_length: default_min_question_length(),
            max_question_length: default_max_question_length(),
            classification_retries: default_classification_retries(),
            cache_ttl_secs: default_cache_ttl_secs(),
            streaming_delay_ms: default_streaming_delay_ms(),
            max_concurrent_streams: default_max_concurrent_streams(),
            allow_fallback: default_allow_fallback(),
            classification_prompt: default_classification_prompt(),
            generation_prompt: default_generation_prompt(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_rag()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.retrieval_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.retrieval_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        for (field, value) in [
            ("rag.classification_temperature", rag.classification_temperature),
            ("rag.generation_temperature", rag.generation_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 2.0, got {}", value),
                });
            }
        }

        if rag.min_question_length == 0 || rag.min_question_length >= rag.max_question_length {
            return Err(ConfigError::InvalidValue {
                field: "rag.min_question_length".to_string(),
                message: format!(
                    "Must be positive and below max_question_length ({})",
                    rag.max_question_length
                ),
            });
        }

        if rag.max_concurrent_streams == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.max_concurrent_streams".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if rag.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.cache_ttl_secs".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        for (field, template) in [
            ("rag.classification_prompt", &rag.classification_prompt),
            ("rag.generation_prompt", &rag.generation_prompt),
        ] {
            if template.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Prompt template cannot be empty".to_string(),
                });
            }
        }

        if !rag.generation_prompt.contains("{context}") {
            return Err(ConfigError::InvalidValue {
                field: "rag.generation_prompt".to_string(),
                message: "Template must contain the {context} placeholder".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment.
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = Path::new("config/default.yaml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    if let Some(env_name) = env {
        let env_path = format!("config/{}.yaml", env_name);
        if Path::new(&env_path).exists() {
            builder = builder.add_source(File::with_name(&env_path));
        } else {
            tracing::warn!(path = %env_path, "Environment config file not found, skipping");
        }
    }

    let config = builder
        .add_source(Environment::with_prefix("WEEKLOG").separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}
