use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuorumError, Result};

/// Top-level configuration for the Quorum service.
///
/// Loaded from `~/.quorum/config.toml` by default. Secrets are usually left
/// empty in the file and supplied through the environment, see
/// [`QuorumConfig::apply_env_overrides`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuorumConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub call: CallConfig,
}

impl QuorumConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QuorumConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| QuorumError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GOOGLE_API_KEY") {
            self.generation.api_key = v;
        }
        if let Some(v) = get("QDRANT_URL") {
            self.retrieval.qdrant_url = v;
        }
        if let Some(v) = get("ACS_ENDPOINT") {
            self.call.acs_endpoint = v;
        }
        if let Some(v) = get("ACS_ACCESS_TOKEN") {
            self.call.acs_access_token = v;
        }
        if let Some(v) = get("BOT_CALLBACK_URL") {
            self.call.callback_url = v;
        }
        if let Some(v) = get("QUORUM_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid QUORUM_PORT"),
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Display name reported by the root endpoint.
    pub app_name: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Where uploaded documents are written before ingestion.
    pub upload_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: "Company RAG Agent".to_string(),
            log_level: "info".to_string(),
            upload_dir: "./data/uploads".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Largest accepted multipart upload.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API key for the model provider. Empty means generation is unavailable.
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Which vector store backs retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBackend {
    /// Process-local index, lost on restart.
    #[default]
    Memory,
    /// Qdrant over its REST API.
    Qdrant,
}

/// Vector store and embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    pub qdrant_url: String,
    pub collection: String,
    /// Number of chunks fetched per question.
    pub top_k: usize,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::Memory,
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "company_docs".to_string(),
            top_k: 5,
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dim: 768,
        }
    }
}

/// Document chunking and write batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunks per store call.
    pub batch_size: usize,
    /// Pause between store batches, in milliseconds.
    pub batch_pause_ms: u64,
    /// Attempts per batch before giving up.
    pub store_attempts: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 5,
            batch_pause_ms: 1000,
            store_attempts: 3,
        }
    }
}

/// Question-answering retry and memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub max_attempts: u32,
    /// Base delay unit: the pause after an empty answer and the first backoff step.
    pub retry_delay_ms: u64,
    /// Turns kept per conversation (two per exchange).
    pub history_turns: usize,
    /// Conversations kept in memory before the least recent is dropped.
    pub max_conversations: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            history_turns: 10,
            max_conversations: 1000,
        }
    }
}

/// Voice call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Call automation endpoint. Empty means call control is unavailable.
    pub acs_endpoint: String,
    pub acs_access_token: String,
    /// Public base URL the platform posts webhook events to.
    pub callback_url: String,
    pub bot_label: String,
    pub participant_label: String,
    /// Events retained per call.
    pub max_events: usize,
    /// Speak answers back into the call.
    pub speak_answers: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            acs_endpoint: String::new(),
            acs_access_token: String::new(),
            callback_url: String::new(),
            bot_label: "RAG Bot".to_string(),
            participant_label: "Participant".to_string(),
            max_events: 100,
            speak_answers: false,
        }
    }
}
