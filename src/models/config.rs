use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_REMOTE_EMBEDDING_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_CHUNK_SIZE: u32 = 500;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 100;
pub const DEFAULT_TOP_K: u32 = 3;

const CONFIG_ENV: &str = "RAGCHAT_CONFIG";
const APP_DIR: &str = "ragchat";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Config file location, `RAGCHAT_CONFIG` wins over the platform config dir.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    /// Base directory for uploads, the vector index and local models.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
    }

    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if let Some(score) = self.retrieval.min_score
            && !(0.0..=1.0).contains(&score)
        {
            return Err(ConfigError::ValidationError(
                "retrieval.min_score must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.storage.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.extensions must not be empty".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the upload and index directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.storage.upload_dir)?;
        std::fs::create_dir_all(&self.storage.index_dir)?;
        Ok(())
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.storage.index_dir.join("index.sqlite3")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_true")]
    pub ingest_on_upload: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            ingest_on_upload: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// File extensions accepted for upload and ingestion, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_upload_dir() -> PathBuf {
    Config::data_dir().join("uploads")
}

fn default_index_dir() -> PathBuf {
    Config::data_dir().join("vector_db")
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string()]
}

impl StorageConfig {
    pub fn is_allowed(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            index_dir: default_index_dir(),
            extensions: default_extensions(),
        }
    }
}

/// Where embeddings are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// ONNX model loaded into the process
    #[default]
    Local,
    /// Hosted feature-extraction endpoint
    Remote,
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingProvider::Local => write!(f, "local"),
            EmbeddingProvider::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub model_id: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    /// Directory holding `model.onnx` and `tokenizer.json` for the local provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_remote_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_token_env")]
    pub api_token_env: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_tokens() -> u32 {
    256
}

fn default_remote_embedding_url() -> String {
    DEFAULT_REMOTE_EMBEDDING_URL.to_string()
}

fn default_embedding_token_env() -> String {
    "HF_API_TOKEN".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    32
}

impl EmbeddingConfig {
    /// Resolved model directory for the local provider.
    pub fn model_dir(&self) -> PathBuf {
        self.model_path.clone().unwrap_or_else(|| {
            Config::data_dir()
                .join("models")
                .join(model_dir_name(&self.model_id))
        })
    }
}

/// `sentence-transformers/all-MiniLM-L6-v2` becomes `all-MiniLM-L6-v2`.
fn model_dir_name(model_id: &str) -> String {
    model_id.rsplit('/').next().unwrap_or(model_id).to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model_id: default_embedding_model(),
            dimension: default_embedding_dimension(),
            model_path: None,
            max_tokens: default_max_tokens(),
            url: default_remote_embedding_url(),
            api_token_env: default_embedding_token_env(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// Embedded SQLite file under `storage.index_dir`
    #[default]
    Sqlite,
    /// PostgreSQL with the pgvector extension
    #[serde(alias = "postgresql")]
    Postgres,
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorDriver::Sqlite => write!(f, "sqlite"),
            VectorDriver::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    /// Connection string for the Postgres driver. Falls back to `url_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_database_url_env")]
    pub url_env: String,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::Sqlite,
            url: None,
            url_env: default_database_url_env(),
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> u32 {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_temperature", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Omit `temperature` from requests and let the provider choose.
    #[serde(default)]
    pub use_provider_temperature: bool,

    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.to_string()
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.2)
}

impl CompletionConfig {
    /// Temperature to send, `None` when the provider default applies.
    pub fn effective_temperature(&self) -> Option<f32> {
        if self.use_provider_temperature {
            None
        } else {
            self.temperature
        }
    }
}

fn default_completion_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_completion_timeout() -> u64 {
    60
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_url(),
            model: default_completion_model(),
            temperature: default_temperature(),
            use_provider_temperature: false,
            api_key_env: default_completion_key_env(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "ragchat=info,tower_http=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Credentials read from the environment, never from the config file.
#[derive(Clone, Default)]
pub struct Secrets {
    pub completion_api_key: Option<String>,
    pub embedding_api_token: Option<String>,
    pub database_url: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("completion_api_key", &self.completion_api_key.as_ref().map(|_| "***"))
            .field("embedding_api_token", &self.embedding_api_token.as_ref().map(|_| "***"))
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    pub fn from_env(config: &Config) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(config: &Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            completion_api_key: read(&config.completion.api_key_env),
            embedding_api_token: read(&config.embedding.api_token_env),
            database_url: config
                .vector_store
                .url
                .clone()
                .or_else(|| read(&config.vector_store.url_env)),
        }
    }

    pub fn require_completion_key(&self, config: &Config) -> Result<&str, ConfigError> {
        self.completion_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv(config.completion.api_key_env.clone()))
    }

    pub fn require_database_url(&self, config: &Config) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv(config.vector_store.url_env.clone()))
    }
}
