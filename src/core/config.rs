//! Paths and typed application configuration.
//!
//! Configuration comes from `config.toml` in the data directory, with
//! environment overrides for the LLM endpoint and credentials. A missing
//! or empty LLM base URL is a fatal startup error; the server never binds
//! without a reachable upstream configured.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("helpdesk.db");
        let config_path = data_dir.join("config.toml");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            db_path,
            config_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("HELPDESK_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("Helpdesk");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("Helpdesk");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("helpdesk")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// LLM upstream settings (OpenAI-compatible HTTP API).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    /// Must match the vector store's configured width.
    pub embedding_dimension: usize,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            request_timeout_secs: 30,
        }
    }
}

/// Knobs for the retrieval pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Sentences carried over from the previous chunk.
    pub overlap_sentences: usize,
    /// Candidates fetched from the store before re-ranking.
    pub retrieval_top_k: usize,
    /// Raw similarity floor; deliberately low, the re-ranker recovers precision.
    pub similarity_threshold: f32,
    /// Candidates surfaced to the model and the caller.
    pub final_top_n: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    /// Chunks per store insert during ingestion.
    pub insert_batch_size: usize,
    /// Pause between embedding calls during ingestion (rate-limit courtesy).
    pub embed_delay_ms: u64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap_sentences: 3,
            retrieval_top_k: 8,
            similarity_threshold: 0.3,
            final_top_n: 5,
            vector_weight: 0.7,
            keyword_weight: 0.3,
            insert_batch_size: 50,
            embed_delay_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8787,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub rag: RagSettings,
    pub server: ServerSettings,
}

impl AppConfig {
    /// Loads `config.toml` if present, applies environment overrides and
    /// validates the result. Errors here abort startup.
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let mut config = Self::read_file(&paths.config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| ApiError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("HELPDESK_LLM_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.base_url = url;
            }
        }
        if let Ok(key) = env::var("HELPDESK_LLM_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(port) = env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ApiError::Config(
                "llm.base_url is not set (config.toml or HELPDESK_LLM_BASE_URL)".to_string(),
            ));
        }
        if self.llm.embedding_dimension == 0 {
            return Err(ApiError::Config(
                "llm.embedding_dimension must be positive".to_string(),
            ));
        }
        if self.rag.chunk_size == 0 {
            return Err(ApiError::Config("rag.chunk_size must be positive".to_string()));
        }
        if self.rag.final_top_n > self.rag.retrieval_top_k {
            return Err(ApiError::Config(
                "rag.final_top_n cannot exceed rag.retrieval_top_k".to_string(),
            ));
        }
        Ok(())
    }
}
