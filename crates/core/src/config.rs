//! Configuration management for datalens.
//!
//! This module handles loading and merging configuration from multiple sources,
//! lowest precedence first:
//! - Built-in defaults
//! - Config file (`datalens.yaml` or `DATALENS_CONFIG`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Encoder providers the store knows how to construct.
pub const KNOWN_ENCODERS: [&str; 2] = ["trigram", "ollama"];

/// Config file looked up in the current directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "datalens.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the persisted vector store snapshot
    pub store_dir: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Encoder used to embed documents and queries
    pub encoder: EncoderConfig,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Encoder selection and tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Base URL for HTTP encoders
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout for HTTP encoders
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of texts per encoder request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    EncoderConfig::default_model_for("trigram").to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    64
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    store: Option<StoreSection>,
    encoder: Option<EncoderConfig>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreSection {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./vector_db"),
            config_file: None,
            encoder: EncoderConfig::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `DATALENS_CONFIG`: Path to config file
    /// - `VECTOR_DB_PATH`: Store directory
    /// - `DATALENS_ENCODER`: Encoder provider
    /// - `DATALENS_ENCODER_MODEL`: Encoder model
    /// - `DATALENS_ENCODER_DIMENSIONS`: Embedding dimensions
    /// - `OLLAMA_URL`: Ollama base URL
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(std::env::var("DATALENS_CONFIG").ok().map(PathBuf::from))
    }

    /// Same as [`AppConfig::load`] with an explicit config file.
    ///
    /// An explicit file must exist; without one, `datalens.yaml` in the
    /// current directory is used when present.
    pub fn load_from(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self {
            config_file,
            ..Self::default()
        };

        let config_path = match config.config_file {
            Some(ref cf) => {
                if !cf.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        cf
                    )));
                }
                Some(cf.clone())
            }
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            }
        };

        if let Some(path) = config_path {
            config = config.merge_yaml(&path)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.config_file = Some(path.to_path_buf());

        if let Some(path) = config_file.store.and_then(|s| s.path) {
            result.store_dir = path;
        }

        if let Some(encoder) = config_file.encoder {
            result.encoder = encoder;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Environment variables override the config file.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(dir) = std::env::var("VECTOR_DB_PATH") {
            self.store_dir = PathBuf::from(dir);
        }

        if let Ok(provider) = std::env::var("DATALENS_ENCODER") {
            self.encoder.set_provider(provider);
        }

        if let Ok(model) = std::env::var("DATALENS_ENCODER_MODEL") {
            self.encoder.model = model;
        }

        if let Ok(dimensions) = std::env::var("DATALENS_ENCODER_DIMENSIONS") {
            self.encoder.dimensions = dimensions.parse().map_err(|_| {
                AppError::Config(format!(
                    "DATALENS_ENCODER_DIMENSIONS must be a positive integer, got '{}'",
                    dimensions
                ))
            })?;
        }

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.encoder.endpoint = url;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        store_dir: Option<PathBuf>,
        encoder: Option<String>,
        model: Option<String>,
        dimensions: Option<usize>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(store_dir) = store_dir {
            self.store_dir = store_dir;
        }

        if let Some(encoder) = encoder {
            self.encoder.set_provider(encoder);
        }

        if let Some(model) = model {
            self.encoder.model = model;
        }

        if let Some(dimensions) = dimensions {
            self.encoder.dimensions = dimensions;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate the final configuration before the store is opened.
    pub fn validate(&self) -> AppResult<()> {
        self.encoder.validate()
    }
}

impl EncoderConfig {
    /// Model used when a provider is selected without naming one.
    pub fn default_model_for(provider: &str) -> &'static str {
        match provider {
            "ollama" => "all-minilm",
            _ => "trigram-v1",
        }
    }

    /// Switch provider. A model still at the old provider's default follows
    /// the switch; an explicitly chosen model is kept.
    pub fn set_provider(&mut self, provider: String) {
        if provider != self.provider && self.model == Self::default_model_for(&self.provider) {
            self.model = Self::default_model_for(&provider).to_string();
        }
        self.provider = provider;
    }

    /// Reject configurations no encoder can honour.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_ENCODERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown encoder provider: {}. Supported: {}",
                self.provider,
                KNOWN_ENCODERS.join(", ")
            )));
        }

        if self.provider == "ollama" && self.model == Self::default_model_for("trigram") {
            return Err(AppError::Config(format!(
                "Model '{}' belongs to the trigram encoder; set encoder.model for ollama",
                self.model
            )));
        }

        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Encoder dimensions must be greater than zero".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Encoder batch_size must be greater than zero".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(AppError::Config(
                "Encoder timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store_dir, PathBuf::from("./vector_db"));
        assert_eq!(config.encoder.provider, "trigram");
        assert_eq!(config.encoder.dimensions, 384);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some(PathBuf::from("/tmp/vectors")),
            Some("ollama".to_string()),
            Some("all-minilm".to_string()),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.store_dir, PathBuf::from("/tmp/vectors"));
        assert_eq!(overridden.encoder.provider, "ollama");
        assert_eq!(overridden.encoder.model, "all-minilm");
        assert_eq!(overridden.encoder.dimensions, 384);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("datalens.yaml");
        std::fs::write(
            &path,
            r#"
store:
  path: /data/vectors
encoder:
  provider: ollama
  model: nomic-embed-text
  dimensions: 768
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.store_dir, PathBuf::from("/data/vectors"));
        assert_eq!(merged.encoder.provider, "ollama");
        assert_eq!(merged.encoder.dimensions, 768);
        // Unspecified encoder fields fall back to defaults
        assert_eq!(merged.encoder.batch_size, 64);
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(merged.config_file, Some(path));
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("datalens.yaml");
        std::fs::write(&path, "encoder: [1, 2").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.encoder.provider = "word2vec".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_dimensions() {
        let mut config = AppConfig::default();
        config.encoder.dimensions = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = AppConfig::load_from(Some(PathBuf::from("/nonexistent/datalens.yaml")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_provider_switch_follows_default_model() {
        let config = AppConfig::default().with_overrides(
            None,
            Some("ollama".to_string()),
            None,
            None,
            None,
            false,
            false,
        );
        assert_eq!(config.encoder.model, "all-minilm");
        assert!(config.validate().is_ok());

        let config = AppConfig::default().with_overrides(
            None,
            Some("ollama".to_string()),
            Some("nomic-embed-text".to_string()),
            Some(768),
            None,
            false,
            false,
        );
        assert_eq!(config.encoder.model, "nomic-embed-text");
    }

    #[test]
    fn test_validate_rejects_trigram_model_for_ollama() {
        let mut config = AppConfig::default();
        config.encoder.provider = "ollama".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trigram-v1"));
    }

    #[test]
    fn test_no_color_env_accepts_any_value() {
        std::env::set_var("NO_COLOR", "1");
        let config = AppConfig::load_from(None).unwrap();
        assert!(config.no_color);
    }
}
