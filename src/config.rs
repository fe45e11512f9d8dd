use crate::constants;
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub page_size: u64,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub requests_per_min: Option<u64>,
    /// Socrata application token; normally supplied through the environment
    pub app_token: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_SOURCE_URL.to_string(),
            page_size: constants::DEFAULT_PAGE_SIZE,
            timeout_seconds: 120,
            max_retries: 4,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            requests_per_min: None,
            app_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub oltp_path: PathBuf,
    pub olap_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            oltp_path: PathBuf::from(constants::DEFAULT_OLTP_PATH),
            olap_path: PathBuf::from(constants::DEFAULT_OLAP_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory if present, then apply
    /// environment overrides. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                PipelineError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml(&config_content)?
        } else {
            Config::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = env::var(constants::ENV_OLTP_DB) {
            if !path.trim().is_empty() {
                self.database.oltp_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = env::var(constants::ENV_OLAP_DB) {
            if !path.trim().is_empty() {
                self.database.olap_path = PathBuf::from(path);
            }
        }
        if let Ok(token) = env::var(constants::ENV_APP_TOKEN) {
            if !token.trim().is_empty() {
                self.source.app_token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.page_size == 0 {
            return Err(PipelineError::Config("source.page_size must be positive".to_string()));
        }
        if self.source.url.trim().is_empty() {
            return Err(PipelineError::Config("source.url must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [source]
            page_size = 2000
            max_retries = 2

            [export]
            output_dir = "/tmp/reports"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.page_size, 2000);
        assert_eq!(config.source.max_retries, 2);
        assert_eq!(config.source.url, constants::DEFAULT_SOURCE_URL);
        assert_eq!(config.database.oltp_path, PathBuf::from(constants::DEFAULT_OLTP_PATH));
        assert_eq!(config.export.output_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let config = Config::from_toml("[source]\npage_size = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.source.page_size, constants::DEFAULT_PAGE_SIZE);
    }
}
