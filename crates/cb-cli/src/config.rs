use std::path::Path;

use cb_core::core::{Question, TextField};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub fields: Vec<TextField>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub guidelines: Option<String>,
    #[serde(default)]
    pub training: Option<TrainingConfig>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormatConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormatConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormatConfig {
    #[default]
    Json,
    Pretty,
}

/// Text-classification task assembled by `cb unify`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Field supplying the example text.
    pub text: String,
    /// Question whose unified responses become the label.
    pub label: String,
    /// Strategy tag; the question family's default when absent.
    #[serde(default)]
    pub strategy: Option<String>,
    /// Seed for majority tie-breaks. Unseeded runs are not reproducible.
    #[serde(default)]
    pub seed: Option<u64>,
}
