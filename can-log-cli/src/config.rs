//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_log_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    pub definitions: Option<PathBuf>,
    /// Event code descriptions (`code;level;text;hide` lines)
    pub event_codes: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Signals to summarize by name (empty = all)
    #[serde(default)]
    pub signals: Vec<String>,
    /// Signals holding event words to list
    #[serde(default)]
    pub events: Vec<String>,
    pub resample_hz: Option<u16>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Check that everything needed for a run is present
    pub fn validate(&self) -> Result<()> {
        if self.input.definitions.is_none() {
            bail!("No signal definitions given (use --definitions or [input] definitions)");
        }
        if self.input.files.is_empty() {
            bail!("No log files given");
        }
        if self.output.resample_hz == Some(0) {
            bail!("Resample frequency must be at least 1 Hz");
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_log_engine::LoadDecision;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            files = ["front.clg", "rear.clg"]
            definitions = "signals.toml"

            [engine]
            load_decision = "align_and_merge"
            await_timeout_ms = 5000

            [output]
            signals = ["Speed", "Voltage"]
            resample_hz = 10
            format = "json"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.files.len(), 2);
        assert_eq!(config.engine.load_decision, LoadDecision::AlignAndMerge);
        assert!(config.engine.auto_populate);
        assert_eq!(config.output.resample_hz, Some(10));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_needs_inputs() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/app.toml")).unwrap_err();
        assert!(err.to_string().contains("app.toml"));
    }
}
