//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.adsight.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Data source settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// LLM settings for the insights stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Skip the model call and use the deterministic fallback report.
    #[serde(default)]
    pub mock_mode: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            mock_mode: false,
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_timeout() -> u64 {
    300
}

/// Dataset locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory containing the advertising report exports.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sponsored Display advertised-product report file name.
    #[serde(default = "default_sd_file")]
    pub sponsored_display_file: String,

    /// Sponsored Brands search-term report file name.
    #[serde(default = "default_sb_file")]
    pub sponsored_brands_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sponsored_display_file: default_sd_file(),
            sponsored_brands_file: default_sb_file(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_sd_file() -> String {
    "sd_advertised_product.csv".to_string()
}

fn default_sb_file() -> String {
    "sb_search_term.csv".to_string()
}

/// Output and slicing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Result-count cap applied to every top/bottom slice.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Path the metrics bundle JSON is written to.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            output: default_output(),
        }
    }
}

fn default_top_n() -> usize {
    5
}

fn default_output() -> PathBuf {
    PathBuf::from("metrics_output.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".adsight.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; optional
    /// arguments only override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Model settings - always override since they have defaults in CLI
        self.model.name = args.model.clone();
        self.model.ollama_url = args.ollama_url.clone();
        self.model.temperature = args.temperature;

        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if args.mock {
            self.model.mock_mode = true;
        }

        if let Some(ref data_dir) = args.data_dir {
            self.data.data_dir = data_dir.clone();
        }
        if let Some(ref output) = args.output {
            self.report.output = output.clone();
        }
        if let Some(top_n) = args.top_n {
            self.report.top_n = top_n;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.model.timeout_seconds, 300);
        assert_eq!(config.data.data_dir, PathBuf::from("data"));
        assert_eq!(config.report.top_n, 5);
        assert!(!config.model.mock_mode);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[model]
name = "qwen2.5:14b"
temperature = 0.2
mock_mode = true

[data]
data_dir = "exports"

[report]
top_n = 10
output = "bundle.json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.model.name, "qwen2.5:14b");
        assert_eq!(config.model.temperature, 0.2);
        assert!(config.model.mock_mode);
        assert_eq!(config.data.data_dir, PathBuf::from("exports"));
        // Unset fields keep their defaults.
        assert_eq!(config.data.sponsored_display_file, "sd_advertised_product.csv");
        assert_eq!(config.report.top_n, 10);
        assert_eq!(config.report.output, PathBuf::from("bundle.json"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[data]"));
        assert!(toml_str.contains("[report]"));
    }

    #[test]
    fn test_merge_prefers_explicit_args() {
        let mut config = Config::default();
        let args = crate::cli::Args {
            request: "test".to_string(),
            start_date: None,
            end_date: None,
            data_dir: Some(PathBuf::from("exports")),
            output: None,
            top_n: Some(3),
            model: "mistral:7b".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            timeout: Some(60),
            mock: true,
            config: None,
            init_config: false,
            verbose: false,
            quiet: false,
        };

        config.merge_with_args(&args);
        assert_eq!(config.model.name, "mistral:7b");
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.model.timeout_seconds, 60);
        assert!(config.model.mock_mode);
        assert_eq!(config.data.data_dir, PathBuf::from("exports"));
        // Output not given on the CLI, keeps the config default.
        assert_eq!(config.report.output, PathBuf::from("metrics_output.json"));
        assert_eq!(config.report.top_n, 3);
    }
}
