//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// AdSight - Amazon Ads performance analyzer
///
/// Aggregate Sponsored Display and Sponsored Brands report exports into a
/// deterministic metrics bundle, then generate structured insights with a
/// local model. Built in Rust.
///
/// Examples:
///   adsight --request "How did my campaigns perform last month?"
///   adsight --data-dir ./exports --start-date 2025-06-01 --end-date 2025-06-30
///   adsight --mock --output bundle.json
///   adsight --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Analysis request to answer
    ///
    /// Free-form text carried in the workflow state for the duration of
    /// the run.
    #[arg(
        short,
        long,
        default_value = "Analyze my ad performance and recommend optimizations.",
        value_name = "TEXT"
    )]
    pub request: String,

    /// Start of the reporting window (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<String>,

    /// End of the reporting window (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<String>,

    /// Directory containing the report exports
    ///
    /// Overrides the [data] section of .adsight.toml when given.
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output file path for the metrics bundle JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Number of entries kept in every top/bottom metric slice
    #[arg(long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Ollama model to use for the insights stage
    ///
    /// Can also be set via ADSIGHT_MODEL env var or .adsight.toml config.
    #[arg(short, long, default_value = "llama3.2:latest", env = "ADSIGHT_MODEL")]
    pub model: String,

    /// Ollama API endpoint URL
    #[arg(long, default_value = "http://localhost:11434", env = "OLLAMA_URL")]
    pub ollama_url: String,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.4")]
    pub temperature: f32,

    /// Request timeout in seconds
    ///
    /// How long to wait for the model to respond. Default: from config or 300s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run without calling the model
    ///
    /// The insights stage emits a deterministic fallback report built
    /// directly from the metrics bundle.
    #[arg(long)]
    pub mock: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .adsight.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Generate a default .adsight.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let start = self.parsed_start_date()?;
        let end = self.parsed_end_date()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(format!(
                    "Start date {start} is after end date {end}"
                ));
            }
        }

        // Validate Ollama URL format (not needed in mock mode)
        if !self.mock {
            if !self.ollama_url.starts_with("http://") && !self.ollama_url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        if let Some(top_n) = self.top_n {
            if top_n == 0 {
                return Err("Top N must be at least 1".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the parsed start date, if one was given.
    pub fn parsed_start_date(&self) -> Result<Option<NaiveDate>, String> {
        parse_date_arg(self.start_date.as_deref(), "start date")
    }

    /// Returns the parsed end date, if one was given.
    pub fn parsed_end_date(&self) -> Result<Option<NaiveDate>, String> {
        parse_date_arg(self.end_date.as_deref(), "end date")
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn parse_date_arg(raw: Option<&str>, label: &str) -> Result<Option<NaiveDate>, String> {
    match raw {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("Invalid {label} '{s}': expected YYYY-MM-DD")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            request: "Analyze my ad performance.".to_string(),
            start_date: None,
            end_date: None,
            data_dir: None,
            output: None,
            top_n: None,
            model: "llama3.2:latest".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            temperature: 0.4,
            timeout: None,
            mock: false,
            config: None,
            init_config: false,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_default_args_validate() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.ollama_url = "localhost:11434".to_string();
        assert!(args.validate().is_err());

        // Mock mode never touches the endpoint.
        args.mock = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_dates() {
        let mut args = make_args();
        args.start_date = Some("2025-06-01".to_string());
        args.end_date = Some("2025-06-30".to_string());
        assert!(args.validate().is_ok());
        assert_eq!(
            args.parsed_start_date().unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );

        args.end_date = Some("2025-05-01".to_string());
        assert!(args.validate().is_err());

        args.end_date = Some("not-a-date".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_temperature_range() {
        let mut args = make_args();
        args.temperature = 1.5;
        assert!(args.validate().is_err());

        args.temperature = 0.0;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
