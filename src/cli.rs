//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{GeneratorKind, ValidatorKind};
use clap::Parser;
use std::path::PathBuf;

/// Painminer - mine recurring user pain points from the web
///
/// Generates search queries for a subject, scrapes what people say about it,
/// keeps the genuine complaints, and groups them into a report.
///
/// Examples:
///   painminer --subject "wireless earbuds"
///   painminer --subject "project management tools" --audience "developers"
///   painminer --subject "smart thermostats" --offline --format json
///   painminer --subject "note taking apps" --dry-run
///   painminer --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subject to mine for pain points
    ///
    /// Prompted for interactively when omitted.
    #[arg(short, long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Audience to focus queries on (e.g. "developers", "parents")
    #[arg(short, long, value_name = "TEXT")]
    pub audience: Option<String>,

    /// Feedback notes that steer query generation (comma-separated)
    ///
    /// Example: --feedback "battery life,bluetooth pairing"
    #[arg(long, value_name = "NOTES", value_delimiter = ',')]
    pub feedback: Option<Vec<String>>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .painminer.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of queries scraped concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Maximum number of search queries to generate
    #[arg(long, value_name = "COUNT")]
    pub max_queries: Option<usize>,

    /// Minimum validation score for a record to count (0.0 - 1.0)
    #[arg(long, value_name = "SCORE")]
    pub threshold: Option<f32>,

    /// Per-query scrape timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Query generation policy
    #[arg(long, value_name = "KIND")]
    pub generator: Option<GeneratorKind>,

    /// Validation policy
    #[arg(long, value_name = "KIND")]
    pub validator: Option<ValidatorKind>,

    /// Use deterministic sample content instead of the search API
    #[arg(long)]
    pub offline: bool,

    /// Ollama model used by the llm generator/validator
    #[arg(short, long, env = "PAINMINER_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Tavily search API key
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    pub tavily_api_key: Option<String>,

    /// Dry run: generate and print queries without scraping
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .painminer.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err("Threshold must be between 0.0 and 1.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_queries == Some(0) {
            return Err("Max queries must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
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
