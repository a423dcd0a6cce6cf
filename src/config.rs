//! Configuration file handling.
//!
//! This module handles loading, merging, and validating configuration from
//! `.painminer.toml` files. Every field has a default, so an empty file (or
//! no file at all) is a valid configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".painminer.toml";

/// Upper bound on search retries; backoff doubles on each one.
const MAX_RETRIES: usize = 10;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Query generation settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Scraper settings.
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Analyzer (validation) settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Language model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of queries scraped concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "pain_points_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// How search queries are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Strategy templates, no external calls
    #[default]
    Template,
    /// Ask the language model
    Llm,
}

/// Query generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Generation policy.
    #[serde(default)]
    pub kind: GeneratorKind,

    /// Maximum number of queries per subject.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Audience the queries should focus on (e.g. "users", "developers").
    #[serde(default)]
    pub target_audience: Option<String>,

    /// Feedback notes that bias generation toward specific topics.
    #[serde(default)]
    pub feedback: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::default(),
            max_queries: default_max_queries(),
            target_audience: None,
            feedback: Vec::new(),
        }
    }
}

fn default_max_queries() -> usize {
    20
}

/// Where scraped content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScraperBackend {
    /// Tavily web search API
    #[default]
    Tavily,
    /// Deterministic sample content, no network
    Offline,
}

/// Scraper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Content backend.
    #[serde(default)]
    pub backend: ScraperBackend,

    /// Search API base URL.
    #[serde(default = "default_search_url")]
    pub api_url: String,

    /// Search API key. Usually supplied via `TAVILY_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum raw records kept across all queries.
    #[serde(default = "default_results_limit")]
    pub results_limit: usize,

    /// Per-query timeout in seconds.
    #[serde(default = "default_scrape_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transient search failures.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Restrict results to these domains (e.g. "reddit.com").
    #[serde(default)]
    pub include_domains: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            backend: ScraperBackend::default(),
            api_url: default_search_url(),
            api_key: None,
            max_results: default_max_results(),
            results_limit: default_results_limit(),
            timeout_seconds: default_scrape_timeout(),
            retries: default_retries(),
            include_domains: Vec::new(),
        }
    }
}

fn default_search_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_results_limit() -> usize {
    100
}

fn default_scrape_timeout() -> u64 {
    10
}

fn default_retries() -> usize {
    3
}

/// How records are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    /// Complaint/praise keyword scoring
    #[default]
    Keyword,
    /// Ask the language model
    Llm,
}

/// Analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Validation policy.
    #[serde(default)]
    pub kind: ValidatorKind,

    /// Minimum score for a record to count as a pain point.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            kind: ValidatorKind::default(),
            threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> f32 {
    0.8
}

/// LLM model settings.
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
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_model_timeout(),
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
    0.1
}

fn default_model_timeout() -> u64 {
    120
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Keyword overlap (Jaccard) at which two complaint groups merge.
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f32,

    /// Maximum example excerpts per pain point.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,

    /// Maximum keywords listed per pain point.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity(),
            max_examples: default_max_examples(),
            max_keywords: default_max_keywords(),
        }
    }
}

fn default_similarity() -> f32 {
    0.5
}

fn default_max_examples() -> usize {
    3
}

fn default_max_keywords() -> usize {
    5
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
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.painminer.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if let Some(kind) = args.generator {
            self.generator.kind = kind;
        }
        if let Some(max_queries) = args.max_queries {
            self.generator.max_queries = max_queries;
        }
        if let Some(ref audience) = args.audience {
            self.generator.target_audience = Some(audience.clone());
        }
        if let Some(ref feedback) = args.feedback {
            self.generator.feedback = feedback.clone();
        }

        if args.offline {
            self.scraper.backend = ScraperBackend::Offline;
        }
        if let Some(ref key) = args.tavily_api_key {
            self.scraper.api_key = Some(key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.scraper.timeout_seconds = timeout;
        }

        if let Some(kind) = args.validator {
            self.analyzer.kind = kind;
        }
        if let Some(threshold) = args.threshold {
            self.analyzer.threshold = threshold;
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
    }

    /// Check the merged configuration once, before any stage is built.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if self.generator.max_queries == 0 {
            bail!("Max queries must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.analyzer.threshold) {
            bail!("Validation threshold must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.report.similarity_threshold) {
            bail!("Similarity threshold must be between 0.0 and 1.0");
        }
        if self.scraper.timeout_seconds == 0 {
            bail!("Scrape timeout must be at least 1 second");
        }
        if self.scraper.results_limit == 0 {
            bail!("Results limit must be at least 1");
        }
        if self.scraper.retries > MAX_RETRIES {
            bail!("Scraper retries must be at most {}", MAX_RETRIES);
        }

        if self.scraper.backend == ScraperBackend::Tavily {
            if !is_http_url(&self.scraper.api_url) {
                bail!("Search API URL must start with 'http://' or 'https://'");
            }
            let has_key = self
                .scraper
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
            if !has_key {
                bail!("TAVILY_API_KEY is not set. Set it in .env or pass --offline");
            }
        }

        let uses_llm = self.generator.kind == GeneratorKind::Llm
            || self.analyzer.kind == ValidatorKind::Llm;
        if uses_llm && !is_http_url(&self.model.ollama_url) {
            bail!("Ollama URL must start with 'http://' or 'https://'");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.scraper.backend = ScraperBackend::Offline;
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.generator.max_queries, 20);
        assert_eq!(config.scraper.results_limit, 100);
        assert_eq!(config.scraper.timeout_seconds, 10);
        assert_eq!(config.analyzer.threshold, 0.8);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "earbuds.md"
concurrency = 2

[generator]
kind = "llm"
target_audience = "commuters"
feedback = ["focus on battery"]

[scraper]
backend = "offline"
include_domains = ["reddit.com"]

[analyzer]
threshold = 0.6
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "earbuds.md");
        assert_eq!(config.general.concurrency, 2);
        assert_eq!(config.generator.kind, GeneratorKind::Llm);
        assert_eq!(config.generator.target_audience.as_deref(), Some("commuters"));
        assert_eq!(config.scraper.backend, ScraperBackend::Offline);
        assert_eq!(config.scraper.include_domains, vec!["reddit.com"]);
        assert_eq!(config.analyzer.threshold, 0.6);
        // Untouched sections keep their defaults
        assert_eq!(config.report.max_examples, 3);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[generator]\nmax_queries = 5\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.generator.max_queries, 5);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[generator\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_validate_requires_api_key_for_tavily() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.scraper.api_key = Some("tvly-test".to_string());
        assert!(config.validate().is_ok());

        assert!(offline_config().validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = offline_config();
        config.analyzer.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = offline_config();
        config.general.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = offline_config();
        config.generator.max_queries = 0;
        assert!(config.validate().is_err());

        let mut config = offline_config();
        config.scraper.retries = 11;
        assert!(config.validate().is_err());

        let mut config = offline_config();
        config.analyzer.kind = ValidatorKind::Llm;
        config.model.ollama_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[generator]"));
        assert!(toml_str.contains("[scraper]"));
        assert!(toml_str.contains("[analyzer]"));
        assert!(!toml_str.contains("api_key"));
        assert!(!toml_str.contains("verbose"));
    }

    #[test]
    fn test_unknown_general_keys_are_ignored() {
        // Logging verbosity is a command-line concern only.
        let config: Config =
            toml::from_str("[general]\nverbose = true\nconcurrency = 3\n").unwrap();
        assert_eq!(config.general.concurrency, 3);
    }
}
