//! Pipeline stage agents.
//!
//! Each stage sits behind a trait so the workflow can be driven by real
//! services or by test doubles.

pub mod analyzer;
pub mod ollama;
pub mod query_generator;
pub mod scraper;

pub use analyzer::{Analyzer, Classifier, KeywordClassifier, LlmClassifier, Verdict};
pub use ollama::OllamaClient;
pub use query_generator::{LlmQueryGenerator, QueryGenerator, TemplateQueryGenerator};
pub use scraper::{OfflineScraper, Scraper, TavilyScraper};
