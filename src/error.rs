//! Error types for the pipeline stages and the workflow controller.

use thiserror::Error;

/// Errors from the language model client.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to Ollama at {0}")]
    Connect(String),

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse Ollama response: {0}")]
    Decode(String),

    #[error("failed to send request: {0}")]
    Request(String),
}

/// Errors from query generation. Always fatal for a run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("subject is empty")]
    EmptySubject,

    #[error("query source unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("query source returned no usable queries")]
    EmptyResponse,
}

/// Errors from scraping a single query. Recoverable per query.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("search service unreachable: {0}")]
    Unreachable(String),

    #[error("scrape timed out after {0}s")]
    Timeout(u64),

    #[error("search service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed search response: {0}")]
    Malformed(String),
}

impl ScrapeError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Unreachable(_) | ScrapeError::Timeout(_) => true,
            ScrapeError::Api { status, .. } => *status >= 500 || *status == 429,
            ScrapeError::Malformed(_) => false,
        }
    }
}

/// Errors from validating records. Fatal for a run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(#[from] LlmError),

    #[error("classifier returned an invalid verdict for {source_id}: {reason}")]
    InvalidVerdict { source_id: String, reason: String },
}

/// Errors from aggregating validated records. Fatal for a run.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("malformed validated record from {source_id}: {reason}")]
    MalformedRecord { source_id: String, reason: String },
}

/// A workflow failure, tagged with the stage that caused it.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("query generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("all {} queries failed to scrape", .0.len())]
    AllScrapesFailed(Vec<(String, ScrapeError)>),

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),
}

impl WorkflowError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkflowError::Generation(_) => "query generation",
            WorkflowError::AllScrapesFailed(_) => "scraping",
            WorkflowError::Analysis(_) => "analysis",
            WorkflowError::Aggregation(_) => "aggregation",
        }
    }

    /// Per-query causes for a total scrape failure, one line each.
    pub fn details(&self) -> Vec<String> {
        match self {
            WorkflowError::AllScrapesFailed(failures) => failures
                .iter()
                .map(|(query, err)| format!("{}: {}", query, err))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(
            WorkflowError::from(GenerationError::EmptySubject).stage(),
            "query generation"
        );
        assert_eq!(WorkflowError::AllScrapesFailed(vec![]).stage(), "scraping");
    }

    #[test]
    fn test_all_scrapes_failed_message() {
        let err = WorkflowError::AllScrapesFailed(vec![
            ("a".to_string(), ScrapeError::Timeout(10)),
            ("b".to_string(), ScrapeError::Unreachable("dns".to_string())),
        ]);
        assert_eq!(err.to_string(), "all 2 queries failed to scrape");
        assert_eq!(err.details()[0], "a: scrape timed out after 10s");
    }

    #[test]
    fn test_transient_scrape_errors() {
        assert!(ScrapeError::Timeout(5).is_transient());
        assert!(ScrapeError::Api {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!ScrapeError::Api {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!ScrapeError::Malformed("eof".to_string()).is_transient());
    }
}
