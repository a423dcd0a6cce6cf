//! Data models for the pain point miner.
//!
//! This module contains the core data structures that flow through the
//! pipeline: subjects, queries, scraped records, validated records, and the
//! final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The topic being mined for pain points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the subject is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A search query produced by a query generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// The search text.
    pub text: String,
    /// Generation order (0 is highest priority).
    pub priority: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, priority: usize) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A unit of scraped content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Text of the query that produced this record.
    pub query: String,
    /// Source identifier, usually a URL.
    pub source: String,
    /// Page or post title, if the source provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Text body.
    pub body: String,
    /// When the record was fetched.
    pub retrieved_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(query: &Query, source: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            query: query.text.clone(),
            source: source.into(),
            title: None,
            body: body.into(),
            retrieved_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A raw record that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    /// The record this validation refers to.
    pub record: RawRecord,
    /// Validation score in `[0.0, 1.0]`.
    pub score: f32,
    /// Extracted one-line description of the complaint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ValidatedRecord {
    /// The summary if present and non-blank, otherwise the record body.
    pub fn description(&self) -> &str {
        match self.summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => &self.record.body,
        }
    }
}

/// A query whose scrape failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedQuery {
    pub query: String,
    pub error: String,
}

/// A recurring complaint: a cluster of validated records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainPoint {
    /// 1-based rank within the report.
    pub id: usize,
    /// Representative description of the complaint.
    pub description: String,
    /// Number of validated records in this cluster.
    pub mentions: usize,
    /// Distinct sources, in first-seen order.
    pub sources: Vec<String>,
    /// Distinct queries that surfaced this complaint.
    pub queries: Vec<String>,
    /// Salient keywords shared by the cluster.
    pub keywords: Vec<String>,
    /// Representative excerpts.
    pub examples: Vec<String>,
    /// Earliest retrieval time among the cluster's records.
    pub first_seen: DateTime<Utc>,
    /// Mean validation score.
    pub average_score: f32,
}

/// Counters collected by the workflow controller during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub queries_generated: usize,
    pub failed_queries: Vec<FailedQuery>,
    pub raw_records: usize,
    pub validated_records: usize,
    pub duration_seconds: f64,
}

/// Metadata about a mining run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// The subject that was mined.
    pub subject: Subject,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Query generation policy used.
    pub generator: String,
    /// Validation policy used.
    pub validator: String,
    /// Number of queries generated.
    pub queries_generated: usize,
    /// Queries whose scrape failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_queries: Vec<FailedQuery>,
    /// Number of raw records scraped.
    pub raw_records: usize,
    /// Number of records that passed validation.
    pub validated_records: usize,
    /// Number of distinct pain points.
    pub pain_point_count: usize,
    /// Total run time in seconds.
    pub duration_seconds: f64,
}

/// The complete pain point report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Pain points, most mentioned first.
    pub pain_points: Vec<PainPoint>,
}

impl Report {
    /// Creates an empty report for a subject.
    pub fn new(subject: Subject) -> Self {
        Self {
            metadata: ReportMetadata {
                subject,
                generated_at: Utc::now(),
                generator: String::new(),
                validator: String::new(),
                queries_generated: 0,
                failed_queries: Vec::new(),
                raw_records: 0,
                validated_records: 0,
                pain_point_count: 0,
                duration_seconds: 0.0,
            },
            pain_points: Vec::new(),
        }
    }

    pub fn pain_point_count(&self) -> usize {
        self.pain_points.len()
    }

    /// Folds run counters into the metadata.
    pub fn with_run_stats(mut self, stats: RunStats) -> Self {
        self.metadata.queries_generated = stats.queries_generated;
        self.metadata.failed_queries = stats.failed_queries;
        self.metadata.raw_records = stats.raw_records;
        self.metadata.validated_records = stats.validated_records;
        self.metadata.duration_seconds = stats.duration_seconds;
        self
    }

    /// Records which generation and validation policies produced the report.
    pub fn with_policies(mut self, generator: &str, validator: &str) -> Self {
        self.metadata.generator = generator.to_string();
        self.metadata.validator = validator.to_string();
        self
    }

    /// Total mentions across all pain points.
    pub fn total_mentions(&self) -> usize {
        self.pain_points.iter().map(|p| p.mentions).sum()
    }
}
