//! Workflow controller.
//!
//! Drives one mining run through a fixed sequence of states:
//!
//! ```text
//! Idle -> Generating -> Scraping -> Analyzing -> Aggregating -> Done
//!              \            \            \             \
//!               +------------+------------+-------------+--> Failed
//! ```
//!
//! The controller owns sequencing only: it hands each stage's output to the
//! next, runs the scrape stage through a bounded worker pool, and decides
//! which stage errors end the run.

use crate::agent::{Analyzer, QueryGenerator, Scraper};
use crate::analysis::Aggregator;
use crate::error::{ScrapeError, WorkflowError};
use crate::models::{FailedQuery, Query, RawRecord, Report, RunStats, Subject};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Generating,
    Scraping,
    Analyzing,
    Aggregating,
    Done,
    Failed,
}

impl WorkflowState {
    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Idle, Generating)
                | (Generating, Scraping)
                | (Scraping, Analyzing)
                | (Analyzing, Aggregating)
                | (Aggregating, Done)
                | (Generating | Scraping | Analyzing | Aggregating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Generating => "generating",
            WorkflowState::Scraping => "scraping",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::Aggregating => "aggregating",
            WorkflowState::Done => "done",
            WorkflowState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Knobs the controller applies around the stages.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Queries scraped at once.
    pub concurrency: usize,
    /// Timeout for a single scrape attempt. Scrapers that retry widen it
    /// through [`Scraper::call_budget`].
    pub scrape_timeout: Duration,
    /// Maximum raw records passed to the analyzer.
    pub results_limit: usize,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            scrape_timeout: Duration::from_secs(10),
            results_limit: 100,
        }
    }
}

/// Sequences the four stages for one subject at a time.
pub struct Workflow {
    generator: Arc<dyn QueryGenerator>,
    scraper: Arc<dyn Scraper>,
    analyzer: Analyzer,
    aggregator: Aggregator,
    options: WorkflowOptions,
    state: WorkflowState,
    history: Vec<WorkflowState>,
}

impl Workflow {
    pub fn new(
        generator: Arc<dyn QueryGenerator>,
        scraper: Arc<dyn Scraper>,
        analyzer: Analyzer,
        aggregator: Aggregator,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            generator,
            scraper,
            analyzer,
            aggregator,
            options,
            state: WorkflowState::Idle,
            history: vec![WorkflowState::Idle],
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Every state visited by the last run, starting with `Idle`.
    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    fn transition(&mut self, next: WorkflowState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("Workflow {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        error!("Workflow failed during {}: {}", err.stage(), err);
        self.transition(WorkflowState::Failed);
        err
    }

    /// Run the whole pipeline for `subject`. A finished or interrupted
    /// workflow may be run again.
    pub async fn run(&mut self, subject: &Subject) -> Result<Report, WorkflowError> {
        if self.state != WorkflowState::Idle {
            if !self.state.is_terminal() {
                warn!("Previous run was interrupted while {}", self.state);
            }
            self.state = WorkflowState::Idle;
            self.history = vec![WorkflowState::Idle];
        }
        let start = Instant::now();
        let mut stats = RunStats::default();
        info!("Mining pain points for '{}'", subject);

        self.transition(WorkflowState::Generating);
        let queries = match self.generator.generate(subject).await {
            Ok(queries) => queries,
            Err(e) => return Err(self.fail(e.into())),
        };
        stats.queries_generated = queries.len();
        info!("Generated {} queries ({})", queries.len(), self.generator.name());

        self.transition(WorkflowState::Scraping);
        let (records, failures) = self.scrape_all(queries).await;
        if !failures.is_empty() && failures.len() == stats.queries_generated {
            return Err(self.fail(WorkflowError::AllScrapesFailed(failures)));
        }
        stats.failed_queries = failures
            .iter()
            .map(|(query, e)| FailedQuery {
                query: query.clone(),
                error: e.to_string(),
            })
            .collect();
        stats.raw_records = records.len();

        self.transition(WorkflowState::Analyzing);
        let validated = match self.analyzer.analyze(records).await {
            Ok(validated) => validated,
            Err(e) => return Err(self.fail(e.into())),
        };
        stats.validated_records = validated.len();

        self.transition(WorkflowState::Aggregating);
        let report = match self.aggregator.aggregate(subject, validated) {
            Ok(report) => report,
            Err(e) => return Err(self.fail(e.into())),
        };

        stats.duration_seconds = start.elapsed().as_secs_f64();
        let report = report
            .with_run_stats(stats)
            .with_policies(self.generator.name(), self.analyzer.policy_name());

        self.transition(WorkflowState::Done);
        info!(
            "Done: {} pain points from {} validated records",
            report.pain_point_count(),
            report.metadata.validated_records
        );
        Ok(report)
    }

    /// Scrape every query through a bounded pool. Failed queries are logged
    /// and returned alongside the records of the ones that succeeded.
    async fn scrape_all(
        &self,
        queries: Vec<Query>,
    ) -> (Vec<RawRecord>, Vec<(String, ScrapeError)>) {
        let budget = self.scraper.call_budget(self.options.scrape_timeout);

        let mut results: Vec<(Query, Result<Vec<RawRecord>, ScrapeError>)> =
            stream::iter(queries.into_iter().map(|query| {
                let scraper = Arc::clone(&self.scraper);
                async move {
                    let result = match tokio::time::timeout(budget, scraper.scrape(&query)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ScrapeError::Timeout(budget.as_secs())),
                    };
                    (query, result)
                }
            }))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        // Completion order is arbitrary; restore generation order.
        results.sort_by_key(|(query, _)| query.priority);

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (query, result) in results {
            match result {
                Ok(found) => {
                    debug!("'{}' yielded {} records", query, found.len());
                    records.extend(found);
                }
                Err(e) => {
                    warn!("Skipping query '{}': {}", query, e);
                    failures.push((query.text, e));
                }
            }
        }

        if records.len() > self.options.results_limit {
            debug!(
                "Capping {} raw records at {}",
                records.len(),
                self.options.results_limit
            );
            records.truncate(self.options.results_limit);
        }

        (records, failures)
    }
}
