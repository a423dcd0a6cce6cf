//! Validation: keeps the raw records that describe genuine pain points.

use crate::agent::ollama::OllamaClient;
use crate::analysis::text::{sentences, tokenize, truncate_chars};
use crate::error::AnalysisError;
use crate::models::{RawRecord, ValidatedRecord};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

/// Maximum characters in an extracted summary.
const SUMMARY_MAX_CHARS: usize = 160;

/// A classifier's judgement of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_pain_point: bool,
    /// Confidence in `[0.0, 1.0]`.
    pub score: f32,
    pub summary: Option<String>,
}

impl Verdict {
    pub fn rejected() -> Self {
        Self {
            is_pain_point: false,
            score: 0.0,
            summary: None,
        }
    }
}

/// Decides whether a record is a genuine complaint.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, record: &RawRecord) -> Result<Verdict, AnalysisError>;

    /// Short policy name for logs and report metadata.
    fn name(&self) -> &str;
}

/// Applies a classifier and a score threshold to a batch of records.
pub struct Analyzer {
    classifier: Box<dyn Classifier>,
    threshold: f32,
}

impl Analyzer {
    pub fn new(classifier: Box<dyn Classifier>, threshold: f32) -> Self {
        Self {
            classifier,
            threshold,
        }
    }

    pub fn policy_name(&self) -> &str {
        self.classifier.name()
    }

    /// Validate records in order. Rejected records are dropped; the first
    /// classifier error aborts the batch.
    pub async fn analyze(
        &self,
        records: Vec<RawRecord>,
    ) -> Result<Vec<ValidatedRecord>, AnalysisError> {
        let total = records.len();
        let mut validated = Vec::new();

        for record in records {
            let verdict = self.classifier.classify(&record).await?;
            if verdict.is_pain_point && verdict.score >= self.threshold {
                validated.push(ValidatedRecord {
                    record,
                    score: verdict.score,
                    summary: verdict.summary,
                });
            } else {
                debug!(
                    "Dropped record from {} (score {:.2})",
                    record.source, verdict.score
                );
            }
        }

        info!(
            "{} of {} records validated as pain points",
            validated.len(),
            total
        );
        Ok(validated)
    }
}

/// Word forms that signal a complaint. Matched as whole tokens.
const COMPLAINT_MARKERS: &[&str] = &[
    "annoy", "annoyance", "annoyed", "annoying", "annoys", "awful", "bad", "badly", "breaks",
    "broke", "broken", "bug", "buggy", "bugs", "can't", "cannot", "complain", "complained",
    "complaining", "complains", "complaint", "complaints", "crash", "crashed", "crashes",
    "crashing", "dead", "defect", "defective", "defects", "die", "died", "dies", "disappoint",
    "disappointed", "disappointing", "disappointment", "disconnect", "disconnected",
    "disconnecting", "disconnects", "doesn't", "drain", "drained", "draining", "drains", "drop",
    "dropped", "dropping", "drops", "error", "errors", "fail", "failed", "failing", "fails",
    "failure", "failures", "fault", "faulty", "frustrate", "frustrated", "frustrating",
    "frustration", "frustrations", "garbage", "hate", "hated", "hates", "hating", "horrible",
    "issue", "issues", "lag", "lagging", "laggy", "lags", "problem", "problems", "refund",
    "refunds", "regret", "regrets", "slow", "slower", "slows", "stuck", "terrible",
    "unreliable", "useless", "waiting", "waste", "wasted", "won't", "worst",
];

/// Word forms that signal praise. Matched as whole tokens.
const PRAISE_MARKERS: &[&str] = &[
    "amazing", "awesome", "easier", "easy", "excellent", "fantastic", "great", "love", "loved",
    "loves", "perfect", "perfectly", "recommend", "recommended", "smooth", "smoothly",
];

/// Words that cancel a marker shortly after them ("no complaints").
const NEGATIONS: &[&str] = &[
    "barely", "hardly", "never", "no", "none", "not", "nothing", "without", "zero",
];

/// How many tokens before a marker a negation reaches.
const NEGATION_WINDOW: usize = 2;

fn is_negated(tokens: &[String], index: usize) -> bool {
    tokens[index.saturating_sub(NEGATION_WINDOW)..index]
        .iter()
        .any(|t| NEGATIONS.contains(&t.as_str()))
}

/// Count marker tokens that are not negated.
fn count_markers(tokens: &[String], markers: &[&str]) -> usize {
    tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| markers.contains(&t.as_str()) && !is_negated(tokens, *i))
        .count()
}

/// Scores records by the balance of complaint and praise words.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn judge(&self, text: &str) -> Verdict {
        let tokens = tokenize(text);
        let complaints = count_markers(&tokens, COMPLAINT_MARKERS);
        if complaints == 0 {
            return Verdict::rejected();
        }
        let praise = count_markers(&tokens, PRAISE_MARKERS);
        let score = complaints as f32 / (complaints + praise) as f32;

        let summary = sentences(text)
            .find(|s| count_markers(&tokenize(s), COMPLAINT_MARKERS) > 0)
            .map(|s| truncate_chars(s, SUMMARY_MAX_CHARS));

        Verdict {
            is_pain_point: true,
            score,
            summary,
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, record: &RawRecord) -> Result<Verdict, AnalysisError> {
        Ok(self.judge(&record.body))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Asks the language model to judge each record.
pub struct LlmClassifier {
    client: OllamaClient,
}

impl LlmClassifier {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, record: &RawRecord) -> Result<Verdict, AnalysisError> {
        let prompt = format!(
            "Search query: {}\nSource: {}\n\nText:\n{}\n\nRespond with the JSON verdict.",
            record.query, record.source, record.body
        );
        let response = self.client.chat_json(CLASSIFIER_SYSTEM_PROMPT, &prompt).await?;
        parse_verdict(&response).map_err(|reason| AnalysisError::InvalidVerdict {
            source_id: record.source.clone(),
            reason,
        })
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Parse a `{"is_pain_point", "score", "summary"}` reply. The object may be
/// surrounded by prose or a code fence.
pub(crate) fn parse_verdict(response: &str) -> Result<Verdict, String> {
    let start = response.find('{').ok_or("no JSON object in reply")?;
    let end = response.rfind('}').ok_or("no JSON object in reply")?;
    if end < start {
        return Err("no JSON object in reply".to_string());
    }

    let json: Value = serde_json::from_str(&response[start..=end]).map_err(|e| e.to_string())?;
    let is_pain_point = json["is_pain_point"]
        .as_bool()
        .ok_or("missing boolean 'is_pain_point'")?;
    let score = json["score"]
        .as_f64()
        .map(|s| s.clamp(0.0, 1.0) as f32)
        .unwrap_or(if is_pain_point { 1.0 } else { 0.0 });
    let summary = json["summary"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, SUMMARY_MAX_CHARS));

    Ok(Verdict {
        is_pain_point,
        score,
        summary,
    })
}

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You review scraped web text and decide whether it describes a genuine user complaint or frustration.
Praise, marketing copy, news, and neutral questions are not pain points.
Reply with exactly one JSON object:
{"is_pain_point": true, "score": 0.0-1.0, "summary": "one short sentence naming the problem"}"#;
