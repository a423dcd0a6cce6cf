//! Query generation: turns a subject into an ordered list of search queries.

use crate::agent::ollama::OllamaClient;
use crate::config::GeneratorConfig;
use crate::error::GenerationError;
use crate::models::{Query, Subject};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};

/// Produces search queries for a subject.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Generate a non-empty, finite list of queries, highest priority first.
    async fn generate(&self, subject: &Subject) -> Result<Vec<Query>, GenerationError>;

    /// Short policy name for logs and report metadata.
    fn name(&self) -> &str;
}

/// Builds queries from fixed strategies (generic, audience, emotion,
/// bottleneck, integration, persona, feedback) plus short variants.
#[derive(Debug, Clone)]
pub struct TemplateQueryGenerator {
    max_queries: usize,
    target_audience: Option<String>,
    feedback: Vec<String>,
}

impl TemplateQueryGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            max_queries: config.max_queries,
            target_audience: config
                .target_audience
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from),
            feedback: config.feedback.clone(),
        }
    }

    fn seed_queries(&self, subject: &str) -> Vec<String> {
        let audience = self.target_audience.as_deref();
        let mut queries = vec![format!("{subject} complaints")];

        if let Some(a) = audience {
            queries.push(format!("{subject} complaints from {a}"));
            queries.push(format!("{a} frustrations with {subject}"));
        }

        queries.push(format!("frustrations about {subject}"));
        queries.push(format!("why people hate {subject}"));

        queries.push(format!("{subject} performance issues"));
        queries.push(format!("{subject} bottlenecks"));
        queries.push(format!("{subject} productivity problems"));

        queries.push(format!("{subject} integration problems"));
        queries.push(format!("{subject} data loss"));
        queries.push(format!("{subject} crash"));

        if let Some(a) = audience {
            queries.push(format!("{a} problems with {subject}"));
            queries.push(format!("what {a} hate about {subject}"));
        }

        for note in self.feedback.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
            queries.push(format!("{subject} {note}"));
            queries.push(format!("{subject} problems: {note}"));
        }

        queries
    }

    /// Rewrite queries to follow reviewer feedback. Notes mentioning tools
    /// add tool and integration angles, notes mentioning bottlenecks add
    /// bottleneck and slowness angles, and "too generic" adds error-focused
    /// ones. Each query is kept after its refinements.
    pub fn refine(&self, queries: Vec<String>) -> Vec<String> {
        let mentions = |needle: &str| {
            self.feedback
                .iter()
                .any(|note| note.to_lowercase().contains(needle))
        };
        let mut suffixes: Vec<&str> = Vec::new();
        if mentions("tool") {
            suffixes.extend(["specific tool", "integrations"]);
        }
        if mentions("bottleneck") {
            suffixes.extend(["bottleneck", "slow"]);
        }
        if mentions("generic") {
            suffixes.extend(["error messages", "stack traces"]);
        }
        if suffixes.is_empty() {
            return queries;
        }

        let mut refined = Vec::with_capacity(queries.len() * (suffixes.len() + 1));
        for query in queries {
            refined.extend(suffixes.iter().map(|suffix| format!("{query} {suffix}")));
            refined.push(query);
        }
        refined
    }
}

#[async_trait]
impl QueryGenerator for TemplateQueryGenerator {
    async fn generate(&self, subject: &Subject) -> Result<Vec<Query>, GenerationError> {
        if subject.is_blank() {
            return Err(GenerationError::EmptySubject);
        }
        let subject = subject.as_str().trim();

        let seeds = self.seed_queries(subject);
        let mut variants = Vec::with_capacity(seeds.len() * 3);
        for q in &seeds {
            variants.push(format!("{q} issues"));
            variants.push(format!("{q} complaints"));
            let tokens: Vec<&str> = q.split_whitespace().collect();
            if tokens.len() > 1 {
                variants.push(tokens[tokens.len() - 2..].join(" "));
            }
        }

        let candidates: Vec<String> = seeds.into_iter().chain(variants).collect();
        let candidates = if self.feedback.is_empty() {
            candidates
        } else {
            self.refine(candidates)
        };

        let queries = dedup_queries(candidates, self.max_queries);
        debug!("Template generator produced {} queries", queries.len());
        Ok(queries)
    }

    fn name(&self) -> &str {
        "template"
    }
}

/// Asks the language model for search queries.
pub struct LlmQueryGenerator {
    client: OllamaClient,
    max_queries: usize,
    target_audience: Option<String>,
    feedback: Vec<String>,
}

impl LlmQueryGenerator {
    pub fn new(client: OllamaClient, config: &GeneratorConfig) -> Self {
        Self {
            client,
            max_queries: config.max_queries,
            target_audience: config.target_audience.clone(),
            feedback: config.feedback.clone(),
        }
    }

    fn build_prompt(&self, subject: &str) -> String {
        let mut prompt = format!(
            "Write up to {} distinct web search queries that would surface genuine user complaints, frustrations and recurring problems about: {}\n",
            self.max_queries, subject
        );
        if let Some(ref audience) = self.target_audience {
            prompt.push_str(&format!("Focus on what {} struggle with.\n", audience));
        }
        if !self.feedback.is_empty() {
            prompt.push_str("Take this reviewer feedback into account:\n");
            for note in &self.feedback {
                prompt.push_str(&format!("- {}\n", note));
            }
        }
        prompt.push_str("\nOutput one query per line. No numbering, no explanations.");
        prompt
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(&self, subject: &Subject) -> Result<Vec<Query>, GenerationError> {
        if subject.is_blank() {
            return Err(GenerationError::EmptySubject);
        }

        info!("Asking {} for search queries", self.client.model_name());
        let prompt = self.build_prompt(subject.as_str().trim());
        let response = self.client.chat(QUERY_SYSTEM_PROMPT, &prompt).await?;

        let queries = parse_queries(&response, self.max_queries);
        if queries.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(queries)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Parse one query per line, stripping list markers and quotes.
pub(crate) fn parse_queries(response: &str, max_queries: usize) -> Vec<Query> {
    let lines = response.lines().filter_map(|line| {
        let cleaned = strip_list_marker(line.trim())
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim();
        (!cleaned.is_empty() && !cleaned.ends_with(':')).then(|| cleaned.to_string())
    });
    dedup_queries(lines, max_queries)
}

/// Strip a leading bullet (`-`, `*`) or number (`1.`, `2)`).
fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix(['-', '*']) {
        return rest.trim_start();
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    line
}

/// Case-insensitive dedup preserving order, capped at `max`.
fn dedup_queries(candidates: impl IntoIterator<Item = String>, max: usize) -> Vec<Query> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|q| seen.insert(q.trim().to_lowercase()))
        .take(max)
        .enumerate()
        .map(|(priority, text)| Query::new(text, priority))
        .collect()
}

const QUERY_SYSTEM_PROMPT: &str = r#"You are a market researcher who finds where people complain online.
You write short, specific search engine queries. You only output the queries."#;

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(audience: Option<&str>, feedback: &[&str]) -> TemplateQueryGenerator {
        TemplateQueryGenerator::new(&GeneratorConfig {
            target_audience: audience.map(String::from),
            feedback: feedback.iter().map(|s| s.to_string()).collect(),
            ..GeneratorConfig::default()
        })
    }

    #[tokio::test]
    async fn test_template_generates_queries() {
        let generator = generator(
            Some("users"),
            &["I hate waiting on hold", "The chatbot is useless"],
        );
        let queries = generator
            .generate(&Subject::new("customer service"))
            .await
            .unwrap();

        assert!(!queries.is_empty());
        assert!(queries.len() <= 20);
        assert_eq!(queries[0].text, "customer service complaints");
        assert_eq!(queries[1].text, "customer service complaints from users");
        assert!(queries
            .iter()
            .any(|q| q.text == "customer service I hate waiting on hold"));

        for (i, q) in queries.iter().enumerate() {
            assert_eq!(q.priority, i);
        }
        let distinct: HashSet<String> = queries.iter().map(|q| q.text.to_lowercase()).collect();
        assert_eq!(distinct.len(), queries.len());
    }

    #[tokio::test]
    async fn test_template_respects_max_queries() {
        let generator = TemplateQueryGenerator::new(&GeneratorConfig {
            max_queries: 3,
            ..GeneratorConfig::default()
        });
        let queries = generator.generate(&Subject::new("earbuds")).await.unwrap();
        let texts: Vec<_> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["earbuds complaints", "frustrations about earbuds", "why people hate earbuds"]
        );
    }

    #[tokio::test]
    async fn test_feedback_refines_queries() {
        let generator = generator(None, &["focus on bottlenecks and tool names"]);
        let queries = generator.generate(&Subject::new("earbuds")).await.unwrap();
        let texts: Vec<_> = queries.iter().map(|q| q.text.as_str()).collect();

        assert_eq!(
            texts[..5],
            [
                "earbuds complaints specific tool",
                "earbuds complaints integrations",
                "earbuds complaints bottleneck",
                "earbuds complaints slow",
                "earbuds complaints",
            ]
        );
        assert_eq!(queries.len(), 20);
    }

    #[test]
    fn test_refine_keeps_seed_and_ignores_unrelated_feedback() {
        let seeds = vec!["earbuds crash".to_string()];

        let generic = generator(None, &["Too generic"]);
        assert_eq!(
            generic.refine(seeds.clone()),
            vec![
                "earbuds crash error messages",
                "earbuds crash stack traces",
                "earbuds crash",
            ]
        );

        let unrelated = generator(None, &["results are outdated"]);
        assert_eq!(unrelated.refine(seeds.clone()), seeds);
    }

    #[test]
    fn test_template_rejects_blank_subject() {
        let generator = generator(None, &[]);
        let result = tokio_test::block_on(generator.generate(&Subject::new("  ")));
        assert!(matches!(result, Err(GenerationError::EmptySubject)));
    }

    #[test]
    fn test_parse_queries() {
        let response = "Here are some queries:\n1. earbuds battery drain\n- \"earbuds pairing problems\"\n\n* Earbuds Battery Drain\n2) earbuds fall out\n3D printed case cracks";
        let queries = parse_queries(response, 10);
        let texts: Vec<_> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "earbuds battery drain",
                "earbuds pairing problems",
                "earbuds fall out",
                "3D printed case cracks"
            ]
        );
    }
}
