//! Pain point aggregation and statistics.
//!
//! This module groups validated records into recurring pain points and
//! computes the summary statistics used by the report.

use crate::analysis::text::{jaccard, keywords, normalize, truncate_chars};
use crate::config::ReportConfig;
use crate::error::AggregationError;
use crate::models::{PainPoint, Report, Subject, ValidatedRecord};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Keywords considered per description when comparing groups.
const GROUP_KEYWORDS: usize = 12;

/// Maximum characters in an example excerpt.
const EXAMPLE_MAX_CHARS: usize = 240;

/// Groups validated records into a report.
#[derive(Debug, Clone)]
pub struct Aggregator {
    similarity_threshold: f32,
    max_examples: usize,
    max_keywords: usize,
}

/// Records sharing one normalized description, plus their keyword set.
struct Group {
    members: Vec<ValidatedRecord>,
    keywords: HashSet<String>,
}

impl Aggregator {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            max_examples: config.max_examples,
            max_keywords: config.max_keywords,
        }
    }

    /// Group records into ranked pain points. An empty input yields a report
    /// with no pain points.
    pub fn aggregate(
        &self,
        subject: &Subject,
        records: Vec<ValidatedRecord>,
    ) -> Result<Report, AggregationError> {
        for record in &records {
            check_record(record)?;
        }
        let validated_records = records.len();

        let groups = group_by_description(records);
        debug!("{} distinct descriptions before merging", groups.len());
        let clusters = self.merge_similar(groups);

        let mut pain_points: Vec<PainPoint> = clusters
            .into_iter()
            .map(|cluster| self.build_pain_point(cluster))
            .collect();
        sort_by_mentions(&mut pain_points);
        for (rank, point) in pain_points.iter_mut().enumerate() {
            point.id = rank + 1;
        }

        info!(
            "Aggregated {} validated records into {} pain points",
            validated_records,
            pain_points.len()
        );

        let mut report = Report::new(subject.clone());
        report.metadata.validated_records = validated_records;
        report.metadata.pain_point_count = pain_points.len();
        report.pain_points = pain_points;
        Ok(report)
    }

    /// Greedily merge each group into the first earlier cluster it resembles.
    fn merge_similar(&self, groups: Vec<Group>) -> Vec<Group> {
        let mut clusters: Vec<Group> = Vec::new();

        for group in groups {
            let target = clusters
                .iter()
                .position(|c| jaccard(&c.keywords, &group.keywords) >= self.similarity_threshold);
            match target {
                Some(i) => {
                    clusters[i].keywords.extend(group.keywords);
                    clusters[i].members.extend(group.members);
                }
                None => clusters.push(group),
            }
        }

        clusters
    }

    fn build_pain_point(&self, cluster: Group) -> PainPoint {
        let members = cluster.members;

        let mut sources = Vec::new();
        let mut queries = Vec::new();
        let mut examples = Vec::new();
        for m in &members {
            push_unique(&mut sources, &m.record.source);
            push_unique(&mut queries, &m.record.query);
            if examples.len() < self.max_examples {
                push_unique(&mut examples, &truncate_chars(&m.record.body, EXAMPLE_MAX_CHARS));
            }
        }

        let descriptions: Vec<&str> = members.iter().map(|m| m.description()).collect();
        let description = most_common(&descriptions).unwrap_or_default().to_string();

        let all_keywords: Vec<String> = descriptions
            .iter()
            .flat_map(|d| keywords(d, GROUP_KEYWORDS))
            .collect();
        let mut top_keywords = Vec::new();
        for kw in ranked_by_frequency(&all_keywords) {
            if top_keywords.len() == self.max_keywords {
                break;
            }
            top_keywords.push(kw.to_string());
        }

        let first_seen = members
            .iter()
            .map(|m| m.record.retrieved_at)
            .min()
            .unwrap_or_else(chrono::Utc::now);
        let average_score =
            members.iter().map(|m| m.score).sum::<f32>() / members.len().max(1) as f32;

        PainPoint {
            id: 0,
            description,
            mentions: members.len(),
            sources,
            queries,
            keywords: top_keywords,
            examples,
            first_seen,
            average_score,
        }
    }
}

fn check_record(record: &ValidatedRecord) -> Result<(), AggregationError> {
    let malformed = |reason: &str| AggregationError::MalformedRecord {
        source_id: record.record.source.clone(),
        reason: reason.to_string(),
    };

    if !(0.0..=1.0).contains(&record.score) {
        return Err(malformed("score outside [0, 1]"));
    }
    if record.description().trim().is_empty() {
        return Err(malformed("no summary and empty body"));
    }
    Ok(())
}

/// Group records by normalized description, in first-seen order.
fn group_by_description(records: Vec<ValidatedRecord>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = normalize(record.description());
        match index.get(&key) {
            Some(&i) => groups[i].members.push(record),
            None => {
                index.insert(key, groups.len());
                groups.push(Group {
                    keywords: keywords(record.description(), GROUP_KEYWORDS)
                        .into_iter()
                        .collect(),
                    members: vec![record],
                });
            }
        }
    }

    groups
}

fn push_unique(items: &mut Vec<String>, value: &str) {
    if !items.iter().any(|v| v == value) {
        items.push(value.to_string());
    }
}

/// Most frequent item; ties go to the one seen first.
fn most_common<T: AsRef<str>>(items: &[T]) -> Option<&str> {
    ranked_by_frequency(items).into_iter().next()
}

/// Distinct items by descending frequency, ties in first-seen order.
fn ranked_by_frequency<T: AsRef<str>>(items: &[T]) -> Vec<&str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in items {
        let item = item.as_ref();
        match counts.iter_mut().find(|(k, _)| *k == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    counts.sort_by_key(|(_, n)| std::cmp::Reverse(*n));
    counts.into_iter().map(|(k, _)| k).collect()
}

/// Sort pain points by mentions (most first). Stable, so ties keep first-seen order.
pub fn sort_by_mentions(points: &mut [PainPoint]) {
    points.sort_by_key(|p| std::cmp::Reverse(p.mentions));
}

/// Host part of a URL-like source, or the source itself.
pub fn source_domain(source: &str) -> &str {
    let rest = source.split_once("://").map_or(source, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    host.strip_prefix("www.").unwrap_or(host)
}

/// Identify the domains that contributed most pain points.
pub fn top_domains(report: &Report, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for point in &report.pain_points {
        let domains: HashSet<&str> = point.sources.iter().map(|s| source_domain(s)).collect();
        for domain in domains {
            *counts.entry(domain).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(d, c)| (d.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Number of pain points each query surfaced, most productive first.
pub fn query_yield(report: &Report) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for point in &report.pain_points {
        for query in &point.queries {
            *counts.entry(query.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(q, c)| (q.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
