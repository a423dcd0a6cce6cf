//! Markdown and JSON report generation.
//!
//! This module renders a finished [`Report`] for humans (Markdown) or for
//! other tools (JSON).

use crate::analysis::{query_yield, top_domains};
use crate::models::{FailedQuery, PainPoint, Report, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Pain Points Report: {}\n\n",
        report.metadata.subject
    ));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(report));
    output.push_str(&generate_pain_points_section(&report.pain_points));
    output.push_str(&generate_failed_queries_section(
        &report.metadata.failed_queries,
    ));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Subject:** {}\n", metadata.subject));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Policies:** queries `{}`, validation `{}`\n",
        metadata.generator, metadata.validator
    ));
    section.push_str(&format!(
        "- **Queries:** {} generated",
        metadata.queries_generated
    ));
    if !metadata.failed_queries.is_empty() {
        section.push_str(&format!(", {} failed", metadata.failed_queries.len()));
    }
    section.push('\n');
    section.push_str(&format!("- **Records Scraped:** {}\n", metadata.raw_records));
    section.push_str(&format!(
        "- **Records Validated:** {}\n",
        metadata.validated_records
    ));
    section.push_str(&format!("- **Pain Points:** {}\n", metadata.pain_point_count));
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Pain Points](#pain-points)\n");

    for point in &report.pain_points {
        toc.push_str(&format!(
            "  - [{}. {}](#{})\n",
            point.id,
            point.description,
            anchor(point)
        ));
    }

    if !report.metadata.failed_queries.is_empty() {
        toc.push_str("- [Failed Queries](#failed-queries)\n");
    }

    toc.push('\n');

    toc
}

fn anchor(point: &PainPoint) -> String {
    format!("pain-point-{}", point.id)
}

/// Generate the summary section.
fn generate_summary_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    if report.pain_points.is_empty() {
        section.push_str("No recurring pain points were found.\n\n");
        return section;
    }

    section.push_str("| # | Pain Point | Mentions | Avg. Score |\n");
    section.push_str("|:---:|:---|:---:|:---:|\n");
    for point in &report.pain_points {
        section.push_str(&format!(
            "| {} | {} | {} | {:.2} |\n",
            point.id,
            point.description.replace('|', "\\|"),
            point.mentions,
            point.average_score
        ));
    }
    section.push('\n');

    let domains = top_domains(report, 5);
    if !domains.is_empty() {
        section.push_str("### Top Sources\n\n");
        section.push_str("| Domain | Pain Points |\n");
        section.push_str("|:---|:---:|\n");
        for (domain, count) in domains {
            section.push_str(&format!("| {} | {} |\n", domain, count));
        }
        section.push('\n');
    }

    let yields = query_yield(report);
    if !yields.is_empty() {
        section.push_str("### Most Productive Queries\n\n");
        section.push_str("| Query | Pain Points |\n");
        section.push_str("|:---|:---:|\n");
        for (query, count) in yields.into_iter().take(5) {
            section.push_str(&format!("| `{}` | {} |\n", query, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the pain points section.
fn generate_pain_points_section(points: &[PainPoint]) -> String {
    let mut section = String::new();

    section.push_str("## Pain Points\n\n");

    if points.is_empty() {
        section.push_str("Nothing to report for this subject.\n\n");
        return section;
    }

    for point in points {
        section.push_str(&generate_pain_point_block(point));
    }

    section
}

/// Generate a single pain point block.
fn generate_pain_point_block(point: &PainPoint) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {}. {} {{#{}}}\n\n",
        point.id,
        point.description,
        anchor(point)
    ));
    block.push_str(&format!(
        "*Mentions: {} | Avg. score: {:.2} | First seen: {}*\n\n",
        point.mentions,
        point.average_score,
        point.first_seen.format("%Y-%m-%d %H:%M UTC")
    ));

    if !point.keywords.is_empty() {
        block.push_str(&format!("**Keywords:** {}\n\n", point.keywords.join(", ")));
    }

    for example in &point.examples {
        block.push_str(&format!("> {}\n\n", example));
    }

    block.push_str("**Sources:**\n\n");
    for source in &point.sources {
        block.push_str(&format!("- {}\n", source));
    }
    block.push('\n');

    block.push_str("---\n\n");

    block
}

/// Generate the failed queries section.
fn generate_failed_queries_section(failed: &[FailedQuery]) -> String {
    if failed.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failed Queries\n\n");
    section.push_str("These queries could not be scraped and were skipped:\n\n");
    for f in failed {
        section.push_str(&format!("- `{}`: {}\n", f.query, f.error));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!("*Report generated by painminer v{}*\n", env!("CARGO_PKG_VERSION"))
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunStats, Subject};
    use chrono::Utc;

    fn create_test_report() -> Report {
        let point = PainPoint {
            id: 1,
            description: "Bluetooth connection drops".to_string(),
            mentions: 2,
            sources: vec![
                "https://www.reddit.com/r/earbuds/1".to_string(),
                "https://forum.example/2".to_string(),
            ],
            queries: vec!["wireless earbuds connectivity issues".to_string()],
            keywords: vec!["bluetooth".to_string(), "connection".to_string()],
            examples: vec!["Left bud keeps disconnecting from my phone".to_string()],
            first_seen: Utc::now(),
            average_score: 0.9,
        };

        let mut report = Report::new(Subject::new("wireless earbuds"))
            .with_run_stats(RunStats {
                queries_generated: 2,
                failed_queries: vec![FailedQuery {
                    query: "wireless earbuds battery complaints".to_string(),
                    error: "scrape timed out after 10s".to_string(),
                }],
                raw_records: 3,
                validated_records: 2,
                duration_seconds: 4.2,
            })
            .with_policies("template", "keyword");
        report.metadata.pain_point_count = 1;
        report.pain_points = vec![point];
        report
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Pain Points Report: wireless earbuds"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Pain Points"));
        assert!(markdown.contains("### 1. Bluetooth connection drops {#pain-point-1}"));
        assert!(markdown.contains("> Left bud keeps disconnecting from my phone"));
        assert!(markdown.contains("| reddit.com | 1 |"));
        assert!(markdown.contains("## Failed Queries"));
        assert!(markdown.contains("2 generated, 1 failed"));
    }

    #[test]
    fn test_empty_report_markdown() {
        let report = Report::new(Subject::new("smart thermostats"));
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("No recurring pain points were found."));
        assert!(!markdown.contains("## Failed Queries"));
        assert!(!markdown.contains("### Top Sources"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["subject"], "wireless earbuds");
        assert_eq!(value["metadata"]["pain_point_count"], 1);
        assert_eq!(value["pain_points"][0]["mentions"], 2);
        assert_eq!(
            value["metadata"]["failed_queries"][0]["query"],
            "wireless earbuds battery complaints"
        );
    }
}
