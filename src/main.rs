//! Painminer - multi-stage pain point mining pipeline
//!
//! A CLI tool that generates search queries for a subject, scrapes what
//! people write about it, keeps the genuine complaints, and compiles a
//! report of recurring pain points.
//!
//! Exit codes:
//!   0 - Report completed
//!   1 - Any failure (configuration, stage failure, write error)

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod workflow;

use agent::{
    Analyzer, Classifier, KeywordClassifier, LlmClassifier, LlmQueryGenerator, OfflineScraper,
    OllamaClient, QueryGenerator, Scraper, TavilyScraper, TemplateQueryGenerator,
};
use analysis::Aggregator;
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, GeneratorKind, ScraperBackend, ValidatorKind};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, Subject};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use workflow::{Workflow, WorkflowOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so clap's env fallbacks see it
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env: {}", e);
        }
    }

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("Painminer v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_mining(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .painminer.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Put TAVILY_API_KEY in .env, or set scraper.backend = \"offline\".");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins when set.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the complete mining workflow. Returns the process exit code.
async fn run_mining(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let subject = match args.subject.clone() {
        Some(subject) => Subject::new(subject),
        None => prompt_for_subject()?,
    };

    let generator = build_generator(&config)?;

    if args.dry_run {
        return handle_dry_run(generator.as_ref(), &subject).await;
    }

    let scraper = build_scraper(&config)?;
    let analyzer = build_analyzer(&config)?;
    let aggregator = Aggregator::new(&config.report);
    let options = WorkflowOptions {
        concurrency: config.general.concurrency,
        scrape_timeout: Duration::from_secs(config.scraper.timeout_seconds),
        results_limit: config.scraper.results_limit,
    };

    println!("⛏️  Mining pain points for: {}", subject);
    println!(
        "   Queries: {} (max {})",
        generator.name(),
        config.generator.max_queries
    );
    println!(
        "   Scraper: {} ({} at a time, {}s timeout)",
        scraper.name(),
        config.general.concurrency,
        config.scraper.timeout_seconds
    );
    println!(
        "   Validator: {} (threshold {:.2})",
        analyzer.policy_name(),
        config.analyzer.threshold
    );

    let mut workflow = Workflow::new(generator, scraper, analyzer, aggregator, options);

    let spinner = make_spinner(&args)?;
    let result = workflow.run(&subject).await;
    spinner.finish_and_clear();
    debug!(
        "Workflow ended in state {} after {:?}",
        workflow.state(),
        workflow.history()
    );

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("\n❌ Mining failed during {} stage: {}", e.stage(), e);
            for detail in e.details() {
                eprintln!("   - {}", detail);
            }
            return Ok(1);
        }
    };

    let output_path = output_path(&args, &config);
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&report);
    println!("\n✅ Report saved to: {}", output_path.display());

    Ok(0)
}

/// Handle --dry-run: generate queries, print them, exit.
async fn handle_dry_run(generator: &dyn QueryGenerator, subject: &Subject) -> Result<i32> {
    println!("\n🔍 Dry run: generating queries (no scraping)...\n");

    match generator.generate(subject).await {
        Ok(queries) => {
            for query in &queries {
                println!("   {:>2}. {}", query.priority + 1, query.text);
            }
            println!("\n✅ Dry run complete. {} queries would be scraped.", queries.len());
            Ok(0)
        }
        Err(e) => {
            eprintln!("\n❌ Query generation failed: {}", e);
            Ok(1)
        }
    }
}

/// Read the subject from stdin when it wasn't given on the command line.
fn prompt_for_subject() -> Result<Subject> {
    print!("Subject to mine: ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read subject from stdin")?;
    Ok(Subject::new(line.trim()))
}

fn build_generator(config: &Config) -> Result<Arc<dyn QueryGenerator>> {
    Ok(match config.generator.kind {
        GeneratorKind::Template => Arc::new(TemplateQueryGenerator::new(&config.generator)),
        GeneratorKind::Llm => {
            let client = OllamaClient::new(&config.model)?;
            Arc::new(LlmQueryGenerator::new(client, &config.generator))
        }
    })
}

fn build_scraper(config: &Config) -> Result<Arc<dyn Scraper>> {
    Ok(match config.scraper.backend {
        ScraperBackend::Tavily => Arc::new(TavilyScraper::new(&config.scraper)?),
        ScraperBackend::Offline => {
            warn!("Using offline sample content; results are not real");
            Arc::new(OfflineScraper::new(&config.scraper))
        }
    })
}

fn build_analyzer(config: &Config) -> Result<Analyzer> {
    let classifier: Box<dyn Classifier> = match config.analyzer.kind {
        ValidatorKind::Keyword => Box::new(KeywordClassifier::new()),
        ValidatorKind::Llm => Box::new(LlmClassifier::new(OllamaClient::new(&config.model)?)),
    };
    Ok(Analyzer::new(classifier, config.analyzer.threshold))
}

fn make_spinner(args: &Args) -> Result<ProgressBar> {
    if args.quiet || args.verbose {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message("Generating, scraping and analyzing...");
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// The configured output path, with a `.json` extension for JSON output
/// unless the path was given explicitly.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    let mut path = PathBuf::from(&config.general.output);
    if args.format == OutputFormat::Json
        && args.output.is_none()
        && path.extension().is_some_and(|ext| ext == "md")
    {
        path.set_extension("json");
    }
    path
}

fn print_summary(report: &Report) {
    let meta = &report.metadata;
    println!("\n📊 Mining Summary:");
    println!(
        "   Queries: {} ({} failed)",
        meta.queries_generated,
        meta.failed_queries.len()
    );
    println!(
        "   Records: {} scraped, {} validated",
        meta.raw_records, meta.validated_records
    );
    println!(
        "   Pain points: {} ({} mentions)",
        meta.pain_point_count,
        report.total_mentions()
    );
    for point in report.pain_points.iter().take(5) {
        println!("     {}. {} ({} mentions)", point.id, point.description, point.mentions);
    }
    println!("   Duration: {:.1}s", meta.duration_seconds);
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
