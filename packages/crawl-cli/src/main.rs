//! `crawl` - run a bounded listing crawl from a JSON configuration.

mod settings;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use listing_crawler::{
    build_fetcher, sinks, CrawlConfig, CrawlOutcome, CrawlScheduler, OutputFormat,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "crawl")]
#[command(about = "Crawl listing pages and export structured records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crawl and write the records
    Run(RunArgs),

    /// Validate a configuration and print it with defaults filled in
    Check {
        #[arg(long, short)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Crawl configuration (JSON)
    #[arg(long, short)]
    config: PathBuf,

    /// Output file (defaults to $CRAWL_OUTPUT_DIR/listings.<ext>)
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// json, jsonl or csv (defaults to $CRAWL_FORMAT or json)
    #[arg(long, short)]
    format: Option<OutputFormat>,

    /// Drop records published before this year
    #[arg(long)]
    min_year: Option<i32>,

    /// Keep records whose date is unknown
    #[arg(long)]
    keep_undated: bool,

    #[arg(long)]
    max_urls: Option<usize>,

    #[arg(long)]
    max_depth: Option<u32>,

    /// Follow same-site links beyond the listings
    #[arg(long)]
    deep: bool,

    /// Fetch each record's own page to fill in details
    #[arg(long)]
    enrich: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut CrawlConfig) {
        if let Some(min_year) = self.min_year {
            config.retention.min_year = min_year;
        }
        if self.keep_undated {
            config.retention.keep_undated = true;
        }
        if let Some(max_urls) = self.max_urls {
            config.budget.max_urls = max_urls;
        }
        if let Some(max_depth) = self.max_depth {
            config.budget.max_depth = max_depth;
        }
        if self.deep {
            config.deep = true;
        }
        if self.enrich {
            config.enrich_details = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,listing_crawler=info,reqwest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::from_env().context("Failed to load settings")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args, &settings).await,
        Commands::Check { config } => check(config),
    }
}

async fn run(args: RunArgs, settings: &Settings) -> Result<()> {
    let mut config = load_config(&args.config)?;
    args.apply(&mut config);
    if config.fetch.user_agent.is_none() {
        config.fetch.user_agent = settings.user_agent.clone();
    }

    let format = args.format.unwrap_or(settings.default_format);
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| settings.default_output(format));

    let fetcher = build_fetcher(&config.fetch).context("Failed to build HTTP client")?;
    let scheduler = CrawlScheduler::new(fetcher, config).context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            on_signal.cancel();
        }
    });

    let outcome = scheduler.run_with_cancel(cancel).await;

    let bytes = sinks::render(format, &outcome.records).context("Failed to serialize records")?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&out, bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    print_report(&outcome);
    println!(
        "{} {} records written to {}",
        "✅".green(),
        outcome.records.len(),
        out.display().to_string().bold()
    );
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let config = load_config(&path)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?
    );
    println!(
        "{} {} seed(s), max {} URLs, depth {}",
        "✅ Configuration valid:".bright_green().bold(),
        config.seeds.len(),
        config.budget.max_urls,
        config.budget.max_depth
    );
    Ok(())
}

fn load_config(path: &Path) -> Result<CrawlConfig> {
    CrawlConfig::from_path(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn print_report(outcome: &CrawlOutcome) {
    let report = outcome.report();
    let summary = &report.summary;

    println!();
    println!("{}", "📋 Crawl report".bright_blue().bold());
    println!("  Records: {}", report.total.to_string().bold());

    println!("{}", "  By category".bold());
    for (category, count) in &report.by_category {
        println!("    {category}: {count}");
    }
    println!("{}", "  By location".bold());
    for (location, count) in &report.by_location {
        println!("    {location}: {count}");
    }

    println!(
        "  Pages fetched: {}, URLs enqueued: {}, rejected by date: {}",
        summary.pages_fetched, summary.urls_enqueued, summary.records_rejected
    );
    if summary.failed_count() > 0 {
        println!(
            "{}",
            format!("  Failed URLs: {}", summary.failed_count()).red()
        );
        for url in &summary.failed_urls {
            println!("    {}", url.dimmed());
        }
    }
    if summary.budget_exhausted {
        println!("{}", "  URL budget exhausted".yellow());
    }
    if summary.cancelled {
        println!("{}", "  Cancelled: partial result".yellow().bold());
    }
}
