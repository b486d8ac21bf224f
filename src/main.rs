//! Spinneret command-line entry point.

use std::collections::HashSet;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spinneret::config::{load_options, validate, Options};
use spinneret::output::StandardWriter;
use spinneret::{Crawler, FieldScope, SpinneretError, Strategy};

/// Spinneret: a concurrent web crawling engine
///
/// Crawls each seed URL with a bounded worker pool, reporting every
/// in-scope discovery as it is made. Fetching uses either a plain HTTP
/// client or a headless browser.
#[derive(Parser, Debug)]
#[command(name = "spinneret")]
#[command(version)]
#[command(about = "A concurrent web crawling engine", long_about = None)]
struct Cli {
    /// Seed URLs (also read line-by-line from stdin when piped)
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum crawl depth
    #[arg(short, long)]
    depth: Option<usize>,

    /// Crawl time budget per seed, in seconds
    #[arg(long, value_name = "SECONDS")]
    crawl_duration: Option<u64>,

    /// Worker pool size
    #[arg(long)]
    concurrency: Option<usize>,

    /// Requests per second
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Traversal strategy (breadth-first, depth-first)
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Scope comparison field (host, subdomain, root-domain)
    #[arg(long)]
    field_scope: Option<FieldScope>,

    /// In-scope regex patterns
    #[arg(long = "scope", value_name = "REGEX")]
    scope: Vec<String>,

    /// Out-of-scope regex patterns
    #[arg(long = "out-of-scope", value_name = "REGEX")]
    out_of_scope: Vec<String>,

    /// Report out-of-scope discoveries instead of dropping them
    #[arg(long)]
    display_out_scope: bool,

    /// Probe robots.txt for extra candidates
    #[arg(long)]
    known_files: bool,

    /// Use the headless-browser backend
    #[arg(long)]
    headless: bool,

    /// Run the browser with a visible window
    #[arg(long, requires = "headless")]
    show_browser: bool,

    /// Pass --no-sandbox to the browser
    #[arg(long, requires = "headless")]
    no_sandbox: bool,

    /// HTTP/SOCKS proxy URL
    #[arg(long)]
    proxy: Option<String>,

    /// Write results to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit JSON lines instead of bare URLs
    #[arg(short, long)]
    json: bool,

    /// Suppress screen output
    #[arg(long)]
    silent: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error log output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let options = build_options(&cli).context("invalid configuration")?;
    let seeds = collect_seeds(&cli.urls)?;
    if seeds.is_empty() {
        return Err(SpinneretError::NoSeeds.into());
    }
    tracing::info!("Crawling {} seed(s)", seeds.len());

    let writer = Arc::new(StandardWriter::new(
        options.output.json,
        options.output.silent,
        options.output.file.as_deref().map(Path::new),
        options.output.error_log.as_deref().map(Path::new),
    )?);
    let crawler = Crawler::new(options, writer).await?;

    for seed in &seeds {
        if let Err(e) = crawler.crawl(seed).await {
            // A bad seed or an exhausted budget ends that seed's crawl,
            // not the whole run.
            tracing::warn!("Crawl of {} failed: {}", seed, e);
        }
    }
    crawler.close().await;
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spinneret=info,warn"),
            1 => EnvFilter::new("spinneret=debug,info"),
            2 => EnvFilter::new("spinneret=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file (if given) and layers CLI overrides on top.
fn build_options(cli: &Cli) -> anyhow::Result<Options> {
    let mut options = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_options(path)?
        }
        None => Options::default(),
    };

    if let Some(depth) = cli.depth {
        options.max_depth = depth;
    }
    if let Some(duration) = cli.crawl_duration {
        options.crawl_duration = duration;
    }
    if let Some(concurrency) = cli.concurrency {
        options.concurrency = concurrency;
    }
    if let Some(rate_limit) = cli.rate_limit {
        options.rate_limit = rate_limit;
    }
    if let Some(strategy) = cli.strategy {
        options.strategy = strategy;
    }
    if let Some(field_scope) = cli.field_scope {
        options.field_scope = field_scope;
    }
    if !cli.scope.is_empty() {
        options.scope = cli.scope.clone();
    }
    if !cli.out_of_scope.is_empty() {
        options.out_of_scope = cli.out_of_scope.clone();
    }
    if cli.display_out_scope {
        options.display_out_scope = true;
    }
    if cli.known_files {
        options.known_files = true;
    }
    if cli.headless {
        options.headless.enabled = true;
    }
    if cli.show_browser {
        options.headless.show_browser = true;
    }
    if cli.no_sandbox {
        options.headless.no_sandbox = true;
    }
    if let Some(proxy) = &cli.proxy {
        options.proxy = Some(proxy.clone());
    }
    if let Some(output) = &cli.output {
        options.output.file = Some(output.display().to_string());
    }
    if cli.json {
        options.output.json = true;
    }
    if cli.silent {
        options.output.silent = true;
    }

    validate(&options)?;
    Ok(options)
}

/// Seeds come from arguments and, when piped, stdin lines. Order is
/// preserved; duplicates and blank lines are dropped.
fn collect_seeds(args: &[String]) -> anyhow::Result<Vec<String>> {
    let mut seeds: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut add = |raw: &str| {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_string()) {
            seeds.push(trimmed.to_string());
        }
    };

    for url in args {
        add(url);
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        for line in stdin.lock().lines() {
            add(&line.context("failed to read stdin")?);
        }
    }
    Ok(seeds)
}
