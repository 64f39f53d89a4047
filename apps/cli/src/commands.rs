//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use moralgraph_core::{DropPolicy, HttpFetcher, HttpScorer, Pipeline, PipelineReport, RequestMode};
use moralgraph_graph::{FusekiClient, ProjectionReport, Projector};
use moralgraph_shared::{AppConfig, init_config, load_config};
use moralgraph_storage::Storage;
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// moralgraph — annotate news articles with moral-foundation scores.
#[derive(Parser)]
#[command(
    name = "moralgraph",
    version,
    about = "Fetch, score, and store moral-foundation annotations for news articles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Annotate a single article URL (any failure aborts).
    Annotate {
        /// Article URL to fetch and score.
        url: String,

        /// Persist relationally only; skip graph projection.
        #[arg(long)]
        no_graph: bool,
    },

    /// Annotate a list of article URLs (failing URLs are skipped).
    Batch {
        /// Article URLs to fetch and score.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Persist relationally only; skip graph projection.
        #[arg(long)]
        no_graph: bool,
    },

    /// Annotate every article listed by an RSS feed.
    Rss {
        /// Feed URL to expand.
        url: String,

        /// Persist relationally only; skip graph projection.
        #[arg(long)]
        no_graph: bool,
    },

    /// Show one article and its stored assessments.
    Show {
        /// Relational article id.
        article_id: i64,
    },

    /// Re-project the whole relational store into the graph.
    Backfill,

    /// Probe the relational and graph stores.
    Health,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "moralgraph=info",
        1 => "moralgraph=debug",
        _ => "moralgraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Annotate { url, no_graph } => {
            cmd_annotate(&[url], RequestMode::Single, no_graph).await
        }
        Command::Batch { urls, no_graph } => cmd_annotate(&urls, RequestMode::Batch, no_graph).await,
        Command::Rss { url, no_graph } => cmd_rss(&url, no_graph).await,
        Command::Show { article_id } => cmd_show(article_id).await,
        Command::Backfill => cmd_backfill().await,
        Command::Health => cmd_health().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = expand_home(&config.database.path);
    Ok(Storage::open(&path).await?)
}

fn drop_policy(config: &AppConfig) -> DropPolicy {
    DropPolicy::from_flag(config.pipeline.drop_empty_rows)
}

fn graph_client(config: &AppConfig, with_heartbeat: bool) -> Result<FusekiClient> {
    let mut client = FusekiClient::new(&config.graph_store)?;
    if with_heartbeat {
        client.spawn_heartbeat(config.graph_store.heartbeat_interval());
    }
    Ok(client)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_annotate(urls: &[String], mode: RequestMode, no_graph: bool) -> Result<()> {
    for url in urls {
        Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
    }

    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let fetcher = HttpFetcher::new(Duration::from_secs(config.pipeline.fetch_timeout_secs))?;
    let scorer = HttpScorer::new(&config.scoring)?;
    let pipeline =
        Pipeline::new(&fetcher, &scorer, &storage).with_drop_policy(drop_policy(&config));

    info!(urls = urls.len(), ?mode, "annotating");

    if no_graph {
        let result = pipeline.annotate(urls, mode).await?;
        print_persisted(result.persisted.articles.len(), result.persisted.assessments.len());
        print_skipped(&result.skipped.iter().map(|s| (s.url.as_str(), s.reason.as_str())).collect::<Vec<_>>());
        return Ok(());
    }

    let graph = graph_client(&config, true)?;
    let projector = Projector::new(&graph);
    let report = pipeline.annotate_and_project(urls, mode, &projector).await?;
    print_report(&report);
    Ok(())
}

async fn cmd_rss(feed_url: &str, no_graph: bool) -> Result<()> {
    Url::parse(feed_url).map_err(|e| eyre!("invalid feed URL '{feed_url}': {e}"))?;

    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let fetcher = HttpFetcher::new(Duration::from_secs(config.pipeline.fetch_timeout_secs))?;
    let scorer = HttpScorer::new(&config.scoring)?;
    let pipeline =
        Pipeline::new(&fetcher, &scorer, &storage).with_drop_policy(drop_policy(&config));

    info!(feed = feed_url, "annotating feed");

    let result = pipeline.annotate_feed(feed_url).await?;
    if no_graph {
        print_persisted(result.persisted.articles.len(), result.persisted.assessments.len());
        print_skipped(&result.skipped.iter().map(|s| (s.url.as_str(), s.reason.as_str())).collect::<Vec<_>>());
        return Ok(());
    }

    let graph = graph_client(&config, true)?;
    let projector = Projector::new(&graph);
    let projection = pipeline.project_persisted(&result.persisted, &projector).await?;
    print_persisted(result.persisted.articles.len(), result.persisted.assessments.len());
    print_projection(&projection);
    print_skipped(&result.skipped.iter().map(|s| (s.url.as_str(), s.reason.as_str())).collect::<Vec<_>>());
    Ok(())
}

async fn cmd_show(article_id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let article = storage
        .get_article(article_id)
        .await?
        .ok_or_else(|| eyre!("article {article_id} not found"))?;
    let assessments = storage.assessments_for_article(article_id).await?;

    println!();
    println!("  Article {}", article.id);
    if let Some(identifier) = &article.identifier {
        println!("  Identifier: {identifier}");
    }
    println!("  Title:      {}", article.title);
    println!("  URL:        {}", article.url);
    if assessments.is_empty() {
        println!("  No assessments recorded.");
    }
    for a in &assessments {
        let confidence = a
            .confidence
            .map(|c| format!(", confidence {c:.2}"))
            .unwrap_or_default();
        println!(
            "    {:<10} {} (intensity {:.1}{confidence})",
            a.moral_foundation, a.polarity, a.intensity
        );
    }
    println!();
    Ok(())
}

async fn cmd_backfill() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let graph = graph_client(&config, true)?;
    let projector = Projector::new(&graph);

    let report = moralgraph_core::backfill(&storage, &projector, drop_policy(&config)).await?;
    print_projection(&report);
    Ok(())
}

async fn cmd_health() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let graph = graph_client(&config, false)?;

    let report = moralgraph_core::health(&storage, &graph).await;
    println!("  database:    {}", if report.database { "ok" } else { "unreachable" });
    println!("  graph store: {}", if report.graph_store { "ok" } else { "unreachable" });

    if !report.healthy() {
        return Err(eyre!("one or more stores are unreachable"));
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(report: &PipelineReport) {
    print_persisted(report.persisted_articles, report.persisted_assessments);
    print_projection(&report.projection);
    print_skipped(
        &report
            .skipped
            .iter()
            .map(|s| (s.url.as_str(), s.reason.as_str()))
            .collect::<Vec<_>>(),
    );
}

fn print_persisted(articles: usize, assessments: usize) {
    println!();
    println!("  Persisted:   {articles} article(s), {assessments} assessment(s)");
}

fn print_projection(projection: &ProjectionReport) {
    println!(
        "  Projected:   {} article(s), {} annotation(s)",
        projection.articles, projection.annotations
    );
    if projection.skipped_scores > 0 {
        println!("  Skipped:     {} score(s) with invalid intensity", projection.skipped_scores);
    }
}

fn print_skipped(skipped: &[(&str, &str)]) {
    if !skipped.is_empty() {
        println!("  Skipped URLs:");
        for (url, reason) in skipped {
            println!("    {url} — {reason}");
        }
    }
    println!();
}
