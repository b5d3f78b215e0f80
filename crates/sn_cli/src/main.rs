use anyhow::Context;
use clap::{Parser, Subcommand};
use sn_core::config::{PipelineConfig, StorageBackendKind};
use sn_core::logging::init_logging;
use sn_core::{ArticleStorage, EnrichmentModel, EnrichmentStatus, Trigger};
use sn_pipeline::Orchestrator;
use sn_scrapers::ScraperRegistry;
use sn_web::AppState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

mod duration;

use duration::HumanDuration;

const DEFAULT_CONFIG: &str = "sn.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Startup news aggregation pipeline", long_about = None)]
pub struct Cli {
    /// TOML config file. Defaults to ./sn.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Storage backend, overriding the config file (memory, sqlite)
    #[arg(long, global = true)]
    storage: Option<String>,
    /// SQLite database path, overriding the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Credential for the enrichment provider. Falls back to SN_API_KEY.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline once and print the run summary
    Run {
        /// Trigger payload, e.g. '{"action": "reconcile"}'
        #[arg(long)]
        trigger: Option<String>,
    },
    /// Run the pipeline periodically (e.g. 1h, 30m, 1d, 1h15m30s)
    Schedule {
        #[arg(long, default_value = "1h")]
        interval: HumanDuration,
        #[arg(long)]
        trigger: Option<String>,
    },
    /// List the registered source adapters
    Sources,
    /// List stored articles
    Articles {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        source: Option<String>,
        /// pending, enriched or failed
        #[arg(long)]
        status: Option<EnrichmentStatus>,
    },
    /// List recent runs
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Serve the trigger and query API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => PipelineConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => PipelineConfig::default(),
    };

    if let Some(backend) = cli.storage.as_deref() {
        config.storage.backend = match backend.to_lowercase().as_str() {
            "memory" => StorageBackendKind::Memory,
            "sqlite" => StorageBackendKind::Sqlite,
            other => anyhow::bail!("Unknown storage backend: {}", other),
        };
    }
    if let Some(db) = &cli.db {
        config.storage.path = db.clone();
    }
    config.enrichment.api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("SN_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());
    Ok(config)
}

async fn open_storage(config: &PipelineConfig) -> anyhow::Result<Arc<dyn ArticleStorage>> {
    info!("💾 Checking storage connection...");
    let storage = sn_storage::create_storage(&config.storage).await?;
    sn_storage::check_storage(storage.as_ref()).await?;
    Ok(storage)
}

async fn build_orchestrator(config: PipelineConfig) -> anyhow::Result<Orchestrator> {
    let registry = ScraperRegistry::with_defaults();
    config.validate(&registry.ids())?;

    let storage = open_storage(&config).await?;
    let model = sn_inference::create_model(&config.enrichment).await?;
    info!("🧠 Enrichment model initialized (using {})", model.name());
    info!("🦗 Source adapters: {}", registry.ids().join(", "));

    Ok(Orchestrator::new(config, registry, model, storage))
}

fn parse_trigger(raw: Option<&str>) -> anyhow::Result<Trigger> {
    match raw {
        Some(payload) => Ok(Trigger::parse(payload)?),
        None => Ok(Trigger::aggregate()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { ref trigger } => {
            let trigger = parse_trigger(trigger.as_deref())?;
            let orchestrator = build_orchestrator(config).await?;
            let summary = orchestrator.run(&trigger).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Schedule { interval, ref trigger } => {
            let trigger = parse_trigger(trigger.as_deref())?;
            let orchestrator = build_orchestrator(config).await?;
            info!("⏰ Running every {}s", interval.0.as_secs());
            loop {
                if let Err(e) = orchestrator.run(&trigger).await {
                    error!(error = %e, "Run failed");
                }
                info!("💤 Waiting {}s before next run", interval.0.as_secs());
                tokio::time::sleep(interval.0).await;
            }
        }
        Commands::Sources => {
            let registry = ScraperRegistry::with_defaults();
            for meta in registry.metadata() {
                let configured = config.sources.iter().find(|s| s.id == meta.id);
                let state = match configured {
                    Some(source) if source.enabled => source.url.as_str(),
                    Some(_) => "(disabled)",
                    None => "(not configured)",
                };
                println!("{} {:<18} {:<18} {}", meta.emoji, meta.id, meta.name, state);
            }
        }
        Commands::Articles { limit, ref source, status } => {
            let storage = open_storage(&config).await?;
            let articles = match (source.as_deref(), status) {
                (Some(source), status) => {
                    let mut articles = storage.get_by_source(source).await?;
                    if let Some(status) = status {
                        articles.retain(|a| a.enrichment_status == status);
                    }
                    articles.truncate(limit);
                    articles
                }
                (None, Some(status)) => storage.list_by_status(status, limit).await?,
                (None, None) => storage.list_recent(limit).await?,
            };
            for article in articles {
                println!(
                    "[{}] {} {} ({})",
                    article.enrichment_status,
                    article.published_at.format("%Y-%m-%d"),
                    article.title,
                    article.source_id
                );
                if !article.url.is_empty() {
                    println!("    {}", article.url);
                }
                if let Some(summary) = &article.summary {
                    println!("    {}", summary);
                }
            }
        }
        Commands::Runs { limit } => {
            let storage = open_storage(&config).await?;
            for run in storage.list_runs(limit).await? {
                println!(
                    "{} {} {:<15} sources {}/{} failed, {} new, {} enrichment failures",
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.run_id,
                    run.status.map(|s| s.as_str()).unwrap_or("running"),
                    run.sources_failed,
                    run.sources_attempted,
                    run.articles_new,
                    run.articles_enrichment_failed
                );
            }
        }
        Commands::Serve { addr } => {
            let orchestrator = build_orchestrator(config).await?;
            sn_web::serve(addr, AppState::new(Arc::new(orchestrator)))
                .await
                .context("web server stopped")?;
        }
    }

    Ok(())
}
