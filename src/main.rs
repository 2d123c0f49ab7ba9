use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tsubame::cache::{CacheEntry, CacheKey, CacheManager, CacheTier, DurableTier, Namespace};
use tsubame::config::Config;

/// Tsubame - tiered client cache maintenance tool
#[derive(Parser, Debug)]
#[command(name = "tsubame")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Operate on the durable tier; without a command, run the sweeper
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a cached payload
    Get {
        key: String,
        #[arg(short, long, default_value = "api")]
        namespace: Namespace,
    },
    /// Store a JSON payload
    Set {
        key: String,
        /// JSON document to store
        value: String,
        #[arg(short, long, default_value = "api")]
        namespace: Namespace,
        /// Defaults to the namespace TTL
        #[arg(long)]
        ttl_seconds: Option<u64>,
    },
    /// Remove one entry
    Delete {
        key: String,
        #[arg(short, long, default_value = "api")]
        namespace: Namespace,
    },
    /// Remove one namespace, or everything
    Clear {
        #[arg(short, long)]
        namespace: Option<Namespace>,
    },
    /// Remove expired entries once
    Sweep,
    /// Print tier statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    if args.test {
        println!("Configuration {} is valid", args.config.display());
        return Ok(());
    }

    tsubame::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        config_file = %args.config.display(),
        durable_dir = %config.cache.durable.dir.display(),
        memory_max_entries = config.cache.memory.max_entries,
        "Configuration loaded successfully"
    );

    match args.command {
        Some(command) => run_command(&config, command).await,
        None => run_sweeper(config).await,
    }
}

async fn run_command(config: &Config, command: Command) -> anyhow::Result<()> {
    let tier = DurableTier::open(&config.cache.durable)
        .await
        .context("Failed to open durable cache")?;

    match command {
        Command::Get { key, namespace } => {
            let key = CacheKey::new(namespace, key);
            match tier.get(&key).await? {
                Some(entry) => println!("{}", String::from_utf8_lossy(&entry.payload)),
                None => {
                    eprintln!("{} not found", key);
                    std::process::exit(1);
                }
            }
        }
        Command::Set {
            key,
            value,
            namespace,
            ttl_seconds,
        } => {
            let parsed: serde_json::Value =
                serde_json::from_str(&value).context("Value is not valid JSON")?;
            let ttl = ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.cache.ttl_for(namespace));
            let entry = CacheEntry::new(Bytes::from(serde_json::to_vec(&parsed)?), ttl);
            tier.set(CacheKey::new(namespace, key), entry).await?;
        }
        Command::Delete { key, namespace } => {
            let existed = tier.delete(&CacheKey::new(namespace, key)).await?;
            println!("{}", if existed { "deleted" } else { "not found" });
        }
        Command::Clear { namespace } => match namespace {
            Some(ns) => println!("{} entries removed", tier.clear_namespace(ns).await?),
            None => tier.clear().await?,
        },
        Command::Sweep => println!("{} entries removed", tier.purge_expired().await?),
        Command::Stats => println!("{}", serde_json::to_string_pretty(&tier.stats().await?)?),
    }
    Ok(())
}

async fn run_sweeper(config: Config) -> anyhow::Result<()> {
    let manager = CacheManager::from_config(config.cache).await;
    let Some(janitor) = manager.spawn_janitor() else {
        anyhow::bail!("Durable cache is disabled or unavailable, nothing to sweep");
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    janitor.shutdown().await;
    Ok(())
}
