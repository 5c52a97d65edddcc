use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bl_hello::{
    CachePolicy, FileNameValueStore, HelloCache, HelloCacheResult, HelloConfig,
    StaticVersionResolver, SystemClock,
};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

/// Inspect and maintain the on-disk broker hello cache
#[derive(Debug, Parser)]
#[command(name = "brokerlink", version, about)]
pub struct Cli {
    /// Path to hello.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the cached hello result for a version range
    Inspect {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Record a negotiated protocol version
    Seed {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        range: RangeArgs,
        /// Negotiated protocol version to store
        #[arg(long)]
        negotiated: String,
    },
    /// Record a broker rejection for a version range
    SeedError {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Remove every cached result for a protocol and target build
    Clear {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

/// Which cache to address
#[derive(Debug, Clone, Args)]
pub struct ScopeArgs {
    /// Protocol name, e.g. msal.broker
    #[arg(long)]
    pub protocol: String,

    /// Package name of the target broker app
    #[arg(long)]
    pub target: String,

    /// Installed version code of the target app; omitted means unknown
    #[arg(long)]
    pub target_version: Option<String>,
}

/// Version range that was negotiated
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    #[arg(long)]
    pub min: Option<String>,

    #[arg(long)]
    pub max: String,
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => HelloConfig::default_config_path()?,
        };
        let config = HelloConfig::load_or_default(&config_path)
            .await
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        let storage_dir = config.resolve_storage_dir()?;
        debug!("Using hello cache store in {}", storage_dir.display());

        let store = FileNameValueStore::new(&storage_dir, &config.store_namespace)
            .await
            .with_context(|| format!("Failed to open store in {}", storage_dir.display()))?
            .with_lock_timeout(config.lock_timeout());
        let store = Arc::new(store);
        let policy = config.cache_policy();

        let open = |scope: &ScopeArgs| -> HelloCache { open_cache(store.clone(), scope, policy) };

        match self.command {
            Commands::Inspect { scope, range } => {
                let cache = open(&scope);
                let key = cache.key(range.min.as_deref(), &range.max);
                match cache
                    .get_hello_cache_result(range.min.as_deref(), &range.max)
                    .await
                {
                    Some(HelloCacheResult::Negotiated(version)) => {
                        println!("{key}: negotiated {version}");
                    }
                    Some(HelloCacheResult::HandshakeError {
                        error_code,
                        error_message,
                    }) => {
                        println!(
                            "{key}: handshake error {} ({})",
                            error_code.as_deref().unwrap_or("-"),
                            error_message.as_deref().unwrap_or("-")
                        );
                    }
                    None => println!("{key}: miss"),
                }
            }
            Commands::Seed {
                scope,
                range,
                negotiated,
            } => {
                let cache = open(&scope);
                let key = cache.key(range.min.as_deref(), &range.max);
                cache
                    .try_save_negotiated_protocol_version(
                        range.min.as_deref(),
                        &range.max,
                        &negotiated,
                    )
                    .await
                    .with_context(|| format!("Failed to seed {key}"))?;
                println!("{key}: negotiated {negotiated}");
            }
            Commands::SeedError {
                scope,
                range,
                code,
                message,
            } => {
                let cache = open(&scope);
                let key = cache.key(range.min.as_deref(), &range.max);
                cache
                    .try_save_handshake_error(
                        range.min.as_deref(),
                        &range.max,
                        code.as_deref(),
                        message.as_deref(),
                    )
                    .await
                    .with_context(|| format!("Failed to seed handshake error for {key}"))?;
                println!("{key}: handshake error recorded");
            }
            Commands::Clear { scope } => {
                open(&scope)
                    .try_clear_cache()
                    .await
                    .with_context(|| format!("Failed to clear hello cache for {}", scope.protocol))?;
                println!("Cleared {} for {}", scope.protocol, scope.target);
            }
        }

        Ok(())
    }
}

fn open_cache(store: Arc<FileNameValueStore>, scope: &ScopeArgs, policy: CachePolicy) -> HelloCache {
    let resolver = StaticVersionResolver::new();
    if let Some(version) = &scope.target_version {
        resolver.set_version(&scope.target, version);
    }
    HelloCache::new(
        store,
        Arc::new(SystemClock),
        &scope.protocol,
        &scope.target,
        &resolver,
        policy,
    )
}
