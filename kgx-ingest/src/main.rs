//! kgx-ingest - triple file to KGX loader
//!
//! Reads tab-separated triple files from a data directory, normalizes node
//! identifiers and predicates, and writes `<stem>_nodes.<mode>`,
//! `<stem>_edges.<mode>` and `<stem>_load_metadata.json` next to each input.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kgx_common::config::{OutputMode, TomlConfig};
use kgx_ingest::{KgxLoader, LoaderConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for kgx-ingest
#[derive(Parser, Debug)]
#[command(name = "kgx-ingest")]
#[command(about = "Load triple files and create KGX node/edge files")]
#[command(version)]
struct Args {
    /// Directory holding the source files (outputs are written here)
    #[arg(short = 'd', long)]
    data_dir: PathBuf,

    /// Comma-separated source file names inside the data directory
    #[arg(short = 'f', long, value_delimiter = ',', required = true)]
    data_file: Vec<String>,

    /// Output mode (tsv or json); overrides the config file
    #[arg(short = 'm', long)]
    out_mode: Option<OutputMode>,

    /// Triples per processing block; overrides the config file
    #[arg(short = 'b', long)]
    block_size: Option<usize>,

    /// Configuration file (falls back to KGX_CONFIG, then the per-user default)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Directory of cache snapshots to seed the normalization caches from
    #[arg(long)]
    seed_cache: Option<PathBuf>,

    /// Directory to save the normalization caches to after the run
    #[arg(long)]
    save_cache: Option<PathBuf>,

    /// Keep source files after loading them
    #[arg(long)]
    keep_input: bool,

    /// Fail when an assembled pair has no relation for its group key
    #[arg(long)]
    strict_relations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = kgx_common::logging::with_bootstrap_logging(|| TomlConfig::load(args.config.as_deref()))
        .context("Failed to load configuration")?;
    if let Some(mode) = args.out_mode {
        config.output.mode = mode;
    }
    if let Some(block_size) = args.block_size {
        config.output.block_size = block_size;
    }
    config.validate().context("Invalid configuration")?;

    kgx_common::logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting kgx-ingest {}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", args.data_dir.display());

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let loader_config = LoaderConfig {
        keep_input: args.keep_input,
        strict_relations: args.strict_relations,
        ..LoaderConfig::new(args.data_dir.clone(), config.output.clone())
    };

    let mut loader = KgxLoader::from_config(&config, loader_config)
        .context("Failed to create loader")?
        .with_cancel_token(cancel);

    if let Some(dir) = &args.seed_cache {
        loader
            .seed_caches(dir)
            .with_context(|| format!("Failed to seed caches from {}", dir.display()))?;
    }

    let loaded = loader.load(&args.data_file).await.context("Load failed")?;

    if let Some(dir) = &args.save_cache {
        loader
            .save_caches(dir)
            .with_context(|| format!("Failed to save caches to {}", dir.display()))?;
    }

    for metadata in &loaded {
        info!(
            file = %metadata.source_file,
            nodes = metadata.node_count,
            edges = metadata.edge_count,
            unusable_lines = metadata.unusable_source_lines,
            "Load summary"
        );
    }

    Ok(())
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling load"),
        _ = terminate => info!("Received terminate signal, cancelling load"),
    }

    cancel.cancel();
}
