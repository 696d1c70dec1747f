mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use plexmeta_core::{
    create_report_system, load_config, metrics, validate_config, Library, LibraryAggregator,
    LocalAssetBuilder, LogSink, LookupCaches, MetadataCache, RunOptions, SnapshotCatalog,
    SqliteMetadataCache, SummaryCollector,
};

use args::Args;

/// Buffer size for the processing event channel
const REPORT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.log_json);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    info!("Loading configuration from {:?}", args.config);
    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    validate_config(&config).context("Configuration validation failed")?;
    if args.dry_run {
        config.features.dry_run = true;
    }
    info!("Metadata directory: {:?}", config.metadata.directory);
    if config.features.dry_run {
        info!("Dry run: no documents or cache will be written");
    }
    let config = Arc::new(config);

    // Open the catalog snapshot
    let catalog = Arc::new(
        SnapshotCatalog::open(&config.catalog.snapshot_path).with_context(|| {
            format!(
                "Failed to open catalog snapshot {:?}",
                config.catalog.snapshot_path
            )
        })?,
    );
    let libraries: Vec<Arc<dyn Library>> = {
        let selected = args.selected_libraries(&config.catalog.libraries);
        if selected.is_empty() {
            catalog.libraries()
        } else {
            selected
                .iter()
                .map(|name| catalog.library(name))
                .collect::<Result<_, _>>()
                .with_context(|| {
                    format!(
                        "Unknown library selected (available: {})",
                        catalog.library_names().join(", ")
                    )
                })?
        }
    };
    info!("Processing {} libraries", libraries.len());

    // Create report system
    let (report, report_writer) = create_report_system(Arc::new(LogSink), REPORT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(report_writer.run());

    let summaries = SummaryCollector::new();
    let mut aggregator = LibraryAggregator::new(
        Arc::clone(&config),
        catalog.clone(),
        LocalAssetBuilder::builders(config.assets.directory.clone()),
        report.clone(),
    )
    .with_summaries(summaries.clone());

    // Lookup cache
    if config.cache.enabled {
        let cache = Arc::new(
            SqliteMetadataCache::new(&config.cache.path).with_context(|| {
                format!("Failed to open lookup cache {:?}", config.cache.path)
            })?,
        );
        let state = cache.load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable lookup cache: {}", e);
            Default::default()
        });
        info!("Lookup cache loaded ({} entries)", state.len());
        aggregator = aggregator
            .with_cache(cache)
            .with_lookup_caches(Arc::new(LookupCaches::from_state(state)));
    }
    let aggregator = Arc::new(aggregator);

    // Ctrl-C / SIGTERM cancels the run in flight
    let signal_task = {
        let aggregator = Arc::clone(&aggregator);
        tokio::spawn(async move {
            shutdown_signal().await;
            aggregator.shutdown();
        })
    };

    let options = RunOptions::from_config(&config);
    let outcomes = aggregator.run_all(libraries, &options).await;

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    let items: usize = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|run| run.stats.len())
        .sum();
    if failed > 0 {
        warn!("{} of {} libraries failed", failed, outcomes.len());
    }
    info!(
        "Finished: {} libraries, {} items built",
        outcomes.len() - failed,
        items
    );

    if args.summary_json {
        let json = serde_json::to_string_pretty(&summaries.summaries().await)
            .context("Failed to serialize summaries")?;
        println!("{}", json);
    }

    if let Some(path) = &config.metrics.output_path {
        std::fs::write(path, metrics::render_metrics())
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
    }

    // Flush pending events
    signal_task.abort();
    let _ = signal_task.await;
    drop(aggregator);
    drop(report);
    let _ = writer_handle.await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
