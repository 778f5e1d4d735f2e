// Path: crates/node/src/main.rs
#![forbid(unsafe_code)]

//! The Chainwatch fleet monitor binary: configuration, wiring and lifecycle.

mod config;

use chainwatch_analysis::{Analyzer, AnalyzerOptions};
use chainwatch_messaging::{AlertBroker, PairServer};
use chainwatch_poller::{Poller, PrivateNodesHandler};
use chainwatch_storage::{EventsStorage, NodesStorage};
use chainwatch_types::error::InternalError;
use chainwatch_types::AlertType;
use clap::Parser;
use config::Opts;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};

const INVALID_CONFIGURATION_EXIT_CODE: i32 = 2;
const CANCELLED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    if let Err(error) = chainwatch_telemetry::init_tracing(opts.log_json) {
        eprintln!("failed to initialize logging: {error}");
        std::process::exit(INVALID_CONFIGURATION_EXIT_CODE);
    }
    tracing::info!(
        target = "node",
        version = env!("CARGO_PKG_VERSION"),
        "starting chainwatch"
    );
    if let Err(message) = opts.validate() {
        tracing::error!(target = "node", %message, "invalid configuration");
        std::process::exit(INVALID_CONFIGURATION_EXIT_CODE);
    }

    if let Err(error) = run(opts).await {
        if error
            .downcast_ref::<InternalError>()
            .is_some_and(|e| matches!(e, InternalError::Cancelled))
        {
            std::process::exit(CANCELLED_EXIT_CODE);
        }
        tracing::error!(target = "node", %error, "fatal error");
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let nodes = Arc::new(NodesStorage::open(&opts.storage, &opts.seed_urls())?);
    for url in opts.private_urls() {
        nodes.add_specific(&url)?;
    }
    let events = Arc::new(EventsStorage::new(Duration::from_secs(opts.retention)));

    let (shutdown_sender, shutdown) = watch::channel(false);
    spawn_signal_listener(shutdown_sender);

    tokio::spawn(chainwatch_telemetry::http::run_server(
        opts.telemetry_bind,
        shutdown.clone(),
    ));

    // The pipeline, stage by stage: poller -> private overlay -> analyzer ->
    // alert bus. Each stage owns the channel to the next, so shutdown
    // cascades down once the poller stops.
    let poller = Poller::new(
        Arc::clone(&nodes),
        Arc::clone(&events),
        Duration::from_secs(opts.interval),
        Duration::from_secs(opts.timeout),
    );
    let notifications = poller.start(shutdown.clone());

    let private =
        PrivateNodesHandler::with_unreachable_initial_state(Arc::clone(&events), Arc::clone(&nodes))?;
    let observations = private.writer();
    let notifications = private.run(notifications);

    let mut analyzer_options = AnalyzerOptions::new(opts.base_target_threshold);
    analyzer_options.height_delta = opts.height_delta;
    analyzer_options.alert_backoff = opts.alert_backoff;
    analyzer_options.alert_vacuum_quota = opts.alert_vacuum_quota;
    analyzer_options
        .required_confirmations
        .insert(AlertType::Height, opts.height_confirmations);
    let analyzer = Analyzer::new(Arc::clone(&events), analyzer_options);
    let alerts = analyzer.start(notifications);

    let broker = Arc::new(AlertBroker::new());
    let bus = Arc::clone(&broker).run(alerts);

    // The pair request sender is the attachment point for front-end
    // transports; it stays open until shutdown.
    let (pair_requests, pair_receiver) = mpsc::channel(16);
    let pair = PairServer::new(
        Arc::clone(&nodes),
        Arc::clone(&events),
        observations,
        Duration::from_secs(opts.pair_deadline),
    )
    .start(pair_receiver);

    let mut shutdown_watch = shutdown;
    let _ = shutdown_watch.changed().await;
    tracing::info!(target = "node", "shutting down");

    // Wait for the pipeline to drain through the bus, then release the pair
    // channel and run one final retention pass.
    bus.await
        .map_err(|e| anyhow::anyhow!("alert bus task failed: {e}"))?;
    drop(pair_requests);
    pair.await
        .map_err(|e| anyhow::anyhow!("pair server task failed: {e}"))?;

    let cutoff = unix_now() - opts.retention as i64;
    let reclaimed = events.vacuum(cutoff);
    tracing::info!(target = "node", reclaimed, "final vacuum complete, goodbye");
    // Reaching this point always means the shutdown signal fired; report the
    // cancellation so the process exits with the cancellation code.
    Err(InternalError::Cancelled.into())
}

fn spawn_signal_listener(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = terminate.recv() => {}
                    }
                }
                Err(error) => {
                    tracing::warn!(target = "node", %error, "no SIGTERM handler, SIGINT only");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!(target = "node", "shutdown signal received");
        let _ = shutdown.send(true);
    });
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
