//! brx-server binary entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brx_metadata::ReceiverConfig;
use brx_middleware::MiddlewareFactory;
use brx_receiver::{
    run_server, ErrorLogProducer, InMemoryInventory, ListenerManager, PerfDataProducer,
    ReceiverContext, ReceiverMetrics, ReplayLoop, Sampler, ServerState, StandardizationWorker,
    TelemetryKind, TransportSourceReceiver,
};

#[derive(Parser, Debug)]
#[command(name = "brx-server")]
#[command(about = "Browser performance and error telemetry receiver")]
struct Args {
    /// Path to receiver configuration file
    #[arg(short, long, env = "BRX_CONFIG")]
    config: PathBuf,
}

type Tasks = JoinSet<anyhow::Result<()>>;

/// Track a background task that has no result of its own
fn track(tasks: &mut Tasks, name: &'static str, handle: JoinHandle<()>) {
    tasks.spawn(async move {
        handle.await.with_context(|| format!("{name} task panicked"))
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ReceiverConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen_addr {}", config.listen_addr))?;

    info!(
        listen_addr = %addr,
        sample_rate = config.sample_rate,
        transport = ?config.transport.transport_type,
        perf_buffer = ?config.perf_data.buffer.path,
        error_log_buffer = ?config.error_log.buffer.path,
        "Starting receiver"
    );

    let registry = prometheus::Registry::new();
    let metrics = ReceiverMetrics::new(registry).context("Failed to register metrics")?;
    let inventory = Arc::new(InMemoryInventory::from_config(&config.inventory));
    let shutdown = CancellationToken::new();
    let mut tasks = Tasks::new();

    let transport = MiddlewareFactory::create_transport(&config.transport)
        .await
        .context("Failed to create transport")?;
    let (events, publisher) = TransportSourceReceiver::spawn(
        transport,
        &config.transport.subject_prefix,
        config.handoff.capacity,
        metrics.clone(),
        shutdown.clone(),
    );
    track(&mut tasks, "publisher", publisher);

    // Buffers must open before anything is accepted
    let perf_buffer = MiddlewareFactory::create_buffer(&config.perf_data.buffer)
        .context("Failed to open perf data retry buffer")?;
    let error_log_buffer = MiddlewareFactory::create_buffer(&config.error_log.buffer)
        .context("Failed to open error log retry buffer")?;

    let ctx = Arc::new(ReceiverContext::new(
        inventory.clone(),
        inventory.clone(),
        Arc::new(events),
        Sampler::new(config.sample_rate),
        metrics.clone(),
    ));
    let listeners = Arc::new(ListenerManager::with_defaults());

    let (perf_worker, handle) = StandardizationWorker::spawn(
        perf_buffer.clone(),
        &config.handoff,
        metrics.for_kind(TelemetryKind::PerfData),
        shutdown.clone(),
    );
    track(&mut tasks, "perf data worker", handle);
    let (error_log_worker, handle) = StandardizationWorker::spawn(
        error_log_buffer.clone(),
        &config.handoff,
        metrics.for_kind(TelemetryKind::ErrorLog),
        shutdown.clone(),
    );
    track(&mut tasks, "error log worker", handle);

    let perf_producer = Arc::new(PerfDataProducer::new(
        ctx.clone(),
        listeners.clone(),
        perf_worker,
    ));
    let error_log_producer = Arc::new(ErrorLogProducer::new(ctx, listeners, error_log_worker));

    let interval = Duration::from_millis(config.replay.interval_ms);
    let registrar = inventory.clone();
    let perf_replay = ReplayLoop::new(perf_buffer, perf_producer.clone(), interval)
        .with_before_pass(move || {
            registrar.apply_pending();
        });
    let registrar = inventory.clone();
    let error_log_replay = ReplayLoop::new(error_log_buffer, error_log_producer.clone(), interval)
        .with_before_pass(move || {
            registrar.apply_pending();
        });
    track(
        &mut tasks,
        "perf data replay",
        tokio::spawn(perf_replay.run(shutdown.clone())),
    );
    track(
        &mut tasks,
        "error log replay",
        tokio::spawn(error_log_replay.run(shutdown.clone())),
    );

    let state = ServerState::new(perf_producer, error_log_producer, metrics);
    state.set_ready(true);
    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        run_server(addr, state, server_shutdown)
            .await
            .context("Ingest server failed")
    });

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    info!("Receiver running, waiting for SIGTERM/SIGINT to stop");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down gracefully");
        }
        _ = sigint.recv() => {
            info!("SIGINT received, shutting down gracefully");
        }
        result = tasks.join_next() => {
            match result {
                Some(Ok(Ok(()))) => info!("Task exited early, shutting down all tasks"),
                Some(Ok(Err(e))) => error!(error = %e, "Task failed, shutting down all tasks"),
                Some(Err(e)) => error!(error = %e, "Task panicked, shutting down all tasks"),
                None => info!("All tasks completed"),
            }
        }
    }
    shutdown.cancel();

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Task failed during shutdown"),
            Err(e) => error!(error = %e, "Task panicked during shutdown"),
        }
    }

    info!("Receiver stopped");
    Ok(())
}
