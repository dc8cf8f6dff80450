//! Inkpress pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use inkpress_queue::{Broker, QueueManager};
use inkpress_worker::{WorkerConfig, WorkerContext, WorkerRegistry};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("inkpress=info".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting inkpress-worker");

    // Load configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Create the queue manager; workers require a reachable broker.
    let manager = Arc::new(QueueManager::with_default_queues(Broker::from_env()));
    if let Err(e) = manager.initialize().await {
        error!("Failed to initialize queue manager: {}", e);
        std::process::exit(1);
    }
    if !manager.is_available() {
        error!("No broker configured or broker unreachable; worker cannot run");
        std::process::exit(1);
    }

    // Build the shared context
    let ctx = match WorkerContext::from_env(config, Arc::clone(&manager)).await {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to build worker context: {}", e);
            std::process::exit(1);
        }
    };

    // Bind one worker per queue
    let registry = WorkerRegistry::new(Arc::clone(&manager), ctx);
    let workers = match registry.start() {
        Ok(workers) => workers,
        Err(e) => {
            error!("Failed to start workers: {}", e);
            std::process::exit(1);
        }
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");

    // Ordered shutdown: stop intake, close workers (in-flight jobs run to
    // completion), then close queues so no worker polls a closed queue.
    manager.begin_shutdown();
    workers.shutdown().await;
    manager.close();

    info!("Worker shutdown complete");
}
