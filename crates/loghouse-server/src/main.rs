//! Loghouse server
//!
//! Single-node entry point: brings up the three stores with bounded-retry
//! connection establishment and idempotent schema creation, starts one
//! processor loop per bus partition, and serves the HTTP edge.
//!
//! ## Configuration
//! All configuration is via environment variables:
//!
//! - `LOGHOUSE_PORT`: HTTP port (default: 8081)
//! - `LOGHOUSE_PAYLOAD_DB`: payload store path (default: ./data/payloads.db)
//! - `LOGHOUSE_INDEX_DB`: index store path (default: ./data/index.db)
//! - `LOGHOUSE_ACCESS_DB`: account store path (default: ./data/access.db)
//! - `LOGHOUSE_PARTITIONS`: bus partition count (default: 4)
//! - `LOGHOUSE_BUS_CHANNELS`: publisher channels, round-robined (default: 1)
//! - `LOGHOUSE_CONNECT_ATTEMPTS`: store connect retries (default: 10)
//! - `LOGHOUSE_CONNECT_INTERVAL_SECS`: delay between retries (default: 5)
//!
//! ## Logging
//! Controlled via `RUST_LOG` (default `info`).

use std::sync::Arc;
use std::time::Duration;

use loghouse_api::{create_router, AppState};
use loghouse_bus::InMemoryBus;
use loghouse_client::Publisher;
use loghouse_processor::Processor;
use loghouse_query::{Aggregator, QueryFederator};
use loghouse_store::{
    connect_with_retry, AccessControl, IndexStore, PayloadStore, RetrySettings,
    SqliteAccessStore, SqliteIndexStore, SqlitePayloadStore,
};

const CONSUMER_GROUP: &str = "log-processors";

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = env_or("LOGHOUSE_PORT", "8081").parse()?;
    let payload_db = env_or("LOGHOUSE_PAYLOAD_DB", "./data/payloads.db");
    let index_db = env_or("LOGHOUSE_INDEX_DB", "./data/index.db");
    let access_db = env_or("LOGHOUSE_ACCESS_DB", "./data/access.db");
    let partitions: u32 = env_or("LOGHOUSE_PARTITIONS", "4").parse()?;
    let channels: usize = env_or("LOGHOUSE_BUS_CHANNELS", "1").parse()?;
    let retry = RetrySettings {
        max_attempts: env_or("LOGHOUSE_CONNECT_ATTEMPTS", "10").parse()?,
        interval: Duration::from_secs(env_or("LOGHOUSE_CONNECT_INTERVAL_SECS", "5").parse()?),
    };

    for db_path in [&payload_db, &index_db, &access_db] {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Stores come up with bounded retry; schema creation is idempotent and
    // happens inside each constructor.
    tracing::info!("Initializing payload store at {}", payload_db);
    let payload_store: Arc<dyn PayloadStore> = Arc::new(
        connect_with_retry("payload store", retry, || SqlitePayloadStore::new(&payload_db))
            .await?,
    );

    tracing::info!("Initializing index store at {}", index_db);
    let index_store: Arc<dyn IndexStore> = Arc::new(
        connect_with_retry("index store", retry, || SqliteIndexStore::new(&index_db)).await?,
    );

    tracing::info!("Initializing access store at {}", access_db);
    let access: Arc<dyn AccessControl> = Arc::new(
        connect_with_retry("access store", retry, || SqliteAccessStore::new(&access_db)).await?,
    );

    // In-process bus; a broker-backed BusProducer/BusConsumer pair slots in
    // here for multi-node deployments.
    tracing::info!("Initializing bus with {} partitions", partitions);
    let bus = InMemoryBus::new(partitions);

    let mut publisher = Publisher::builder().access_store(access.clone());
    for _ in 0..channels.max(1) {
        publisher = publisher.channel(Arc::new(bus.producer()));
    }
    let publisher = Arc::new(publisher.build()?);

    // One strictly-sequential processor loop per partition.
    let mut shutdown_handles = Vec::new();
    for partition in 0..partitions {
        let consumer = bus.subscribe_partitions(CONSUMER_GROUP, vec![partition])?;
        let processor = Processor::builder()
            .consumer(Box::new(consumer))
            .payload_store(payload_store.clone())
            .index_store(index_store.clone())
            .build()?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        shutdown_handles.push(shutdown_tx);
        tokio::spawn(processor.run(shutdown_rx));
    }
    tracing::info!("Started {} processor loops", partitions);

    let federator = Arc::new(QueryFederator::new(
        index_store.clone(),
        payload_store.clone(),
    ));
    let aggregator = Arc::new(Aggregator::new(index_store.clone()));

    let state = AppState {
        access,
        publisher,
        federator,
        aggregator,
    };

    let router = create_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Loghouse API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the processor loops after the HTTP server drains.
    for handle in shutdown_handles {
        let _ = handle.send(());
    }
    tracing::info!("Loghouse server shut down gracefully");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
