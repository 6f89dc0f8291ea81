//! Token ledger server binary

use anyhow::Context;
use std::sync::Arc;
use token_ledger::{
    events::{BroadcastSink, FanoutSink, TracingSink},
    spawn_ledger_actor, Config, Ledger, Metrics, SnapshotStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting token ledger server");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    let store = if config.snapshot.enabled {
        Some(SnapshotStore::open(&config.snapshot.path)?)
    } else {
        None
    };

    // Restore or start from genesis
    let ledger = match store.as_ref().map(SnapshotStore::load).transpose()?.flatten() {
        Some(snapshot) => Ledger::from_snapshot(snapshot)?,
        None => Ledger::new(config.token.genesis()?)?,
    };

    let broadcast = Arc::new(BroadcastSink::new(config.actor.broadcast_capacity));
    let sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(broadcast.clone());
    let metrics = Metrics::new()?;

    let ledger = Arc::new(ledger.with_sink(Arc::new(sink)).with_metrics(metrics.clone()));
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        symbol = %ledger.symbol(),
        holders = ledger.holders().len(),
        "Ledger ready"
    );

    let handle = spawn_ledger_actor(ledger.clone(), config.actor.mailbox_capacity);

    let listener = tokio::net::TcpListener::bind(&config.metrics_listen_addr)
        .await
        .with_context(|| format!("binding metrics on {}", config.metrics_listen_addr))?;
    let metrics_server = tokio::spawn(metrics.clone().serve(listener));

    // Requests arrive through the embedding transport; until then, just keep running
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down token ledger server");
    let snapshot = handle.snapshot().await?;
    handle.shutdown().await?;
    metrics_server.abort();

    if !ledger.check_conservation()? {
        anyhow::bail!("conservation invariant violated at shutdown");
    }

    if let Some(store) = store {
        store.save(&snapshot)?;
    }

    tracing::info!(metrics = %metrics.gather_text()?, "Final metrics");
    Ok(())
}
