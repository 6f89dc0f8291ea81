//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `token_transfers_total` - Successful transfers (direct and delegated)
//! - `token_approvals_total` - Successful approvals
//! - `token_rejections_total{reason}` - Failed operations by cause
//! - `token_operation_duration_seconds{operation}` - Critical-section latency
//! - `token_holders` - Accounts with a non-zero balance

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Metrics collector
///
/// Each collector owns its registry, so several ledgers (or tests) can live in
/// one process without colliding in the global default registry.
#[derive(Clone)]
pub struct Metrics {
    /// Successful transfers
    pub transfers_total: IntCounter,

    /// Successful approvals
    pub approvals_total: IntCounter,

    /// Rejected operations by reason
    pub rejections_total: IntCounterVec,

    /// Operation latency by operation name
    pub operation_duration: HistogramVec,

    /// Accounts with a non-zero balance
    pub holders: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total = IntCounter::new(
            "token_transfers_total",
            "Total number of successful transfers",
        )?;
        registry.register(Box::new(transfers_total.clone()))?;

        let approvals_total = IntCounter::new(
            "token_approvals_total",
            "Total number of successful approvals",
        )?;
        registry.register(Box::new(approvals_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("token_rejections_total", "Total number of rejected operations"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "token_operation_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.01]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let holders = IntGauge::new("token_holders", "Accounts with a non-zero balance")?;
        registry.register(Box::new(holders.clone()))?;

        Ok(Self {
            transfers_total,
            approvals_total,
            rejections_total,
            operation_duration,
            holders,
            registry,
        })
    }

    /// Record a committed transfer
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record a committed approval
    pub fn record_approval(&self) {
        self.approvals_total.inc();
    }

    /// Record a rejected operation
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record operation duration
    pub fn record_duration(&self, operation: &str, duration_seconds: f64) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration_seconds);
    }

    /// Update holder count
    pub fn set_holders(&self, count: usize) {
        self.holders.set(count as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Answer every connection on `listener` with the current text exposition
    ///
    /// Runs until the listener fails; spawn it next to the ledger actor.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!(addr = ?listener.local_addr()?, "Serving metrics");

        loop {
            let (stream, peer) = listener.accept().await?;
            let metrics = self.clone();
            tokio::spawn(async move {
                if let Err(e) = metrics.respond(stream).await {
                    tracing::debug!(%peer, error = %e, "Metrics scrape failed");
                }
            });
        }
    }

    async fn respond(&self, mut stream: TcpStream) -> std::io::Result<()> {
        // Any request path gets the metrics; only drain the request head
        let mut request = [0u8; 1024];
        let _ = stream.read(&mut request).await?;

        let body = self
            .gather_text()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transfers_total", &self.transfers_total.get())
            .field("approvals_total", &self.approvals_total.get())
            .field("holders", &self.holders.get())
            .finish()
    }
}
