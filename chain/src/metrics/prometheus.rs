//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed ledger metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Ledger-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the Block
/// Engine and Node Loop.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Latency of building a block (admission verify + apply + sign).
    pub block_build_seconds: Histogram,
    /// Latency of verifying and applying a received block.
    pub block_verify_seconds: Histogram,
    /// Total number of blocks this node has built.
    pub blocks_built: IntCounter,
    /// Total number of blocks this node has verified and applied.
    pub blocks_verified: IntCounter,
    /// Total number of individual transactions applied across all blocks.
    pub txns_applied: IntCounter,
    /// Total number of transactions rejected at admission time (bad nonce,
    /// insufficient funds, bad signature).
    pub txns_rejected: IntCounter,
    /// Total number of received blocks that failed verification and were
    /// rolled back.
    pub blocks_rejected: IntCounter,
    /// Current depth of the incoming transaction pool.
    pub txn_pool_depth: Gauge,
    /// Current depth of the incoming block pool.
    pub block_pool_depth: Gauge,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let block_build_seconds = Histogram::with_opts(
            HistogramOpts::new("ledger_block_build_seconds", "Time to build one block, in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )?;
        registry.register(Box::new(block_build_seconds.clone()))?;

        let block_verify_seconds = Histogram::with_opts(
            HistogramOpts::new("ledger_block_verify_seconds", "Time to verify and apply one received block, in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )?;
        registry.register(Box::new(block_verify_seconds.clone()))?;

        let blocks_built = IntCounter::with_opts(Opts::new("ledger_blocks_built_total", "Total blocks built by this node"))?;
        registry.register(Box::new(blocks_built.clone()))?;

        let blocks_verified =
            IntCounter::with_opts(Opts::new("ledger_blocks_verified_total", "Total blocks verified and applied by this node"))?;
        registry.register(Box::new(blocks_verified.clone()))?;

        let txns_applied = IntCounter::with_opts(Opts::new("ledger_txns_applied_total", "Total transactions applied"))?;
        registry.register(Box::new(txns_applied.clone()))?;

        let txns_rejected =
            IntCounter::with_opts(Opts::new("ledger_txns_rejected_total", "Total transactions rejected at admission"))?;
        registry.register(Box::new(txns_rejected.clone()))?;

        let blocks_rejected =
            IntCounter::with_opts(Opts::new("ledger_blocks_rejected_total", "Total received blocks that failed verification"))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let txn_pool_depth = Gauge::with_opts(Opts::new("ledger_txn_pool_depth", "Current depth of the incoming transaction pool"))?;
        registry.register(Box::new(txn_pool_depth.clone()))?;

        let block_pool_depth = Gauge::with_opts(Opts::new("ledger_block_pool_depth", "Current depth of the incoming block pool"))?;
        registry.register(Box::new(block_pool_depth.clone()))?;

        Ok(Self {
            block_build_seconds,
            block_verify_seconds,
            blocks_built,
            blocks_verified,
            txns_applied,
            txns_rejected,
            blocks_rejected,
            txn_pool_depth,
            block_pool_depth,
        })
    }
}

/// Wrapper around a Prometheus registry and the ledger metrics.
///
/// This is the main handle passed around in the node. It can be wrapped in
/// an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the ledger metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        Ok(Self { registry, ledger })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
