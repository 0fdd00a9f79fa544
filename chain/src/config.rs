//! Ledger-core configuration.
//!
//! One struct per subsystem, each with a `Default` giving sane
//! standalone-demo values. Binaries can construct these from defaults,
//! config files, or environment variables as needed.

use std::net::SocketAddr;

/// Configuration for the durable journal and the Block Engine's capacity
/// limits.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Path to the sqlite journal database file.
    pub db_path: String,
    /// Soft limit on the number of transactions per block.
    pub max_txns_per_block: usize,
    /// Byte budget for a single block's serialized body.
    pub max_block_size_bytes: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: "data/ledger.sqlite".to_string(),
            max_txns_per_block: 10_000,
            max_block_size_bytes: crate::types::BLOCK_SIZE_MAX,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self { enabled: true, listen_addr: addr }
    }
}
