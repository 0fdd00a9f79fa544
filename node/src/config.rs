//! Node binary configuration.
//!
//! Mirrors the teacher's `ChainConfig`/`ApiConfig` aggregation-of-`Default`-
//! structs pattern: each subsystem gets its own struct with sane
//! standalone-demo defaults, composed here into one `NodeConfig`.

use std::net::SocketAddr;

use chain::{LedgerConfig, MetricsConfig};

/// Configuration for the websocket Network Boundary.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Address to bind the websocket server to.
    pub listen_addr: SocketAddr,
    /// HTTP path the websocket upgrade is served under.
    pub ws_path: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let addr: SocketAddr = "0.0.0.0:4879".parse().expect("hard-coded network listen address should parse");
        Self { listen_addr: addr, ws_path: "data".to_string() }
    }
}

/// Paths and parameters for the demo/harness file-based flows
/// (`gen-genesis`, `gen-txns`, `replay-txns`, `replay-blocks`).
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub genesis_path: String,
    pub txns_path: String,
    pub blocks_path: String,
    /// Number of synthetic transactions `gen-txns` writes.
    pub num_txns: usize,
    /// Starting balance credited to the genesis account.
    pub genesis_amount: i64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            genesis_path: "data/genesis.bin".to_string(),
            txns_path: "data/txns.bin".to_string(),
            blocks_path: "data/blocks.bin".to_string(),
            num_txns: 1_000,
            genesis_amount: 1_000_000,
        }
    }
}

/// Top-level node configuration: one field per subsystem.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub network: NetworkConfig,
    pub metrics: MetricsConfig,
    pub harness: HarnessConfig,
}
