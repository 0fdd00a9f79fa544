//! Ledger node binary.
//!
//! Subcommands:
//!
//! - `serve`: runs the Node Loop, the websocket Network Boundary, and
//!   (optionally) dials a peer, plus the Prometheus metrics exporter.
//! - `gen-genesis`: writes (or reuses) a genesis keypair + balance file.
//! - `gen-txns`: writes a file of synthetic, signed transactions spent
//!   from the genesis account, for feeding a running node.
//! - `replay-txns` / `replay-blocks`: reads a length-prefixed frame file
//!   and posts it to a running node's websocket endpoint as TXN/BLOCK
//!   frames.

mod config;
mod harness;
mod network;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use chain::bls::PrivateKey;
use chain::storage::sqlite::SqliteConfig;
use chain::{run_prometheus_http_server, AccountIndex, Journal, MetricsRegistry, Node, Pool, SqliteJournal};
use config::{HarnessConfig, NodeConfig};

#[derive(Parser)]
#[command(name = "node", about = "Minimal BLS12-381-signed transaction ledger node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node: Node Loop + Network Boundary + metrics exporter.
    Serve {
        /// If set, also dial this peer (ws://host:port/path) and mirror
        /// inbound/outbound traffic with it.
        #[arg(long)]
        peer: Option<String>,
    },
    /// Generate (or reuse) the genesis keypair and balance file.
    GenGenesis,
    /// Generate a file of synthetic signed transactions spent from genesis.
    GenTxns {
        #[arg(long)]
        num_txns: Option<usize>,
    },
    /// Post every frame in a length-prefixed transactions file to a peer.
    ReplayTxns {
        #[arg(long)]
        peer: String,
    },
    /// Post every frame in a length-prefixed blocks file to a peer.
    ReplayBlocks {
        #[arg(long)]
        peer: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()))
        .init();

    let cli = Cli::parse();
    let cfg = NodeConfig::default();

    let result = match cli.command {
        Command::Serve { peer } => run_serve(cfg, peer).await,
        Command::GenGenesis => run_gen_genesis(cfg),
        Command::GenTxns { num_txns } => run_gen_txns(cfg, num_txns),
        Command::ReplayTxns { peer } => run_replay(cfg.harness.txns_path.clone(), peer, network::MSG_TXN).await,
        Command::ReplayBlocks { peer } => run_replay(cfg.harness.blocks_path.clone(), peer, network::MSG_BLOCK).await,
    };

    if let Err(e) = result {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run_gen_genesis(cfg: NodeConfig) -> Result<(), String> {
    let (amount, _key) = harness::genesis::read_or_generate_genesis(&cfg.harness.genesis_path, cfg.harness.genesis_amount)
        .map_err(|e| format!("failed to read/generate genesis: {e}"))?;
    tracing::info!(path = %cfg.harness.genesis_path, amount, "genesis ready");
    Ok(())
}

fn run_gen_txns(cfg: NodeConfig, num_txns: Option<usize>) -> Result<(), String> {
    let (amount, priv_key) = harness::genesis::read_or_generate_genesis(&cfg.harness.genesis_path, cfg.harness.genesis_amount)
        .map_err(|e| format!("failed to read/generate genesis: {e}"))?;
    let num_txns = num_txns.unwrap_or(cfg.harness.num_txns);
    let num_accounts = harness::txgen::generate_txns_file(&cfg.harness.txns_path, num_txns, amount, &priv_key)
        .map_err(|e| format!("failed to generate transactions file: {e}"))?;
    tracing::info!(path = %cfg.harness.txns_path, num_txns, num_accounts, "wrote synthetic transactions");
    Ok(())
}

async fn run_replay(path: String, peer: String, discriminator: u8) -> Result<(), String> {
    use futures_util::SinkExt;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    let pool = Arc::new(Pool::new());
    let num_added = harness::replay::replay_into_pool(&path, &pool).map_err(|e| format!("failed to read {path}: {e}"))?;

    let (ws_stream, _response) = connect_async(&peer).await.map_err(|e| format!("failed to connect to {peer}: {e}"))?;
    let (mut write, _read) = futures_util::StreamExt::split(ws_stream);

    let mut sent = 0usize;
    while let Some(payload) = pool.get() {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.push(discriminator);
        frame.extend_from_slice(&payload);
        write
            .send(Message::Binary(frame.into()))
            .await
            .map_err(|e| format!("failed to send frame {sent}/{num_added}: {e}"))?;
        sent += 1;
    }
    tracing::info!(path = %path, sent, "replayed frames to peer");
    Ok(())
}

async fn run_serve(cfg: NodeConfig, peer: Option<String>) -> Result<(), String> {
    let metrics = Arc::new(MetricsRegistry::new().map_err(|e| format!("failed to initialize metrics registry: {e}"))?);

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    let mut journal = SqliteJournal::open(&SqliteConfig { path: cfg.ledger.db_path.clone() })
        .map_err(|e| format!("failed to open journal at {}: {e}", cfg.ledger.db_path))?;

    seed_genesis_if_needed(&mut journal, &cfg.harness)?;

    let txn_pool = Arc::new(Pool::new());
    let block_pool = Arc::new(Pool::new());
    let outbound_blocks = Arc::new(Pool::new());

    let mut node = Node::new(
        &cfg.ledger,
        Box::new(journal),
        txn_pool.clone(),
        block_pool.clone(),
        Some(outbound_blocks.clone()),
        Some(cfg.harness.blocks_path.clone()),
        Some(metrics.clone()),
    )
    .map_err(|e| format!("failed to start node: {e}"))?;

    let shutdown = node.shutdown_handle();

    let node_handle = std::thread::spawn(move || node.run());

    if let Some(peer_url) = peer {
        let inbound_txn = txn_pool.clone();
        let inbound_block = block_pool.clone();
        let outbound = outbound_blocks.clone();
        tokio::spawn(async move {
            if let Err(e) = network::client::run_client(&peer_url, inbound_txn, inbound_block, outbound).await {
                tracing::warn!(error = %e, "peer connection ended");
            }
        });
    }

    let state = network::server::NetworkState { txn_pool: txn_pool.clone(), block_pool: block_pool.clone() };
    let app = network::server::router(state, &cfg.network.ws_path);

    tracing::info!("node listening on ws://{}/{}", cfg.network.listen_addr, cfg.network.ws_path);
    let listener = tokio::net::TcpListener::bind(cfg.network.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.network.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("network server error: {e}"))?;

    shutdown.request_shutdown();
    let _ = node_handle.join();
    Ok(())
}

/// Seeds the genesis account into the journal if it has no accounts yet,
/// matching the original node's startup behavior of funding the genesis
/// pubkey before the node can process any transaction (every harness-
/// generated transaction's first sender is account 0). A no-op against a
/// journal that already has accounts.
fn seed_genesis_if_needed(journal: &mut SqliteJournal, harness: &HarnessConfig) -> Result<(), String> {
    let existing = journal.load_accounts().map_err(|e| format!("failed to read existing accounts: {e}"))?;
    if !existing.is_empty() {
        return Ok(());
    }

    let (amount, priv_key) = harness::genesis::read_or_generate_genesis(&harness.genesis_path, harness.genesis_amount)
        .map_err(|e| format!("failed to read/generate genesis: {e}"))?;
    let pubkey = PrivateKey::from_ikm(&priv_key).public_key();

    let mut accounts = AccountIndex::new();
    journal.begin().map_err(|e| format!("failed to begin genesis seed batch: {e}"))?;
    let account_id = accounts
        .add(pubkey, journal)
        .map_err(|e| format!("failed to seed genesis account: {e}"))?;
    journal
        .append_row(account_id, amount, 0, 0)
        .map_err(|e| format!("failed to seed genesis balance: {e}"))?;
    journal.commit().map_err(|e| format!("failed to commit genesis seed batch: {e}"))?;

    tracing::info!(account_id, amount, "seeded genesis account");
    Ok(())
}

/// Waits for Ctrl-C, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
