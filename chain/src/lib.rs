//! Chain library crate.
//!
//! This crate provides the core building blocks for a minimal BLS-signed
//! transaction ledger:
//!
//! - a growable byte buffer and varnum codec (`buffer`),
//! - the transaction wire codec (`txn`),
//! - strongly-typed domain types (`types`),
//! - BLS12-381 signing/verification primitives (`bls`),
//! - the partitioned aggregate signature engine (`aggregate`),
//! - the in-memory account index (`account_index`),
//! - durable journal storage backends (`storage`),
//! - the thread-safe transaction/block pool (`pool`),
//! - the block engine tying all of the above together (`block`),
//! - Prometheus-based metrics (`metrics`),
//! - the error taxonomy (`error`),
//! - and ledger-core configuration (`config`).
//!
//! Higher-level binaries compose these pieces into a running node.

pub mod account_index;
pub mod aggregate;
pub mod block;
pub mod bls;
pub mod buffer;
pub mod config;
pub mod error;
pub mod metrics;
pub mod node;
pub mod pool;
pub mod storage;
pub mod txn;
pub mod types;

pub use account_index::AccountIndex;
pub use aggregate::{aggregate_sign, aggregate_verify, group_range};
pub use block::{add_txn, check_and_write, finish, PendingBlock};
pub use bls::{verify_single, PrivateKey};
pub use buffer::ByteBuffer;
pub use config::{LedgerConfig, MetricsConfig};
pub use error::{DecodeError, LedgerError, LifecycleError, PersistenceError, SignatureError, StateError};
pub use metrics::{LedgerMetrics, MetricsRegistry, run_prometheus_http_server};
pub use node::{Node, NodeStats};
pub use pool::Pool;
pub use storage::{InMemoryJournal, Journal, SqliteJournal};
pub use txn::{decode, encode, DecodedTxn};
pub use types::*;
