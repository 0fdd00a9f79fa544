//! The Node Loop: a single worker thread that repeatedly builds blocks from
//! the incoming transaction pool and verifies blocks from the incoming
//! block pool, sleeping briefly whenever both are empty.
//!
//! The Node Loop is the only thing that mutates the Account Index and
//! Journal Store; the Network Boundary only enqueues into the two pools.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::account_index::AccountIndex;
use crate::block::{self, PendingBlock};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::metrics::MetricsRegistry;
use crate::pool::Pool;
use crate::storage::Journal;

/// Observational statistics tracked by the Node Loop. These never affect
/// correctness; they exist for operators and tests.
#[derive(Clone, Debug, Default)]
pub struct NodeStats {
    pub last_block_seconds: f64,
    pub last_block_bytes: usize,
    pub last_block_txns: usize,
    pub cumulative_txns: u64,
    pub blocks_built: u64,
    pub blocks_verified: u64,
}

/// Cooperative shutdown handle: shared between the Node Loop and whatever
/// owns it (a signal handler, a test harness).
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self { running: Arc::new(AtomicBool::new(true)), finished: Arc::new(AtomicBool::new(false)) }
    }

    /// Requests the loop to stop after its current iteration.
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the loop has observed the shutdown request and exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn should_run(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// The ledger node: Account Index, Journal Store, and pending block, driven
/// by a single worker loop that drains the transaction and block pools.
pub struct Node {
    accounts: AccountIndex,
    journal: Box<dyn Journal + Send>,
    pending: PendingBlock,
    max_txns_per_block: usize,
    max_block_size_bytes: usize,
    txn_pool: Arc<Pool>,
    block_pool: Arc<Pool>,
    /// Finished blocks are fanned out to whichever of these are present:
    /// an outbound network pool, a durable file sink, or neither
    /// (discarded) in a pure verifier role.
    outbound_blocks: Option<Arc<Pool>>,
    blocks_sink_path: Option<String>,
    metrics: Option<Arc<MetricsRegistry>>,
    stats: NodeStats,
    shutdown: ShutdownHandle,
}

impl Node {
    /// Builds a node, hydrating the Account Index from `journal`'s existing
    /// contents.
    pub fn new(
        config: &LedgerConfig,
        journal: Box<dyn Journal + Send>,
        txn_pool: Arc<Pool>,
        block_pool: Arc<Pool>,
        outbound_blocks: Option<Arc<Pool>>,
        blocks_sink_path: Option<String>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Result<Self, LedgerError> {
        let accounts = AccountIndex::hydrate(journal.as_ref())?;
        Ok(Node {
            accounts,
            journal,
            pending: PendingBlock::new(),
            max_txns_per_block: config.max_txns_per_block,
            max_block_size_bytes: config.max_block_size_bytes,
            txn_pool,
            block_pool,
            outbound_blocks,
            blocks_sink_path,
            metrics,
            stats: NodeStats::default(),
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> NodeStats {
        self.stats.clone()
    }

    pub fn accounts(&self) -> &AccountIndex {
        &self.accounts
    }

    /// Runs the loop until shutdown is requested.
    pub fn run(&mut self) {
        while self.shutdown.should_run() {
            match self.tick() {
                Ok(true) => {}
                Ok(false) => thread::sleep(Duration::from_millis(1)),
                Err(e) => tracing::warn!(error = %e, "node loop iteration failed, continuing"),
            }
        }
        self.shutdown.mark_finished();
        tracing::info!("node loop shut down");
    }

    /// One iteration: build takes priority over verify. Returns whether any
    /// work was done.
    fn tick(&mut self) -> Result<bool, LedgerError> {
        if self.txn_pool.num() > 0 {
            self.build_round()?;
            return Ok(true);
        }
        if self.block_pool.num() > 0 {
            return self.verify_round();
        }
        Ok(false)
    }

    /// Drains the transaction pool into a new block, up to the configured
    /// caps, then commits and finalizes it. Does nothing if every pending
    /// transaction was rejected at admission.
    fn build_round(&mut self) -> Result<(), LedgerError> {
        let start = Instant::now();
        self.journal.begin()?;
        self.pending.reset_and_prepare();
        let pre_len = self.accounts.len();
        let mut touched = BTreeSet::new();
        let mut applied = 0usize;

        while applied < self.max_txns_per_block {
            let Some(bytes) = self.txn_pool.get() else { break };
            match block::add_txn(
                &mut self.pending,
                &bytes,
                self.max_block_size_bytes,
                &mut self.accounts,
                self.journal.as_mut(),
                &mut touched,
            ) {
                Ok(true) => {
                    self.txn_pool.push_front(bytes);
                    break;
                }
                Ok(false) => applied += 1,
                Err(LedgerError::Persistence(e)) => {
                    self.journal.rollback()?;
                    self.accounts.rollback(pre_len, &touched, self.journal.as_ref())?;
                    return Err(LedgerError::Persistence(e));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "rejected transaction at admission");
                    if let Some(m) = &self.metrics {
                        m.ledger.txns_rejected.inc();
                    }
                }
            }
        }

        if applied == 0 {
            self.journal.rollback()?;
            return Ok(());
        }

        self.journal.commit()?;
        block::finish(&mut self.pending)?;

        let num_txns = self.pending.num_txns();
        let pending = std::mem::take(&mut self.pending);
        let wire_bytes = pending.into_wire_bytes();

        self.stats.last_block_seconds = start.elapsed().as_secs_f64();
        self.stats.last_block_bytes = wire_bytes.len();
        self.stats.last_block_txns = num_txns;
        self.stats.cumulative_txns += num_txns as u64;
        self.stats.blocks_built += 1;

        if let Some(m) = &self.metrics {
            m.ledger.block_build_seconds.observe(self.stats.last_block_seconds);
            m.ledger.blocks_built.inc();
            m.ledger.txns_applied.inc_by(num_txns as u64);
            m.ledger.txn_pool_depth.set(self.txn_pool.num() as f64);
        }
        tracing::info!(txns = num_txns, bytes = wire_bytes.len(), "built block");

        if let Some(path) = &self.blocks_sink_path {
            if let Err(e) = append_block_to_file(path, &wire_bytes) {
                tracing::warn!(error = %e, path = %path, "failed to persist built block to disk");
            }
        }
        if let Some(sink) = &self.outbound_blocks {
            sink.add(wire_bytes);
        }
        Ok(())
    }

    /// Verifies and applies the oldest pending block. On failure, the
    /// journal batch and Account Index are already rolled back by
    /// [`block::check_and_write`]; the error is returned to the caller so
    /// the loop can log it.
    fn verify_round(&mut self) -> Result<bool, LedgerError> {
        let Some(bytes) = self.block_pool.get() else { return Ok(false) };
        let start = Instant::now();
        let mut verify_pending = PendingBlock::new();
        let num_txns_hint = bytes.len();

        match block::check_and_write(&mut verify_pending, &bytes, &mut self.accounts, self.journal.as_mut()) {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64();
                self.stats.last_block_seconds = elapsed;
                self.stats.last_block_bytes = bytes.len();
                self.stats.blocks_verified += 1;
                if let Some(m) = &self.metrics {
                    m.ledger.block_verify_seconds.observe(elapsed);
                    m.ledger.blocks_verified.inc();
                    m.ledger.block_pool_depth.set(self.block_pool.num() as f64);
                }
                tracing::info!(bytes = num_txns_hint, "verified and applied block");
                Ok(true)
            }
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.ledger.blocks_rejected.inc();
                }
                tracing::warn!(error = %e, "block verification failed, rolled back");
                Err(e)
            }
        }
    }
}

/// Appends one length-prefixed block record (`[length i64 LE][frame bytes]`)
/// to `path`, creating it and any parent directories if needed. Matches the
/// file format the demo harness reads back with `replay_into_pool`.
fn append_block_to_file(path: &str, frame: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&(frame.len() as i64).to_le_bytes())?;
    file.write_all(frame)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::PrivateKey;
    use crate::buffer::ByteBuffer;
    use crate::storage::InMemoryJournal;
    use crate::txn;
    use crate::types::{TxnRaw, PRIVKEY_LEN};

    fn dummy_key(seed: u8) -> PrivateKey {
        PrivateKey::from_ikm(&[seed; PRIVKEY_LEN])
    }

    fn encode_frame(t: &TxnRaw, signer: &PrivateKey) -> Vec<u8> {
        let pk = signer.public_key();
        let mut buf = ByteBuffer::new();
        txn::encode(t, Some(&pk), signer, &mut buf);
        buf.into_vec()
    }

    #[test]
    fn build_round_produces_a_block_and_feeds_outbound_sink() {
        let mut journal = InMemoryJournal::new();
        let genesis_key = dummy_key(1);
        let g = {
            let mut idx = AccountIndex::new();
            idx.add(genesis_key.public_key(), &mut journal).unwrap()
        };
        // AccountIndex::hydrate will re-derive `g` from the journal; set the
        // genesis balance directly via a committed batch so hydration sees it.
        journal.begin().unwrap();
        journal.append_row(g, 100, 0, 0).unwrap();
        journal.commit().unwrap();

        let cfg = LedgerConfig { db_path: String::new(), max_txns_per_block: 10, max_block_size_bytes: 1_048_576 };
        let txn_pool = Arc::new(Pool::new());
        let block_pool = Arc::new(Pool::new());
        let outbound = Arc::new(Pool::new());

        let new_key = dummy_key(2);
        let t = TxnRaw::new_long(g, 0, 10, 0, new_key.public_key());
        txn_pool.add(encode_frame(&t, &genesis_key));

        let mut node =
            Node::new(&cfg, Box::new(journal), txn_pool.clone(), block_pool, Some(outbound.clone()), None, None).unwrap();
        node.build_round().unwrap();

        assert_eq!(node.stats().blocks_built, 1);
        assert_eq!(outbound.num(), 1);
        assert_eq!(node.accounts().get(g).unwrap().amount, 90);
    }

    #[test]
    fn build_round_persists_blocks_to_a_file_sink_regardless_of_outbound_pool() {
        let dir = tempfile::tempdir().unwrap();
        let blocks_path = dir.path().join("blocks.bin").to_str().unwrap().to_string();

        let mut journal = InMemoryJournal::new();
        let genesis_key = dummy_key(5);
        let g = {
            let mut idx = AccountIndex::new();
            idx.add(genesis_key.public_key(), &mut journal).unwrap()
        };
        journal.begin().unwrap();
        journal.append_row(g, 100, 0, 0).unwrap();
        journal.commit().unwrap();

        let cfg = LedgerConfig { db_path: String::new(), max_txns_per_block: 10, max_block_size_bytes: 1_048_576 };
        let txn_pool = Arc::new(Pool::new());
        let block_pool = Arc::new(Pool::new());

        let new_key = dummy_key(6);
        let t = TxnRaw::new_long(g, 0, 10, 0, new_key.public_key());
        txn_pool.add(encode_frame(&t, &genesis_key));

        let mut node =
            Node::new(&cfg, Box::new(journal), txn_pool, block_pool, None, Some(blocks_path.clone()), None).unwrap();
        node.build_round().unwrap();

        let written = std::fs::read(&blocks_path).unwrap();
        assert!(!written.is_empty(), "built block should be appended to the file sink");
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&written[0..8]);
        let len = i64::from_le_bytes(len_bytes) as usize;
        assert_eq!(written.len(), 8 + len, "file should contain exactly one length-prefixed record");
    }

    #[test]
    fn build_round_rejects_bad_txn_without_producing_a_block() {
        let mut journal = InMemoryJournal::new();
        let genesis_key = dummy_key(3);
        let g = {
            let mut idx = AccountIndex::new();
            idx.add(genesis_key.public_key(), &mut journal).unwrap()
        };
        journal.begin().unwrap();
        journal.append_row(g, 100, 0, 0).unwrap();
        journal.commit().unwrap();

        let cfg = LedgerConfig::default();
        let txn_pool = Arc::new(Pool::new());
        let block_pool = Arc::new(Pool::new());

        // Wrong nonce: admission-time rejection, nothing applied.
        let t = TxnRaw::new_short(g, 9, 1, 0, g);
        txn_pool.add(encode_frame(&t, &genesis_key));

        let mut node = Node::new(&cfg, Box::new(journal), txn_pool, block_pool, None, None, None).unwrap();
        node.build_round().unwrap();

        assert_eq!(node.stats().blocks_built, 0);
        assert_eq!(node.accounts().get(g).unwrap().amount, 100);
    }

    #[test]
    fn shutdown_handle_stops_the_loop() {
        let mut journal = InMemoryJournal::new();
        let genesis_key = dummy_key(4);
        {
            let mut idx = AccountIndex::new();
            idx.add(genesis_key.public_key(), &mut journal).unwrap();
        }
        let cfg = LedgerConfig::default();
        let mut node = Node::new(
            &cfg,
            Box::new(journal),
            Arc::new(Pool::new()),
            Arc::new(Pool::new()),
            None,
            None,
            None,
        )
        .unwrap();
        let handle = node.shutdown_handle();
        handle.request_shutdown();
        node.run();
        assert!(handle.is_finished());
    }
}
