//! Durable journal storage backends for the ledger.
//!
//! This module provides the [`Journal`] trait plus two implementations:
//!
//! - [`sqlite::SqliteJournal`]: the production backend, an embedded
//!   relational store with `accounts` and `txns` tables.
//! - [`mem::InMemoryJournal`]: an in-memory double used in unit tests,
//!   implementing the exact same batch semantics.

pub mod mem;
pub mod sqlite;

pub use mem::InMemoryJournal;
pub use sqlite::SqliteJournal;

use crate::error::PersistenceError;
use crate::types::PubKey;

/// The durable append-only journal of per-account state deltas.
///
/// `append_row` is only valid inside an active batch delimited by
/// [`begin`](Journal::begin) and [`commit`](Journal::commit)/
/// [`rollback`](Journal::rollback).
pub trait Journal {
    fn begin(&mut self) -> Result<(), PersistenceError>;
    fn commit(&mut self) -> Result<(), PersistenceError>;
    fn rollback(&mut self) -> Result<(), PersistenceError>;

    /// Persists a newly-seen public key to the accounts side table.
    /// Insertion order is the account id.
    fn insert_account(&mut self, pubkey: &PubKey) -> Result<(), PersistenceError>;

    /// Appends one journal row, returning its assigned row id.
    fn append_row(
        &mut self,
        account_id: i64,
        amount: i64,
        nonce: i64,
        prev_rowid: i64,
    ) -> Result<i64, PersistenceError>;

    /// Reads every known public key in insertion order, used to rebuild the
    /// Account Index's id space at startup.
    fn load_accounts(&self) -> Result<Vec<PubKey>, PersistenceError>;

    /// Reads `(account_id, amount, nonce, rowid)` for the most recent row
    /// of every account, ordered by `account_id` ascending. Used to
    /// hydrate the Account Index at startup.
    fn load_latest_rows(&self) -> Result<Vec<(i64, i64, i64, i64)>, PersistenceError>;

    /// Reads `(amount, nonce, rowid)` for the most recent row of a single
    /// account, if any. Used by the Account Index's rollback contract to
    /// re-hydrate a touched account after a batch abort.
    fn latest_row_for_account(&self, account_id: i64) -> Result<Option<(i64, i64, i64)>, PersistenceError>;
}
