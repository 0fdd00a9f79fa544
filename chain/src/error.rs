//! Error taxonomy for the ledger core.
//!
//! Mirrors the kinds called out in the design: decode, state, signature,
//! capacity, persistence, and lifecycle failures. Capacity is not really an
//! error (it is a signal the block is full); it is included here only so
//! callers can match on one enum when they want to.

use std::fmt;

/// A malformed or truncated wire frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ran out of bytes before a read completed.
    OutOfBuffer,
    /// `dst_kind` byte was neither `0` (LONG) nor `1` (SHORT).
    UnknownDstKind(u8),
    /// A fixed-size field (pubkey or signature) did not match its expected length.
    BadLength { what: &'static str, expected: usize, got: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::OutOfBuffer => write!(f, "decode: out of buffer"),
            DecodeError::UnknownDstKind(b) => write!(f, "decode: unknown dst_kind byte {b}"),
            DecodeError::BadLength { what, expected, got } => {
                write!(f, "decode: {what} expected {expected} bytes, got {got}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// A transaction that fails the ledger's state-transition rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateError {
    /// `stored_nonce != txn.src_nonce`.
    NonceMismatch { expected: i64, got: i64 },
    /// `stored_amount < txn.amount`.
    InsufficientFunds { have: i64, need: i64 },
    /// `src_id` or `dst_id` referenced an account id beyond the index's range.
    AccountOutOfRange(i64),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::NonceMismatch { expected, got } => {
                write!(f, "state: nonce mismatch, expected {expected} got {got}")
            }
            StateError::InsufficientFunds { have, need } => {
                write!(f, "state: insufficient funds, have {have} need {need}")
            }
            StateError::AccountOutOfRange(id) => write!(f, "state: account id {id} out of range"),
        }
    }
}

impl std::error::Error for StateError {}

/// A BLS signature that failed to verify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureError {
    /// Single-transaction admission verify failed.
    SingleVerifyFailed,
    /// Partitioned aggregate verify failed for at least one group.
    AggregateVerifyFailed { group: usize },
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::SingleVerifyFailed => write!(f, "signature: single verify failed"),
            SignatureError::AggregateVerifyFailed { group } => {
                write!(f, "signature: aggregate verify failed for group {group}")
            }
        }
    }
}

impl std::error::Error for SignatureError {}

/// A durable-store operation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceError {
    Sqlite(String),
    NoActiveBatch,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Sqlite(msg) => write!(f, "persistence: {msg}"),
            PersistenceError::NoActiveBatch => {
                write!(f, "persistence: append_row called outside an active batch")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

/// An operation was attempted on a closed or shutting-down component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleError(pub &'static str);

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lifecycle: {}", self.0)
    }
}

impl std::error::Error for LifecycleError {}

/// Top-level error type the Node Loop and Block Engine propagate.
#[derive(Debug)]
pub enum LedgerError {
    Decode(DecodeError),
    State(StateError),
    Signature(SignatureError),
    Persistence(PersistenceError),
    Lifecycle(LifecycleError),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Decode(e) => write!(f, "{e}"),
            LedgerError::State(e) => write!(f, "{e}"),
            LedgerError::Signature(e) => write!(f, "{e}"),
            LedgerError::Persistence(e) => write!(f, "{e}"),
            LedgerError::Lifecycle(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<DecodeError> for LedgerError {
    fn from(e: DecodeError) -> Self {
        LedgerError::Decode(e)
    }
}

impl From<StateError> for LedgerError {
    fn from(e: StateError) -> Self {
        LedgerError::State(e)
    }
}

impl From<SignatureError> for LedgerError {
    fn from(e: SignatureError) -> Self {
        LedgerError::Signature(e)
    }
}

impl From<PersistenceError> for LedgerError {
    fn from(e: PersistenceError) -> Self {
        LedgerError::Persistence(e)
    }
}

impl From<LifecycleError> for LedgerError {
    fn from(e: LifecycleError) -> Self {
        LedgerError::Lifecycle(e)
    }
}
