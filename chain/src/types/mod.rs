//! Core domain types used by the ledger.
//!
//! This module defines the account record, the raw transaction shape, and
//! the wire-level constants (biases, partition count, capacity caps) that
//! the codec and block engine both depend on.

pub mod block_header;

pub use block_header::BlockHeader;

/// Length in bytes of a BLS12-381 (ETH2 mode) public key.
pub const PUBKEY_LEN: usize = 48;

/// Length in bytes of a BLS12-381 (ETH2 mode) signature.
pub const SIGNATURE_LEN: usize = 96;

/// Length in bytes of a BLS12-381 secret key.
pub const PRIVKEY_LEN: usize = 32;

/// Length in bytes of the transaction message digest (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Number of aggregate-signature partitions a block is split into.
pub const N_AGG: usize = 8;

/// Default byte budget for a single block's serialized body.
pub const BLOCK_SIZE_MAX: usize = 1_048_576;

/// Fixed additive bias applied to `src_id` before it is written as a varnum.
pub const BIAS_SRC: i64 = 1_000_000;

/// Fixed additive bias applied to `dst_id` before it is written as a varnum.
pub const BIAS_DST: i64 = 1_000_000;

/// Fixed additive bias applied to `amount` before it is written as a varnum.
pub const BIAS_AMOUNT: i64 = 1_000_000;

/// A 48-byte BLS12-381 public key, used as an account's stable identity.
pub type PubKey = [u8; PUBKEY_LEN];

/// A 96-byte BLS12-381 (ETH2 mode) signature.
pub type Sig = [u8; SIGNATURE_LEN];

/// In-memory record for a single account.
///
/// The account's position in the [`crate::account_index::AccountIndex`]'s
/// backing vector is its id; this struct carries everything else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    /// The account's BLS public key, its stable identity.
    pub pubkey: PubKey,
    /// Current balance. Never negative.
    pub amount: i64,
    /// Number of outgoing transactions applied from this account so far.
    pub nonce: i64,
    /// Journal row id of this account's most recent applied delta, or 0
    /// if the account has never been touched by a transaction.
    pub last_journal_row: i64,
}

impl Account {
    /// Constructs a freshly-added account with zeroed balance, nonce, and
    /// back-pointer.
    pub fn new(pubkey: PubKey) -> Self {
        Account {
            pubkey,
            amount: 0,
            nonce: 0,
            last_journal_row: 0,
        }
    }
}

/// Discriminates how a transaction's destination is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DstKind {
    /// Destination carries a full 48-byte public key; a new account is
    /// created on first sight (or reused if the key is already known).
    Long = 0,
    /// Destination carries an existing account id.
    Short = 1,
}

impl DstKind {
    /// Recovers a [`DstKind`] from its wire byte, or `None` if unknown.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(DstKind::Long),
            1 => Some(DstKind::Short),
            _ => None,
        }
    }
}

/// The destination half of a transaction: either a brand-new public key
/// or a reference to an already-known account id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Long(PubKey),
    Short(i64),
}

impl Destination {
    pub fn kind(&self) -> DstKind {
        match self {
            Destination::Long(_) => DstKind::Long,
            Destination::Short(_) => DstKind::Short,
        }
    }
}

/// A decoded, unbiased transaction record.
///
/// This is the in-memory shape produced by the transaction codec; biases
/// (see [`BIAS_SRC`], [`BIAS_DST`], [`BIAS_AMOUNT`]) have already been
/// removed by the time a value of this type exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxnRaw {
    /// Source account id.
    pub src_id: i64,
    /// Expected nonce of the source account before this transaction applies.
    pub src_nonce: i64,
    /// Value transferred. Always positive.
    pub amount: i64,
    /// Reserved fee. Parsed but never applied to balances.
    pub fee: i64,
    /// Destination of the transfer.
    pub dst: Destination,
}

impl TxnRaw {
    /// Constructs a transaction whose destination is a brand-new (or
    /// already-known) public key.
    pub fn new_long(src_id: i64, src_nonce: i64, amount: i64, fee: i64, dst_pubkey: PubKey) -> Self {
        TxnRaw {
            src_id,
            src_nonce,
            amount,
            fee,
            dst: Destination::Long(dst_pubkey),
        }
    }

    /// Constructs a transaction whose destination is an existing account id.
    pub fn new_short(src_id: i64, src_nonce: i64, amount: i64, fee: i64, dst_id: i64) -> Self {
        TxnRaw {
            src_id,
            src_nonce,
            amount,
            fee,
            dst: Destination::Short(dst_id),
        }
    }
}
