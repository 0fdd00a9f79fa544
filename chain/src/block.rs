//! Block assembly and verification: the component that ties the Byte
//! Buffer, Transaction Codec, Account Index, Journal Store, and Aggregate
//! Signature Engine together.
//!
//! A [`PendingBlock`] is built by repeated [`add_txn`] calls, closed off by
//! [`finish`], and handed to a sink. A received block is applied and
//! checked by [`check_and_write`] in one step.

use std::collections::BTreeSet;

use crate::account_index::AccountIndex;
use crate::aggregate;
use crate::bls;
use crate::buffer::{sha256, ByteBuffer};
use crate::error::{DecodeError, LedgerError, StateError};
use crate::storage::Journal;
use crate::txn;
use crate::types::{Destination, PubKey, Sig, DIGEST_LEN, N_AGG, SIGNATURE_LEN};

const AGG_PREFIX_LEN: usize = N_AGG * SIGNATURE_LEN;

/// A block under construction (build path) or under verification (verify
/// path). Three parallel sequences describe its transactions; `buf` is the
/// block's wire encoding, used only on the build path.
#[derive(Default)]
pub struct PendingBlock {
    pubkeys: Vec<PubKey>,
    digests: Vec<u8>,
    signs: Vec<Sig>,
    buf: ByteBuffer,
}

impl PendingBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all three sequences and the wire buffer, then writes the
    /// reserved `N_AGG * 96`-byte zero prefix the build path will later
    /// overwrite in [`finish`].
    pub fn reset_and_prepare(&mut self) {
        self.clear();
        self.buf.write_raw(&[0u8; AGG_PREFIX_LEN]);
    }

    /// Clears the three parallel sequences without touching `buf`. Used by
    /// the verify path, which does not build a wire buffer of its own.
    pub fn clear(&mut self) {
        self.pubkeys.clear();
        self.digests.clear();
        self.signs.clear();
        self.buf.clear();
    }

    pub fn num_txns(&self) -> usize {
        self.digests.len() / DIGEST_LEN
    }

    pub fn wire_size(&self) -> usize {
        self.buf.size()
    }

    fn add_sender_sig(&mut self, digest: [u8; DIGEST_LEN], sig: Sig) {
        self.digests.extend_from_slice(&digest);
        self.signs.push(sig);
    }

    fn add_sender_pubkey(&mut self, pubkey: PubKey, digest: [u8; DIGEST_LEN]) {
        self.pubkeys.push(pubkey);
        self.digests.extend_from_slice(&digest);
    }

    /// The finished block's wire bytes, valid after [`finish`].
    pub fn into_wire_bytes(self) -> Vec<u8> {
        self.buf.into_vec()
    }
}

/// Applies one transaction's state transition against the Account Index
/// and journal, shared by the build and verify paths. Returns the
/// (possibly newly assigned) source account id.
fn apply_txn(
    txn: &crate::types::TxnRaw,
    accounts: &mut AccountIndex,
    journal: &mut dyn Journal,
    touched: &mut BTreeSet<i64>,
) -> Result<i64, LedgerError> {
    let src_id = txn.src_id;
    {
        let src = accounts.get(src_id)?;
        if src.nonce != txn.src_nonce {
            return Err(StateError::NonceMismatch { expected: src.nonce, got: txn.src_nonce }.into());
        }
        if src.amount < txn.amount {
            return Err(StateError::InsufficientFunds { have: src.amount, need: txn.amount }.into());
        }
    }

    let dst_id = match &txn.dst {
        Destination::Long(pubkey) => accounts.add(*pubkey, journal)?,
        Destination::Short(id) => {
            accounts.get(*id)?; // bounds-check
            *id
        }
    };

    let src_prev = accounts.get(src_id)?.last_journal_row;
    let dst_prev = accounts.get(dst_id)?.last_journal_row;

    let (new_src_amount, new_src_nonce) = {
        let src = accounts.get_mut(src_id)?;
        src.nonce += 1;
        src.amount -= txn.amount;
        (src.amount, src.nonce)
    };
    let (new_dst_amount, new_dst_nonce) = {
        let dst = accounts.get_mut(dst_id)?;
        dst.amount += txn.amount;
        (dst.amount, dst.nonce)
    };

    let src_row = journal.append_row(src_id, new_src_amount, new_src_nonce, src_prev)?;
    accounts.get_mut(src_id)?.last_journal_row = src_row;
    let dst_row = journal.append_row(dst_id, new_dst_amount, new_dst_nonce, dst_prev)?;
    accounts.get_mut(dst_id)?.last_journal_row = dst_row;

    touched.insert(src_id);
    touched.insert(dst_id);
    Ok(src_id)
}

/// Build path: decodes one transaction frame (leading pubkey, trailing
/// signature) from `txn_bytes` and attempts to admit it into `pending`.
///
/// Returns `Ok(true)` if the block is full and the transaction was *not*
/// consumed — callers must return `txn_bytes` to the pool so the next
/// block can use it. Returns `Ok(false)` if the transaction was applied.
pub fn add_txn(
    pending: &mut PendingBlock,
    txn_bytes: &[u8],
    max_block_size: usize,
    accounts: &mut AccountIndex,
    journal: &mut dyn Journal,
    touched: &mut BTreeSet<i64>,
) -> Result<bool, LedgerError> {
    let mut buf = ByteBuffer::from_vec(txn_bytes.to_vec());
    let decoded = txn::decode(&mut buf, true, true)?;

    if pending.wire_size() + decoded.message.len() > max_block_size {
        return Ok(true);
    }

    let src_pubkey = accounts.get(decoded.txn.src_id)?.pubkey;
    let sig = decoded.signature.ok_or(DecodeError::OutOfBuffer)?;
    bls::verify_single(&src_pubkey, &decoded.message, &sig)?;

    apply_txn(&decoded.txn, accounts, journal, touched)?;

    let digest = sha256(&decoded.message);
    pending.add_sender_sig(digest, sig);
    pending.buf.write_raw(&decoded.message);
    Ok(false)
}

/// Computes the block's `N_AGG` aggregate signatures from the individual
/// signatures collected during [`add_txn`], and patches them into the
/// block's reserved header prefix.
pub fn finish(pending: &mut PendingBlock) -> Result<(), LedgerError> {
    let agg = aggregate::aggregate_sign(&pending.signs)?;
    let mut offset = 0;
    for sig in &agg {
        pending.buf.write_at(offset, sig);
        offset += SIGNATURE_LEN;
    }
    Ok(())
}

/// Verify path: parses a complete block frame, applies every transaction
/// in a single batch, and checks the `N_AGG` aggregate signatures. Commits
/// on full success; rolls back the journal and the Account Index on any
/// failure (decode, state, or signature).
pub fn check_and_write(
    pending: &mut PendingBlock,
    block_bytes: &[u8],
    accounts: &mut AccountIndex,
    journal: &mut dyn Journal,
) -> Result<(), LedgerError> {
    let mut buf = ByteBuffer::from_vec(block_bytes.to_vec());
    let mut agg_signs = [bls::IDENTITY_SIG; N_AGG];
    for slot in &mut agg_signs {
        let raw = buf.read_raw(SIGNATURE_LEN)?;
        slot.copy_from_slice(raw);
    }

    pending.clear();

    let pre_len = accounts.len();
    let mut touched = BTreeSet::new();
    journal.begin()?;

    let apply_result: Result<(), LedgerError> = (|| {
        while buf.remaining() > 0 {
            let decoded = txn::decode(&mut buf, false, false)?;
            let src_id = apply_txn(&decoded.txn, accounts, journal, &mut touched)?;
            let pubkey = accounts.get(src_id)?.pubkey;
            let digest = sha256(&decoded.message);
            pending.add_sender_pubkey(pubkey, digest);
        }
        Ok(())
    })();

    let final_result = apply_result.and_then(|()| {
        aggregate::aggregate_verify(&agg_signs, &pending.pubkeys, &pending.digests).map_err(LedgerError::from)
    });

    match final_result {
        Ok(()) => {
            journal.commit()?;
            Ok(())
        }
        Err(e) => {
            journal.rollback()?;
            accounts.rollback(pre_len, &touched, journal)?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::PrivateKey;
    use crate::storage::InMemoryJournal;
    use crate::types::{TxnRaw, PRIVKEY_LEN, PUBKEY_LEN};

    fn dummy_key(seed: u8) -> PrivateKey {
        PrivateKey::from_ikm(&[seed; PRIVKEY_LEN])
    }

    fn genesis(amount: i64) -> (AccountIndex, InMemoryJournal, PrivateKey, i64) {
        let mut journal = InMemoryJournal::new();
        let mut accounts = AccountIndex::new();
        let key = dummy_key(1);
        let pk = key.public_key();
        let id = accounts.add(pk, &mut journal).unwrap();
        accounts.get_mut(id).unwrap().amount = amount;
        (accounts, journal, key, id)
    }

    fn encode_frame(txn: &TxnRaw, signer: &PrivateKey) -> Vec<u8> {
        let pubkey = signer.public_key();
        let mut buf = ByteBuffer::new();
        txn::encode(txn, Some(&pubkey), signer, &mut buf);
        buf.into_vec()
    }

    #[test]
    fn genesis_plus_single_transfer_matches_scenario_one() {
        let (mut accounts, mut journal, genesis_key, g) = genesis(100);
        let new_key = dummy_key(2);
        let new_pk = new_key.public_key();
        let t = TxnRaw::new_long(g, 0, 10, 0, new_pk);
        let frame = encode_frame(&t, &genesis_key);

        let mut pending = PendingBlock::new();
        pending.reset_and_prepare();
        let mut touched = BTreeSet::new();
        journal.begin().unwrap();
        let full = add_txn(&mut pending, &frame, 1_048_576, &mut accounts, &mut journal, &mut touched).unwrap();
        assert!(!full);
        journal.commit().unwrap();

        assert_eq!(accounts.len(), 2);
        let g_acc = accounts.get(g).unwrap();
        assert_eq!((g_acc.amount, g_acc.nonce), (90, 1));
        let p = accounts.find(&new_pk).unwrap();
        let p_acc = accounts.get(p).unwrap();
        assert_eq!((p_acc.amount, p_acc.nonce), (10, 0));
        assert_eq!(accounts.sum_amounts(), 100);
    }

    #[test]
    fn nonce_mismatch_is_rejected_without_mutation() {
        let (mut accounts, mut journal, genesis_key, g) = genesis(100);
        let t = TxnRaw::new_short(g, 5, 5, 0, g);
        let frame = encode_frame(&t, &genesis_key);

        let mut pending = PendingBlock::new();
        pending.reset_and_prepare();
        let mut touched = BTreeSet::new();
        journal.begin().unwrap();
        let err = add_txn(&mut pending, &frame, 1_048_576, &mut accounts, &mut journal, &mut touched).unwrap_err();
        assert!(matches!(err, LedgerError::State(StateError::NonceMismatch { .. })));
        assert_eq!(accounts.get(g).unwrap().amount, 100);
    }

    #[test]
    fn over_spend_is_rejected() {
        let (mut accounts, mut journal, genesis_key, g) = genesis(90);
        let t = TxnRaw::new_short(g, 0, 1000, 0, g);
        let frame = encode_frame(&t, &genesis_key);

        let mut pending = PendingBlock::new();
        pending.reset_and_prepare();
        let mut touched = BTreeSet::new();
        journal.begin().unwrap();
        let err = add_txn(&mut pending, &frame, 1_048_576, &mut accounts, &mut journal, &mut touched).unwrap_err();
        assert!(matches!(err, LedgerError::State(StateError::InsufficientFunds { .. })));
    }

    #[test]
    fn build_then_verify_round_trip_is_bit_equal() {
        let (mut accounts_a, mut journal_a, genesis_key, g) = genesis(100);
        let new_key = dummy_key(7);
        let new_pk = new_key.public_key();

        let mut pending = PendingBlock::new();
        pending.reset_and_prepare();
        let mut touched = BTreeSet::new();
        journal_a.begin().unwrap();

        let txns = [
            TxnRaw::new_long(g, 0, 10, 0, new_pk),
            TxnRaw::new_short(g, 1, 5, 0, g),
        ];
        for t in &txns {
            let frame = encode_frame(t, &genesis_key);
            let full = add_txn(&mut pending, &frame, 1_048_576, &mut accounts_a, &mut journal_a, &mut touched).unwrap();
            assert!(!full);
        }
        journal_a.commit().unwrap();
        finish(&mut pending).unwrap();
        let block_bytes = pending.into_wire_bytes();

        // Node B starts from the same genesis and verifies the block.
        let mut journal_b = InMemoryJournal::new();
        let mut accounts_b = AccountIndex::new();
        let gb = accounts_b.add(genesis_key.public_key(), &mut journal_b).unwrap();
        accounts_b.get_mut(gb).unwrap().amount = 100;

        let mut verify_pending = PendingBlock::new();
        check_and_write(&mut verify_pending, &block_bytes, &mut accounts_b, &mut journal_b).unwrap();

        assert_eq!(accounts_a.sum_amounts(), accounts_b.sum_amounts());
        assert_eq!(accounts_a.get(g).unwrap(), accounts_b.get(gb).unwrap());
    }

    #[test]
    fn capacity_stop_does_not_consume_overflowing_txn() {
        let (mut accounts, mut journal, genesis_key, g) = genesis(1000);
        let t = TxnRaw::new_short(g, 0, 1, 0, g);
        let frame = encode_frame(&t, &genesis_key);

        let mut pending = PendingBlock::new();
        pending.reset_and_prepare();
        let mut touched = BTreeSet::new();
        journal.begin().unwrap();

        // Cap smaller than one message: the very first txn reports full.
        let full = add_txn(&mut pending, &frame, 0, &mut accounts, &mut journal, &mut touched).unwrap();
        assert!(full);
        assert_eq!(pending.num_txns(), 0);
        // Nothing was mutated: account state is untouched, safe to return
        // `frame` to the pool unconsumed.
        assert_eq!(accounts.get(g).unwrap().nonce, 0);
    }

    #[test]
    fn partition_boundary_single_txn_verifies() {
        let (mut accounts, mut journal, genesis_key, g) = genesis(100);
        let t = TxnRaw::new_short(g, 0, 1, 0, g);
        let frame = encode_frame(&t, &genesis_key);

        let mut pending = PendingBlock::new();
        pending.reset_and_prepare();
        let mut touched = BTreeSet::new();
        journal.begin().unwrap();
        add_txn(&mut pending, &frame, 1_048_576, &mut accounts, &mut journal, &mut touched).unwrap();
        journal.commit().unwrap();
        finish(&mut pending).unwrap();

        let mut journal_b = InMemoryJournal::new();
        let mut accounts_b = AccountIndex::new();
        let gb = accounts_b.add(genesis_key.public_key(), &mut journal_b).unwrap();
        accounts_b.get_mut(gb).unwrap().amount = 100;

        let mut verify_pending = PendingBlock::new();
        let block_bytes = pending.into_wire_bytes();
        assert!(check_and_write(&mut verify_pending, &block_bytes, &mut accounts_b, &mut journal_b).is_ok());
    }

    #[test]
    fn verify_rolls_back_account_index_on_bad_nonce() {
        let (mut accounts, mut journal, genesis_key, g) = genesis(100);
        // Hand-build a block body with a bad nonce, skipping the build path.
        let bad = TxnRaw::new_short(g, 9, 1, 0, g);
        let mut body = ByteBuffer::new();
        txn::encode(&bad, None, &genesis_key, &mut body);
        let mut block_bytes = vec![0u8; AGG_PREFIX_LEN];
        block_bytes.extend_from_slice(body.as_slice());

        let mut pending = PendingBlock::new();
        let pre_amount = accounts.get(g).unwrap().amount;
        let err = check_and_write(&mut pending, &block_bytes, &mut accounts, &mut journal).unwrap_err();
        assert!(matches!(err, LedgerError::State(StateError::NonceMismatch { .. })));
        assert_eq!(accounts.get(g).unwrap().amount, pre_amount);
        assert_eq!(accounts.len(), 1);
    }
}
