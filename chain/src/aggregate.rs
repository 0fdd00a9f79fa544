//! Partitioned BLS aggregate-signature engine.
//!
//! A block's transactions are split into [`N_AGG`] contiguous groups; each
//! group is covered by one BLS aggregate signature. Signing and verifying
//! groups is embarrassingly parallel and dominates block-processing cost,
//! so both directions fan out across `N_AGG` threads.

use std::thread;

use crate::bls::{self, IDENTITY_SIG};
use crate::error::SignatureError;
use crate::types::{PubKey, Sig, DIGEST_LEN, N_AGG};

/// Computes the `[start, end)` transaction range covered by partition
/// `group_i` out of `N_AGG`, for a block of `num_txns` transactions.
pub fn group_range(group_i: usize, num_txns: usize) -> (usize, usize) {
    let per_group = num_txns.div_ceil(N_AGG).max(1);
    let start = (group_i * per_group).min(num_txns);
    let end = (start + per_group).min(num_txns);
    (start, end)
}

/// Signs a block: aggregates `individual_signs` into `N_AGG` group
/// signatures, one per partition. Empty groups yield the identity
/// signature.
pub fn aggregate_sign(individual_signs: &[Sig]) -> Result<[Sig; N_AGG], SignatureError> {
    let num_txns = individual_signs.len();
    let mut out = [IDENTITY_SIG; N_AGG];
    for (i, slot) in out.iter_mut().enumerate() {
        let (start, end) = group_range(i, num_txns);
        if end > start {
            *slot = bls::aggregate_signatures(&individual_signs[start..end])?;
        }
    }
    Ok(out)
}

/// Verifies `agg_signs` (one per partition) against the block's sender
/// public keys and 32-byte message digests. Dispatches `N_AGG` parallel
/// verification tasks; any group failure fails the whole block.
pub fn aggregate_verify(
    agg_signs: &[Sig; N_AGG],
    pubkeys: &[PubKey],
    digests: &[u8],
) -> Result<(), SignatureError> {
    debug_assert_eq!(digests.len(), pubkeys.len() * DIGEST_LEN);
    let num_txns = pubkeys.len();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..N_AGG)
            .map(|group_i| {
                let (start, end) = group_range(group_i, num_txns);
                let group_pubkeys = &pubkeys[start..end];
                let group_digests = &digests[start * DIGEST_LEN..end * DIGEST_LEN];
                let agg_sig = &agg_signs[group_i];
                scope.spawn(move || -> Result<(), SignatureError> {
                    if group_pubkeys.is_empty() {
                        return Ok(());
                    }
                    bls::aggregate_verify_group(group_pubkeys, group_digests, agg_sig)
                        .map_err(|_| SignatureError::AggregateVerifyFailed { group: group_i })
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("aggregate verify worker panicked")?;
        }
        Ok(())
    })
}
