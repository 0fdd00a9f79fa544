//! BLS12-381 signatures in ETH2 mode, the narrow capability set the rest of
//! the ledger consumes: key generation, sign, verify, and aggregate.
//!
//! Backed by `blst`'s `min_pk` variant (48-byte public keys, 96-byte
//! signatures in G2), matching the sizes this codebase's wire format
//! already assumes.

use blst::min_pk::{AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;

use crate::error::SignatureError;
use crate::types::{PubKey, Sig, PRIVKEY_LEN};

/// Domain separation tag for signing, matching the standard ETH2 BLS
/// signature scheme (ciphersuite `BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_`).
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed serialization of the G2 identity (point at infinity), used as
/// the aggregate signature for an empty partition group.
pub const IDENTITY_SIG: Sig = {
    let mut b = [0u8; 96];
    b[0] = 0xc0;
    b
};

/// A BLS secret key, generated or imported from 32 bytes of key material.
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Derives a secret key deterministically from arbitrary key material
    /// via blst's IKM expansion. `ikm` must be at least 32 bytes.
    pub fn from_ikm(ikm: &[u8; PRIVKEY_LEN]) -> Self {
        let sk = SecretKey::key_gen(ikm, &[]).expect("key_gen: ikm length satisfies blst's minimum");
        PrivateKey(sk)
    }

    pub fn public_key(&self) -> PubKey {
        self.0.sk_to_pk().compress()
    }

    /// Signs a message (the transaction's 32-byte SHA-256 digest) and
    /// returns the 96-byte compressed signature.
    pub fn sign(&self, msg: &[u8]) -> Sig {
        self.0.sign(msg, DST, &[]).compress()
    }
}

/// Verifies a single (pubkey, message, signature) triple.
///
/// This is the admission-time check used by the Block Engine's build path
/// and the network boundary's edge filter.
pub fn verify_single(pubkey: &PubKey, msg: &[u8], sig: &Sig) -> Result<(), SignatureError> {
    let pk = PublicKey::uncompress(pubkey).map_err(|_| SignatureError::SingleVerifyFailed)?;
    let sg = Signature::uncompress(sig).map_err(|_| SignatureError::SingleVerifyFailed)?;
    let err = sg.verify(true, msg, DST, &[], &pk, true);
    if err == BLST_ERROR::BLST_SUCCESS {
        Ok(())
    } else {
        Err(SignatureError::SingleVerifyFailed)
    }
}

/// Aggregates a non-empty slice of individual signatures into one.
pub fn aggregate_signatures(sigs: &[Sig]) -> Result<Sig, SignatureError> {
    let parsed: Vec<Signature> = sigs
        .iter()
        .map(|s| Signature::uncompress(s).map_err(|_| SignatureError::SingleVerifyFailed))
        .collect::<Result<_, _>>()?;
    let refs: Vec<&Signature> = parsed.iter().collect();
    let agg = AggregateSignature::aggregate(&refs, true).map_err(|_| SignatureError::SingleVerifyFailed)?;
    Ok(agg.to_signature().compress())
}

/// Verifies one aggregate signature against `N` distinct (pubkey, digest)
/// pairs, where `digests` is the concatenation of `N` 32-byte digests.
pub fn aggregate_verify_group(
    pubkeys: &[PubKey],
    digests: &[u8],
    agg_sig: &Sig,
) -> Result<(), SignatureError> {
    debug_assert_eq!(digests.len(), pubkeys.len() * 32);

    let parsed_pks: Vec<PublicKey> = pubkeys
        .iter()
        .map(|pk| PublicKey::uncompress(pk).map_err(|_| SignatureError::SingleVerifyFailed))
        .collect::<Result<_, _>>()?;
    let pk_refs: Vec<&PublicKey> = parsed_pks.iter().collect();

    let msgs: Vec<&[u8]> = digests.chunks(32).collect();

    let sig = Signature::uncompress(agg_sig).map_err(|_| SignatureError::SingleVerifyFailed)?;

    let err = sig.aggregate_verify(true, &msgs, DST, &pk_refs, true);
    if err == BLST_ERROR::BLST_SUCCESS {
        Ok(())
    } else {
        Err(SignatureError::SingleVerifyFailed)
    }
}
