//! Transaction codec: encodes/decodes a [`TxnRaw`] plus its optional sender
//! public key and signature to/from a [`ByteBuffer`].
//!
//! The canonical message — the span that is hashed and signed — is always
//! the unsigned body (`src_id` through the destination), excluding both the
//! optional leading pubkey and the trailing signature. Every signer and
//! every verifier must agree on exactly this span.

use crate::buffer::ByteBuffer;
use crate::bls::PrivateKey;
use crate::error::DecodeError;
use crate::types::{
    BIAS_AMOUNT, BIAS_DST, BIAS_SRC, Destination, DstKind, PubKey, Sig, TxnRaw, PUBKEY_LEN,
    SIGNATURE_LEN,
};

/// A fully decoded wire frame: the parsed transaction plus whatever
/// prefix/suffix material the caller asked to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTxn {
    /// The sender's public key, if a leading prefix was expected.
    pub pubkey: Option<PubKey>,
    /// The exact bytes that were (or must be) hashed and signed.
    pub message: Vec<u8>,
    /// The trailing signature, if one was expected.
    pub signature: Option<Sig>,
    pub txn: TxnRaw,
}

/// Encodes `txn` into a fresh frame in `buf`, clearing it first.
///
/// If `sender_pubkey` is `Some`, its 48 bytes are written verbatim before
/// the transaction body (used when a peer must discover the sender's key
/// from the frame itself; omitted inside a block body because the Account
/// Index already knows every sender). The frame is always signed and the
/// 96-byte signature is appended at the end.
pub fn encode(txn: &TxnRaw, sender_pubkey: Option<&PubKey>, signer: &PrivateKey, buf: &mut ByteBuffer) {
    buf.clear();

    let prefix_len = if let Some(pk) = sender_pubkey {
        buf.write_raw(pk);
        PUBKEY_LEN
    } else {
        0
    };

    buf.write_number(txn.src_id + BIAS_SRC);
    buf.write_number(txn.src_nonce);
    buf.write_number(txn.amount + BIAS_AMOUNT);
    buf.write_number(txn.fee);
    buf.write_u8(txn.dst.kind() as u8);
    match &txn.dst {
        Destination::Long(pk) => buf.write_raw(pk),
        Destination::Short(id) => buf.write_number(*id + BIAS_DST),
    }

    let digest = buf.sha256(prefix_len);
    let sig = signer.sign(&digest);
    buf.write_raw(&sig);
}

/// Decodes one transaction frame starting at `buf`'s current read cursor.
///
/// `expect_pubkey` and `expect_sign` must match how the frame was produced:
/// `true`/`true` for a standalone wire frame, `false`/`false` for a
/// transaction embedded in a block body.
pub fn decode(buf: &mut ByteBuffer, expect_pubkey: bool, expect_sign: bool) -> Result<DecodedTxn, DecodeError> {
    let pubkey = if expect_pubkey {
        let raw = buf.read_raw(PUBKEY_LEN)?;
        let mut arr = [0u8; PUBKEY_LEN];
        arr.copy_from_slice(raw);
        Some(arr)
    } else {
        None
    };

    let msg_start = buf.pos();

    let src_id = buf.read_number()? - BIAS_SRC;
    let src_nonce = buf.read_number()?;
    let amount = buf.read_number()? - BIAS_AMOUNT;
    let fee = buf.read_number()?;

    let dst_byte = buf.read_u8()?;
    let dst_kind = DstKind::from_u8(dst_byte).ok_or(DecodeError::UnknownDstKind(dst_byte))?;
    let dst = match dst_kind {
        DstKind::Long => {
            let raw = buf.read_raw(PUBKEY_LEN)?;
            let mut arr = [0u8; PUBKEY_LEN];
            arr.copy_from_slice(raw);
            Destination::Long(arr)
        }
        DstKind::Short => {
            let id = buf.read_number()? - BIAS_DST;
            Destination::Short(id)
        }
    };

    let msg_end = buf.pos();
    let message = buf.as_slice()[msg_start..msg_end].to_vec();

    let signature = if expect_sign {
        let raw = buf.read_raw(SIGNATURE_LEN)?;
        let mut arr = [0u8; SIGNATURE_LEN];
        arr.copy_from_slice(raw);
        Some(arr)
    } else {
        None
    };

    Ok(DecodedTxn {
        pubkey,
        message,
        signature,
        txn: TxnRaw {
            src_id,
            src_nonce,
            amount,
            fee,
            dst,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PRIVKEY_LEN;

    fn dummy_key(seed: u8) -> PrivateKey {
        PrivateKey::from_ikm(&[seed; PRIVKEY_LEN])
    }

    #[test]
    fn roundtrip_long_with_pubkey_prefix() {
        let signer = dummy_key(1);
        let pubkey = signer.public_key();
        let txn = TxnRaw::new_long(3, 0, 10, 0, [9u8; PUBKEY_LEN]);

        let mut buf = ByteBuffer::new();
        encode(&txn, Some(&pubkey), &signer, &mut buf);
        buf.set_pos(0);

        let decoded = decode(&mut buf, true, true).unwrap();
        assert_eq!(decoded.txn, txn);
        assert_eq!(decoded.pubkey, Some(pubkey));
        assert!(decoded.signature.is_some());
    }

    #[test]
    fn roundtrip_short_without_pubkey_prefix() {
        let signer = dummy_key(2);
        let txn = TxnRaw::new_short(5, 2, 1, 0, 7);

        let mut buf = ByteBuffer::new();
        encode(&txn, None, &signer, &mut buf);
        buf.set_pos(0);

        let decoded = decode(&mut buf, false, true).unwrap();
        assert_eq!(decoded.txn, txn);
        assert_eq!(decoded.pubkey, None);
    }

    #[test]
    fn message_span_excludes_prefix_and_signature() {
        let signer = dummy_key(3);
        let pubkey = signer.public_key();
        let txn = TxnRaw::new_short(1, 0, 1, 0, 2);

        let mut buf = ByteBuffer::new();
        encode(&txn, Some(&pubkey), &signer, &mut buf);
        buf.set_pos(0);
        let decoded = decode(&mut buf, true, true).unwrap();

        // The block body re-encoding of this same transaction (no pubkey,
        // no signature) should hash identically to the recovered message.
        let mut body_only = ByteBuffer::new();
        encode(&txn, None, &signer, &mut body_only);
        body_only.set_pos(0);
        let body_decoded = decode(&mut body_only, false, true).unwrap();

        assert_eq!(decoded.message, body_decoded.message);
    }

    #[test]
    fn decode_rejects_unknown_dst_kind() {
        let signer = dummy_key(4);
        let txn = TxnRaw::new_short(1, 0, 1, 0, 2);
        let mut buf = ByteBuffer::new();
        encode(&txn, None, &signer, &mut buf);
        let mut bytes = buf.into_vec();
        // dst_kind byte sits right after src_id/src_nonce/amount/fee varnums;
        // easier to corrupt by scanning for the 0/1 byte pattern is fragile,
        // so instead build a tiny buffer by hand.
        bytes.clear();
        let mut raw = ByteBuffer::new();
        raw.write_number(1 + crate::types::BIAS_SRC);
        raw.write_number(0);
        raw.write_number(1 + crate::types::BIAS_AMOUNT);
        raw.write_number(0);
        raw.write_u8(9); // invalid dst_kind
        raw.set_pos(0);
        let err = decode(&mut raw, false, false).unwrap_err();
        assert_eq!(err, DecodeError::UnknownDstKind(9));
    }
}
