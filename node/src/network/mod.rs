//! Network Boundary: a websocket server plus a dialer client. Binary frames
//! begin with a one-byte discriminator: `0 = TXN`, `1 = BLOCK`. This is the
//! only thing the Node Loop is decoupled from — it depends solely on the
//! [`chain::Pool`] interfaces this module enqueues into.

pub mod client;
pub mod server;

/// Frame discriminator for a transaction frame.
pub const MSG_TXN: u8 = 0;
/// Frame discriminator for a block frame.
pub const MSG_BLOCK: u8 = 1;

/// Cheap admission filter shared by both halves of the Network Boundary:
/// decode the frame and verify its signature against the sender pubkey
/// embedded in the frame itself. Applied to every inbound TXN frame,
/// whether it arrived over an accepted connection or one this node dialed
/// out to; the Block Engine re-verifies against the *stored* account
/// pubkey at real admission regardless.
pub(crate) fn admit_txn(payload: &[u8]) -> bool {
    let mut buf = chain::ByteBuffer::from_vec(payload.to_vec());
    let decoded = match chain::decode(&mut buf, true, true) {
        Ok(d) => d,
        Err(_) => return false,
    };
    let (Some(pubkey), Some(sig)) = (decoded.pubkey, decoded.signature) else {
        return false;
    };
    chain::verify_single(&pubkey, &decoded.message, &sig).is_ok()
}
