//! Websocket server half of the Network Boundary.
//!
//! Accepts binary frames whose first byte is the kind discriminator.
//! `TXN` frames are verified against their own embedded pubkey (a cheap
//! spam filter; the Block Engine re-verifies against the *stored* account
//! pubkey at admission) before being enqueued verbatim. `BLOCK` frames are
//! enqueued with the discriminator stripped.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};

use chain::Pool;

use super::{admit_txn, MSG_BLOCK, MSG_TXN};

/// Shared state for the websocket router: the two pools the Node Loop
/// drains.
#[derive(Clone)]
pub struct NetworkState {
    pub txn_pool: Arc<Pool>,
    pub block_pool: Arc<Pool>,
}

/// Builds the router serving the websocket upgrade at `/{ws_path}`.
pub fn router(state: NetworkState, ws_path: &str) -> Router {
    let path = format!("/{}", ws_path.trim_start_matches('/'));
    Router::new().route(&path, get(upgrade)).with_state(state)
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<NetworkState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: NetworkState) {
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Binary(bytes) = msg {
            handle_frame(&bytes, &state);
        }
    }
}

fn handle_frame(bytes: &[u8], state: &NetworkState) {
    let Some((&kind, payload)) = bytes.split_first() else { return };
    match kind {
        MSG_TXN => {
            if admit_txn(payload) {
                state.txn_pool.add(payload.to_vec());
            } else {
                tracing::debug!("rejected transaction frame at network edge");
            }
        }
        MSG_BLOCK => state.block_pool.add(payload.to_vec()),
        other => tracing::debug!(kind = other, "unknown frame discriminator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::{bls::PrivateKey, types::{PRIVKEY_LEN, TxnRaw}};

    fn dummy_key(seed: u8) -> PrivateKey {
        PrivateKey::from_ikm(&[seed; PRIVKEY_LEN])
    }

    #[test]
    fn admit_txn_accepts_well_signed_frame() {
        let signer = dummy_key(1);
        let pk = signer.public_key();
        let t = TxnRaw::new_short(0, 0, 1, 0, 0);
        let mut buf = chain::ByteBuffer::new();
        chain::encode(&t, Some(&pk), &signer, &mut buf);
        assert!(admit_txn(&buf.into_vec()));
    }

    #[test]
    fn admit_txn_rejects_tampered_frame() {
        let signer = dummy_key(2);
        let pk = signer.public_key();
        let t = TxnRaw::new_short(0, 0, 1, 0, 0);
        let mut buf = chain::ByteBuffer::new();
        chain::encode(&t, Some(&pk), &signer, &mut buf);
        let mut bytes = buf.into_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(!admit_txn(&bytes));
    }

    #[test]
    fn handle_frame_routes_by_discriminator() {
        let txn_pool = Arc::new(Pool::new());
        let block_pool = Arc::new(Pool::new());
        let state = NetworkState { txn_pool: txn_pool.clone(), block_pool: block_pool.clone() };

        let mut block_frame = vec![MSG_BLOCK];
        block_frame.extend_from_slice(&[9u8; 4]);
        handle_frame(&block_frame, &state);
        assert_eq!(block_pool.num(), 1);
        assert_eq!(txn_pool.num(), 0);
    }
}
