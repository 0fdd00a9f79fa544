//! Websocket dialer half of the Network Boundary: connects out to a peer,
//! forwards inbound frames into the local pools, and drains an outbound
//! block pool to the peer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use chain::Pool;

use super::{admit_txn, MSG_BLOCK, MSG_TXN};

/// Dials `url` and runs until the connection closes or the write side
/// errors. Inbound TXN/BLOCK frames land in `inbound_txn`/`inbound_block`;
/// `outbound_blocks` is drained and sent to the peer as it fills.
pub async fn run_client(
    url: &str,
    inbound_txn: Arc<Pool>,
    inbound_block: Arc<Pool>,
    outbound_blocks: Arc<Pool>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let (ws_stream, _response) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let writer = tokio::spawn(async move {
        loop {
            match outbound_blocks.get() {
                Some(block_bytes) => {
                    let mut frame = Vec::with_capacity(block_bytes.len() + 1);
                    frame.push(MSG_BLOCK);
                    frame.extend_from_slice(&block_bytes);
                    if write.send(Message::Binary(frame.into())).await.is_err() {
                        break;
                    }
                }
                None => tokio::time::sleep(Duration::from_millis(1)).await,
            }
        }
    });

    while let Some(msg) = read.next().await {
        let Ok(Message::Binary(bytes)) = msg else { continue };
        let Some((&kind, payload)) = bytes.split_first() else { continue };
        match kind {
            MSG_TXN => {
                if admit_txn(payload) {
                    inbound_txn.add(payload.to_vec());
                } else {
                    tracing::debug!("rejected transaction frame from peer at network edge");
                }
            }
            MSG_BLOCK => inbound_block.add(payload.to_vec()),
            _ => tracing::debug!(kind, "unknown frame discriminator from peer"),
        }
    }

    writer.abort();
    Ok(())
}
