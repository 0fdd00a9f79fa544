//! Block chaining header.
//!
//! This struct mirrors the original implementation's `BlockHeader`: a
//! version/parent-hash/merkle-root/timestamp/bits/nonce tuple that would,
//! in a chained blockchain, link each block to its predecessor. It is kept
//! here because it is part of this codebase's data model, but nothing in
//! the block engine currently populates or checks it — chain continuity
//! between blocks is not enforced (see the open question in DESIGN.md).

/// Length in bytes of the manual serialization produced by [`BlockHeader::serialize`].
pub const BLOCK_HEADER_LEN: usize = 1 + 32 + 32 + 8 + 4 + 4;

/// A block-chaining header. Currently unused by the block engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_LEN] {
        let mut out = [0u8; BLOCK_HEADER_LEN];
        let mut pos = 0;
        out[pos] = self.version;
        pos += 1;
        out[pos..pos + 32].copy_from_slice(&self.prev_block);
        pos += 32;
        out[pos..pos + 32].copy_from_slice(&self.merkle_root);
        pos += 32;
        out[pos..pos + 8].copy_from_slice(&self.timestamp.to_le_bytes());
        pos += 8;
        out[pos..pos + 4].copy_from_slice(&self.bits.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn deserialize(buf: &[u8; BLOCK_HEADER_LEN]) -> Self {
        let mut pos = 0;
        let version = buf[pos];
        pos += 1;
        let mut prev_block = [0u8; 32];
        prev_block.copy_from_slice(&buf[pos..pos + 32]);
        pos += 32;
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&buf[pos..pos + 32]);
        pos += 32;
        let timestamp = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let bits = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let nonce = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        BlockHeader {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_serialize_deserialize() {
        let h = BlockHeader {
            version: 1,
            prev_block: [7u8; 32],
            merkle_root: [9u8; 32],
            timestamp: 1_700_000_000,
            bits: 0x1d00ffff,
            nonce: 42,
        };
        let bytes = h.serialize();
        let back = BlockHeader::deserialize(&bytes);
        assert_eq!(h, back);
    }
}
