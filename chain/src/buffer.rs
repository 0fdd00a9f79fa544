//! Growable byte buffer with a write cursor and a read cursor, plus the
//! variable-length integer codec used throughout the wire format.
//!
//! The number codec drops zero bytes from a 64-bit little-endian integer:
//! one header byte is a bitmask of which of the 8 LE byte positions are
//! non-zero, followed by only those bytes. Small biased values (the common
//! case on this wire) therefore compress to 2-3 bytes instead of 8.

use sha2::{Digest, Sha256};

use crate::error::DecodeError;

/// Computes a plain SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// A growable byte arena with independent write (`size`) and read (`pos`)
/// cursors.
#[derive(Clone, Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        ByteBuffer { data: Vec::new(), pos: 0 }
    }

    /// Wraps an existing byte vector for reading (`pos` starts at 0).
    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteBuffer { data, pos: 0 }
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Appends raw bytes at the write cursor.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Reads and returns `n` raw bytes, advancing the read cursor.
    pub fn read_raw(&mut self, n: usize) -> Result<&[u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::OutOfBuffer);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    pub fn write_u8(&mut self, b: u8) {
        self.data.push(b);
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.remaining() < 1 {
            return Err(DecodeError::OutOfBuffer);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Writes `value` using the zero-byte-stripped varnum codec.
    pub fn write_number(&mut self, value: i64) {
        let le = (value as u64).to_le_bytes();
        let mut mask: u8 = 0;
        let mut present = Vec::with_capacity(8);
        for (i, b) in le.iter().enumerate() {
            if *b != 0 {
                mask |= 1 << i;
                present.push(*b);
            }
        }
        self.data.push(mask);
        self.data.extend_from_slice(&present);
    }

    /// Reads a value written by [`write_number`](Self::write_number).
    pub fn read_number(&mut self) -> Result<i64, DecodeError> {
        let mask = self.read_u8()?;
        let mut le = [0u8; 8];
        for i in 0..8 {
            if mask & (1 << i) != 0 {
                le[i] = self.read_u8()?;
            }
        }
        Ok(u64::from_le_bytes(le) as i64)
    }

    /// Computes SHA-256 over `data[prefix_len..size]`, i.e. everything
    /// written so far except a leading prefix of `prefix_len` bytes.
    pub fn sha256(&self, prefix_len: usize) -> [u8; 32] {
        sha256(&self.data[prefix_len..])
    }

    /// Overwrites `bytes.len()` bytes starting at `offset`, without moving
    /// the write cursor. Used to patch the block header's aggregate
    /// signature prefix after the body has already been written.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varnum_roundtrip_small_and_large_values() {
        for x in [0i64, 1, 42, 1_000_000, -1, i64::MAX, i64::MIN, 255, 256, 65535] {
            let mut buf = ByteBuffer::new();
            buf.write_number(x);
            buf.set_pos(0);
            let back = buf.read_number().unwrap();
            assert_eq!(x, back, "roundtrip failed for {x}");
        }
    }

    #[test]
    fn varnum_compresses_small_biased_values() {
        let mut buf = ByteBuffer::new();
        buf.write_number(1_000_001); // a typical biased small value
        // header byte + at most 3 non-zero LE bytes for a 21-bit value
        assert!(buf.size() <= 4, "expected compact encoding, got {} bytes", buf.size());
    }

    #[test]
    fn read_raw_out_of_buffer_is_reported() {
        let mut buf = ByteBuffer::from_vec(vec![1, 2, 3]);
        assert!(buf.read_raw(10).is_err());
    }

    #[test]
    fn sha256_excludes_prefix() {
        let mut buf = ByteBuffer::new();
        buf.write_raw(&[0u8; 48]); // pretend pubkey prefix
        buf.write_raw(b"hello");
        let with_prefix_excluded = buf.sha256(48);

        let mut direct = ByteBuffer::new();
        direct.write_raw(b"hello");
        let direct_hash = direct.sha256(0);

        assert_eq!(with_prefix_excluded, direct_hash);
    }
}
