//! Length-prefixed file replay: reads `[length i64 LE][frame bytes]`
//! records from `txns.bin`/`blocks.bin` and enqueues them verbatim onto a
//! pool, and writes the same format out from a pool's drained contents.

use std::fs;
use std::io;
use std::sync::Arc;

use chain::Pool;

/// Reads every length-prefixed record in `path` and pushes it onto `pool`
/// unmodified. Returns the number of records added.
pub fn replay_into_pool(path: &str, pool: &Arc<Pool>) -> io::Result<usize> {
    let data = fs::read(path)?;
    let mut pos = 0usize;
    let mut num_added = 0usize;

    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated length prefix"));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&data[pos..pos + 8]);
        let len = i64::from_le_bytes(len_bytes) as usize;
        pos += 8;

        if pos + len > data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated record"));
        }
        pool.add(data[pos..pos + len].to_vec());
        pos += len;
        num_added += 1;
    }

    Ok(num_added)
}

/// Writes `frames` as length-prefixed records to `path`.
pub fn write_frames(path: &str, frames: &[Vec<u8>]) -> io::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = Vec::new();
    for frame in frames {
        out.extend_from_slice(&(frame.len() as i64).to_le_bytes());
        out.extend_from_slice(frame);
    }
    fs::write(path, out)
}
