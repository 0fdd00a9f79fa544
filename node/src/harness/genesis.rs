//! Genesis file: `[amount i64 LE][priv_key 32B]`.
//!
//! Read if present; otherwise a fresh keypair is generated and the file is
//! written so a later run picks up the same genesis account.

use std::fs;
use std::io;

use chain::types::PRIVKEY_LEN;

pub fn write_genesis(path: &str, amount: i64, priv_key: &[u8; PRIVKEY_LEN]) -> io::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::with_capacity(8 + PRIVKEY_LEN);
    buf.extend_from_slice(&amount.to_le_bytes());
    buf.extend_from_slice(priv_key);
    fs::write(path, buf)
}

pub fn read_genesis(path: &str) -> io::Result<(i64, [u8; PRIVKEY_LEN])> {
    let data = fs::read(path)?;
    if data.len() < 8 + PRIVKEY_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "genesis file too short"));
    }
    let mut amount_bytes = [0u8; 8];
    amount_bytes.copy_from_slice(&data[0..8]);
    let amount = i64::from_le_bytes(amount_bytes);
    let mut priv_key = [0u8; PRIVKEY_LEN];
    priv_key.copy_from_slice(&data[8..8 + PRIVKEY_LEN]);
    Ok((amount, priv_key))
}

/// Reads `path` if it exists, otherwise generates a fresh CSPRNG keypair
/// funded with `default_amount` and writes it for next time.
pub fn read_or_generate_genesis(path: &str, default_amount: i64) -> io::Result<(i64, [u8; PRIVKEY_LEN])> {
    match read_genesis(path) {
        Ok(g) => Ok(g),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let key: [u8; PRIVKEY_LEN] = rand::random();
            write_genesis(path, default_amount, &key)?;
            Ok((default_amount, key))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_roundtrips_through_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.bin");
        let path_str = path.to_str().unwrap();
        write_genesis(path_str, 100_000, &[7u8; PRIVKEY_LEN]).unwrap();
        let (amount, key) = read_genesis(path_str).unwrap();
        assert_eq!(amount, 100_000);
        assert_eq!(key, [7u8; PRIVKEY_LEN]);
    }

    #[test]
    fn read_or_generate_creates_file_on_first_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.bin");
        let path_str = path.to_str().unwrap();

        let (amount_a, key_a) = read_or_generate_genesis(path_str, 42).unwrap();
        assert_eq!(amount_a, 42);

        let (amount_b, key_b) = read_or_generate_genesis(path_str, 999).unwrap();
        assert_eq!(amount_b, 42, "second call must reuse the already-written genesis");
        assert_eq!(key_a, key_b);
    }
}
