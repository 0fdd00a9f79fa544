//! Synthetic transaction generator, mirroring the original harness's
//! traffic pattern: every 20th transaction mints a brand-new account with
//! a LONG transfer of 1000 from genesis; the rest are SHORT transfers of 1
//! between accounts chosen uniformly at random (the sender is retried
//! until one with sufficient balance is found).
//!
//! A local mirror of account balances/nonces is kept and updated after
//! each transaction so later transactions in the same run see up-to-date
//! state, exactly as the node itself would once the transaction lands.

use std::fs::File;
use std::io::{self, Write};

use rand::Rng;

use chain::bls::PrivateKey;
use chain::types::{Destination, PubKey, TxnRaw, PRIVKEY_LEN};
use chain::ByteBuffer;

struct ClientAccount {
    key: PrivateKey,
    pubkey: PubKey,
    amount: i64,
    nonce: i64,
}

fn pick_account_with_min(accounts: &[ClientAccount], min_amount: i64, rng: &mut impl Rng) -> usize {
    loop {
        let i = rng.gen_range(0..accounts.len());
        if accounts[i].amount >= min_amount {
            return i;
        }
    }
}

/// Writes `num_txns` synthetic transactions to `path`, starting from a
/// genesis account holding `genesis_amount` and signed with
/// `genesis_priv_key`. Returns the total number of accounts that came
/// into existence (including genesis).
pub fn generate_txns_file(
    path: &str,
    num_txns: usize,
    genesis_amount: i64,
    genesis_priv_key: &[u8; PRIVKEY_LEN],
) -> io::Result<usize> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;

    let genesis_key = PrivateKey::from_ikm(genesis_priv_key);
    let genesis_pubkey = genesis_key.public_key();
    let mut accounts = vec![ClientAccount {
        key: genesis_key,
        pubkey: genesis_pubkey,
        amount: genesis_amount,
        nonce: 0,
    }];

    let mut rng = rand::thread_rng();

    for i in 0..num_txns {
        let (src_i, dst_i, amount, txn) = if i % 20 == 0 {
            let amount = 1000;
            let src_i = 0;
            let new_key = PrivateKey::from_ikm(&rng.gen::<[u8; PRIVKEY_LEN]>());
            let new_pubkey = new_key.public_key();
            let txn = TxnRaw::new_long(src_i as i64, accounts[src_i].nonce, amount, 0, new_pubkey);
            accounts.push(ClientAccount { key: new_key, pubkey: new_pubkey, amount: 0, nonce: 0 });
            let dst_i = accounts.len() - 1;
            (src_i, dst_i, amount, txn)
        } else {
            let amount = 1;
            let src_i = pick_account_with_min(&accounts, amount, &mut rng);
            let dst_i = rng.gen_range(0..accounts.len());
            let txn = TxnRaw::new_short(src_i as i64, accounts[src_i].nonce, amount, 0, dst_i as i64);
            (src_i, dst_i, amount, txn)
        };

        accounts[src_i].amount -= amount;
        accounts[dst_i].amount += amount;
        accounts[src_i].nonce += 1;

        let mut buf = ByteBuffer::new();
        chain::encode(&txn, Some(&accounts[src_i].pubkey), &accounts[src_i].key, &mut buf);
        let frame = buf.into_vec();

        file.write_all(&(frame.len() as i64).to_le_bytes())?;
        file.write_all(&frame)?;

        debug_assert!(matches!(txn.dst, Destination::Long(_) | Destination::Short(_)));
    }

    Ok(accounts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::replay::replay_into_pool;
    use chain::Pool;
    use std::sync::Arc;

    #[test]
    fn generated_file_decodes_to_well_signed_admissible_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("txns.bin");
        let path_str = path.to_str().unwrap();

        let genesis_priv = [3u8; PRIVKEY_LEN];
        let num_accounts = generate_txns_file(path_str, 50, 1_000_000, &genesis_priv).unwrap();
        assert!(num_accounts > 1, "the 0th transaction should mint a new account");

        let pool = Arc::new(Pool::new());
        let added = replay_into_pool(path_str, &pool).unwrap();
        assert_eq!(added, 50);

        let mut decoded_count = 0;
        while let Some(frame) = pool.get() {
            let mut buf = ByteBuffer::from_vec(frame);
            let decoded = chain::decode(&mut buf, true, true).unwrap();
            let pubkey = decoded.pubkey.unwrap();
            let sig = decoded.signature.unwrap();
            chain::verify_single(&pubkey, &decoded.message, &sig).unwrap();
            decoded_count += 1;
        }
        assert_eq!(decoded_count, 50);
    }
}
