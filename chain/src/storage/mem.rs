//! In-memory [`Journal`] double, used by unit tests that want to exercise
//! account-index/rollback behavior without touching the filesystem.

use crate::error::PersistenceError;
use crate::storage::Journal;
use crate::types::PubKey;

#[derive(Clone, Debug)]
struct Row {
    account_id: i64,
    amount: i64,
    nonce: i64,
    prev_rowid: i64,
    rowid: i64,
}

#[derive(Default)]
pub struct InMemoryJournal {
    accounts: Vec<PubKey>,
    rows: Vec<Row>,
    next_rowid: i64,
    in_batch: bool,
    batch_rows_start: usize,
    batch_accounts_start: usize,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        InMemoryJournal { next_rowid: 1, ..Default::default() }
    }
}

impl Journal for InMemoryJournal {
    fn begin(&mut self) -> Result<(), PersistenceError> {
        self.in_batch = true;
        self.batch_rows_start = self.rows.len();
        self.batch_accounts_start = self.accounts.len();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistenceError> {
        self.in_batch = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.rows.truncate(self.batch_rows_start);
        self.accounts.truncate(self.batch_accounts_start);
        self.in_batch = false;
        Ok(())
    }

    fn insert_account(&mut self, pubkey: &PubKey) -> Result<(), PersistenceError> {
        self.accounts.push(*pubkey);
        Ok(())
    }

    fn append_row(
        &mut self,
        account_id: i64,
        amount: i64,
        nonce: i64,
        prev_rowid: i64,
    ) -> Result<i64, PersistenceError> {
        if !self.in_batch {
            return Err(PersistenceError::NoActiveBatch);
        }
        let rowid = self.next_rowid;
        self.next_rowid += 1;
        self.rows.push(Row { account_id, amount, nonce, prev_rowid, rowid });
        Ok(rowid)
    }

    fn load_accounts(&self) -> Result<Vec<PubKey>, PersistenceError> {
        Ok(self.accounts.clone())
    }

    fn load_latest_rows(&self) -> Result<Vec<(i64, i64, i64, i64)>, PersistenceError> {
        let mut by_account: std::collections::BTreeMap<i64, &Row> = std::collections::BTreeMap::new();
        for row in &self.rows {
            by_account
                .entry(row.account_id)
                .and_modify(|existing| {
                    if row.rowid > existing.rowid {
                        *existing = row;
                    }
                })
                .or_insert(row);
        }
        Ok(by_account
            .into_iter()
            .map(|(account_id, row)| (account_id, row.amount, row.nonce, row.rowid))
            .collect())
    }

    fn latest_row_for_account(&self, account_id: i64) -> Result<Option<(i64, i64, i64)>, PersistenceError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.account_id == account_id)
            .max_by_key(|r| r.rowid)
            .map(|r| (r.amount, r.nonce, r.rowid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PUBKEY_LEN;

    #[test]
    fn rollback_truncates_rows_and_accounts_added_since_begin() {
        let mut j = InMemoryJournal::new();
        j.insert_account(&[1u8; PUBKEY_LEN]).unwrap();
        j.begin().unwrap();
        j.insert_account(&[2u8; PUBKEY_LEN]).unwrap();
        j.append_row(0, 50, 1, 0).unwrap();
        j.rollback().unwrap();

        assert_eq!(j.load_accounts().unwrap().len(), 1);
        assert!(j.latest_row_for_account(0).unwrap().is_none());
    }
}
