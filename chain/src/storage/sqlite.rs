//! Embedded relational Journal Store backend, grounded in the original
//! implementation's use of sqlite3: one `accounts` table holding only the
//! public key in insertion order, and one `txns` table holding the journal
//! rows, indexed by `account_id`.

use rusqlite::Connection;

use crate::error::PersistenceError;
use crate::storage::Journal;
use crate::types::{PubKey, PUBKEY_LEN};

fn sqlite_err(e: rusqlite::Error) -> PersistenceError {
    PersistenceError::Sqlite(e.to_string())
}

/// Configuration for opening a [`SqliteJournal`].
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig { path: "data/ledger.sqlite".to_string() }
    }
}

/// Sqlite-backed Journal Store.
pub struct SqliteJournal {
    conn: Connection,
    in_batch: bool,
}

impl SqliteJournal {
    pub fn open(cfg: &SqliteConfig) -> Result<Self, PersistenceError> {
        let conn = Connection::open(&cfg.path).map_err(sqlite_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS Accounts (pub_key BLOB NOT NULL);
             CREATE TABLE IF NOT EXISTS Txns (
                 account_id INTEGER NOT NULL,
                 amount INTEGER NOT NULL,
                 nonce INTEGER NOT NULL,
                 prev_rowid INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_txns_account_id ON Txns(account_id);",
        )
        .map_err(sqlite_err)?;
        Ok(SqliteJournal { conn, in_batch: false })
    }

    /// Opens an in-memory sqlite database, useful for tests that still want
    /// to exercise the real SQL (as opposed to [`super::mem::InMemoryJournal`]).
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        conn.execute_batch(
            "CREATE TABLE Accounts (pub_key BLOB NOT NULL);
             CREATE TABLE Txns (
                 account_id INTEGER NOT NULL,
                 amount INTEGER NOT NULL,
                 nonce INTEGER NOT NULL,
                 prev_rowid INTEGER NOT NULL
             );
             CREATE INDEX idx_txns_account_id ON Txns(account_id);",
        )
        .map_err(sqlite_err)?;
        Ok(SqliteJournal { conn, in_batch: false })
    }
}

impl Journal for SqliteJournal {
    fn begin(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch("BEGIN").map_err(sqlite_err)?;
        self.in_batch = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch("COMMIT").map_err(sqlite_err)?;
        self.in_batch = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch("ROLLBACK").map_err(sqlite_err)?;
        self.in_batch = false;
        Ok(())
    }

    fn insert_account(&mut self, pubkey: &PubKey) -> Result<(), PersistenceError> {
        self.conn
            .execute("INSERT INTO Accounts(pub_key) VALUES (?1)", [pubkey.as_slice()])
            .map_err(sqlite_err)?;
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
        self.conn
            .execute(
                "INSERT INTO Txns(account_id, amount, nonce, prev_rowid) VALUES (?1, ?2, ?3, ?4)",
                (account_id, amount, nonce, prev_rowid),
            )
            .map_err(sqlite_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_accounts(&self) -> Result<Vec<PubKey>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT pub_key FROM Accounts ORDER BY rowid")
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for row in rows {
            let bytes = row.map_err(sqlite_err)?;
            if bytes.len() != PUBKEY_LEN {
                return Err(PersistenceError::Sqlite(format!(
                    "accounts row has {} bytes, expected {}",
                    bytes.len(),
                    PUBKEY_LEN
                )));
            }
            let mut arr = [0u8; PUBKEY_LEN];
            arr.copy_from_slice(&bytes);
            out.push(arr);
        }
        Ok(out)
    }

    fn load_latest_rows(&self) -> Result<Vec<(i64, i64, i64, i64)>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT account_id, amount, nonce, MAX(rowid) FROM Txns \
                 GROUP BY account_id ORDER BY account_id",
            )
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sqlite_err)?);
        }
        Ok(out)
    }

    fn latest_row_for_account(&self, account_id: i64) -> Result<Option<(i64, i64, i64)>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT amount, nonce, rowid FROM Txns WHERE account_id = ?1 \
                 ORDER BY rowid DESC LIMIT 1",
            )
            .map_err(sqlite_err)?;
        let mut rows = stmt.query([account_id]).map_err(sqlite_err)?;
        if let Some(row) = rows.next().map_err(sqlite_err)? {
            Ok(Some((row.get(0).map_err(sqlite_err)?, row.get(1).map_err(sqlite_err)?, row.get(2).map_err(sqlite_err)?)))
        } else {
            Ok(None)
        }
    }
}
