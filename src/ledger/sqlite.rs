//! SQLite ledger backend.
//!
//! Ledgers are rows of `ledgers` (unique period key); their records live in
//! `ledger_rows`. Every record is hash-chained to the previous record of the
//! same ledger, so an edited or deleted row breaks verification.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use super::{LedgerBackend, LedgerLayout};

/// Chain seed for the first row of every ledger.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Hashes a row payload with the previous chain hash.
pub fn hash_entry(prev_hash: &[u8; 32], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(payload);
    hasher.finalize().into()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqliteLedgerId {
    pub id: i64,
    pub period_key: String,
}

/// Summary of one stored ledger.
#[derive(Clone, Debug)]
pub struct LedgerSummary {
    pub period_key: String,
    pub created_at: i64,
    pub columns: Vec<String>,
    pub rows: i64,
}

pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut ledger = Self { conn };
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS ledgers (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              period_key TEXT NOT NULL UNIQUE,
              created_at INTEGER NOT NULL,
              columns_json TEXT NOT NULL,
              frozen_rows INTEGER NOT NULL,
              image_column INTEGER NOT NULL,
              image_column_width INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ledger_rows (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              ledger_id INTEGER NOT NULL REFERENCES ledgers(id),
              created_at INTEGER NOT NULL,
              row_json TEXT NOT NULL,
              prev_hash BLOB NOT NULL,
              entry_hash BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rows_ledger ON ledger_rows(ledger_id, id);
            "#,
        )?;
        Ok(())
    }
}

fn blob_to_hash(bytes: Vec<u8>, what: &str) -> Result<[u8; 32]> {
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow!("corrupt ledger: {} size {}", what, len))
}

fn last_entry_hash(conn: &Connection, ledger_id: i64) -> Result<[u8; 32]> {
    let last: Option<Vec<u8>> = conn
        .query_row(
            "SELECT entry_hash FROM ledger_rows WHERE ledger_id = ?1 ORDER BY id DESC LIMIT 1",
            params![ledger_id],
            |row| row.get(0),
        )
        .optional()?;
    match last {
        Some(bytes) => blob_to_hash(bytes, "entry_hash"),
        None => Ok(GENESIS_HASH),
    }
}

impl LedgerBackend for SqliteLedger {
    type Ledger = SqliteLedgerId;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn find_ledger(&mut self, period_key: &str) -> Result<Option<SqliteLedgerId>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM ledgers WHERE period_key = ?1",
                params![period_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| SqliteLedgerId {
            id,
            period_key: period_key.to_string(),
        }))
    }

    fn create_ledger(&mut self, period_key: &str, layout: &LedgerLayout) -> Result<SqliteLedgerId> {
        let columns_json = serde_json::to_string(layout.columns)?;
        self.conn.execute(
            r#"
            INSERT INTO ledgers(period_key, created_at, columns_json, frozen_rows, image_column, image_column_width)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                period_key,
                chrono::Utc::now().timestamp(),
                columns_json,
                layout.frozen_rows,
                layout.image_column,
                layout.image_column_width_px
            ],
        )?;
        Ok(SqliteLedgerId {
            id: self.conn.last_insert_rowid(),
            period_key: period_key.to_string(),
        })
    }

    fn append_row(&mut self, ledger: &SqliteLedgerId, row: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        let prev_hash = last_entry_hash(&tx, ledger.id)?;
        let row_json = serde_json::to_string(row)?;
        let entry_hash = hash_entry(&prev_hash, row_json.as_bytes());
        tx.execute(
            r#"
            INSERT INTO ledger_rows(ledger_id, created_at, row_json, prev_hash, entry_hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                ledger.id,
                chrono::Utc::now().timestamp(),
                row_json,
                prev_hash.to_vec(),
                entry_hash.to_vec()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// All ledgers, oldest first, with their row counts.
pub fn list_ledgers(conn: &Connection) -> Result<Vec<LedgerSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT l.period_key, l.created_at, l.columns_json,
               (SELECT COUNT(*) FROM ledger_rows r WHERE r.ledger_id = l.id)
        FROM ledgers l ORDER BY l.id
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (period_key, created_at, columns_json, count) = row?;
        out.push(LedgerSummary {
            period_key,
            created_at,
            columns: serde_json::from_str(&columns_json)?,
            rows: count,
        });
    }
    Ok(out)
}

/// Rows of one ledger in append order.
pub fn read_rows(conn: &Connection, period_key: &str) -> Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT r.row_json FROM ledger_rows r
        JOIN ledgers l ON l.id = r.ledger_id
        WHERE l.period_key = ?1 ORDER BY r.id
        "#,
    )?;
    let rows = stmt.query_map(params![period_key], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(serde_json::from_str(&row?)?);
    }
    Ok(out)
}

/// Recompute the hash chain of one ledger, calling `on_row` for each
/// verified row. Returns the number of rows verified.
pub fn verify_ledger_with(
    conn: &Connection,
    period_key: &str,
    mut on_row: impl FnMut(i64, [u8; 32]),
) -> Result<u64> {
    let mut stmt = conn.prepare(
        r#"
        SELECT r.id, r.row_json, r.prev_hash, r.entry_hash FROM ledger_rows r
        JOIN ledgers l ON l.id = r.ledger_id
        WHERE l.period_key = ?1 ORDER BY r.id
        "#,
    )?;
    let mut rows = stmt.query(params![period_key])?;
    let mut expected_prev = GENESIS_HASH;
    let mut count = 0u64;
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let row_json: String = row.get(1)?;
        let prev_hash = blob_to_hash(row.get(2)?, "prev_hash")?;
        let entry_hash = blob_to_hash(row.get(3)?, "entry_hash")?;
        if prev_hash != expected_prev {
            return Err(anyhow!(
                "ledger '{}' row {}: chain broken (prev_hash mismatch)",
                period_key,
                id
            ));
        }
        if hash_entry(&prev_hash, row_json.as_bytes()) != entry_hash {
            return Err(anyhow!(
                "ledger '{}' row {}: entry_hash mismatch",
                period_key,
                id
            ));
        }
        on_row(id, entry_hash);
        expected_prev = entry_hash;
        count += 1;
    }
    Ok(count)
}

pub fn verify_ledger(conn: &Connection, period_key: &str) -> Result<u64> {
    verify_ledger_with(conn, period_key, |_, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MONTHLY_LAYOUT;

    fn row(plate: &str) -> Vec<String> {
        vec!["2025-03-14".to_string(), plate.to_string()]
    }

    #[test]
    fn create_is_unique_per_period() -> Result<()> {
        let mut ledger = SqliteLedger::open(":memory:")?;
        assert!(ledger.find_ledger("March 2025")?.is_none());
        let created = ledger.create_ledger("March 2025", &MONTHLY_LAYOUT)?;
        assert_eq!(ledger.find_ledger("March 2025")?, Some(created));
        assert!(ledger.create_ledger("March 2025", &MONTHLY_LAYOUT).is_err());
        Ok(())
    }

    #[test]
    fn rows_chain_and_verify() -> Result<()> {
        let mut ledger = SqliteLedger::open(":memory:")?;
        let march = ledger.create_ledger("March 2025", &MONTHLY_LAYOUT)?;
        let april = ledger.create_ledger("April 2025", &MONTHLY_LAYOUT)?;
        ledger.append_row(&march, &row("A1"))?;
        ledger.append_row(&april, &row("B1"))?;
        ledger.append_row(&march, &row("A2"))?;

        let conn = ledger.connection();
        assert_eq!(read_rows(conn, "March 2025")?, vec![row("A1"), row("A2")]);
        assert_eq!(verify_ledger(conn, "March 2025")?, 2);
        assert_eq!(verify_ledger(conn, "April 2025")?, 1);

        let summaries = list_ledgers(conn)?;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].period_key, "March 2025");
        assert_eq!(summaries[0].rows, 2);
        assert_eq!(summaries[0].columns.len(), 10);
        assert_eq!(summaries[0].columns[9], "Snapshot");
        Ok(())
    }

    #[test]
    fn edited_row_fails_verification() -> Result<()> {
        let mut ledger = SqliteLedger::open(":memory:")?;
        let march = ledger.create_ledger("March 2025", &MONTHLY_LAYOUT)?;
        ledger.append_row(&march, &row("A1"))?;
        ledger.append_row(&march, &row("A2"))?;
        ledger.connection().execute(
            "UPDATE ledger_rows SET row_json = ?1 WHERE id = 1",
            params![serde_json::to_string(&row("FORGED"))?],
        )?;
        let err = verify_ledger(ledger.connection(), "March 2025").unwrap_err();
        assert!(err.to_string().contains("entry_hash mismatch"));
        Ok(())
    }

    #[test]
    fn deleted_row_fails_verification() -> Result<()> {
        let mut ledger = SqliteLedger::open(":memory:")?;
        let march = ledger.create_ledger("March 2025", &MONTHLY_LAYOUT)?;
        for plate in ["A1", "A2", "A3"] {
            ledger.append_row(&march, &row(plate))?;
        }
        ledger
            .connection()
            .execute("DELETE FROM ledger_rows WHERE id = 2", [])?;
        let err = verify_ledger(ledger.connection(), "March 2025").unwrap_err();
        assert!(err.to_string().contains("chain broken"));
        Ok(())
    }
}
