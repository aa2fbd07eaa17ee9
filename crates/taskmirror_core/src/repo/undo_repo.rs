//! Undo journal persistence.
//!
//! # Responsibility
//! - Append and list rows of `undo_entries`.
//! - Swap the whole journal content for bulk uploads.
//!
//! # Invariants
//! - Rows are append-only; `seq` orders equal timestamps by insertion.
//! - `replace_all` is atomic: either every new row lands or the prior rows
//!   stay untouched.

use super::{ensure_schema_ready, in_transaction, RepoResult};
use crate::model::undo::{JournalRecord, UndoEntry};
use rusqlite::{params, Connection};

/// Repository interface for undo journal rows.
pub trait UndoRepository {
    /// Appends one entry and returns its sequence number.
    fn append(&self, actor: &str, entry: &UndoEntry) -> RepoResult<i64>;
    /// Lists all rows ordered by `time ASC, seq ASC`.
    fn list(&self) -> RepoResult<Vec<JournalRecord>>;
    fn count(&self) -> RepoResult<usize>;
    /// Replaces every row with `entries`, all attributed to `actor`.
    fn replace_all(&self, actor: &str, entries: &[UndoEntry]) -> RepoResult<usize>;
}

/// SQLite-backed undo repository.
pub struct SqliteUndoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUndoRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["undo_entries"])?;
        Ok(Self { conn })
    }

    fn insert(&self, actor: &str, entry: &UndoEntry) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO undo_entries (time, old_record, new_record, actor)
             VALUES (?1, ?2, ?3, ?4);",
            params![entry.time, entry.old.as_deref(), entry.new.as_str(), actor],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl UndoRepository for SqliteUndoRepository<'_> {
    fn append(&self, actor: &str, entry: &UndoEntry) -> RepoResult<i64> {
        self.insert(actor, entry)
    }

    fn list(&self) -> RepoResult<Vec<JournalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, time, old_record, new_record, actor
             FROM undo_entries
             ORDER BY time ASC, seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(JournalRecord {
                seq: row.get(0)?,
                entry: UndoEntry {
                    time: row.get(1)?,
                    old: row.get(2)?,
                    new: row.get(3)?,
                },
                actor: row.get(4)?,
            });
        }
        Ok(records)
    }

    fn count(&self) -> RepoResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM undo_entries;", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn replace_all(&self, actor: &str, entries: &[UndoEntry]) -> RepoResult<usize> {
        in_transaction(self.conn, || {
            self.conn.execute("DELETE FROM undo_entries;", [])?;
            for entry in entries {
                self.insert(actor, entry)?;
            }
            Ok(entries.len())
        })
    }
}
