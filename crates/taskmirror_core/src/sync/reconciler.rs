//! Full-collection replace from uploaded text.
//!
//! # Responsibility
//! - Decode and validate a whole upload before touching the store.
//! - Replace the collection's rows in one write transaction.
//! - Resolve `depends` tokens to ids, creating placeholders for forward
//!   references to records later in the batch or to well-formed uuids.
//!
//! # Invariants
//! - Records are upserted by uuid in file order; an existing row (including
//!   a placeholder) is overwritten, never duplicated.
//! - The stored graph does not depend on record order within the batch.
//! - Rows still referenced from outside the collection are demoted to
//!   placeholders instead of deleted.
//! - No journal entries are appended; the undo collection replaces the
//!   journal content verbatim.

use super::collection::Collection;
use super::SyncResult;
use crate::clock::Clock;
use crate::codec::{decode_collection, from_fields, ImportedTask};
use crate::db::begin_write;
use crate::journal::UndoJournal;
use crate::model::task::TaskId;
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::undo_repo::SqliteUndoRepository;
use crate::sync::SyncError;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

/// Non-fatal problem found while importing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    /// A `depends` token that names no stored task, no record of the batch,
    /// and is not a well-formed uuid; the edge is skipped.
    DanglingDependency { record_uuid: String, token: String },
}

/// Summary of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub collection: Collection,
    /// Records (or undo entries) written.
    pub records: usize,
    /// Placeholder rows created for unresolved forward references.
    pub placeholders_created: usize,
    /// Rows (or undo entries) removed before re-import.
    pub removed: usize,
    /// Rows kept as placeholders because other collections reference them.
    pub demoted: usize,
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            records: 0,
            placeholders_created: 0,
            removed: 0,
            demoted: 0,
            warnings: Vec::new(),
        }
    }
}

/// Bulk importer for one collection at a time.
pub struct Reconciler<C: Clock> {
    clock: C,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Makes the store's `collection` match `text`, acting as `principal`.
    ///
    /// # Errors
    /// - `Codec`/`InvalidRecord` when any record fails to decode; nothing is
    ///   written.
    /// - `Journal` when undo text is malformed; the prior journal is kept.
    /// - `Repo` on storage failure; the transaction is rolled back.
    pub fn reconcile(
        &self,
        conn: &mut Connection,
        collection: Collection,
        text: &str,
        principal: &str,
    ) -> SyncResult<ImportReport> {
        let started_at = Instant::now();
        info!(
            "event=import module=sync status=start collection={} bytes={}",
            collection,
            text.len()
        );

        let result = match collection.scope(principal) {
            Some(_) => self.reconcile_tasks(conn, collection, text, principal),
            None => self.reconcile_journal(conn, text, principal),
        };

        match &result {
            Ok(report) => info!(
                "event=import module=sync status=ok collection={} duration_ms={} records={} placeholders={} removed={} demoted={} warnings={}",
                collection,
                started_at.elapsed().as_millis(),
                report.records,
                report.placeholders_created,
                report.removed,
                report.demoted,
                report.warnings.len()
            ),
            Err(err) => warn!(
                "event=import module=sync status=error collection={} duration_ms={} error={}",
                collection,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn reconcile_journal(
        &self,
        conn: &mut Connection,
        text: &str,
        principal: &str,
    ) -> SyncResult<ImportReport> {
        let tx = begin_write(conn)?;
        let (removed, records) = {
            let journal = UndoJournal::new(SqliteUndoRepository::try_new(&tx)?, &self.clock);
            let removed = journal.len()?;
            (removed, journal.replace_all(text, principal)?)
        };
        tx.commit()?;

        let mut report = ImportReport::new(Collection::Undo);
        report.records = records;
        report.removed = removed;
        Ok(report)
    }

    fn reconcile_tasks(
        &self,
        conn: &mut Connection,
        collection: Collection,
        text: &str,
        principal: &str,
    ) -> SyncResult<ImportReport> {
        let now = self.clock.now();
        let mut imported = Vec::new();
        for record in decode_collection(text)? {
            let task = from_fields(&record.fields, now).map_err(|error| {
                SyncError::InvalidRecord {
                    line: record.line,
                    error,
                }
            })?;
            imported.push(task);
        }

        let batch: HashSet<String> = imported
            .iter()
            .filter_map(|record| record.task.uuid.clone())
            .collect();

        let mut report = ImportReport::new(collection);
        let tx = begin_write(conn)?;
        {
            let repo = SqliteTaskRepository::try_new(&tx)?;
            if let Some(scope) = collection.scope(principal) {
                let removal = repo.remove_scope(scope)?;
                report.removed = removal.deleted;
                report.demoted = removal.demoted;
            }

            for record in imported {
                upsert(&repo, record, &batch, principal, &mut report)?;
            }
        }
        tx.commit()?;

        Ok(report)
    }
}

fn upsert(
    repo: &SqliteTaskRepository<'_>,
    record: ImportedTask,
    batch: &HashSet<String>,
    principal: &str,
    report: &mut ImportReport,
) -> SyncResult<()> {
    let ImportedTask { mut task, depends } = record;
    let uuid = task.uuid.clone().unwrap_or_default();

    let mut dependencies: BTreeSet<TaskId> = BTreeSet::new();
    for token in depends {
        if token == uuid {
            dangling(report, &uuid, token);
            continue;
        }
        if let Some(id) = repo.find_id_by_uuid(&token)? {
            dependencies.insert(id);
        } else if batch.contains(&token) || uuid::Uuid::parse_str(&token).is_ok() {
            let (id, created) = repo.get_or_create_placeholder(&token, principal)?;
            if created {
                report.placeholders_created += 1;
            }
            dependencies.insert(id);
        } else {
            dangling(report, &uuid, token);
        }
    }
    task.dependencies = dependencies;

    match repo.find_id_by_uuid(&uuid)? {
        Some(id) => {
            task.id = Some(id);
            repo.update_task(&task)?;
            repo.set_owner(id, principal)?;
        }
        None => {
            repo.insert_task(&task, principal)?;
        }
    }
    report.records += 1;
    Ok(())
}

fn dangling(report: &mut ImportReport, record_uuid: &str, token: String) {
    warn!("event=import_dependency module=sync status=skipped reason=dangling_dependency");
    report.warnings.push(ImportWarning::DanglingDependency {
        record_uuid: record_uuid.to_string(),
        token,
    });
}

#[cfg(test)]
mod tests {
    use super::{ImportWarning, Reconciler};
    use crate::clock::FixedClock;
    use crate::db::open_db_in_memory;
    use crate::sync::{Collection, SyncError};

    const A: &str = "a0000000-0000-4000-8000-000000000001";
    const B: &str = "b0000000-0000-4000-8000-000000000002";

    #[test]
    fn forward_dependency_creates_then_fills_placeholder() {
        let mut conn = open_db_in_memory().unwrap();
        let reconciler = Reconciler::new(FixedClock::new(2_000));
        let text = format!(
            "[depends:\"{A}\" description:\"b\" entry:\"10\" status:\"pending\" uuid:\"{B}\"]\n\
             [description:\"a\" entry:\"11\" status:\"pending\" uuid:\"{A}\"]\n"
        );

        let report = reconciler
            .reconcile(&mut conn, Collection::Pending, &text, "alice")
            .unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.placeholders_created, 1);
        assert!(report.warnings.is_empty());

        let placeholders: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks WHERE is_placeholder = 1;", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(placeholders, 0);
    }

    #[test]
    fn malformed_token_is_a_warning_not_an_error() {
        let mut conn = open_db_in_memory().unwrap();
        let reconciler = Reconciler::new(FixedClock::new(2_000));
        let text = format!("[depends:\"not-a-uuid\" description:\"a\" entry:\"1\" uuid:\"{A}\"]\n");

        let report = reconciler
            .reconcile(&mut conn, Collection::Pending, &text, "alice")
            .unwrap();
        assert_eq!(
            report.warnings,
            vec![ImportWarning::DanglingDependency {
                record_uuid: A.to_string(),
                token: "not-a-uuid".to_string(),
            }]
        );
        assert_eq!(report.records, 1);
    }

    #[test]
    fn invalid_field_reports_line_and_writes_nothing() {
        let mut conn = open_db_in_memory().unwrap();
        let reconciler = Reconciler::new(FixedClock::new(2_000));
        let text = format!(
            "[description:\"a\" entry:\"1\" uuid:\"{A}\"]\n\n[entry:\"soon\" uuid:\"{B}\"]\n"
        );

        let err = reconciler
            .reconcile(&mut conn, Collection::Pending, &text, "alice")
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord { line: 3, .. }));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
