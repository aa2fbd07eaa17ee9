//! Collection transfer surface.
//!
//! # Responsibility
//! - Serve `read`/`write` by collection file name for callers such as the
//!   CLI.
//!
//! # Invariants
//! - Names are validated before the connection is touched.
//! - Exports never include placeholder rows.
//! - Task collections export ordered by `entry ASC, id ASC`; the journal by
//!   time then insertion.

use super::collection::Collection;
use super::reconciler::{ImportReport, Reconciler};
use super::SyncResult;
use crate::clock::Clock;
use crate::codec::{encode, flatten};
use crate::journal::format;
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::undo_repo::{SqliteUndoRepository, UndoRepository};
use rusqlite::Connection;

/// Read/write access to whole collections over one connection.
pub struct CollectionService<'conn, C: Clock> {
    conn: &'conn mut Connection,
    reconciler: Reconciler<C>,
}

impl<'conn, C: Clock> CollectionService<'conn, C> {
    pub fn new(conn: &'conn mut Connection, clock: C) -> Self {
        Self {
            conn,
            reconciler: Reconciler::new(clock),
        }
    }

    /// Produces the full flat-file text of collection `name`.
    pub fn read(&self, name: &str, principal: &str) -> SyncResult<String> {
        let collection = Collection::from_file_name(name)?;
        self.export(collection, principal)
    }

    /// Replaces collection `name` with `payload`.
    pub fn write(&mut self, name: &str, payload: &str, principal: &str) -> SyncResult<ImportReport> {
        let collection = Collection::from_file_name(name)?;
        self.reconciler
            .reconcile(self.conn, collection, payload, principal)
    }

    pub fn export(&self, collection: Collection, principal: &str) -> SyncResult<String> {
        let conn: &Connection = &*self.conn;
        let Some(scope) = collection.scope(principal) else {
            let entries: Vec<_> = SqliteUndoRepository::try_new(conn)?
                .list()?
                .into_iter()
                .map(|record| record.entry)
                .collect();
            return Ok(format::serialize(&entries));
        };

        let repo = SqliteTaskRepository::try_new(conn)?;
        let mut out = String::new();
        for task in repo.list_tasks(scope)? {
            let uuids = repo.dependency_uuids(&task.dependencies)?;
            out.push_str(&encode(&flatten(&task, &uuids)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionService;
    use crate::clock::FixedClock;
    use crate::db::open_db_in_memory;
    use crate::sync::SyncError;

    const PENDING: &str = concat!(
        "[description:\"first\" entry:\"100\" status:\"pending\" tags:\"home,urgent\" uuid:\"a0000000-0000-4000-8000-000000000001\"]\n",
        "[description:\"second\" entry:\"200\" priority:\"H\" status:\"pending\" uuid:\"a0000000-0000-4000-8000-000000000002\"]\n",
    );

    #[test]
    fn written_collection_reads_back_identically() {
        let mut conn = open_db_in_memory().unwrap();
        let mut service = CollectionService::new(&mut conn, FixedClock::new(1_000));

        service.write("pending.data", PENDING, "alice").unwrap();
        assert_eq!(service.read("pending.data", "alice").unwrap(), PENDING);
        assert_eq!(service.read("pending.data", "bob").unwrap(), "");
    }

    #[test]
    fn unsupported_names_fail_before_io() {
        let mut conn = open_db_in_memory().unwrap();
        let mut service = CollectionService::new(&mut conn, FixedClock::new(1_000));

        assert!(matches!(
            service.read("backlog.data", "alice"),
            Err(SyncError::UnsupportedCollection(_))
        ));
        assert!(matches!(
            service.write("tasks.db", PENDING, "alice"),
            Err(SyncError::UnsupportedCollection(_))
        ));
    }
}
