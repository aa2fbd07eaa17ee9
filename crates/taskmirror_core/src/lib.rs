//! Core of the task mirror.
//! This crate is the single source of truth for record, journal and
//! reconciliation invariants.

pub mod clock;
pub mod codec;
pub mod config;
pub mod db;
pub mod journal;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;
pub mod sync;
pub mod tracking;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{CodecError, FieldMap};
pub use config::{ConfigError, CoreConfig};
pub use journal::{JournalError, JournalParseError, UndoJournal};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{Annotation, Priority, Task, TaskId, TaskStatus, TaskValidationError};
pub use model::undo::UndoEntry;
pub use registry::{LookupKind, Registry, RegistryError};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository};
pub use repo::undo_repo::{SqliteUndoRepository, UndoRepository};
pub use repo::{RepoError, RepoResult};
pub use service::task_service::{SaveOutcome, TaskService, TaskServiceError};
pub use sync::{Collection, CollectionService, ImportReport, ImportWarning, Reconciler, SyncError};
pub use tracking::{Snapshot, SnapshotTable};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
