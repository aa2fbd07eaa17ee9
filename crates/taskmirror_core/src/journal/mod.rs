//! Undo history of task changes.
//!
//! # Responsibility
//! - Append one before/after entry per effective task change.
//! - Serialize and parse the `undo.data` text format.
//! - Replace the whole history from uploaded text.
//!
//! # Invariants
//! - Entries are immutable once written.
//! - Export order is `time` ascending, ties in insertion order.
//! - A failed parse never touches stored history.
//!
//! # See also
//! - `crate::service::task_service` (appends entries)
//! - `crate::sync::reconciler` (replaces the journal)

pub mod format;
pub mod undo_journal;

pub use format::{parse, serialize, JournalParseError};
pub use undo_journal::{JournalError, JournalResult, UndoJournal};
