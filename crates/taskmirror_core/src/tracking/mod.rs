//! Change detection for mirrored tasks.
//!
//! # Responsibility
//! - Hold the last persisted flattened state of each loaded task in a side
//!   table owned by the service, never inside the task itself.
//! - Answer whether a task's externally visible content changed since it was
//!   loaded or last saved, and which fields changed.
//!
//! # Invariants
//! - Comparison is by flattened field map only, not by object graph.
//! - A task without a baseline (never saved) is always dirty.
//! - Callers refresh the baseline after every successful save, journaled or
//!   not.

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotTable};
