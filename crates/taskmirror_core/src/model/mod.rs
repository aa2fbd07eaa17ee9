//! Domain model for mirrored tasks and their change history.
//!
//! # Responsibility
//! - Define canonical data structures used by codec, tracking and sync logic.
//!
//! # Invariants
//! - Every persisted task carries a stable external `uuid` and an internal
//!   `TaskId`; relations between tasks use `TaskId` only.
//! - Deletion is a status transition, not a hard delete.
//!
//! # See also
//! - `crate::codec::fields`

pub mod task;
pub mod undo;
