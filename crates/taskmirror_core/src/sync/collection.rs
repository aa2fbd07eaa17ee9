//! Mirrored collection names.

use super::{SyncError, SyncResult};
use crate::repo::task_repo::TaskScope;
use std::fmt::{Display, Formatter};

/// One of the three files the external tool keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Pending,
    Completed,
    Undo,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Pending, Self::Completed, Self::Undo];

    /// Parses a collection file name such as `pending.data`.
    pub fn from_file_name(name: &str) -> SyncResult<Self> {
        match name {
            "pending.data" => Ok(Self::Pending),
            "completed.data" => Ok(Self::Completed),
            "undo.data" => Ok(Self::Undo),
            other => Err(SyncError::UnsupportedCollection(other.to_string())),
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Pending => "pending.data",
            Self::Completed => "completed.data",
            Self::Undo => "undo.data",
        }
    }

    /// Task rows belonging to this collection; `None` for the journal.
    pub fn scope(self, principal: &str) -> Option<TaskScope<'_>> {
        match self {
            Self::Pending => Some(TaskScope::Pending { owner: principal }),
            Self::Completed => Some(TaskScope::Closed),
            Self::Undo => None,
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}
