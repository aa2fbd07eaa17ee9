//! Collection transfer: full dumps and full-replace uploads.
//!
//! # Responsibility
//! - Name the three mirrored collections and reject anything else.
//! - Serialize a collection to its flat-file text.
//! - Reconcile the store against an uploaded collection.
//!
//! # Invariants
//! - An unsupported collection name is rejected before any I/O.
//! - A batch with any malformed record or undo block mutates nothing.
//! - Uploads never append journal entries.
//!
//! # See also
//! - `crate::codec` and `crate::journal::format` for the file formats

use crate::codec::CodecError;
use crate::db::DbError;
use crate::journal::{JournalError, JournalParseError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection;
pub mod collection_service;
pub mod reconciler;

pub use collection::Collection;
pub use collection_service::CollectionService;
pub use reconciler::{ImportReport, ImportWarning, Reconciler};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// Collection name outside `pending.data`, `completed.data`, `undo.data`.
    UnsupportedCollection(String),
    Codec(CodecError),
    /// A well-formed record whose field values cannot be imported.
    InvalidRecord { line: usize, error: CodecError },
    Journal(JournalParseError),
    Repo(RepoError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedCollection(name) => write!(f, "unsupported collection `{name}`"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::InvalidRecord { line, error } => write!(f, "record at line {line}: {error}"),
            Self::Journal(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnsupportedCollection(_) => None,
            Self::Codec(err) => Some(err),
            Self::InvalidRecord { error, .. } => Some(error),
            Self::Journal(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<CodecError> for SyncError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<JournalParseError> for SyncError {
    fn from(value: JournalParseError) -> Self {
        Self::Journal(value)
    }
}

impl From<JournalError> for SyncError {
    fn from(value: JournalError) -> Self {
        match value {
            JournalError::Parse(err) => Self::Journal(err),
            JournalError::Repo(err) => Self::Repo(err),
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for SyncError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
