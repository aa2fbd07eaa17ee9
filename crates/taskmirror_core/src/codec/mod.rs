//! Flat-file record codec.
//!
//! # Responsibility
//! - Convert one record between its field map and the tool's bracketed
//!   `[key:"value" ...]` line format (`record`).
//! - Project a task (with its relations) into the canonical field map and
//!   back (`fields`).
//!
//! # Invariants
//! - Encoded fields are sorted by name and empty values are omitted, so the
//!   same field map always encodes to the same bytes.
//! - Decoding accepts unknown keys; only grammar violations are errors.
//!
//! # See also
//! - `crate::tracking` (compares flattened field maps)
//! - `crate::journal::format` (embeds encoded lines)

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fields;
pub mod record;

pub use fields::{flatten, from_fields, ImportedTask};
pub use record::{decode, decode_collection, encode, escape, unescape, DecodedRecord, FieldMap};

pub type CodecResult<T> = Result<T, CodecError>;

/// Structural codec failure for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Line does not match the bracketed `key:"value"` grammar.
    MalformedRecord {
        /// 1-based line number within the decoded text.
        line: usize,
        /// 0-based byte offset within the line.
        offset: usize,
        reason: &'static str,
    },
    /// A known field holds a value this system cannot interpret.
    InvalidField {
        field: String,
        value: String,
        reason: &'static str,
    },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRecord {
                line,
                offset,
                reason,
            } => write!(f, "malformed record at line {line}, offset {offset}: {reason}"),
            Self::InvalidField {
                field,
                value,
                reason,
            } => write!(f, "invalid value `{value}` for field `{field}`: {reason}"),
        }
    }
}

impl Error for CodecError {}
