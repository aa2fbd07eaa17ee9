//! Undo journal entry model.

/// One before/after transition in the journal's external format.
///
/// `old` and `new` are complete encoded record lines, each terminated by its
/// own newline. `old` is absent for a record's first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    /// Unix seconds.
    pub time: i64,
    pub old: Option<String>,
    pub new: String,
}

/// A persisted journal row: the external entry plus storage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Insertion sequence; breaks ties between equal `time` values.
    pub seq: i64,
    pub actor: String,
    pub entry: UndoEntry,
}
