//! Append-only undo journal service.

use super::format::{self, JournalParseError};
use crate::clock::Clock;
use crate::model::undo::{JournalRecord, UndoEntry};
use crate::repo::undo_repo::UndoRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type JournalResult<T> = Result<T, JournalError>;

#[derive(Debug)]
pub enum JournalError {
    Parse(JournalParseError),
    Repo(RepoError),
}

impl Display for JournalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for JournalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<JournalParseError> for JournalError {
    fn from(value: JournalParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<RepoError> for JournalError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Undo journal over a repository and a time source.
///
/// `record` does not re-check dirtiness: callers decide whether a change is
/// worth journaling.
pub struct UndoJournal<R: UndoRepository, C: Clock> {
    repo: R,
    clock: C,
}

impl<R: UndoRepository, C: Clock> UndoJournal<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Time source shared with callers that stamp the records they journal.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Appends `{time: now, old, new}` attributed to `actor`.
    ///
    /// `old` is `None` for a record's first entry. Both lines are expected to
    /// be complete encoded records including their trailing newline.
    pub fn record(&self, actor: &str, old: Option<&str>, new: &str) -> JournalResult<UndoEntry> {
        let entry = UndoEntry {
            time: self.clock.now(),
            old: old.map(str::to_string),
            new: new.to_string(),
        };
        self.repo.append(actor, &entry)?;
        Ok(entry)
    }

    /// Lists stored rows in export order.
    pub fn entries(&self) -> JournalResult<Vec<JournalRecord>> {
        Ok(self.repo.list()?)
    }

    pub fn len(&self) -> JournalResult<usize> {
        Ok(self.repo.count()?)
    }

    pub fn is_empty(&self) -> JournalResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Renders the whole journal as `undo.data` text.
    pub fn serialize(&self) -> JournalResult<String> {
        let entries: Vec<UndoEntry> = self
            .repo
            .list()?
            .into_iter()
            .map(|record| record.entry)
            .collect();
        Ok(format::serialize(&entries))
    }

    /// Replaces the journal with the entries parsed from `text`.
    ///
    /// Parsing completes before any row is touched, so a parse error leaves
    /// the prior journal in place.
    pub fn replace_all(&self, text: &str, actor: &str) -> JournalResult<usize> {
        let entries = format::parse(text)?;
        let count = self.repo.replace_all(actor, &entries)?;
        info!("event=journal_replace module=journal status=ok entries={count}");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::{JournalError, UndoJournal};
    use crate::clock::FixedClock;
    use crate::db::open_db_in_memory;
    use crate::repo::undo_repo::SqliteUndoRepository;

    #[test]
    fn record_stamps_entries_with_clock_time() {
        let conn = open_db_in_memory().unwrap();
        let clock = FixedClock::new(1_700_000_000);
        let journal = UndoJournal::new(SqliteUndoRepository::try_new(&conn).unwrap(), &clock);

        let first = journal.record("alice", None, "[uuid:\"a\"]\n").unwrap();
        clock.advance(5);
        let second = journal
            .record("alice", Some("[uuid:\"a\"]\n"), "[status:\"completed\" uuid:\"a\"]\n")
            .unwrap();

        assert_eq!(first.time, 1_700_000_000);
        assert_eq!(second.time, 1_700_000_005);
        assert_eq!(journal.len().unwrap(), 2);
        assert_eq!(
            journal.serialize().unwrap(),
            "time 1700000000\nnew [uuid:\"a\"]\n---\n\
             time 1700000005\nold [uuid:\"a\"]\nnew [status:\"completed\" uuid:\"a\"]\n---\n"
        );
    }

    #[test]
    fn replace_all_with_bad_text_keeps_prior_history() {
        let conn = open_db_in_memory().unwrap();
        let journal = UndoJournal::new(
            SqliteUndoRepository::try_new(&conn).unwrap(),
            FixedClock::new(10),
        );
        journal.record("alice", None, "[uuid:\"a\"]\n").unwrap();
        let before = journal.serialize().unwrap();

        let err = journal
            .replace_all("time 1\nnew [uuid:\"b\"]\n---\nbogus\n---\n", "alice")
            .unwrap_err();
        assert!(matches!(err, JournalError::Parse(_)));
        assert_eq!(journal.serialize().unwrap(), before);
    }

    #[test]
    fn replace_all_reproduces_uploaded_text() {
        let conn = open_db_in_memory().unwrap();
        let journal = UndoJournal::new(
            SqliteUndoRepository::try_new(&conn).unwrap(),
            FixedClock::new(10),
        );
        let text = "time 3\nnew [uuid:\"a\"]\n---\ntime 4\nold [uuid:\"a\"]\nnew [status:\"deleted\" uuid:\"a\"]\n---\n";

        assert_eq!(journal.replace_all(text, "bob").unwrap(), 2);
        assert_eq!(journal.serialize().unwrap(), text);
    }
}
