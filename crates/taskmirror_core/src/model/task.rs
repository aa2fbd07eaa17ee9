//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical in-memory task record mirrored from the task tool.
//! - Provide pure lifecycle helpers (`done`, `delete`, `reopen`) and relation
//!   mutators that keep model invariants intact.
//!
//! # Invariants
//! - `uuid` is immutable once assigned.
//! - `end` is present iff `status` is `completed` or `deleted`.
//! - `tags` keep insertion order and never contain duplicates.
//! - `annotations` are ordered by time and never share a timestamp.
//! - `dependencies` hold internal ids only; uuids are resolved at the codec
//!   boundary.
//!
//! # See also
//! - `crate::codec::fields` for the external field names

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Internal, monotonically assigned task identity (SQLite rowid).
pub type TaskId = i64;

/// Task lifecycle state as understood by the external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
}

impl TaskStatus {
    /// External token for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        }
    }

    /// Parses an external status token.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Returns whether this status requires an `end` timestamp.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Deleted)
    }
}

/// Task priority with its ordinal sort weight.
///
/// Weight `0` is the "no priority" sentinel and is never encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn weight(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn from_weight(weight: i64) -> Option<Self> {
        match weight {
            0 => Some(Self::None),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    /// Single-letter external code; `None` for the sentinel.
    pub fn code(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Low => Some("L"),
            Self::Medium => Some("M"),
            Self::High => Some("H"),
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "" => Some(Self::None),
            "L" => Some(Self::Low),
            "M" => Some(Self::Medium),
            "H" => Some(Self::High),
            _ => None,
        }
    }
}

/// Timestamped free-form note attached to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Unix seconds; doubles as the annotation's external key suffix.
    pub time: i64,
    pub text: String,
}

/// Validation errors for task invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    MissingUuid,
    InvalidUuid(String),
    MissingEntry,
    EndWithoutClosedStatus,
    ClosedStatusWithoutEnd(TaskStatus),
    InvalidTag(String),
    /// Blank project names cannot be interned; use `None` for "no project".
    InvalidProject(String),
    DuplicateAnnotationTime(i64),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUuid => write!(f, "task uuid is not assigned"),
            Self::InvalidUuid(value) => write!(f, "task uuid `{value}` is not a valid token"),
            Self::MissingEntry => write!(f, "task entry timestamp is not assigned"),
            Self::EndWithoutClosedStatus => {
                write!(f, "task end is set but status is pending")
            }
            Self::ClosedStatusWithoutEnd(status) => {
                write!(f, "task status `{}` requires an end timestamp", status.as_str())
            }
            Self::InvalidTag(value) => write!(f, "invalid tag token `{value}`"),
            Self::InvalidProject(value) => write!(f, "invalid project name `{value}`"),
            Self::DuplicateAnnotationTime(time) => {
                write!(f, "two annotations share timestamp {time}")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
///
/// Owner and placeholder state are storage concerns and live in the
/// repository, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// `None` until the task is first persisted.
    pub id: Option<TaskId>,
    /// Assigned on first save when absent.
    pub uuid: Option<String>,
    pub description: String,
    /// Creation time in Unix seconds. Assigned on first save when absent.
    pub entry: Option<i64>,
    pub due: Option<i64>,
    pub end: Option<i64>,
    pub status: TaskStatus,
    pub project: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub dependencies: BTreeSet<TaskId>,
    pub annotations: Vec<Annotation>,
    /// Fields this system does not model, preserved for re-export.
    pub extra: BTreeMap<String, String>,
}

impl Task {
    /// Creates an unsaved pending task.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: None,
            uuid: None,
            description: description.into(),
            entry: None,
            due: None,
            end: None,
            status: TaskStatus::Pending,
            project: None,
            priority: Priority::None,
            tags: Vec::new(),
            dependencies: BTreeSet::new(),
            annotations: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Creates an unsaved task with a caller-provided uuid.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_uuid(uuid: impl Into<String>, description: impl Into<String>) -> Self {
        let mut task = Self::new(description);
        task.uuid = Some(uuid.into());
        task
    }

    /// Fills `uuid` and `entry` when they are not assigned yet.
    pub fn ensure_identity(&mut self, now: i64) {
        if self.uuid.as_deref().map_or(true, str::is_empty) {
            self.uuid = Some(uuid::Uuid::new_v4().to_string());
        }
        if self.entry.is_none() {
            self.entry = Some(now);
        }
    }

    /// Checks persisted-state invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        let uuid = self.uuid.as_deref().ok_or(TaskValidationError::MissingUuid)?;
        if !is_valid_token(uuid) {
            return Err(TaskValidationError::InvalidUuid(uuid.to_string()));
        }
        if self.entry.is_none() {
            return Err(TaskValidationError::MissingEntry);
        }
        match (self.status.is_closed(), self.end) {
            (true, None) => return Err(TaskValidationError::ClosedStatusWithoutEnd(self.status)),
            (false, Some(_)) => return Err(TaskValidationError::EndWithoutClosedStatus),
            _ => {}
        }
        for tag in &self.tags {
            if !is_valid_token(tag) {
                return Err(TaskValidationError::InvalidTag(tag.clone()));
            }
        }
        if let Some(project) = &self.project {
            if !is_valid_project(project) {
                return Err(TaskValidationError::InvalidProject(project.clone()));
            }
        }
        for pair in self.annotations.windows(2) {
            if pair[0].time == pair[1].time {
                return Err(TaskValidationError::DuplicateAnnotationTime(pair[0].time));
            }
        }
        Ok(())
    }

    /// Marks the task completed at `now`.
    pub fn done(&mut self, now: i64) {
        self.status = TaskStatus::Completed;
        self.end = Some(now);
    }

    /// Marks the task deleted at `now`. Rows are never hard-deleted here.
    pub fn delete(&mut self, now: i64) {
        self.status = TaskStatus::Deleted;
        self.end = Some(now);
    }

    /// Moves a closed task back to pending.
    pub fn reopen(&mut self) {
        self.status = TaskStatus::Pending;
        self.end = None;
    }

    /// Appends a tag unless already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|existing| existing == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag);
        before != self.tags.len()
    }

    /// Adds an annotation at `time`, moving it to the next free second when
    /// another annotation already owns that timestamp.
    ///
    /// Returns the timestamp actually used.
    pub fn annotate(&mut self, time: i64, text: impl Into<String>) -> i64 {
        let mut slot = time;
        while self.annotations.iter().any(|existing| existing.time == slot) {
            slot += 1;
        }
        let position = self
            .annotations
            .partition_point(|existing| existing.time < slot);
        self.annotations.insert(
            position,
            Annotation {
                time: slot,
                text: text.into(),
            },
        );
        slot
    }

    pub fn remove_annotation(&mut self, time: i64) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|existing| existing.time != time);
        before != self.annotations.len()
    }

    pub fn add_dependency(&mut self, id: TaskId) -> bool {
        self.dependencies.insert(id)
    }

    pub fn remove_dependency(&mut self, id: TaskId) -> bool {
        self.dependencies.remove(&id)
    }
}

/// Tokens (uuids, tags) must be non-empty and free of separators that would
/// break the comma-joined list encodings.
pub fn is_valid_token(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|ch| ch == ',' || ch == '"' || ch.is_whitespace())
}

/// Projects are stored verbatim but need at least one visible character.
pub fn is_valid_project(value: &str) -> bool {
    !value.trim().is_empty()
}
