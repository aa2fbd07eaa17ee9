//! Interactive task lifecycle with change tracking.
//!
//! # Responsibility
//! - Route every interactive save through the dirty check and the journal.
//! - Own the snapshot side table for tasks loaded through this service.
//!
//! # Invariants
//! - A save whose flattened form equals the baseline writes nothing and
//!   appends no journal entry.
//! - The task row and its journal entry are written in one transaction.
//! - The baseline is refreshed after every successful save, journaled or not.

use crate::clock::Clock;
use crate::codec::{encode, flatten, FieldMap};
use crate::journal::{JournalError, UndoJournal};
use crate::model::task::{Task, TaskId, TaskValidationError};
use crate::repo::task_repo::TaskRepository;
use crate::repo::undo_repo::UndoRepository;
use crate::repo::RepoError;
use crate::tracking::{Snapshot, SnapshotTable};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

#[derive(Debug)]
pub enum TaskServiceError {
    Repo(RepoError),
    Journal(JournalError),
    NotFound(TaskId),
    UuidNotFound(String),
    InvalidInput(String),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Journal(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: #{id}"),
            Self::UuidNotFound(uuid) => write!(f, "task not found: {uuid}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Journal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::UuidNotFound(uuid) => Self::UuidNotFound(uuid),
            other => Self::Repo(other),
        }
    }
}

impl From<JournalError> for TaskServiceError {
    fn from(value: JournalError) -> Self {
        Self::Journal(value)
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Repo(RepoError::Validation(value))
    }
}

/// Result of one save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub id: TaskId,
    /// Whether a journal entry was appended.
    pub journaled: bool,
    /// Flattened field names that differed from the baseline.
    pub dirty_fields: Vec<String>,
}

/// Use-case service for interactive task edits.
pub struct TaskService<R: TaskRepository, U: UndoRepository, C: Clock> {
    tasks: R,
    journal: UndoJournal<U, C>,
    snapshots: SnapshotTable,
    actor: String,
}

impl<R: TaskRepository, U: UndoRepository, C: Clock> TaskService<R, U, C> {
    /// Creates a service acting on behalf of `actor`.
    pub fn new(tasks: R, journal: UndoJournal<U, C>, actor: impl Into<String>) -> Self {
        Self {
            tasks,
            journal,
            snapshots: SnapshotTable::new(),
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn journal(&self) -> &UndoJournal<U, C> {
        &self.journal
    }

    /// Loads a task and captures its baseline.
    pub fn load(&mut self, id: TaskId) -> TaskServiceResult<Task> {
        let task = self
            .tasks
            .get_task(id)?
            .ok_or(TaskServiceError::NotFound(id))?;
        let fields = self.flatten(&task)?;
        self.snapshots.refresh(id, fields);
        Ok(task)
    }

    pub fn load_by_uuid(&mut self, uuid: &str) -> TaskServiceResult<Task> {
        let id = self
            .tasks
            .find_id_by_uuid(uuid)?
            .ok_or_else(|| TaskServiceError::UuidNotFound(uuid.to_string()))?;
        self.load(id)
    }

    /// Drops the baseline of `id`; the next save compares against the store.
    pub fn forget(&mut self, id: TaskId) {
        self.snapshots.forget(id);
    }

    /// Field names of `task` that differ from its baseline.
    pub fn dirty_fields(&self, task: &Task) -> TaskServiceResult<Vec<String>> {
        let current = self.flatten(task)?;
        Ok(dirty_against(self.baseline(task.id)?.as_ref(), &current))
    }

    /// Persists `task` if its flattened form changed and journals the
    /// transition.
    ///
    /// A task without `id` is inserted and gets `uuid`/`entry` assigned when
    /// missing; its journal entry has no `old` line.
    pub fn save(&mut self, task: &mut Task) -> TaskServiceResult<SaveOutcome> {
        task.ensure_identity(self.journal.clock().now());
        task.validate()?;

        let current = self.flatten(task)?;
        let baseline = self.baseline(task.id)?;
        let dirty_fields = dirty_against(baseline.as_ref(), &current);

        if let (Some(id), true) = (task.id, dirty_fields.is_empty()) {
            self.snapshots.refresh(id, current);
            return Ok(SaveOutcome {
                id,
                journaled: false,
                dirty_fields,
            });
        }

        let old_line = baseline.as_ref().map(Snapshot::encoded);
        let new_line = encode(&current);
        let actor = self.actor.as_str();
        let tasks = &self.tasks;
        let journal = &self.journal;
        let saved: &Task = task;

        let id = tasks.atomically(|| -> TaskServiceResult<TaskId> {
            let id = match saved.id {
                Some(id) => {
                    tasks.update_task(saved)?;
                    id
                }
                None => tasks.insert_task(saved, actor)?,
            };
            journal.record(actor, old_line.as_deref(), &new_line)?;
            Ok(id)
        })?;

        task.id = Some(id);
        self.snapshots.refresh(id, current);
        Ok(SaveOutcome {
            id,
            journaled: true,
            dirty_fields,
        })
    }

    /// Applies `mutate` to `task` and saves it as one tracked unit of work.
    pub fn with_tracking<F>(&mut self, task: &mut Task, mutate: F) -> TaskServiceResult<SaveOutcome>
    where
        F: FnOnce(&mut Task),
    {
        mutate(task);
        self.save(task)
    }

    /// Creates a pending task with `description`.
    pub fn create(&mut self, description: impl Into<String>) -> TaskServiceResult<Task> {
        let mut task = Task::new(description);
        self.save(&mut task)?;
        Ok(task)
    }

    /// Loads `id`, applies `mutate`, and saves.
    pub fn update<F>(&mut self, id: TaskId, mutate: F) -> TaskServiceResult<(Task, SaveOutcome)>
    where
        F: FnOnce(&mut Task),
    {
        let mut task = self.load(id)?;
        let outcome = self.with_tracking(&mut task, mutate)?;
        Ok((task, outcome))
    }

    pub fn complete(&mut self, id: TaskId) -> TaskServiceResult<(Task, SaveOutcome)> {
        let now = self.journal.clock().now();
        self.update(id, |task| {
            if !task.status.is_closed() {
                task.done(now);
            }
        })
    }

    pub fn delete(&mut self, id: TaskId) -> TaskServiceResult<(Task, SaveOutcome)> {
        let now = self.journal.clock().now();
        self.update(id, |task| task.delete(now))
    }

    pub fn add_tag(&mut self, id: TaskId, tag: &str) -> TaskServiceResult<(Task, SaveOutcome)> {
        if tag.trim().is_empty() {
            return Err(TaskServiceError::InvalidInput("tag must not be blank".to_string()));
        }
        self.update(id, |task| {
            task.add_tag(tag);
        })
    }

    /// Annotates `id` at the current time; see `Task::annotate` for
    /// timestamp collisions.
    pub fn annotate(
        &mut self,
        id: TaskId,
        text: impl Into<String>,
    ) -> TaskServiceResult<(Task, SaveOutcome)> {
        let now = self.journal.clock().now();
        let text = text.into();
        if text.is_empty() {
            return Err(TaskServiceError::InvalidInput(
                "annotation text must not be empty".to_string(),
            ));
        }
        self.update(id, |task| {
            task.annotate(now, text);
        })
    }

    pub fn add_dependency(
        &mut self,
        id: TaskId,
        depends_on: TaskId,
    ) -> TaskServiceResult<(Task, SaveOutcome)> {
        if id == depends_on {
            return Err(TaskServiceError::InvalidInput(format!(
                "task #{id} cannot depend on itself"
            )));
        }
        if self.tasks.get_task(depends_on)?.is_none() {
            return Err(TaskServiceError::NotFound(depends_on));
        }
        self.update(id, |task| {
            task.add_dependency(depends_on);
        })
    }

    fn flatten(&self, task: &Task) -> TaskServiceResult<FieldMap> {
        let uuids = self.tasks.dependency_uuids(&task.dependencies)?;
        if let Some(missing) = task.dependencies.iter().find(|id| !uuids.contains_key(id)) {
            return Err(TaskServiceError::InvalidInput(format!(
                "dependency #{missing} does not exist"
            )));
        }
        Ok(flatten(task, &uuids))
    }

    /// Baseline for `id`: the captured snapshot, else the stored row.
    fn baseline(&self, id: Option<TaskId>) -> TaskServiceResult<Option<Snapshot>> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(snapshot) = self.snapshots.get(id) {
            return Ok(Some(snapshot.clone()));
        }
        let stored = self
            .tasks
            .get_task(id)?
            .ok_or(TaskServiceError::NotFound(id))?;
        Ok(Some(Snapshot::capture(self.flatten(&stored)?)))
    }
}

/// Without a baseline every present field counts as dirty.
fn dirty_against(baseline: Option<&Snapshot>, current: &FieldMap) -> Vec<String> {
    match baseline {
        Some(snapshot) => snapshot.dirty_fields(current),
        None => current.keys().cloned().collect(),
    }
}
