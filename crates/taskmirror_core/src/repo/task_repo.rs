//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist tasks together with their tag, dependency and annotation rows.
//! - Provide the collection-scoped reads and removals used by export/import.
//! - Own placeholder rows created for forward dependency references.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - A task's `uuid` never changes after insert.
//! - Dependency edges are stored as id pairs; uuids are only looked up for
//!   encoding.
//! - Placeholder rows are never returned by collection listings.
//!
//! # See also
//! - `crate::sync::reconciler`

use super::{ensure_schema_ready, in_transaction, RepoError, RepoResult};
use crate::model::task::{is_valid_token, Annotation, Priority, Task, TaskId, TaskStatus};
use crate::registry::{LookupKind, Registry};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet};

const TASK_SELECT_SQL: &str = "SELECT
    tasks.id AS id,
    tasks.uuid AS uuid,
    tasks.description AS description,
    tasks.entry AS entry,
    tasks.due AS due,
    tasks.end_time AS end_time,
    tasks.status AS status,
    projects.name AS project,
    priorities.code AS priority,
    tasks.extra_json AS extra_json
FROM tasks
LEFT JOIN projects ON projects.id = tasks.project_id
LEFT JOIN priorities ON priorities.id = tasks.priority_id";

const REQUIRED_TABLES: &[&str] = &[
    "tasks",
    "projects",
    "priorities",
    "tags",
    "task_tags",
    "task_dependencies",
    "annotations",
];

/// Row predicate for one mirrored collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope<'a> {
    /// Pending tasks owned by one principal.
    Pending { owner: &'a str },
    /// Completed and deleted tasks.
    Closed,
}

impl TaskScope<'_> {
    /// SQL condition on table alias `alias`; the owner binds to `?1`.
    fn condition(&self, alias: &str) -> String {
        match self {
            Self::Pending { .. } => {
                format!("({alias}.status = 'pending' AND {alias}.owner = ?1)")
            }
            Self::Closed => format!("({alias}.status IN ('completed', 'deleted'))"),
        }
    }

    fn bind_values(&self) -> Vec<Value> {
        match self {
            Self::Pending { owner } => vec![Value::Text((*owner).to_string())],
            Self::Closed => Vec::new(),
        }
    }
}

/// Outcome of clearing one collection before a re-import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeRemoval {
    /// Rows hard-deleted (relations cascade).
    pub deleted: usize,
    /// Rows kept as placeholders because tasks outside the collection still
    /// depend on them.
    pub demoted: usize,
}

/// Repository interface for task persistence.
pub trait TaskRepository {
    /// Inserts a new task owned by `owner` and returns its id.
    fn insert_task(&self, task: &Task, owner: &str) -> RepoResult<TaskId>;
    /// Overwrites fields and relations of an existing task (by `task.id`).
    ///
    /// Clears the placeholder flag: the row now holds real data.
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn set_owner(&self, id: TaskId, owner: &str) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn find_id_by_uuid(&self, uuid: &str) -> RepoResult<Option<TaskId>>;
    /// Returns the id for `uuid`, inserting a placeholder row when missing.
    ///
    /// The boolean is `true` when a placeholder was created.
    fn get_or_create_placeholder(&self, uuid: &str, owner: &str) -> RepoResult<(TaskId, bool)>;
    fn is_placeholder(&self, id: TaskId) -> RepoResult<bool>;
    /// Maps dependency ids to uuids; unknown ids are omitted.
    fn dependency_uuids(&self, ids: &BTreeSet<TaskId>) -> RepoResult<BTreeMap<TaskId, String>>;
    /// Lists non-placeholder tasks in scope ordered by `entry ASC, id ASC`.
    fn list_tasks(&self, scope: TaskScope<'_>) -> RepoResult<Vec<Task>>;
    /// Removes every row in scope, demoting rows still referenced from
    /// outside the scope to placeholders.
    fn remove_scope(&self, scope: TaskScope<'_>) -> RepoResult<ScopeRemoval>;
    /// Runs `work` atomically with respect to this repository's connection.
    fn atomically<T, E: From<RepoError>>(
        &self,
        work: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn registry(&self) -> Registry<'conn> {
        Registry::new(self.conn)
    }

    fn write_relations(&self, id: TaskId, task: &Task) -> RepoResult<()> {
        let registry = self.registry();

        self.conn
            .execute("DELETE FROM task_tags WHERE task_id = ?1;", [id])?;
        for (position, tag) in task.tags.iter().enumerate() {
            let tag_id = registry.intern(LookupKind::Tag, tag)?;
            self.conn.execute(
                "INSERT INTO task_tags (task_id, tag_id, position) VALUES (?1, ?2, ?3);",
                params![id, tag_id, position as i64],
            )?;
        }

        self.conn
            .execute("DELETE FROM task_dependencies WHERE task_id = ?1;", [id])?;
        for depends_on in &task.dependencies {
            self.conn.execute(
                "INSERT INTO task_dependencies (task_id, depends_on_id) VALUES (?1, ?2);",
                params![id, depends_on],
            )?;
        }

        self.conn
            .execute("DELETE FROM annotations WHERE task_id = ?1;", [id])?;
        for annotation in &task.annotations {
            self.conn.execute(
                "INSERT INTO annotations (task_id, time, text) VALUES (?1, ?2, ?3);",
                params![id, annotation.time, annotation.text.as_str()],
            )?;
        }

        Ok(())
    }

    fn lookup_ids(&self, task: &Task) -> RepoResult<(Option<i64>, Option<i64>)> {
        let registry = self.registry();
        let project_id = task
            .project
            .as_deref()
            .map(|project| registry.intern(LookupKind::Project, project))
            .transpose()?;
        let priority_id = registry.intern_priority(task.priority)?;
        Ok((project_id, priority_id))
    }

    fn load_relations(&self, task: &mut Task) -> RepoResult<()> {
        let Some(id) = task.id else {
            return Ok(());
        };

        let mut stmt = self.conn.prepare(
            "SELECT tags.name
             FROM task_tags
             INNER JOIN tags ON tags.id = task_tags.tag_id
             WHERE task_tags.task_id = ?1
             ORDER BY task_tags.position ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        while let Some(row) = rows.next()? {
            task.tags.push(row.get(0)?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT depends_on_id FROM task_dependencies WHERE task_id = ?1 ORDER BY depends_on_id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        while let Some(row) = rows.next()? {
            task.dependencies.insert(row.get(0)?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT time, text FROM annotations WHERE task_id = ?1 ORDER BY time ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        while let Some(row) = rows.next()? {
            task.annotations.push(Annotation {
                time: row.get(0)?,
                text: row.get(1)?,
            });
        }

        Ok(())
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert_task(&self, task: &Task, owner: &str) -> RepoResult<TaskId> {
        task.validate()?;
        let (project_id, priority_id) = self.lookup_ids(task)?;

        self.conn.execute(
            "INSERT INTO tasks (
                uuid,
                owner,
                description,
                entry,
                due,
                end_time,
                status,
                project_id,
                priority_id,
                extra_json,
                is_placeholder
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0);",
            params![
                task.uuid.as_deref(),
                owner,
                task.description.as_str(),
                task.entry,
                task.due,
                task.end,
                task.status.as_str(),
                project_id,
                priority_id,
                extra_to_json(task)?,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.write_relations(id, task)?;
        Ok(id)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        let id = task
            .id
            .ok_or_else(|| RepoError::InvalidData("cannot update a task without id".to_string()))?;
        task.validate()?;
        let (project_id, priority_id) = self.lookup_ids(task)?;

        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                description = ?3,
                entry = ?4,
                due = ?5,
                end_time = ?6,
                status = ?7,
                project_id = ?8,
                priority_id = ?9,
                extra_json = ?10,
                is_placeholder = 0
             WHERE id = ?1 AND uuid = ?2;",
            params![
                id,
                task.uuid.as_deref(),
                task.description.as_str(),
                task.entry,
                task.due,
                task.end,
                task.status.as_str(),
                project_id,
                priority_id,
                extra_to_json(task)?,
            ],
        )?;

        if changed == 0 {
            let exists: bool = self
                .conn
                .query_row("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1);", [id], |row| {
                    row.get(0)
                })?;
            return Err(if exists {
                RepoError::InvalidData(format!("uuid of task #{id} is immutable"))
            } else {
                RepoError::NotFound(id)
            });
        }

        self.write_relations(id, task)
    }

    fn set_owner(&self, id: TaskId, owner: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE tasks SET owner = ?2 WHERE id = ?1;", params![id, owner])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE tasks.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut task = parse_task_row(row)?;
        self.load_relations(&mut task)?;
        Ok(Some(task))
    }

    fn find_id_by_uuid(&self, uuid: &str) -> RepoResult<Option<TaskId>> {
        let id = self
            .conn
            .query_row("SELECT id FROM tasks WHERE uuid = ?1;", [uuid], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    fn get_or_create_placeholder(&self, uuid: &str, owner: &str) -> RepoResult<(TaskId, bool)> {
        if let Some(id) = self.find_id_by_uuid(uuid)? {
            return Ok((id, false));
        }
        if !is_valid_token(uuid) {
            return Err(RepoError::InvalidData(format!(
                "placeholder uuid `{uuid}` is not a valid token"
            )));
        }

        self.conn.execute(
            "INSERT INTO tasks (uuid, owner, description, entry, status, is_placeholder)
             VALUES (?1, ?2, '', 0, 'pending', 1);",
            params![uuid, owner],
        )?;
        Ok((self.conn.last_insert_rowid(), true))
    }

    fn is_placeholder(&self, id: TaskId) -> RepoResult<bool> {
        let flag: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_placeholder FROM tasks WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match flag {
            Some(value) => Ok(value == 1),
            None => Err(RepoError::NotFound(id)),
        }
    }

    fn dependency_uuids(&self, ids: &BTreeSet<TaskId>) -> RepoResult<BTreeMap<TaskId, String>> {
        let mut stmt = self.conn.prepare("SELECT uuid FROM tasks WHERE id = ?1;")?;
        let mut uuids = BTreeMap::new();
        for id in ids {
            let uuid: Option<String> = stmt.query_row([id], |row| row.get(0)).optional()?;
            if let Some(uuid) = uuid {
                uuids.insert(*id, uuid);
            }
        }
        Ok(uuids)
    }

    fn list_tasks(&self, scope: TaskScope<'_>) -> RepoResult<Vec<Task>> {
        let sql = format!(
            "{TASK_SELECT_SQL}
             WHERE tasks.is_placeholder = 0 AND {}
             ORDER BY tasks.entry ASC, tasks.id ASC;",
            scope.condition("tasks")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(scope.bind_values()))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        for task in &mut tasks {
            self.load_relations(task)?;
        }
        Ok(tasks)
    }

    fn remove_scope(&self, scope: TaskScope<'_>) -> RepoResult<ScopeRemoval> {
        let referenced_from_outside = format!(
            "SELECT dep.depends_on_id
             FROM task_dependencies dep
             INNER JOIN tasks src ON src.id = dep.task_id
             WHERE NOT {}",
            scope.condition("src")
        );

        let mut stmt = self.conn.prepare(&format!(
            "SELECT tasks.id FROM tasks
             WHERE {} AND tasks.id IN ({referenced_from_outside});",
            scope.condition("tasks")
        ))?;
        let mut rows = stmt.query(params_from_iter(scope.bind_values()))?;
        let mut demoted_ids: Vec<TaskId> = Vec::new();
        while let Some(row) = rows.next()? {
            demoted_ids.push(row.get(0)?);
        }

        for id in &demoted_ids {
            self.conn
                .execute("UPDATE tasks SET is_placeholder = 1 WHERE id = ?1;", [id])?;
            self.conn
                .execute("DELETE FROM task_tags WHERE task_id = ?1;", [id])?;
            self.conn
                .execute("DELETE FROM task_dependencies WHERE task_id = ?1;", [id])?;
            self.conn
                .execute("DELETE FROM annotations WHERE task_id = ?1;", [id])?;
        }

        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM tasks
                 WHERE {} AND tasks.id NOT IN ({referenced_from_outside});",
                scope.condition("tasks")
            ),
            params_from_iter(scope.bind_values()),
        )?;

        Ok(ScopeRemoval {
            deleted,
            demoted: demoted_ids.len(),
        })
    }

    fn atomically<T, E: From<RepoError>>(
        &self,
        work: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        in_transaction(self.conn, work)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in tasks.status"))
    })?;

    let priority = match row.get::<_, Option<String>>("priority")? {
        Some(code) => Priority::from_code(&code).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid priority code `{code}` in priorities.code"))
        })?,
        None => Priority::None,
    };

    let extra_text: String = row.get("extra_json")?;
    let extra: BTreeMap<String, String> = serde_json::from_str(&extra_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid tasks.extra_json: {err}"))
    })?;

    let mut task = Task::new(row.get::<_, String>("description")?);
    task.id = Some(row.get("id")?);
    task.uuid = Some(row.get("uuid")?);
    task.entry = Some(row.get("entry")?);
    task.due = row.get("due")?;
    task.end = row.get("end_time")?;
    task.status = status;
    task.project = row.get("project")?;
    task.priority = priority;
    task.extra = extra;
    Ok(task)
}

fn extra_to_json(task: &Task) -> RepoResult<String> {
    serde_json::to_string(&task.extra)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode extra fields: {err}")))
}
