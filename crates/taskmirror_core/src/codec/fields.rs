//! Task <-> field map projection.
//!
//! # Responsibility
//! - `flatten`: produce the canonical field map that both the encoder and the
//!   dirty tracker consume.
//! - `from_fields`: interpret a decoded field map as an importable task.
//!
//! # Invariants
//! - `decode(encode(flatten(task))) == flatten(task)` for every valid task.
//! - Fields this system does not model round-trip through `Task::extra`.

use super::record::FieldMap;
use super::{CodecError, CodecResult};
use crate::model::task::{
    is_valid_project, is_valid_token, Annotation, Priority, Task, TaskId, TaskStatus,
};
use std::collections::BTreeMap;

pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_DEPENDS: &str = "depends";
pub const FIELD_DUE: &str = "due";
pub const FIELD_END: &str = "end";
pub const FIELD_ENTRY: &str = "entry";
pub const FIELD_PRIORITY: &str = "priority";
pub const FIELD_PROJECT: &str = "project";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_TAGS: &str = "tags";
pub const FIELD_UUID: &str = "uuid";
pub const ANNOTATION_PREFIX: &str = "annotation_";

const MODELED_FIELDS: &[&str] = &[
    FIELD_DESCRIPTION,
    FIELD_DEPENDS,
    FIELD_DUE,
    FIELD_END,
    FIELD_ENTRY,
    FIELD_PRIORITY,
    FIELD_PROJECT,
    FIELD_STATUS,
    FIELD_TAGS,
    FIELD_UUID,
];

/// A decoded task ready for the reconciler.
///
/// Dependencies stay as raw uuid tokens: resolving them to `TaskId`s needs
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTask {
    pub task: Task,
    /// `depends` tokens in file order, blanks removed.
    pub depends: Vec<String>,
}

/// Projects a task into its canonical field map.
///
/// `dependency_uuids` maps dependency ids to their uuids; ids missing from the
/// map are left out of `depends`.
pub fn flatten(task: &Task, dependency_uuids: &BTreeMap<TaskId, String>) -> FieldMap {
    let mut fields = FieldMap::new();
    for (key, value) in &task.extra {
        insert_non_empty(&mut fields, key, value.clone());
    }

    insert_non_empty(&mut fields, FIELD_DESCRIPTION, task.description.clone());
    if let Some(uuid) = &task.uuid {
        insert_non_empty(&mut fields, FIELD_UUID, uuid.clone());
    }
    insert_timestamp(&mut fields, FIELD_ENTRY, task.entry);
    insert_timestamp(&mut fields, FIELD_DUE, task.due);
    insert_timestamp(&mut fields, FIELD_END, task.end);
    fields.insert(FIELD_STATUS.to_string(), task.status.as_str().to_string());
    if let Some(project) = &task.project {
        insert_non_empty(&mut fields, FIELD_PROJECT, project.clone());
    }
    if let Some(code) = task.priority.code() {
        fields.insert(FIELD_PRIORITY.to_string(), code.to_string());
    }
    insert_non_empty(&mut fields, FIELD_TAGS, task.tags.join(","));

    let depends = task
        .dependencies
        .iter()
        .filter_map(|id| dependency_uuids.get(id).cloned())
        .collect::<Vec<_>>()
        .join(",");
    insert_non_empty(&mut fields, FIELD_DEPENDS, depends);

    for annotation in &task.annotations {
        insert_non_empty(
            &mut fields,
            &format!("{ANNOTATION_PREFIX}{}", annotation.time),
            annotation.text.clone(),
        );
    }

    fields
}

/// Interprets a decoded record as a task.
///
/// # Normalization
/// - Missing `uuid` is generated, missing `entry` becomes `now`, missing
///   `status` becomes `pending`.
/// - A closed status without `end` gets `end = entry`; a pending task drops
///   any `end`.
/// - Tags are deduplicated keeping first occurrence.
///
/// # Errors
/// - `InvalidField` for non-integer timestamps, unknown status or priority,
///   and uuid/tag tokens that cannot be re-encoded.
pub fn from_fields(fields: &FieldMap, now: i64) -> CodecResult<ImportedTask> {
    let mut task = Task::new(fields.get(FIELD_DESCRIPTION).cloned().unwrap_or_default());

    if let Some(uuid) = non_empty(fields, FIELD_UUID) {
        if !is_valid_token(uuid) {
            return Err(invalid(FIELD_UUID, uuid, "uuid must be a single token"));
        }
        task.uuid = Some(uuid.to_string());
    }
    task.entry = Some(parse_timestamp(fields, FIELD_ENTRY)?.unwrap_or(now));
    task.due = parse_timestamp(fields, FIELD_DUE)?;
    task.end = parse_timestamp(fields, FIELD_END)?;

    if let Some(status) = non_empty(fields, FIELD_STATUS) {
        task.status = TaskStatus::parse(status)
            .ok_or_else(|| invalid(FIELD_STATUS, status, "unknown status"))?;
    }
    match (task.status.is_closed(), task.end) {
        (true, None) => task.end = task.entry,
        (false, Some(_)) => task.end = None,
        _ => {}
    }

    if let Some(project) = non_empty(fields, FIELD_PROJECT) {
        if !is_valid_project(project) {
            return Err(invalid(FIELD_PROJECT, project, "project must not be blank"));
        }
        task.project = Some(project.to_string());
    }
    if let Some(code) = non_empty(fields, FIELD_PRIORITY) {
        task.priority = Priority::from_code(code)
            .ok_or_else(|| invalid(FIELD_PRIORITY, code, "expected H, M or L"))?;
    }

    if let Some(tags) = non_empty(fields, FIELD_TAGS) {
        for tag in split_list(tags) {
            if !is_valid_token(tag) {
                return Err(invalid(FIELD_TAGS, tags, "tag must be a single token"));
            }
            task.add_tag(tag);
        }
    }

    let depends = non_empty(fields, FIELD_DEPENDS)
        .map(|value| split_list(value).map(str::to_string).collect())
        .unwrap_or_default();

    for (key, value) in fields {
        if MODELED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match annotation_time(key) {
            Some(time) => task.annotations.push(Annotation {
                time,
                text: value.clone(),
            }),
            None => {
                task.extra.insert(key.clone(), value.clone());
            }
        }
    }
    task.annotations.sort_by_key(|annotation| annotation.time);
    task.ensure_identity(now);

    Ok(ImportedTask { task, depends })
}

/// Parses the timestamp suffix of an `annotation_<ts>` key.
///
/// Only canonical integers qualify (`annotation_0100` does not), so every
/// accepted key re-encodes to itself.
pub fn annotation_time(key: &str) -> Option<i64> {
    let suffix = key.strip_prefix(ANNOTATION_PREFIX)?;
    let time: i64 = suffix.parse().ok()?;
    (time.to_string() == suffix).then_some(time)
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn non_empty<'a>(fields: &'a FieldMap, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn parse_timestamp(fields: &FieldMap, key: &'static str) -> CodecResult<Option<i64>> {
    match non_empty(fields, key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(key, value, "expected integer unix seconds")),
    }
}

fn insert_non_empty(fields: &mut FieldMap, key: &str, value: String) {
    if !value.is_empty() {
        fields.insert(key.to_string(), value);
    }
}

fn insert_timestamp(fields: &mut FieldMap, key: &str, value: Option<i64>) {
    if let Some(value) = value.filter(|value| *value != 0) {
        fields.insert(key.to_string(), value.to_string());
    }
}

fn invalid(field: &str, value: &str, reason: &'static str) -> CodecError {
    CodecError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
        reason,
    }
}
