//! Snapshot value type and the per-task baseline table.

use crate::codec::record::{encode, FieldMap};
use crate::model::task::TaskId;
use std::collections::{BTreeSet, HashMap};

/// Captured flattened state of one task at a load/save boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    fields: FieldMap,
}

impl Snapshot {
    pub fn capture(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// Encoded record line for journal `old` values.
    pub fn encoded(&self) -> String {
        encode(&self.fields)
    }

    /// Field names whose presence or value differ from `current`, sorted.
    pub fn dirty_fields(&self, current: &FieldMap) -> Vec<String> {
        let keys: BTreeSet<&String> = self.fields.keys().chain(current.keys()).collect();
        keys.into_iter()
            .filter(|key| self.fields.get(*key) != current.get(*key))
            .cloned()
            .collect()
    }
}

/// Baselines for tasks loaded through one service instance.
#[derive(Debug, Default)]
pub struct SnapshotTable {
    baselines: HashMap<TaskId, Snapshot>,
}

impl SnapshotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TaskId) -> Option<&Snapshot> {
        self.baselines.get(&id)
    }

    /// Replaces the baseline for `id` and returns the previous one.
    pub fn refresh(&mut self, id: TaskId, fields: FieldMap) -> Option<Snapshot> {
        self.baselines.insert(id, Snapshot::capture(fields))
    }

    pub fn forget(&mut self, id: TaskId) -> Option<Snapshot> {
        self.baselines.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Snapshot, SnapshotTable};
    use crate::codec::record::FieldMap;

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn dirty_fields_cover_changed_added_and_removed_keys() {
        let snapshot = Snapshot::capture(map(&[("description", "a"), ("project", "p")]));
        let current = map(&[("description", "b"), ("tags", "x")]);
        assert_eq!(
            snapshot.dirty_fields(&current),
            vec![
                "description".to_string(),
                "project".to_string(),
                "tags".to_string()
            ]
        );
    }

    #[test]
    fn identical_flattened_state_is_clean() {
        let fields = map(&[("description", "a"), ("tags", "x,y")]);
        let snapshot = Snapshot::capture(fields.clone());
        assert!(snapshot.dirty_fields(&fields).is_empty());
        assert_eq!(snapshot.encoded(), "[description:\"a\" tags:\"x,y\"]\n");
    }

    #[test]
    fn refresh_replaces_and_forget_drops_baseline() {
        let mut table = SnapshotTable::new();
        assert!(table.refresh(1, map(&[("description", "a")])).is_none());

        let current = map(&[("description", "b")]);
        let previous = table.refresh(1, current.clone()).unwrap();
        assert_eq!(previous.dirty_fields(&current), vec!["description".to_string()]);
        assert!(table.get(1).unwrap().dirty_fields(&current).is_empty());

        assert!(table.forget(1).is_some());
        assert!(table.get(1).is_none());
    }
}
