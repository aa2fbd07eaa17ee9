use rusqlite::Connection;
use taskmirror_core::db::open_db_in_memory;
use taskmirror_core::journal::{parse, serialize};
use taskmirror_core::{
    CollectionService, FixedClock, Priority, SqliteTaskRepository, SqliteUndoRepository,
    TaskService, UndoEntry, UndoJournal,
};

type Service<'a> = TaskService<SqliteTaskRepository<'a>, SqliteUndoRepository<'a>, &'a FixedClock>;

fn service<'a>(conn: &'a Connection, clock: &'a FixedClock) -> Service<'a> {
    TaskService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        UndoJournal::new(SqliteUndoRepository::try_new(conn).unwrap(), clock),
        "alice",
    )
}

#[test]
fn lifecycle_journals_one_entry_per_effective_change() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_700_000_000);
    let mut service = service(&conn, &clock);

    let mut task = service.create("plan trip").unwrap();
    clock.advance(10);
    service
        .with_tracking(&mut task, |task| {
            task.project = Some("travel".to_string());
            task.priority = Priority::High;
        })
        .unwrap();
    clock.advance(10);
    assert!(!service.with_tracking(&mut task, |_| {}).unwrap().journaled);
    assert!(!service.save(&mut task).unwrap().journaled);

    let entries = service.journal().entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry.old, None);
    assert_eq!(entries[1].entry.old.as_deref(), Some(entries[0].entry.new.as_str()));
    assert_eq!(entries[1].entry.time, 1_700_000_010);
}

#[test]
fn journal_of_recorded_entries_round_trips() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_700_000_000);
    let mut service = service(&conn, &clock);

    let first = service.create("a").unwrap();
    let second = service.create("b \"quoted\" \\ text").unwrap();
    clock.advance(1);
    service.annotate(first.id.unwrap(), "note one").unwrap();
    service.annotate(first.id.unwrap(), "note two").unwrap();
    service.add_dependency(second.id.unwrap(), first.id.unwrap()).unwrap();
    clock.advance(1);
    service.delete(second.id.unwrap()).unwrap();

    let entries: Vec<UndoEntry> = service
        .journal()
        .entries()
        .unwrap()
        .into_iter()
        .map(|record| record.entry)
        .collect();
    assert_eq!(entries.len(), 6);

    let text = service.journal().serialize().unwrap();
    assert_eq!(parse(&text).unwrap(), entries);
    assert_eq!(serialize(&parse(&text).unwrap()), text);
}

#[test]
fn same_second_annotations_keep_both_texts() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_700_000_000);
    let mut service = service(&conn, &clock);

    let task = service.create("a").unwrap();
    let id = task.id.unwrap();
    service.annotate(id, "first").unwrap();
    let (task, _) = service.annotate(id, "second").unwrap();

    let times: Vec<i64> = task.annotations.iter().map(|annotation| annotation.time).collect();
    assert_eq!(times, vec![1_700_000_000, 1_700_000_001]);
}

#[test]
fn adding_a_tag_marks_only_tags_dirty_until_saved() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_700_000_000);
    let mut service = service(&conn, &clock);
    let created = service.create("a").unwrap();
    let mut task = service.load(created.id.unwrap()).unwrap();

    task.add_tag("home");
    assert_eq!(service.dirty_fields(&task).unwrap(), vec!["tags".to_string()]);
    service.save(&mut task).unwrap();
    assert!(service.dirty_fields(&task).unwrap().is_empty());
}

#[test]
fn interactive_history_exports_as_undo_data_and_imports_do_not_journal() {
    let mut conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_700_000_000);
    let journal_text = {
        let mut service = service(&conn, &clock);
        let task = service.create("a").unwrap();
        service.complete(task.id.unwrap()).unwrap();
        service.journal().serialize().unwrap()
    };

    let mut collections = CollectionService::new(&mut conn, FixedClock::new(1_800_000_000));
    assert_eq!(collections.read("undo.data", "alice").unwrap(), journal_text);

    let completed = collections.read("completed.data", "alice").unwrap();
    collections.write("completed.data", &completed, "alice").unwrap();
    assert_eq!(collections.read("completed.data", "alice").unwrap(), completed);
    assert_eq!(collections.read("undo.data", "alice").unwrap(), journal_text);
}
