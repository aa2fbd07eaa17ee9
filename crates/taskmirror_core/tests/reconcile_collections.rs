use rusqlite::Connection;
use taskmirror_core::db::open_db_in_memory;
use taskmirror_core::{
    CollectionService, FixedClock, ImportReport, ImportWarning, SqliteTaskRepository, SyncError,
    TaskRepository,
};

const A: &str = "a0000000-0000-4000-8000-00000000000a";
const B: &str = "b0000000-0000-4000-8000-00000000000b";
const C: &str = "c0000000-0000-4000-8000-00000000000c";
const GHOST: &str = "d0000000-0000-4000-8000-00000000000d";

fn pending_text() -> String {
    format!(
        "[annotation_1700000100:\"called back\" depends:\"{A}\" description:\"ship release\" entry:\"1700000000\" priority:\"H\" project:\"acme\" status:\"pending\" tags:\"work,urgent\" uuid:\"{B}\"]\n\
         [description:\"write notes\" entry:\"1700000050\" status:\"pending\" tags:\"work\" uuid:\"{A}\"]\n"
    )
}

fn completed_text() -> String {
    format!(
        "[description:\"old\" end:\"1600000100\" entry:\"1600000000\" status:\"completed\" uuid:\"{C}\"]\n"
    )
}

fn write(conn: &mut Connection, name: &str, text: &str, principal: &str) -> Result<ImportReport, SyncError> {
    CollectionService::new(conn, FixedClock::new(1_800_000_000)).write(name, text, principal)
}

fn read(conn: &mut Connection, name: &str, principal: &str) -> String {
    CollectionService::new(conn, FixedClock::new(1_800_000_000))
        .read(name, principal)
        .unwrap()
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn canonical_upload_reads_back_byte_for_byte() {
    let mut conn = open_db_in_memory().unwrap();
    let text = pending_text();

    let report = write(&mut conn, "pending.data", &text, "alice").unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.placeholders_created, 1);
    assert_eq!(read(&mut conn, "pending.data", "alice"), text);
}

#[test]
fn importing_twice_is_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    let text = pending_text();

    write(&mut conn, "pending.data", &text, "alice").unwrap();
    let first = read(&mut conn, "pending.data", "alice");
    let report = write(&mut conn, "pending.data", &text, "alice").unwrap();
    let second = read(&mut conn, "pending.data", "alice");

    assert_eq!(first, second);
    assert_eq!(report.removed, 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks;"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags;"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM projects;"), 1);
}

#[test]
fn forward_reference_resolves_to_the_later_record() {
    let mut conn = open_db_in_memory().unwrap();
    write(&mut conn, "pending.data", &pending_text(), "alice").unwrap();

    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let a = repo.find_id_by_uuid(A).unwrap().unwrap();
    let b = repo.find_id_by_uuid(B).unwrap().unwrap();
    let task_b = repo.get_task(b).unwrap().unwrap();

    assert!(task_b.dependencies.contains(&a));
    assert!(!repo.is_placeholder(a).unwrap());
    assert_eq!(task_b.annotations.len(), 1);
    assert_eq!(task_b.tags, vec!["work".to_string(), "urgent".to_string()]);
}

#[test]
fn unresolved_uuid_stays_a_placeholder_and_keeps_the_edge() {
    let mut conn = open_db_in_memory().unwrap();
    let text = format!(
        "[depends:\"{GHOST}\" description:\"blocked\" entry:\"10\" status:\"pending\" uuid:\"{A}\"]\n"
    );

    let report = write(&mut conn, "pending.data", &text, "alice").unwrap();
    assert_eq!(report.placeholders_created, 1);
    assert_eq!(read(&mut conn, "pending.data", "alice"), text);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks WHERE is_placeholder = 1;"), 1);

    write(&mut conn, "pending.data", &text, "alice").unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks;"), 2);
}

#[test]
fn short_uuid_dependency_resolves_regardless_of_record_order() {
    let a_line = "[description:\"first\" entry:\"10\" status:\"pending\" uuid:\"task-a\"]\n";
    let b_line =
        "[depends:\"task-a\" description:\"second\" entry:\"20\" status:\"pending\" uuid:\"task-b\"]\n";

    let mut exports = Vec::new();
    for text in [format!("{a_line}{b_line}"), format!("{b_line}{a_line}")] {
        let mut conn = open_db_in_memory().unwrap();
        let report = write(&mut conn, "pending.data", &text, "alice").unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks WHERE is_placeholder = 1;"), 0);
        exports.push(read(&mut conn, "pending.data", "alice"));
    }

    assert_eq!(exports[0], exports[1]);
    assert_eq!(exports[0], format!("{a_line}{b_line}"));
}

#[test]
fn project_whitespace_round_trips_verbatim() {
    let mut conn = open_db_in_memory().unwrap();
    let text = format!(
        "[description:\"padded\" entry:\"10\" project:\" acme\" status:\"pending\" uuid:\"{A}\"]\n\
         [description:\"plain\" entry:\"20\" project:\"acme\" status:\"pending\" uuid:\"{B}\"]\n"
    );

    write(&mut conn, "pending.data", &text, "alice").unwrap();
    assert_eq!(read(&mut conn, "pending.data", "alice"), text);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM projects;"), 2);
}

#[test]
fn malformed_dependency_token_is_reported_and_skipped() {
    let mut conn = open_db_in_memory().unwrap();
    let text = format!(
        "[depends:\"task-42\" description:\"x\" entry:\"10\" status:\"pending\" uuid:\"{A}\"]\n"
    );

    let report = write(&mut conn, "pending.data", &text, "alice").unwrap();
    assert_eq!(
        report.warnings,
        vec![ImportWarning::DanglingDependency {
            record_uuid: A.to_string(),
            token: "task-42".to_string(),
        }]
    );
    assert_eq!(
        read(&mut conn, "pending.data", "alice"),
        format!("[description:\"x\" entry:\"10\" status:\"pending\" uuid:\"{A}\"]\n")
    );
}

#[test]
fn malformed_batch_leaves_store_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    write(&mut conn, "pending.data", &pending_text(), "alice").unwrap();
    let before = read(&mut conn, "pending.data", "alice");

    let broken = format!("{}[description:\"unterminated uuid:\"{C}\"]\n", completed_text());
    let err = write(&mut conn, "pending.data", &broken, "alice").unwrap_err();
    assert!(matches!(
        err,
        SyncError::Codec(taskmirror_core::CodecError::MalformedRecord { line: 2, .. })
    ));
    assert_eq!(read(&mut conn, "pending.data", "alice"), before);
}

#[test]
fn pending_collections_are_scoped_by_principal() {
    let mut conn = open_db_in_memory().unwrap();
    write(&mut conn, "pending.data", &pending_text(), "alice").unwrap();
    let bob_text = format!("[description:\"bob's\" entry:\"5\" status:\"pending\" uuid:\"{C}\"]\n");
    write(&mut conn, "pending.data", &bob_text, "bob").unwrap();

    assert_eq!(read(&mut conn, "pending.data", "bob"), bob_text);
    assert_eq!(read(&mut conn, "pending.data", "alice"), pending_text());
}

#[test]
fn closed_dependency_survives_reimport_of_its_collection() {
    let mut conn = open_db_in_memory().unwrap();
    write(&mut conn, "completed.data", &completed_text(), "alice").unwrap();
    let pending = format!(
        "[depends:\"{C}\" description:\"follow-up\" entry:\"1700000000\" status:\"pending\" uuid:\"{A}\"]\n"
    );
    write(&mut conn, "pending.data", &pending, "alice").unwrap();

    let report = write(&mut conn, "completed.data", "", "alice").unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(report.demoted, 1);
    assert_eq!(read(&mut conn, "completed.data", "alice"), "");
    assert_eq!(read(&mut conn, "pending.data", "alice"), pending);

    write(&mut conn, "completed.data", &completed_text(), "alice").unwrap();
    assert_eq!(read(&mut conn, "completed.data", "alice"), completed_text());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks WHERE is_placeholder = 1;"), 0);
}

#[test]
fn closed_status_without_end_is_normalized() {
    let mut conn = open_db_in_memory().unwrap();
    let text = format!("[description:\"gone\" entry:\"50\" status:\"deleted\" uuid:\"{C}\"]\n");

    write(&mut conn, "completed.data", &text, "alice").unwrap();
    assert_eq!(
        read(&mut conn, "completed.data", "alice"),
        format!("[description:\"gone\" end:\"50\" entry:\"50\" status:\"deleted\" uuid:\"{C}\"]\n")
    );
}

#[test]
fn undo_collection_is_replaced_verbatim() {
    let mut conn = open_db_in_memory().unwrap();
    let undo = format!(
        "time 1600000000\nnew [description:\"old\" entry:\"1600000000\" status:\"pending\" uuid:\"{C}\"]\n---\n\
         time 1600000100\nold [description:\"old\" entry:\"1600000000\" status:\"pending\" uuid:\"{C}\"]\nnew {}---\n",
        completed_text()
    );

    let report = write(&mut conn, "undo.data", &undo, "alice").unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(read(&mut conn, "undo.data", "alice"), undo);

    let err = write(&mut conn, "undo.data", "time never\n---\n", "alice").unwrap_err();
    assert!(matches!(err, SyncError::Journal(_)));
    assert_eq!(read(&mut conn, "undo.data", "alice"), undo);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks;"), 0);
}

#[test]
fn unsupported_collection_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let err = write(&mut conn, "backlog.data", &pending_text(), "alice").unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedCollection(name) if name == "backlog.data"));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks;"), 0);
}
