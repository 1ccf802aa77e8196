//! Integration-style tests exercising the full driver pipeline against
//! real (in-memory and temp-file) databases.

use crate::error::{DbError, DbResult};
use crate::rowbuf::TAG_INTEGER;
use crate::{decode_row, params, ColumnValue, Connection, Param, Statement};

/// Owned mirror of [`ColumnValue`] for easy assertions.
#[derive(Debug, PartialEq, Eq)]
enum Owned {
    Int(i64),
    Text(String),
    Null,
}

fn decode_owned(bytes: &[u8]) -> DbResult<Vec<Owned>> {
    decode_row(bytes)
        .map(|value| {
            value.map(|value| match value {
                ColumnValue::Integer(i) => Owned::Int(i),
                ColumnValue::Text(t) => Owned::Text(String::from_utf8_lossy(t).into_owned()),
                ColumnValue::Null => Owned::Null,
            })
        })
        .collect()
}

fn fetch_all(stmt: &mut Statement<'_>) -> DbResult<Vec<Vec<Owned>>> {
    let mut rows = Vec::new();
    while stmt.next()? {
        rows.push(decode_owned(stmt.row_bytes())?);
    }
    Ok(rows)
}

fn create_key_val(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE `keyVal` (`key` INT NOT NULL CONSTRAINT `PK_keyVal` PRIMARY KEY, \
         `val` TEXT NOT NULL) WITHOUT ROWID",
    )
    .unwrap();
}

fn insert_rows(conn: &Connection, count: i64) {
    let mut ins = conn
        .prepare("INSERT INTO `keyVal` (`key`, `val`) VALUES (?1, ?2)")
        .unwrap();
    for i in 0..count {
        ins.exec(params![i, format!("test value{i}")]).unwrap();
    }
}

fn select_all(conn: &Connection) -> Vec<Vec<Owned>> {
    let mut sel = conn
        .prepare("SELECT `key`, `val` FROM `keyVal` ORDER BY `key`")
        .unwrap();
    sel.exec(&[]).unwrap();
    fetch_all(&mut sel).unwrap()
}

#[test]
fn open_then_drop_succeeds() {
    let conn = Connection::open_in_memory().unwrap();
    drop(conn);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.db");
    let uri = path.to_str().unwrap();
    drop(Connection::open(uri).unwrap());
    // Reopening an existing file works too.
    drop(Connection::open(uri).unwrap());
}

#[test]
fn open_rejects_oversized_uri() {
    let uri = "x".repeat(crate::URI_MAX_SIZE + 1);
    assert!(matches!(
        Connection::open(&uri),
        Err(DbError::InvalidUri(_))
    ));
}

#[test]
fn open_rejects_interior_nul() {
    assert!(matches!(
        Connection::open("bad\0uri"),
        Err(DbError::InvalidUri(_))
    ));
}

#[test]
fn prepare_error_yields_no_statement() {
    let conn = Connection::open_in_memory().unwrap();
    let err = conn.prepare("SELEKT 1").unwrap_err();
    assert!(matches!(err, DbError::Prepare { .. }));
    // The connection remains usable afterwards.
    conn.execute_batch("SELECT 1").unwrap();
}

#[test]
fn prepare_rejects_empty_sql() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        conn.prepare("-- nothing here"),
        Err(DbError::Prepare { .. })
    ));
}

#[test]
fn key_val_scenario_decodes_in_key_order() {
    let conn = Connection::open_in_memory().unwrap();
    create_key_val(&conn);
    insert_rows(&conn, 10);

    let mut sel = conn
        .prepare("SELECT `key`, `val` FROM `keyVal` ORDER BY `key`")
        .unwrap();
    sel.exec(&[]).unwrap();

    let mut seen = 0_i64;
    while sel.next().unwrap() {
        let bytes = sel.row_bytes();
        // Tag order is INTEGER then TEXT, byte for byte.
        assert_eq!(bytes[0], TAG_INTEGER);
        let row = decode_owned(bytes).unwrap();
        assert_eq!(
            row,
            vec![Owned::Int(seen), Owned::Text(format!("test value{seen}"))]
        );
        seen += 1;
    }
    assert_eq!(seen, 10);
    assert!(sel.row_bytes().is_empty());
}

#[test]
fn exec_resets_prior_bindings() {
    let conn = Connection::open_in_memory().unwrap();
    let mut stmt = conn.prepare("SELECT ?1, ?2").unwrap();

    stmt.exec(params![1_i64, "one"]).unwrap();
    assert!(stmt.next().unwrap());
    assert_eq!(
        decode_owned(stmt.row_bytes()).unwrap(),
        vec![Owned::Int(1), Owned::Text("one".into())]
    );

    stmt.exec(params![2_i64, "two"]).unwrap();
    assert!(stmt.next().unwrap());
    assert_eq!(
        decode_owned(stmt.row_bytes()).unwrap(),
        vec![Owned::Int(2), Owned::Text("two".into())]
    );

    // A parameter left unbound must not observe the previous call's value.
    stmt.exec(params![3_i64]).unwrap();
    assert!(stmt.next().unwrap());
    assert_eq!(
        decode_owned(stmt.row_bytes()).unwrap(),
        vec![Owned::Int(3), Owned::Null]
    );
}

#[test]
fn static_text_binds_without_copy() {
    let conn = Connection::open_in_memory().unwrap();
    let mut stmt = conn.prepare("SELECT ?1").unwrap();
    stmt.exec(&[Param::StaticText("static value")]).unwrap();
    assert!(stmt.next().unwrap());
    assert_eq!(
        decode_owned(stmt.row_bytes()).unwrap(),
        vec![Owned::Text("static value".into())]
    );
}

#[test]
fn integer_rows_commit_to_full_width() {
    let conn = Connection::open_in_memory().unwrap();
    let mut stmt = conn.prepare("SELECT ?1").unwrap();
    for v in [0_i64, 42, -42, i64::MAX, i64::MIN] {
        stmt.exec(params![v]).unwrap();
        assert!(stmt.next().unwrap());
        // Tag byte plus the committed 8-byte payload, at any magnitude.
        assert_eq!(stmt.row_bytes().len(), 9);
        assert_eq!(decode_owned(stmt.row_bytes()).unwrap(), vec![Owned::Int(v)]);
        assert!(!stmt.next().unwrap());
    }
}

#[test]
fn null_column_is_tag_only() {
    let conn = Connection::open_in_memory().unwrap();
    let mut stmt = conn.prepare("SELECT NULL").unwrap();
    stmt.exec(&[]).unwrap();
    assert!(stmt.next().unwrap());
    assert_eq!(stmt.row_bytes().len(), 1);
    assert_eq!(decode_owned(stmt.row_bytes()).unwrap(), vec![Owned::Null]);
}

#[test]
fn float_column_is_unsupported() {
    let conn = Connection::open_in_memory().unwrap();
    let mut stmt = conn.prepare("SELECT 1.5").unwrap();
    stmt.exec(&[]).unwrap();
    assert!(matches!(
        stmt.next(),
        Err(DbError::UnsupportedColumnType(_))
    ));
}

#[test]
fn oversized_row_grows_the_leased_buffer() {
    let conn = Connection::open_in_memory().unwrap();
    let big = "x".repeat(3 * crate::rowbuf::DEFAULT_BUF_CAPACITY);
    let mut stmt = conn.prepare("SELECT ?1, ?2").unwrap();
    stmt.exec(params![7_i64, big.clone()]).unwrap();
    assert!(stmt.next().unwrap());
    assert_eq!(
        decode_owned(stmt.row_bytes()).unwrap(),
        vec![Owned::Int(7), Owned::Text(big)]
    );
}

#[test]
fn constraint_violation_is_a_step_error() {
    let conn = Connection::open_in_memory().unwrap();
    create_key_val(&conn);
    let mut ins = conn
        .prepare("INSERT INTO `keyVal` (`key`, `val`) VALUES (?1, ?2)")
        .unwrap();
    ins.exec(params![0_i64, "first"]).unwrap();
    let err = ins.exec(params![0_i64, "dupe"]).unwrap_err();
    assert!(matches!(err, DbError::Step { .. }));
    // The statement stays usable after a fresh reset via exec.
    ins.exec(params![1_i64, "second"]).unwrap();
}

#[test]
fn step_error_mid_iteration_ends_the_result_set() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE n (v INTEGER)").unwrap();
    let mut ins = conn.prepare("INSERT INTO n (v) VALUES (?1)").unwrap();
    ins.exec(params![1_i64]).unwrap();
    // abs() of the most negative integer raises a runtime overflow error,
    // so stepping onto the second row fails mid-iteration.
    ins.exec(params![i64::MIN]).unwrap();

    let mut sel = conn.prepare("SELECT abs(v) FROM n ORDER BY rowid").unwrap();
    sel.exec(&[]).unwrap();
    assert!(matches!(sel.next(), Err(DbError::Step { .. })));
    // The result set is over; iteration must not silently restart from
    // row 1 on the reset statement.
    assert!(!sel.next().unwrap());
    assert!(sel.row_bytes().is_empty());
}

#[test]
fn backup_rejects_unstageable_target_uri() {
    let conn = Connection::open_in_memory().unwrap();
    let uri = "x".repeat(crate::URI_MAX_SIZE + 1);
    assert!(matches!(conn.backup(&uri), Err(DbError::Backup { .. })));
    assert!(matches!(conn.restore(&uri), Err(DbError::Restore { .. })));
}

#[test]
fn changes_and_last_insert_rowid() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
        .unwrap();
    let mut ins = conn.prepare("INSERT INTO t (v) VALUES (?1)").unwrap();
    ins.exec(params!["a"]).unwrap();
    assert_eq!(conn.changes(), 1);
    assert_eq!(conn.last_insert_rowid(), 1);
    ins.exec(params!["b"]).unwrap();
    assert_eq!(conn.last_insert_rowid(), 2);
}

#[test]
fn backup_then_restore_roundtrip() {
    for rows in [0_i64, 1, 100] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("backup{rows}.db"));
        let uri = path.to_str().unwrap();

        let source = Connection::open_in_memory().unwrap();
        create_key_val(&source);
        insert_rows(&source, rows);
        let expected = select_all(&source);
        assert_eq!(expected.len(), usize::try_from(rows).unwrap());

        source.backup(uri).unwrap();

        // A fresh in-memory connection restored from the file must match
        // the source at backup time exactly.
        let dest = Connection::open_in_memory().unwrap();
        dest.restore(uri).unwrap();
        assert_eq!(select_all(&dest), expected);
    }
}

#[test]
fn restore_overwrites_existing_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.db");
    let uri = path.to_str().unwrap();

    let conn = Connection::open_in_memory().unwrap();
    create_key_val(&conn);
    insert_rows(&conn, 5);
    conn.backup(uri).unwrap();

    // Mutate after the snapshot, then roll back to it.
    insert_rows_starting_at(&conn, 5, 3);
    assert_eq!(select_all(&conn).len(), 8);
    conn.restore(uri).unwrap();
    assert_eq!(select_all(&conn).len(), 5);
}

fn insert_rows_starting_at(conn: &Connection, start: i64, count: i64) {
    let mut ins = conn
        .prepare("INSERT INTO `keyVal` (`key`, `val`) VALUES (?1, ?2)")
        .unwrap();
    for i in start..start + count {
        ins.exec(params![i, format!("test value{i}")]).unwrap();
    }
}

#[test]
fn backup_to_unopenable_target_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("sub").join("backup.db");
    let uri = path.to_str().unwrap();

    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(conn.backup(uri), Err(DbError::Backup { .. })));
    assert!(matches!(conn.restore(uri), Err(DbError::Restore { .. })));
}

#[test]
fn repeated_exec_reuses_the_same_statement() {
    let conn = Connection::open_in_memory().unwrap();
    create_key_val(&conn);
    insert_rows(&conn, 3);
    let mut sel = conn
        .prepare("SELECT `key`, `val` FROM `keyVal` ORDER BY `key`")
        .unwrap();
    for _ in 0..4 {
        sel.exec(&[]).unwrap();
        assert_eq!(fetch_all(&mut sel).unwrap().len(), 3);
    }
}
