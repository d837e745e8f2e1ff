use std::collections::HashSet;

use openedge_sql_middleware::driver::DriverValue;
use openedge_sql_middleware::statement::{CompiledInsert, CompiledStatement, InsertField};
use openedge_sql_middleware::test_utils::{
    Event, Outcome, ScriptedConnection, ScriptedDriver, test_options,
};
use openedge_sql_middleware::{ConnectionContext, OpenEdgeDbError, RowValues};

/// Driver whose catalog reports a shadow `id` column and whose sequences count from 1.
fn shadow_id_driver() -> ScriptedDriver {
    let driver = ScriptedDriver::new();
    driver
        .on(
            "SYSPROGRESS.SYSCOLUMNS",
            Outcome::rows(&["COL"], vec![vec![DriverValue::Text(b"id".to_vec())]]),
        )
        .on("NEXTVAL", Outcome::Sequence { next: 1 });
    driver
}

fn open(driver: &ScriptedDriver, bulk: bool) -> ConnectionContext<ScriptedConnection> {
    let mut opts = test_options();
    opts.bulk_insert = bulk;
    let conn = ConnectionContext::open(driver, opts).unwrap();
    driver.clear_events();
    conn
}

fn titles(n: usize) -> CompiledInsert {
    CompiledInsert::new(
        "book",
        vec![InsertField::new("title")],
        (0..n).map(|i| vec![RowValues::Text(format!("title {i}"))]).collect(),
    )
}

#[test]
fn zero_rows_send_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let driver = shadow_id_driver();
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    assert_eq!(cursor.insert(&titles(0))?, None);
    cursor.close()?;

    assert_eq!(driver.executed().len(), 0);
    assert_eq!(driver.commits(), 0);
    Ok(())
}

#[test]
fn bulk_insert_assigns_distinct_keys() -> Result<(), Box<dyn std::error::Error>> {
    let driver = shadow_id_driver();
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    cursor.insert(&titles(3))?;
    cursor.close()?;

    let executed = driver.executed();
    assert_eq!(
        executed[0],
        "SELECT COL FROM SYSPROGRESS.SYSCOLUMNS WHERE TBL = ? AND OWNER = ? AND COL = 'id'"
    );
    assert_eq!(
        executed.iter().filter(|sql| sql.contains("NEXTVAL")).count(),
        3
    );
    assert!(executed.contains(&r#"SELECT "PUB"."id_book".NEXTVAL FROM "PUB"."DUAL""#.to_string()));

    let batch = driver
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::ExecuteMany { sql, rows } => Some((sql, rows)),
            _ => None,
        })
        .expect("one batched insert");
    assert_eq!(batch.0, r#"INSERT INTO "book" ("title", "id") VALUES (?, ?)"#);
    let keys: HashSet<i64> = batch
        .1
        .iter()
        .filter_map(|row| match row.last() {
            Some(DriverValue::Int(key)) => Some(*key),
            _ => None,
        })
        .collect();
    assert_eq!(keys, HashSet::from([1, 2, 3]));
    Ok(())
}

#[test]
fn shadow_id_lookup_is_cached_until_ddl() -> Result<(), Box<dyn std::error::Error>> {
    let driver = shadow_id_driver();
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    cursor.insert(&titles(1))?;
    cursor.insert(&titles(1))?;
    cursor.execute(r#"ALTER TABLE "book" ADD "isbn" VARCHAR(20)"#, &[])?;
    cursor.insert(&titles(1))?;
    cursor.close()?;

    let lookups = driver
        .executed()
        .iter()
        .filter(|sql| sql.contains("SYSCOLUMNS"))
        .count();
    assert_eq!(lookups, 2);
    Ok(())
}

#[test]
fn row_mode_returns_the_emulated_key() -> Result<(), Box<dyn std::error::Error>> {
    let driver = shadow_id_driver();
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    let key = cursor.insert(&titles(1).returning_id())?;
    cursor.close()?;

    assert_eq!(key, Some(1));
    let last = driver.events().into_iter().rev().find_map(|e| match e {
        Event::Execute { sql, params } => Some((sql, params)),
        _ => None,
    });
    assert_eq!(
        last,
        Some((
            r#"INSERT INTO "book" ("title", "id") VALUES (?, ?)"#.to_string(),
            vec![DriverValue::Text(b"title 0".to_vec()), DriverValue::Int(1)],
        ))
    );
    Ok(())
}

#[test]
fn disabled_bulk_insert_runs_row_by_row() -> Result<(), Box<dyn std::error::Error>> {
    let driver = shadow_id_driver();
    let mut conn = open(&driver, false);

    let mut cursor = conn.cursor()?;
    cursor.insert(&titles(2))?;
    cursor.close()?;

    let inserts = driver
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Execute { sql, .. } if sql.starts_with("INSERT INTO")))
        .count();
    assert_eq!(inserts, 2);
    assert!(!driver
        .events()
        .iter()
        .any(|e| matches!(e, Event::ExecuteMany { .. })));
    Ok(())
}

#[test]
fn table_without_shadow_id_gets_no_keys() -> Result<(), Box<dyn std::error::Error>> {
    let driver = ScriptedDriver::new();
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    let rows = cursor.execute_compiled(&CompiledStatement::Insert(titles(2)))?;
    cursor.close()?;

    assert_eq!(rows, 2);
    let executed = driver.executed();
    assert!(!executed.iter().any(|sql| sql.contains("NEXTVAL")));
    assert_eq!(
        executed.last().map(String::as_str),
        Some(r#"INSERT INTO "book" ("title") VALUES (?)"#)
    );
    Ok(())
}

#[test]
fn empty_sequence_is_a_key_generation_error() -> Result<(), Box<dyn std::error::Error>> {
    let driver = ScriptedDriver::new();
    driver
        .on(
            "SYSPROGRESS.SYSCOLUMNS",
            Outcome::rows(&["COL"], vec![vec![DriverValue::Text(b"id".to_vec())]]),
        )
        .on("NEXTVAL", Outcome::rows(&["NEXTVAL"], Vec::new()));
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    let err = cursor.insert(&titles(1)).unwrap_err();
    cursor.close()?;

    match err {
        OpenEdgeDbError::KeyGenerationError { table, column } => {
            assert_eq!(table, "book");
            assert_eq!(column, "id");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!driver.executed().iter().any(|sql| sql.starts_with("INSERT")));
    Ok(())
}

#[test]
fn executemany_without_rows_is_a_noop() -> Result<(), Box<dyn std::error::Error>> {
    let driver = ScriptedDriver::new();
    let mut conn = open(&driver, true);

    let mut cursor = conn.cursor()?;
    let affected = cursor.executemany(r#"INSERT INTO "book" ("title") VALUES (%s)"#, &[])?;
    cursor.close()?;

    assert_eq!(affected, 0);
    assert!(driver.events().iter().all(|e| matches!(e, Event::CloseCursor)));
    Ok(())
}
