// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! End-to-end tests: submit through the engine, settle through tick

use querylite::{
    params, Deferred, DeferredResultSet, Engine, EngineConfig, ExecutorState, Params, QueryError,
    QueryTemplate, ResultSet,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> EngineConfig {
    EngineConfig::sqlite(dir.path().join("test.db"))
        .with_reconnect_base_delay(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(20))
}

fn start(config: EngineConfig) -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = Engine::new(config).expect("Failed to build engine");
    engine.connect().expect("Failed to start executor");
    engine
}

/// Tick until `deferred` settles or the deadline passes
fn wait<T, E>(engine: &Engine, deferred: &Deferred<T, E>) -> Result<Arc<T>, Arc<E>>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    while deferred.is_pending() {
        assert!(Instant::now() < deadline, "Deferred did not settle in time");
        engine.tick();
        std::thread::sleep(Duration::from_millis(5));
    }
    deferred.outcome().expect("settled deferred has an outcome")
}

fn run(engine: &Engine, sql: &str, params: Params) -> Arc<ResultSet> {
    wait(engine, &engine.submit(sql, params))
        .unwrap_or_else(|e| panic!("'{}' failed: {}", sql, e))
}

fn seed_users(engine: &Engine) {
    run(engine, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)", params![]);
    run(engine, "INSERT INTO users (name, score) VALUES (?, ?)", params!["alice", 4.5]);
    run(engine, "INSERT INTO users (name, score) VALUES (?, ?)", params!["bob", 3.0]);
}

#[test]
fn test_select_returns_rows() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));
    seed_users(&engine);

    let rs = run(&engine, "SELECT id, name, score FROM users ORDER BY id", params![]);
    assert_eq!(rs.len(), 2);
    assert_eq!(rs.column_names(), ["id", "name", "score"]);
    assert_eq!(rs.column_index("NAME"), Some(2));

    let first = &rs.rows[0];
    assert_eq!(first.get_integer(1), Some(1));
    assert_eq!(first.get_string("name"), Some("alice".to_string()));
    assert_eq!(first.get_double("score"), Some(4.5));
    assert_eq!(first.get(0), None);
    assert_eq!(first.get("missing"), None);
    assert_eq!(rs.rows[1].get_string(2), Some("bob".to_string()));

    assert!(engine.disconnect());
}

#[test]
fn test_insert_reports_id_and_changes() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));
    seed_users(&engine);

    let rs = run(&engine, "INSERT INTO users (name) VALUES (?)", params!["carol"]);
    assert_eq!(rs.affected_rows, 1);
    assert_eq!(rs.insert_id, Some(3));
    assert!(rs.is_empty());

    let rs = run(&engine, "UPDATE users SET score = 0", params![]);
    assert_eq!(rs.affected_rows, 3);
    assert_eq!(rs.insert_id, None);

    assert!(engine.disconnect());
}

#[test]
fn test_failed_query_rejects() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));

    let deferred = engine.submit("SELEC name FROM users", params![]);
    let err = wait(&engine, &deferred).unwrap_err();
    assert!(matches!(*err, QueryError::Execution(_)));

    // The connection survives a query error
    run(&engine, "SELECT 1", params![]);
    assert_eq!(engine.stats().connection_losses, 0);
    assert!(engine.disconnect());
}

#[test]
fn test_runaway_query_times_out() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));

    let deferred = engine.submit_with_timeout(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c",
        params![],
        Duration::from_millis(50),
    );
    let err = wait(&engine, &deferred).unwrap_err();
    assert_eq!(*err, QueryError::Timeout(Duration::from_millis(50)));

    run(&engine, "SELECT 1", params![]);
    assert!(engine.disconnect());
}

#[test]
fn test_handlers_run_on_ticking_thread() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let deferred = engine.submit("SELECT 42 AS answer", params![]);
    {
        let seen = Arc::clone(&seen);
        deferred.then(
            move |rs: &ResultSet| {
                let answer = rs.first_row().and_then(|row| row.get_integer("answer"));
                seen.lock().unwrap().push((std::thread::current().id(), answer));
            },
            |_: &QueryError| panic!("query should succeed"),
        );
    }
    wait(&engine, &deferred).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (std::thread::current().id(), Some(42)));
    drop(seen);
    assert!(engine.disconnect());
}

#[test]
fn test_all_and_race_over_queries() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));
    seed_users(&engine);

    let lookups: Vec<DeferredResultSet> = ["alice", "bob"]
        .iter()
        .map(|name| engine.submit("SELECT id FROM users WHERE name = ?", params![*name]))
        .collect();
    let all = Deferred::all(&lookups);
    let ids: Vec<Option<i64>> = wait(&engine, &all)
        .unwrap()
        .iter()
        .map(|rs| rs.first_row().and_then(|row| row.get_integer(1)))
        .collect();
    assert_eq!(ids, vec![Some(1), Some(2)]);

    let members = vec![
        engine.submit("SELECT broken FROM nowhere", params![]),
        engine.submit("SELECT count(*) FROM users", params![]),
    ];
    let race = Deferred::race(&members);
    let rs = wait(&engine, &race).unwrap();
    assert_eq!(rs.first_row().and_then(|row| row.get_integer(1)), Some(2));

    let failing = vec![
        engine.submit("SELECT 1", params![]),
        engine.submit("SELECT broken FROM nowhere", params![]),
    ];
    let all = Deferred::all(&failing);
    assert!(matches!(*wait(&engine, &all).unwrap_err(), QueryError::Execution(_)));

    assert!(engine.disconnect());
}

#[test]
fn test_template_checks_parameters() {
    let dir = TempDir::new().unwrap();
    let engine = start(test_config(&dir));
    seed_users(&engine);

    let by_name = QueryTemplate::new("SELECT score FROM users WHERE name = ?");
    let deferred = by_name.submit(&engine, params!["bob"]);
    let rs = wait(&engine, &deferred).unwrap();
    assert_eq!(rs.rows[0].get_double(1), Some(3.0));

    // Wrong arity rejects without reaching the executor
    let deferred = by_name.submit(&engine, params!["bob", 1]);
    assert!(matches!(
        *deferred.outcome().unwrap().unwrap_err(),
        QueryError::InvalidParameter(_)
    ));

    assert!(engine.disconnect());
}

#[test]
fn test_disconnect_applies_queued_writes() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let engine = start(config.clone());
    run(&engine, "CREATE TABLE events (id INTEGER PRIMARY KEY, kind TEXT)", params![]);

    let writes: Vec<DeferredResultSet> = (0..20)
        .map(|i| engine.submit("INSERT INTO events (kind) VALUES (?)", params![format!("e{}", i)]))
        .collect();
    assert!(engine.disconnect());
    assert_eq!(engine.state(), ExecutorState::Disconnected);

    // disconnect settles everything the executor finished
    for write in &writes {
        assert_eq!(write.outcome().unwrap().unwrap().affected_rows, 1);
    }

    let engine = start(config);
    let rs = run(&engine, "SELECT count(*) AS n FROM events", params![]);
    assert_eq!(rs.rows[0].get_integer("n"), Some(20));
    assert!(engine.disconnect());
}

#[test]
fn test_submit_before_connect() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new(test_config(&dir)).unwrap();

    let deferred = engine.submit("SELECT 'queued' AS status", params![]);
    assert_eq!(engine.tick(), 0);
    assert!(deferred.is_pending());

    engine.connect().unwrap();
    let rs = wait(&engine, &deferred).unwrap();
    assert_eq!(rs.rows[0].get_string("status"), Some("queued".to_string()));
    assert!(engine.disconnect());
}

#[test]
fn test_memory_backend() {
    let engine = start(
        EngineConfig::in_memory().with_poll_interval(Duration::from_millis(20)),
    );
    run(&engine, "CREATE TABLE kv (k TEXT PRIMARY KEY, v BLOB)", params![]);
    run(&engine, "INSERT INTO kv VALUES (?, NULL)", params!["empty"]);

    let rs = run(&engine, "SELECT k, v FROM kv", params![]);
    assert!(rs.rows[0].is_null("v"));
    assert_eq!(rs.to_json()["rows"][0]["k"], "empty");
    assert!(engine.disconnect());
}
