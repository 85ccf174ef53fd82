// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SQLite driver built on rusqlite
//!
//! `BackendType::Sqlite` opens `database` as a file path,
//! `BackendType::Memory` opens a private in-memory database (its contents
//! do not survive a reconnect).

use rusqlite::hooks::Action;
use rusqlite::types::ValueRef;
use rusqlite::{ErrorCode, OpenFlags, Statement};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Connection, Connector, DriverError, DriverResult};
use crate::config::{BackendType, ConnectionConfig};
use crate::job::{leading_keyword, ParamValue, Params, QueryKind};
use crate::result::{ColumnIndex, FieldValue, ResultSet, Row};

const BUSY_TIMEOUT_MS: u64 = 100;

/// VM instructions between timeout checks
const PROGRESS_OPS: i32 = 1000;

/// Opens [`SqliteConnection`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

impl SqliteConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for SqliteConnector {
    fn connect(&self, config: &ConnectionConfig) -> DriverResult<Box<dyn Connection>> {
        let conn = match config.backend {
            BackendType::Memory => rusqlite::Connection::open_in_memory(),
            BackendType::Sqlite => {
                if config.database.is_empty() {
                    return Err(DriverError::Connect(
                        "no database path configured".to_string(),
                    ));
                }
                rusqlite::Connection::open_with_flags(
                    Path::new(&config.database),
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
                )
            }
        }
        .map_err(|e| DriverError::Connect(e.to_string()))?;

        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .map_err(|e| DriverError::Connect(e.to_string()))?;

        // Set when a statement inserts into a rowid table; upserts that take
        // the DO UPDATE path and WITHOUT ROWID inserts leave it clear
        let inserted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&inserted);
        conn.update_hook(Some(move |action: Action, _db: &str, _table: &str, _rowid: i64| {
            if matches!(action, Action::SQLITE_INSERT) {
                flag.store(true, Ordering::Relaxed);
            }
        }));

        log::debug!("Opened SQLite connection ({})", config.describe());
        Ok(Box::new(SqliteConnection { conn, inserted }))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

/// A live rusqlite connection
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    inserted: Arc<AtomicBool>,
}

/// Where a statement failed, for connection-loss classification
enum Failure {
    BeforeExecution(rusqlite::Error),
    DuringExecution(rusqlite::Error, bool),
    Bind(String),
}

impl SqliteConnection {
    fn run(&self, sql: &str, params: &Params) -> Result<ResultSet, Failure> {
        let mut stmt = self.conn.prepare(sql).map_err(Failure::BeforeExecution)?;
        bind(&mut stmt, params)?;
        let writes = !stmt.readonly();
        self.inserted.store(false, Ordering::Relaxed);

        if stmt.column_count() > 0 {
            let names = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();
            let columns = Arc::new(ColumnIndex::new(names));
            let width = columns.len();

            let mut materialized = Vec::new();
            let mut rows = stmt.raw_query();
            loop {
                let row = match rows.next() {
                    Ok(Some(row)) => row,
                    Ok(None) => break,
                    Err(e) => return Err(Failure::DuringExecution(e, writes)),
                };
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| Failure::DuringExecution(e, writes))?;
                    values.push(field_value(value));
                }
                materialized.push(Row::new(Arc::clone(&columns), values));
            }
            drop(rows);

            let mut result = ResultSet::with_rows(columns, materialized);
            // INSERT ... RETURNING and friends
            if writes {
                result.affected_rows = self.conn.changes() as u64;
                result.insert_id = self.insert_id(sql);
            }
            Ok(result)
        } else {
            let changed = stmt
                .raw_execute()
                .map_err(|e| Failure::DuringExecution(e, writes))?;
            Ok(ResultSet::with_changes(changed as u64, self.insert_id(sql)))
        }
    }

    /// Rowid generated by `sql`, if it is an insert that added a row
    ///
    /// Trigger inserts also set the flag, so only statements that are
    /// inserts themselves report an id.
    fn insert_id(&self, sql: &str) -> Option<i64> {
        let is_insert = match leading_keyword(sql).as_deref() {
            Some("insert") | Some("replace") => true,
            Some("with") => QueryKind::classify(sql) == QueryKind::Write,
            _ => false,
        };
        (is_insert && self.inserted.load(Ordering::Relaxed)).then(|| self.conn.last_insert_rowid())
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &Params, timeout: Duration) -> DriverResult<ResultSet> {
        let deadline = Instant::now() + timeout;
        self.conn
            .progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        let result = self.run(sql, params);
        self.conn.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);

        result.map_err(|failure| match failure {
            Failure::Bind(message) => DriverError::Bind(message),
            Failure::BeforeExecution(e) => classify(e, timeout, false),
            Failure::DuringExecution(e, writes) => classify(e, timeout, writes),
        })
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| DriverError::Query(e.to_string()))
    }
}

fn bind(stmt: &mut Statement<'_>, params: &Params) -> Result<(), Failure> {
    let expected = stmt.parameter_count();
    for (position, value) in params.iter() {
        if position == 0 || position > expected {
            return Err(Failure::Bind(format!(
                "position {} is out of range, statement takes {} parameter(s)",
                position, expected
            )));
        }
        let bound = match value {
            ParamValue::Text(s) => stmt.raw_bind_parameter(position, s.as_str()),
            ParamValue::Integer(i) => stmt.raw_bind_parameter(position, *i),
            ParamValue::Double(d) => stmt.raw_bind_parameter(position, *d),
        };
        bound.map_err(|e| {
            Failure::Bind(format!(
                "cannot bind {} at position {}: {}",
                value.type_name(),
                position,
                e
            ))
        })?;
    }
    if let Some(missing) = (1..=expected).find(|p| params.get(*p).is_none()) {
        return Err(Failure::Bind(format!("no value for position {}", missing)));
    }
    Ok(())
}

fn field_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Integer(i),
        ValueRef::Real(f) => FieldValue::Real(f),
        ValueRef::Text(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => FieldValue::Blob(bytes.to_vec()),
    }
}

fn classify(error: rusqlite::Error, timeout: Duration, effect_possible: bool) -> DriverError {
    let code = match &error {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
        _ => None,
    };
    match code {
        Some(ErrorCode::OperationInterrupted) => DriverError::Timeout(timeout),
        Some(ErrorCode::CannotOpen)
        | Some(ErrorCode::SystemIoFailure)
        | Some(ErrorCode::NotADatabase) => DriverError::ConnectionLost {
            message: error.to_string(),
            effect_possible,
        },
        _ => DriverError::Query(error.to_string()),
    }
}
