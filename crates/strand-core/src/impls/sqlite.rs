//! SQLite connector.
//!
//! `database` is a file path; `:memory:` opens a private in-memory
//! database. Host, user, password and port are ignored.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Connection as SqliteHandle, OpenFlags};

use super::MaterializedResult;
use crate::domain::DatabaseError;
use crate::ports::{ConnectOptions, Connection, Connector, ResultSet};

const BUSY_TIMEOUT_MS: u64 = 100;

/// SQLITE_ERROR, used when the driver fails without an engine code.
const GENERIC_ERROR: u32 = 1;

#[derive(Debug, Clone)]
pub struct SqliteConnector {
    busy_timeout: Duration,
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteConnector {
    pub fn new() -> Self {
        Self {
            busy_timeout: Duration::from_millis(BUSY_TIMEOUT_MS),
        }
    }

    pub fn with_busy_timeout(busy_timeout: Duration) -> Self {
        Self { busy_timeout }
    }
}

impl Connector for SqliteConnector {
    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DatabaseError> {
        let path = if options.database.is_empty() {
            ":memory:"
        } else {
            options.database.as_str()
        };
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = SqliteHandle::open_with_flags(Path::new(path), flags).map_err(into_database_error)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(into_database_error)?;
        tracing::debug!(database = path, "sqlite connection opened");
        Ok(Box::new(SqliteConnection {
            conn,
            affected_rows: 0,
        }))
    }

    fn escape(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }
}

pub struct SqliteConnection {
    conn: SqliteHandle,
    affected_rows: u64,
}

impl Connection for SqliteConnection {
    fn execute(&mut self, query: &str) -> Result<Box<dyn ResultSet>, DatabaseError> {
        let mut stmt = self.conn.prepare(query).map_err(into_database_error)?;

        if stmt.column_count() == 0 {
            let changed = stmt.execute([]).map_err(into_database_error)?;
            self.affected_rows = changed as u64;
            return Ok(Box::new(MaterializedResult::empty()));
        }

        let fields: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = fields.len();
        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(into_database_error)?;
        while let Some(row) = cursor.next().map_err(into_database_error)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value = row.get_ref(i).map_err(into_database_error)?;
                values.push(render(value));
            }
            rows.push(values);
        }

        // SELECT reports the number of rows returned.
        self.affected_rows = rows.len() as u64;
        Ok(Box::new(MaterializedResult::new(fields, rows)))
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }
}

fn render(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(s) => Some(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

fn into_database_error(err: rusqlite::Error) -> DatabaseError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message) => DatabaseError::new(
            u32::try_from(failure.extended_code).unwrap_or(GENERIC_ERROR),
            message.clone().unwrap_or_else(|| failure.to_string()),
        ),
        _ => DatabaseError::new(GENERIC_ERROR, err.to_string()),
    }
}
