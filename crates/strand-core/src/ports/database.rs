//! Database port - the relational database collaborator.
//!
//! The bridge only needs three capabilities: open one connection, execute a
//! query on it, and walk an owned result set. Wire protocol and query
//! semantics stay behind these traits.

use serde::{Deserialize, Serialize};

use crate::domain::DatabaseError;

/// Parameters for opening the single shared connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

/// Opens connections and knows the backend's string escaping rules.
///
/// Shared between the host thread (escaping) and initialization (connect).
pub trait Connector: Send + Sync {
    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DatabaseError>;

    /// Escape `raw` for safe interpolation into a string literal.
    fn escape(&self, raw: &str) -> String;
}

/// One open connection. Owned by the worker thread for its whole life.
pub trait Connection: Send {
    /// Execute `query` and take ownership of its result.
    ///
    /// Statements that produce no columns still return a result set, with
    /// zero fields and zero rows.
    fn execute(&mut self, query: &str) -> Result<Box<dyn ResultSet>, DatabaseError>;

    /// Rows changed by the last statement.
    fn affected_rows(&self) -> u64;
}

/// An owned, cursor-based result set.
pub trait ResultSet: Send {
    fn num_rows(&self) -> u64;

    fn num_fields(&self) -> u32;

    /// Move the field cursor and return its previous position.
    fn field_seek(&mut self, offset: u32) -> u32;

    /// Name of the field under the cursor, advancing it.
    fn fetch_field(&mut self) -> Option<String>;

    /// Next row as nullable column strings, advancing the row cursor.
    fn fetch_row(&mut self) -> Option<Vec<Option<String>>>;
}
