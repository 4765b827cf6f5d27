//! Impls - ports の実装
//!
//! - **MaterializedResult**: 全行をコピー済みの ResultSet
//! - **SqliteConnector**: rusqlite による Connector

pub mod materialized;
pub mod sqlite;

pub use self::materialized::MaterializedResult;
pub use self::sqlite::{SqliteConnection, SqliteConnector};
