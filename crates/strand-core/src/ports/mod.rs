//! Ports - collaborator interfaces.
//!
//! The database and the host runtime are external systems; everything the
//! bridge needs from them goes through these traits.

pub mod database;
pub mod host;
pub mod id_generator;

pub use self::database::{Connection, ConnectOptions, Connector, ResultSet};
pub use self::host::{CallFrame, HostRuntime, ThreadHandle};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator};
