//! Domain model (ids, host values, errors).

pub mod errors;
pub mod ids;
pub mod value;

pub use self::errors::{DatabaseError, InitError, LookupError, StrandError};
pub use self::ids::{CallbackRef, EntityId, Epoch, IdentityToken, TaskId};
pub use self::value::{HostValue, TaskArgument};
