//! SQLite backends for the obslog service.
//!
//! Two databases live here: the message store this service owns, and a
//! read-only view of one or more external exposure-registry databases.
//! Both wrap [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod encode;
mod schema;
mod sql;

pub mod error;
pub mod registry;
pub mod store;

pub use error::{Error, Result};
pub use registry::SqliteRegistry;
pub use store::SqliteMessageStore;
