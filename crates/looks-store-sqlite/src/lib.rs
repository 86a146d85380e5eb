//! SQLite backend for the looks vote store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Because every call is funnelled through
//! that single connection thread, upserts on the same key are applied strictly
//! in arrival order.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::REFRESH_TRIGGER;
pub use store::SqliteStore;
