//! SQLite-backed store of cache generations and their entries.
//!
//! Async access goes through tokio-rusqlite. Each generation is a named
//! collection of request/response snapshots; deleting a generation removes
//! its entries with it.

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
