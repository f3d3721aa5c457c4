//! SQLite backend for the venue payment engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
