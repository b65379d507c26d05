//! Synchronous persistence operations over a borrowed SQLite connection.

pub mod lotes;
pub mod users;
