//! Local database layer for Rollcall

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlGuestStore, LocalStore};
