//! Database models and queries

pub mod forum;
pub mod init;
pub mod migrations;
pub mod models;
pub mod schools;
pub mod users;

pub use init::{init_database, init_in_memory_database};
pub use models::*;
