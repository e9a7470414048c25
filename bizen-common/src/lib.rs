//! # BIZEN Common Library
//!
//! Shared code for the BIZEN API service and its maintenance tools:
//! - Database initialization, migrations, models and queries
//! - Course structure (modules, sections, quiz pages)
//! - Section/module progression gating
//! - Hosted identity provider client
//! - Configuration loading

pub mod config;
pub mod curriculum;
pub mod db;
pub mod error;
pub mod identity;
pub mod progression;

pub use curriculum::Curriculum;
pub use error::{Error, Result};
pub use progression::Progression;
