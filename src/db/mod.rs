//! SQLite persistence.
//!
//! This module provides:
//! - Database initialization, pragmas and schema
//! - `Repository`, the SQLite implementation of the settlement `Store`

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, schema_ready};
pub use repo::Repository;
