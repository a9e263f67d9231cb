//! Database layer for music-dl
//!
//! SQLite persistence for the instance directory: the redundant provider
//! endpoints each user registered.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`instances`]: Instance CRUD and the [`InstanceDirectory`](crate::provider::InstanceDirectory) impl

use sqlx::{FromRow, sqlite::SqlitePool};

mod instances;
mod migrations;

/// New instance to be registered
#[derive(Debug, Clone)]
pub struct NewInstance<'a> {
    /// Owning user
    pub user_id: u64,
    /// Provider API the instance speaks (e.g. "hifi")
    pub api: &'a str,
    /// Upstream catalogue behind the API (e.g. "tidal")
    pub provider: &'a str,
    /// Base url of the instance
    pub url: &'a str,
}

/// Instance record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Instance {
    /// Unique database ID
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Provider API the instance speaks
    pub api: String,
    /// Upstream catalogue behind the API
    pub provider: String,
    /// Base url of the instance
    pub url: String,
    /// Unix timestamp when the instance was registered
    pub created_at: i64,
}

/// Database handle for music-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
