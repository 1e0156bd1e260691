//! Collaborator implementations: Postgres for production, in-memory for
//! tests and database-free runs.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryRefreshTokenStore, MemoryUserStore};
pub use postgres::{PostgresRefreshTokenStore, PostgresUserStore};
