//! Database layer - connection pool, schema and repositories
//!
//! - Rely on DB constraints and map violations, no check-then-insert
//! - `max + 1` ordering runs inside the inserting transaction with the board row locked
//! - Soft-deleted rows stay in place; every default query filters `deleted_at IS NULL`

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{connect, create_pool, ping, PoolSettings};
pub use repos::{DbError, PgStore};
