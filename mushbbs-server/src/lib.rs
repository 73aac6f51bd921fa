//! mushbbs-server: PostgreSQL storage, session hub and HTTP routes for the
//! board engine in `mushbbs-core`.

pub mod db;
pub mod http;
pub mod hub;
pub mod state;

pub use db::{connect, create_pool, DbError, PgStore, PoolSettings};
pub use http::{router, run_server, ApiError, ServerConfig, ServerError};
pub use hub::SessionHub;
pub use state::AppState;
