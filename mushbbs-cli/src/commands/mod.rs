//! Subcommand implementations

pub mod config;
pub mod lock;
pub mod migrate;
pub mod serve;

pub use config::run_config;
pub use lock::run_check_lock;
pub use migrate::run_migrate;
pub use serve::run_serve;
