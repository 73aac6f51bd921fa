//! PostgreSQL pool setup and liveness

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use mushbbs_core::config::ServerSection;

/// Pool sizing, taken from the `[server]` config section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long a request may wait for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ServerSection> for PoolSettings {
    fn from(server: &ServerSection) -> Self {
        Self {
            max_connections: server.max_connections.max(1),
            ..Self::default()
        }
    }
}

/// Connect with default settings. Used by `migrate` and the database tests.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    connect(database_url, PoolSettings::default()).await
}

/// Connect and verify one connection can be acquired.
pub async fn connect(database_url: &str, settings: PoolSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(database_url)
        .await?;

    tracing::debug!(
        max_connections = settings.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Round-trip a trivial query; backs the health endpoint
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_server_section() {
        let section = ServerSection {
            max_connections: 25,
            ..ServerSection::default()
        };
        let settings = PoolSettings::from(&section);
        assert_eq!(settings.max_connections, 25);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(5));

        let zero = ServerSection {
            max_connections: 0,
            ..ServerSection::default()
        };
        assert_eq!(PoolSettings::from(&zero).max_connections, 1);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn ping_round_trips() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.expect("pool creation failed");
        ping(&pool).await.expect("ping failed");
    }
}
