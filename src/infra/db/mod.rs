//! Postgres-backed durable store.

mod util;
mod values;

pub use util::map_sqlx_error;

use std::str::FromStr;

use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode},
    query,
};

use crate::application::repos::RepoError;
use crate::config::DatabaseSettings;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: PgPool,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Build a pool from resolved settings. Connections are opened lazily so
    /// a database that is still starting does not abort the process.
    pub fn connect_lazy(url: &str, settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
        let options = PgConnectOptions::from_str(url)?.ssl_mode(settings.ssl_mode);

        Ok(PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(options))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) async fn ping(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

/// Parse the textual ssl mode accepted in configuration.
pub fn parse_ssl_mode(value: &str) -> Result<PgSslMode, String> {
    PgSslMode::from_str(value).map_err(|err| format!("unknown ssl mode `{value}`: {err}"))
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, time::Duration};

    use super::*;

    fn settings() -> DatabaseSettings {
        DatabaseSettings {
            url: None,
            max_connections: NonZeroU32::MIN,
            ssl_mode: PgSslMode::Disable,
            acquire_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn clones_share_one_pool() {
        let pool = PostgresRepositories::connect_lazy(
            "postgres://values@127.0.0.1:1/values",
            &settings(),
        )
        .expect("valid url");
        let repositories = PostgresRepositories::new(pool);
        let clone = repositories.clone();

        repositories.close().await;

        assert!(clone.pool().is_closed());
    }

    #[test]
    fn ssl_modes_parse_by_name() {
        assert!(matches!(parse_ssl_mode("require"), Ok(PgSslMode::Require)));
        assert!(parse_ssl_mode("sometimes").is_err());
    }
}
