use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    application::repos::{RepoError, ValuesRepo},
    domain::{entities::ValueRecord, index::ValueIndex},
};

use super::{PostgresRepositories, map_sqlx_error};

const SOURCE: &str = "values_api::infra::db::values";

#[derive(sqlx::FromRow)]
struct ValueRow {
    number: Option<i32>,
}

#[async_trait]
impl ValuesRepo for PostgresRepositories {
    async fn init(&self) -> Result<(), RepoError> {
        let result = sqlx::query("CREATE TABLE IF NOT EXISTS values (number INT)")
            .execute(self.pool())
            .await;

        match result {
            Ok(_) => {
                info!(target = SOURCE, "values table ready");
                Ok(())
            }
            Err(err) => {
                error!(target = SOURCE, error = %err, "failed to create values table");
                Err(map_sqlx_error(err))
            }
        }
    }

    async fn insert(&self, index: ValueIndex) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO values (number) VALUES ($1)")
            .bind(index.get())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ValueRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ValueRow>("SELECT number FROM values")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        // The column is nullable in the bootstrap schema; this service never
        // writes NULL, so such rows come from outside and are skipped.
        Ok(rows
            .into_iter()
            .filter_map(|row| row.number)
            .map(|number| ValueRecord { number })
            .collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await
    }
}
