//! Insert coordination and the two read paths over the value stores.
//!
//! An accepted insert touches the stores in a fixed order: the cache entry is
//! primed with the placeholder, the index is announced on the notification
//! channel, and only then is the row written to the durable store. The first
//! two steps are best-effort; only the durable write can fail the request.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CacheError, InsertPublisher, RepoError, ValuesCache, ValuesRepo,
};
use crate::domain::entities::{CacheSnapshot, ValueRecord};
use crate::domain::error::DomainError;
use crate::domain::index::{DEFAULT_CEILING, ValueIndex};

const SOURCE: &str = "values_api::application::values";

pub const DEFAULT_PLACEHOLDER: &str = "Nothing yet!";
pub const DEFAULT_CHANNEL: &str = "insert";

pub const METRIC_INSERT_ACCEPTED: &str = "values_api_insert_accepted_total";
pub const METRIC_INSERT_REJECTED: &str = "values_api_insert_rejected_total";
pub const METRIC_CACHE_WRITE_FAILED: &str = "values_api_cache_write_failed_total";
pub const METRIC_PUBLISH_FAILED: &str = "values_api_publish_failed_total";
pub const METRIC_PERSIST_FAILED: &str = "values_api_persist_failed_total";

/// Tunables for the insert path.
#[derive(Debug, Clone)]
pub struct ValuesPolicy {
    pub ceiling: i32,
    pub placeholder: String,
    pub channel: String,
}

impl Default for ValuesPolicy {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub index: ValueIndex,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] DomainError),
    #[error("failed to persist index {index}")]
    PersistenceFailed {
        index: ValueIndex,
        #[source]
        source: RepoError,
    },
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("durable store read failed")]
    Durable(#[source] RepoError),
    #[error("cache read failed")]
    Cache(#[source] CacheError),
}

#[derive(Clone)]
pub struct ValuesService {
    repo: Arc<dyn ValuesRepo>,
    cache: Arc<dyn ValuesCache>,
    publisher: Arc<dyn InsertPublisher>,
    policy: ValuesPolicy,
}

impl ValuesService {
    pub fn new(
        repo: Arc<dyn ValuesRepo>,
        cache: Arc<dyn ValuesCache>,
        publisher: Arc<dyn InsertPublisher>,
        policy: ValuesPolicy,
    ) -> Self {
        Self {
            repo,
            cache,
            publisher,
            policy,
        }
    }

    pub fn policy(&self) -> &ValuesPolicy {
        &self.policy
    }

    /// Validate and record one index.
    ///
    /// Rejections happen before any store is touched.
    pub async fn submit(&self, raw: Option<&Value>) -> Result<Accepted, SubmitError> {
        let index = match ValueIndex::parse(raw, self.policy.ceiling) {
            Ok(index) => index,
            Err(err) => {
                counter!(METRIC_INSERT_REJECTED, "reason" => err.reason()).increment(1);
                return Err(err.into());
            }
        };

        self.prime_cache(index).await;
        self.announce(index).await;

        if let Err(source) = self.repo.insert(index).await {
            counter!(METRIC_PERSIST_FAILED).increment(1);
            return Err(SubmitError::PersistenceFailed { index, source });
        }

        counter!(METRIC_INSERT_ACCEPTED).increment(1);
        info!(target = SOURCE, index = index.get(), "index accepted");
        Ok(Accepted { index })
    }

    pub async fn list_durable(&self) -> Result<Vec<ValueRecord>, ReadError> {
        self.repo.list_all().await.map_err(ReadError::Durable)
    }

    pub async fn snapshot_cache(&self) -> Result<CacheSnapshot, ReadError> {
        self.cache.get_all().await.map_err(ReadError::Cache)
    }

    pub async fn durable_health(&self) -> Result<(), RepoError> {
        self.repo.health_check().await
    }

    pub async fn cache_health(&self) -> Result<(), CacheError> {
        self.cache.ping().await
    }

    async fn prime_cache(&self, index: ValueIndex) {
        if let Err(err) = self.cache.set(index, &self.policy.placeholder).await {
            counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
            warn!(
                target = SOURCE,
                index = index.get(),
                error = %err,
                "cache write failed, continuing with insert"
            );
        }
    }

    async fn announce(&self, index: ValueIndex) {
        let payload = index.to_string();
        if let Err(err) = self.publisher.publish(&self.policy.channel, &payload).await {
            counter!(METRIC_PUBLISH_FAILED).increment(1);
            warn!(
                target = SOURCE,
                index = index.get(),
                channel = %self.policy.channel,
                error = %err,
                "insert notification dropped"
            );
        }
    }
}
