//! Store traits the values service is built on.
//!
//! Production wires the Postgres and Redis adapters from `infra`; tests inject
//! in-memory doubles.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{CacheSnapshot, ValueRecord};
use crate::domain::index::ValueIndex;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
#[error("publish to `{channel}` failed: {message}")]
pub struct PublishError {
    pub channel: String,
    pub message: String,
}

impl PublishError {
    pub fn new(channel: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self {
            channel: channel.into(),
            message: err.to_string(),
        }
    }
}

/// The durable, append-only log of submitted indices.
#[async_trait]
pub trait ValuesRepo: Send + Sync {
    /// Create the backing table when it does not exist yet.
    async fn init(&self) -> Result<(), RepoError>;

    async fn insert(&self, index: ValueIndex) -> Result<(), RepoError>;

    /// Every stored row in insertion-consistent order.
    async fn list_all(&self) -> Result<Vec<ValueRecord>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

/// The derived value cache keyed by index.
#[async_trait]
pub trait ValuesCache: Send + Sync {
    async fn set(&self, index: ValueIndex, value: &str) -> Result<(), CacheError>;

    /// Current entries; an absent hash yields an empty snapshot.
    async fn get_all(&self) -> Result<CacheSnapshot, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// One-way announcement of accepted inserts.
#[async_trait]
pub trait InsertPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PublishError>;
}
