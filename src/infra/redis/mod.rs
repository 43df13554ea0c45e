//! Redis-backed value cache and insert notifications.
//!
//! The cache and the publisher each hold their own connection so a stalled
//! publish never queues behind cache commands. Connections are established in
//! the background; until one is ready its adapter fails every command with an
//! error the insert path already tolerates.

use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use ::redis::{
    AsyncCommands, Client, RedisResult,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use async_trait::async_trait;
use tokio::{sync::OnceCell, task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{
    application::repos::{CacheError, InsertPublisher, PublishError, ValuesCache},
    config::RedisSettings,
    domain::{entities::CacheSnapshot, index::ValueIndex},
};

const SOURCE: &str = "values_api::infra::redis";

/// Run `attempt` until it succeeds, sleeping exactly `interval` after every
/// failure. Returns the value and the number of attempts made.
pub(crate) async fn connect_until_ready<T, E, F, Fut>(
    role: &'static str,
    interval: Duration,
    mut attempt: F,
) -> (T, u64)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts: u64 = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return (value, attempts),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    role,
                    attempts,
                    retry_in_ms = interval.as_millis() as u64,
                    error = %err,
                    "redis connection attempt failed"
                );
                sleep(interval).await;
            }
        }
    }
}

/// A connection slot filled once the background connect succeeds.
#[derive(Clone)]
pub struct RedisLink {
    role: &'static str,
    slot: Arc<OnceCell<ConnectionManager>>,
}

impl RedisLink {
    pub fn pending(role: &'static str) -> Self {
        Self {
            role,
            slot: Arc::new(OnceCell::new()),
        }
    }

    pub fn ready(role: &'static str, conn: ConnectionManager) -> Self {
        Self {
            role,
            slot: Arc::new(OnceCell::new_with(Some(conn))),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        self.slot.initialized()
    }

    fn connection(&self) -> Option<ConnectionManager> {
        self.slot.get().cloned()
    }

    fn fill(&self, conn: ConnectionManager) {
        if self.slot.set(conn).is_err() {
            warn!(target = SOURCE, role = self.role, "redis link already connected");
        }
    }
}

/// Opens connections that retry at a constant interval.
#[derive(Clone)]
pub struct RedisConnector {
    client: Client,
    reconnect_interval: Duration,
}

impl RedisConnector {
    pub fn new(settings: &RedisSettings) -> RedisResult<Self> {
        Ok(Self {
            client: Client::open(settings.url.as_str())?,
            reconnect_interval: settings.reconnect_interval,
        })
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    // Retry pacing is owned by `connect_until_ready`; the manager makes a
    // single attempt per call.
    fn manager_config(&self) -> ConnectionManagerConfig {
        ConnectionManagerConfig::new().set_number_of_retries(0)
    }

    async fn connect_once(&self) -> RedisResult<ConnectionManager> {
        ConnectionManager::new_with_config(self.client.clone(), self.manager_config()).await
    }

    /// Connect now, retrying at the constant interval until Redis answers.
    pub async fn manager(&self, role: &'static str) -> ConnectionManager {
        let (conn, attempts) = connect_until_ready(role, self.reconnect_interval, || {
            let connector = self.clone();
            async move { connector.connect_once().await }
        })
        .await;
        info!(target = SOURCE, role, attempts, "redis connection established");
        conn
    }

    /// Return an unconnected link at once and fill it from a background task.
    pub fn spawn_link(&self, role: &'static str) -> (RedisLink, JoinHandle<()>) {
        let link = RedisLink::pending(role);
        let connector = self.clone();
        let target = link.clone();
        let handle = tokio::spawn(async move {
            let conn = connector.manager(role).await;
            target.fill(conn);
        });
        (link, handle)
    }
}

/// Cache entries live as fields of a single hash.
#[derive(Clone)]
pub struct RedisValuesCache {
    link: RedisLink,
    hash_key: String,
}

impl RedisValuesCache {
    pub fn new(link: RedisLink, hash_key: impl Into<String>) -> Self {
        Self {
            link,
            hash_key: hash_key.into(),
        }
    }

    fn connection(&self, command: &'static str) -> Result<ConnectionManager, CacheError> {
        self.link
            .connection()
            .ok_or_else(|| CacheError::command(command, "redis connection not established"))
    }
}

#[async_trait]
impl ValuesCache for RedisValuesCache {
    async fn set(&self, index: ValueIndex, value: &str) -> Result<(), CacheError> {
        let mut conn = self.connection("HSET")?;
        let _: () = conn
            .hset(&self.hash_key, index.get(), value)
            .await
            .map_err(|err| CacheError::command("HSET", err))?;
        Ok(())
    }

    async fn get_all(&self) -> Result<CacheSnapshot, CacheError> {
        let mut conn = self.connection("HGETALL")?;
        conn.hgetall(&self.hash_key)
            .await
            .map_err(|err| CacheError::command("HGETALL", err))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection("PING")?;
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| CacheError::command("PING", err))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisInsertPublisher {
    link: RedisLink,
}

impl RedisInsertPublisher {
    pub fn new(link: RedisLink) -> Self {
        Self { link }
    }
}

#[async_trait]
impl InsertPublisher for RedisInsertPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PublishError> {
        let mut conn = self
            .link
            .connection()
            .ok_or_else(|| PublishError::new(channel, "redis connection not established"))?;
        // The receiver count is not inspected: zero subscribers is not an error.
        let _: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(|err| PublishError::new(channel, err))?;
        Ok(())
    }
}
