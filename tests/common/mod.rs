//! In-memory store doubles and request helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

use values_api::application::repos::{
    CacheError, InsertPublisher, PublishError, RepoError, ValuesCache, ValuesRepo,
};
use values_api::application::values::{ValuesPolicy, ValuesService};
use values_api::domain::entities::{CacheSnapshot, ValueRecord};
use values_api::domain::index::ValueIndex;
use values_api::infra::http::{HttpState, build_router};

/// Durable rows, cache hash and published messages kept in memory, with
/// switches that simulate each dependency being unreachable.
#[derive(Default)]
pub struct MemoryStores {
    rows: Mutex<Vec<ValueRecord>>,
    cache: Mutex<CacheSnapshot>,
    published: Mutex<Vec<(String, String)>>,
    pub durable_down: AtomicBool,
    pub cache_down: AtomicBool,
    pub publisher_down: AtomicBool,
    pub panic_on_snapshot: AtomicBool,
}

impl MemoryStores {
    pub async fn rows(&self) -> Vec<ValueRecord> {
        self.rows.lock().await.clone()
    }

    pub async fn cache(&self) -> CacheSnapshot {
        self.cache.lock().await.clone()
    }

    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }

    /// Stand in for the external worker storing a computed value.
    pub async fn store_result(&self, index: i32, value: &str) {
        self.cache
            .lock()
            .await
            .insert(index.to_string(), value.to_string());
    }

    fn durable_unreachable(&self) -> Result<(), RepoError> {
        if self.durable_down.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn cache_unreachable(&self, command: &'static str) -> Result<(), CacheError> {
        if self.cache_down.load(Ordering::SeqCst) {
            return Err(CacheError::command(command, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ValuesRepo for MemoryStores {
    async fn init(&self) -> Result<(), RepoError> {
        self.durable_unreachable()
    }

    async fn insert(&self, index: ValueIndex) -> Result<(), RepoError> {
        self.durable_unreachable()?;
        self.rows.lock().await.push(ValueRecord {
            number: index.get(),
        });
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ValueRecord>, RepoError> {
        self.durable_unreachable()?;
        Ok(self.rows().await)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.durable_unreachable()
    }
}

#[async_trait]
impl ValuesCache for MemoryStores {
    async fn set(&self, index: ValueIndex, value: &str) -> Result<(), CacheError> {
        self.cache_unreachable("HSET")?;
        self.cache
            .lock()
            .await
            .insert(index.to_string(), value.to_string());
        Ok(())
    }

    async fn get_all(&self) -> Result<CacheSnapshot, CacheError> {
        if self.panic_on_snapshot.load(Ordering::SeqCst) {
            panic!("snapshot double asked to panic");
        }
        self.cache_unreachable("HGETALL")?;
        Ok(self.cache().await)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.cache_unreachable("PING")
    }
}

#[async_trait]
impl InsertPublisher for MemoryStores {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PublishError> {
        if self.publisher_down.load(Ordering::SeqCst) {
            return Err(PublishError::new(channel, "connection refused"));
        }
        self.published
            .lock()
            .await
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}

pub fn service(stores: &Arc<MemoryStores>) -> ValuesService {
    ValuesService::new(
        stores.clone(),
        stores.clone(),
        stores.clone(),
        ValuesPolicy::default(),
    )
}

pub fn app(stores: &Arc<MemoryStores>) -> Router {
    build_router(HttpState {
        values: Arc::new(service(stores)),
    })
}

/// Router over the in-memory durable store and caller-provided Redis adapters.
pub fn app_with(
    stores: &Arc<MemoryStores>,
    cache: Arc<dyn ValuesCache>,
    publisher: Arc<dyn InsertPublisher>,
) -> Router {
    let values = ValuesService::new(stores.clone(), cache, publisher, ValuesPolicy::default());
    build_router(HttpState {
        values: Arc::new(values),
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body should be json")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body should be utf-8")
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
        .to_vec();

    TestResponse { status, body }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, body: &str) -> TestResponse {
    send(app, Method::POST, "/values", Some(body)).await
}
