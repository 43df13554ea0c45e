use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::values::{
    METRIC_CACHE_WRITE_FAILED, METRIC_INSERT_ACCEPTED, METRIC_INSERT_REJECTED,
    METRIC_PERSIST_FAILED, METRIC_PUBLISH_FAILED,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Route panics from any task through tracing so they reach the log pipeline.
///
/// The process keeps serving; the panicking task is the only casualty.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_default();
        let payload = panic_message(info.payload());
        tracing::error!(
            target = "values_api::panic",
            location = %location,
            payload = %payload,
            "task panicked"
        );
    }));
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_INSERT_ACCEPTED,
            Unit::Count,
            "Total number of indices durably recorded."
        );
        describe_counter!(
            METRIC_INSERT_REJECTED,
            Unit::Count,
            "Total number of submissions refused by validation or policy."
        );
        describe_counter!(
            METRIC_CACHE_WRITE_FAILED,
            Unit::Count,
            "Total number of placeholder cache writes that failed."
        );
        describe_counter!(
            METRIC_PUBLISH_FAILED,
            Unit::Count,
            "Total number of insert notifications that could not be published."
        );
        describe_counter!(
            METRIC_PERSIST_FAILED,
            Unit::Count,
            "Total number of durable inserts that failed."
        );
    });
}
