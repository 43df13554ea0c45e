use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::values::{ReadError, SubmitError},
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

/// Error returned by HTTP handlers: a public message plus the internal report.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn internal(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error",
            detail,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.public_message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<DomainError> for HttpError {
    fn from(error: DomainError) -> Self {
        let status = if error.is_policy() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::BAD_REQUEST
        };
        let public_message = match error {
            DomainError::MissingIndex => "index required",
            DomainError::NotAnInteger => "index must be an integer",
            DomainError::TooLarge { .. } => "index too high",
            DomainError::Negative => "index must not be negative",
        };
        HttpError::from_error(
            "application::error::domain_error_to_http_error",
            status,
            public_message,
            &error,
        )
    }
}

impl From<SubmitError> for HttpError {
    fn from(error: SubmitError) -> Self {
        match error {
            SubmitError::Rejected(err) => err.into(),
            err @ SubmitError::PersistenceFailed { .. } => HttpError::from_error(
                "application::error::submit_error_to_http_error",
                StatusCode::INTERNAL_SERVER_ERROR,
                "database error",
                &err,
            ),
        }
    }
}

impl From<ReadError> for HttpError {
    fn from(error: ReadError) -> Self {
        let public_message = match error {
            ReadError::Durable(_) => "database error",
            ReadError::Cache(_) => "redis error",
        };
        HttpError::from_error(
            "application::error::read_error_to_http_error",
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// Process-level failure surfaced from `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{CacheError, RepoError};
    use crate::domain::index::ValueIndex;

    #[test]
    fn policy_rejections_are_unprocessable() {
        let error = HttpError::from(DomainError::TooLarge { ceiling: 40 });
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let error = HttpError::from(DomainError::Negative);
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn malformed_input_is_bad_request() {
        let error = HttpError::from(SubmitError::Rejected(DomainError::MissingIndex));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_failure_keeps_source_chain() {
        let index = ValueIndex::parse(Some(&serde_json::json!(3)), 40).expect("valid index");
        let error = HttpError::from(SubmitError::PersistenceFailed {
            index,
            source: RepoError::Timeout,
        });

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            error.report.messages,
            vec![
                "failed to persist index 3".to_string(),
                "database timeout".to_string()
            ]
        );
    }

    #[test]
    fn configuration_errors_keep_their_type() {
        let error = AppError::from(LoadError::Invalid {
            key: "server.port",
            reason: "port must be greater than zero".to_string(),
        });

        assert!(matches!(
            &error,
            AppError::Config(LoadError::Invalid { key: "server.port", .. })
        ));
        assert_eq!(
            error.to_string(),
            "failed to load configuration: invalid configuration for `server.port`: port must be greater than zero"
        );
    }

    #[test]
    fn cache_read_failure_is_server_error() {
        let error = HttpError::from(ReadError::Cache(CacheError::command("HGETALL", "down")));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message, "redis error");
    }
}
