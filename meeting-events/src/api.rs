use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sinks::SinkError;

pub const INVALID_INPUT_MESSAGE: &str =
    "Invalid input: Ensure that you pass a JSON array of meeting events";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Body of a successful upload: an empty JSON object.
#[derive(Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadResponse {}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to parse request: {0}")]
    MalformedPayload(String),
    #[error("first event is missing a meeting ID or attendee ID")]
    MissingIdentity,
    #[error("batch holds events for more than one meeting or attendee")]
    InconsistentIdentity,

    #[error("failed to publish log events: {0}")]
    LogPublishFailed(#[source] SinkError),
    #[error("failed to publish metric data: {0}")]
    MetricPublishFailed(#[source] SinkError),
}

impl UploadError {
    /// Label used when counting dropped batches.
    pub fn cause(&self) -> &'static str {
        match self {
            UploadError::MalformedPayload(_) => "malformed_payload",
            UploadError::MissingIdentity => "missing_identity",
            UploadError::InconsistentIdentity => "inconsistent_identity",
            UploadError::LogPublishFailed(_) | UploadError::MetricPublishFailed(_) => {
                "publish_failed"
            }
        }
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::MalformedPayload(err.to_string())
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        // Callers never learn which check failed or which sink broke.
        let (status, message) = match self {
            UploadError::MalformedPayload(_)
            | UploadError::MissingIdentity
            | UploadError::InconsistentIdentity => {
                (StatusCode::UNPROCESSABLE_ENTITY, INVALID_INPUT_MESSAGE)
            }

            UploadError::LogPublishFailed(_) | UploadError::MetricPublishFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message.to_owned(),
            }),
        )
            .into_response()
    }
}

/// Fixed headers attached to every response of the upload route.
#[derive(Clone, Debug)]
pub struct ResponseEnvelope {
    allow_origin: HeaderValue,
}

impl ResponseEnvelope {
    pub fn new(allow_origin: &str) -> Result<ResponseEnvelope, InvalidHeaderValue> {
        Ok(ResponseEnvelope {
            allow_origin: HeaderValue::from_str(allow_origin)?,
        })
    }

    pub fn wrap(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("OPTIONS,POST"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_share_one_response() {
        for err in [
            UploadError::MalformedPayload("oops".to_string()),
            UploadError::MissingIdentity,
            UploadError::InconsistentIdentity,
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn publish_errors_are_server_errors() {
        let log = UploadError::LogPublishFailed(SinkError::Backend("down".to_string()));
        let metric = UploadError::MetricPublishFailed(SinkError::Backend("down".to_string()));

        assert_eq!(log.cause(), "publish_failed");
        assert_eq!(
            log.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            metric.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn envelope_sets_cors_headers() {
        let envelope = ResponseEnvelope::new("https://example.com").unwrap();
        let response = envelope.wrap(StatusCode::OK);
        let headers = response.headers();

        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://example.com"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "OPTIONS,POST"
        );
        assert_eq!(
            headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn envelope_rejects_invalid_origin() {
        assert!(ResponseEnvelope::new("bad\norigin").is_err());
    }
}
