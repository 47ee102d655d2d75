#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Barrier;
use tower::ServiceExt;

use meeting_events::api::ResponseEnvelope;
use meeting_events::config::UploadSettings;
use meeting_events::logs::LogRecord;
use meeting_events::router::{router, UPLOAD_PATH};
use meeting_events::samples::MetricSample;
use meeting_events::sinks::{LogSink, MetricSink, SinkError};
use meeting_events::time::FixedTime;

pub const NOW_MS: i64 = 1_700_000_000_000;
pub const LOG_GROUP: &str = "/chime/meeting-events";
pub const NAMESPACE: &str = "MeetingEvents";
pub const ALLOWED_ORIGIN: &str = "https://dashboard.example.com";
pub const MAX_BODY_SIZE: usize = 64 * 1024;

static TRACING_INIT: Once = Once::new();
pub fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::TestWriter::new())
            .init()
    });
}

#[derive(Clone, Default)]
pub struct MemoryLogSink {
    pub fail_create: bool,
    pub fail_append: bool,
    pub barrier: Option<Arc<Barrier>>,
    pub streams: Arc<Mutex<Vec<(String, String)>>>,
    pub records: Arc<Mutex<Vec<(String, LogRecord)>>>,
}

impl MemoryLogSink {
    pub fn streams(&self) -> Vec<(String, String)> {
        self.streams.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<(String, LogRecord)> {
        self.records.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.streams.lock().unwrap().len() + self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.fail_create {
            return Err(SinkError::Backend("ResourceNotFoundException".to_string()));
        }
        self.streams
            .lock()
            .unwrap()
            .push((group.to_string(), stream.to_string()));
        Ok(())
    }

    async fn append_records(
        &self,
        _group: &str,
        stream: &str,
        records: Vec<LogRecord>,
    ) -> Result<(), SinkError> {
        if self.fail_append {
            return Err(SinkError::Backend("InvalidParameterException".to_string()));
        }
        let mut stored = self.records.lock().unwrap();
        stored.extend(records.into_iter().map(|r| (stream.to_string(), r)));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryMetricSink {
    pub fail: bool,
    pub barrier: Option<Arc<Barrier>>,
    pub writes: Arc<Mutex<Vec<(String, Vec<MetricSample>)>>>,
}

impl MemoryMetricSink {
    pub fn writes(&self) -> Vec<(String, Vec<MetricSample>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricSink for MemoryMetricSink {
    async fn write_samples(
        &self,
        namespace: &str,
        samples: Vec<MetricSample>,
    ) -> Result<(), SinkError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.fail {
            return Err(SinkError::Backend("Throttling".to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((namespace.to_string(), samples));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub logs: MemoryLogSink,
    pub metrics: MemoryMetricSink,
}

impl TestApp {
    pub fn new(logs: MemoryLogSink, metrics: MemoryMetricSink) -> TestApp {
        Self::with_settings(
            logs,
            metrics,
            UploadSettings {
                log_group_name: LOG_GROUP.to_string(),
                metric_namespace: NAMESPACE.to_string(),
                enforce_consistent_identity: false,
            },
        )
    }

    pub fn with_settings(
        logs: MemoryLogSink,
        metrics: MemoryMetricSink,
        settings: UploadSettings,
    ) -> TestApp {
        setup_tracing();
        let router = router(
            FixedTime { millis: NOW_MS },
            Arc::new(logs.clone()),
            Arc::new(metrics.clone()),
            settings,
            ResponseEnvelope::new(ALLOWED_ORIGIN).unwrap(),
            MAX_BODY_SIZE,
            None,
        );

        TestApp {
            router,
            logs,
            metrics,
        }
    }

    pub async fn post(&self, body: impl Into<Body>) -> TestResponse {
        self.request(Method::POST, body.into()).await
    }

    pub async fn request(&self, method: Method, body: Body) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(UPLOAD_PATH)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body: serde_json::from_slice(&body).unwrap(),
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn assert_envelope(&self) {
        assert_eq!(
            self.headers
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            ALLOWED_ORIGIN
        );
        assert_eq!(
            self.headers
                .get(header::ACCESS_CONTROL_ALLOW_METHODS)
                .unwrap(),
            "OPTIONS,POST"
        );
        assert_eq!(
            self.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
