use async_trait::async_trait;
use thiserror::Error;

use crate::logs::LogRecord;
use crate::samples::MetricSample;

pub mod cloudwatch;
pub mod print;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("request rejected by backend: {0}")]
    Backend(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Append-only log storage, organised in groups of named streams.
#[async_trait]
pub trait LogSink {
    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;
    async fn append_records(
        &self,
        group: &str,
        stream: &str,
        records: Vec<LogRecord>,
    ) -> Result<(), SinkError>;
}

/// Metrics storage accepting timestamped samples under a namespace.
#[async_trait]
pub trait MetricSink {
    async fn write_samples(
        &self,
        namespace: &str,
        samples: Vec<MetricSample>,
    ) -> Result<(), SinkError>;
}
