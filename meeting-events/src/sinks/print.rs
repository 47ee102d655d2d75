use async_trait::async_trait;

use metrics::{counter, histogram};
use tracing::info;

use crate::logs::LogRecord;
use crate::samples::MetricSample;
use crate::sinks::{LogSink, MetricSink, SinkError};

/// Writes everything to the service log. Only meant for local debugging.
pub struct PrintSink {}

#[async_trait]
impl LogSink for PrintSink {
    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        info!("created stream {stream} in log group {group}");
        Ok(())
    }

    async fn append_records(
        &self,
        group: &str,
        stream: &str,
        records: Vec<LogRecord>,
    ) -> Result<(), SinkError> {
        let span = tracing::span!(tracing::Level::INFO, "log records", group, stream);
        let _enter = span.enter();

        counter!("meeting_events_logged_total").increment(records.len() as u64);
        for record in records {
            info!("record at {}: {}", record.timestamp_ms, record.message);
        }

        Ok(())
    }
}

#[async_trait]
impl MetricSink for PrintSink {
    async fn write_samples(
        &self,
        namespace: &str,
        samples: Vec<MetricSample>,
    ) -> Result<(), SinkError> {
        let span = tracing::span!(tracing::Level::INFO, "metric samples", namespace);
        let _enter = span.enter();

        histogram!("meeting_event_samples_batch_size").record(samples.len() as f64);
        counter!("meeting_event_samples_published_total").increment(samples.len() as u64);
        for sample in samples {
            info!(
                "sample {} at {}: {} {:?} {:?}",
                sample.metric_name,
                sample.iso_timestamp()?,
                sample.value,
                sample.unit,
                sample.dimensions()
            );
        }

        Ok(())
    }
}
