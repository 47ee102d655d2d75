use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};
use aws_sdk_cloudwatch::Client as CloudWatchClient;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client as CloudWatchLogsClient;
use metrics::{counter, histogram};
use tracing::{error, info, instrument, warn};

use crate::logs::LogRecord;
use crate::samples::{MetricSample, MetricUnit};
use crate::sinks::{LogSink, MetricSink, SinkError};

/// Loads the shared AWS configuration, optionally pointing every client at a custom
/// endpoint (localstack in development).
pub async fn load_aws_config(endpoint: Option<String>) -> SdkConfig {
    let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(endpoint) = endpoint {
        info!("using custom AWS endpoint {}", endpoint);
        config_loader = config_loader.endpoint_url(endpoint);
    }

    config_loader.load().await
}

#[derive(Clone)]
pub struct CloudWatchLogsSink {
    client: CloudWatchLogsClient,
}

impl CloudWatchLogsSink {
    pub fn new(config: &SdkConfig) -> CloudWatchLogsSink {
        CloudWatchLogsSink {
            client: CloudWatchLogsClient::new(config),
        }
    }
}

#[async_trait]
impl LogSink for CloudWatchLogsSink {
    #[instrument(skip_all)]
    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(stream)
            .send()
            .await
            .map_err(|e| {
                let e = aws_sdk_cloudwatchlogs::error::DisplayErrorContext(e);
                error!("failed to create log stream {}: {}", stream, e);
                SinkError::Backend(e.to_string())
            })?;

        Ok(())
    }

    #[instrument(skip_all, fields(records = records.len()))]
    async fn append_records(
        &self,
        group: &str,
        stream: &str,
        records: Vec<LogRecord>,
    ) -> Result<(), SinkError> {
        let count = records.len();
        let log_events = records
            .into_iter()
            .map(|record| {
                InputLogEvent::builder()
                    .message(record.message)
                    .timestamp(record.timestamp_ms)
                    .build()
                    .map_err(|e| SinkError::InvalidRecord(e.to_string()))
            })
            .collect::<Result<Vec<InputLogEvent>, SinkError>>()?;

        let output = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .set_log_events(Some(log_events))
            .send()
            .await
            .map_err(|e| {
                let e = aws_sdk_cloudwatchlogs::error::DisplayErrorContext(e);
                error!("failed to put log events to {}: {}", stream, e);
                SinkError::Backend(e.to_string())
            })?;

        // The call succeeds even when some records fall outside the accepted time
        // window; those are silently dropped by the backend.
        if let Some(rejected) = output.rejected_log_events_info() {
            counter!("meeting_events_rejected_by_backend_total").increment(1);
            warn!("backend rejected part of the batch: {:?}", rejected);
        }

        counter!("meeting_events_logged_total").increment(count as u64);
        Ok(())
    }
}

#[derive(Clone)]
pub struct CloudWatchMetricsSink {
    client: CloudWatchClient,
}

impl CloudWatchMetricsSink {
    pub fn new(config: &SdkConfig) -> CloudWatchMetricsSink {
        CloudWatchMetricsSink {
            client: CloudWatchClient::new(config),
        }
    }
}

fn to_datum(sample: &MetricSample) -> Result<MetricDatum, SinkError> {
    let unit = match sample.unit {
        MetricUnit::Milliseconds => StandardUnit::Milliseconds,
    };
    let dimensions = sample
        .dimensions()
        .into_iter()
        .map(|(name, value)| {
            Ok(Dimension::builder()
                .name(name)
                .value(value)
                .build())
        })
        .collect::<Result<Vec<Dimension>, SinkError>>()?;

    Ok(MetricDatum::builder()
        .metric_name(sample.metric_name)
        .timestamp(DateTime::from_millis(sample.timestamp_millis()))
        .value(sample.value)
        .unit(unit)
        .set_dimensions(Some(dimensions))
        .build())
}

#[async_trait]
impl MetricSink for CloudWatchMetricsSink {
    #[instrument(skip_all, fields(samples = samples.len()))]
    async fn write_samples(
        &self,
        namespace: &str,
        samples: Vec<MetricSample>,
    ) -> Result<(), SinkError> {
        let metric_data = samples
            .iter()
            .map(to_datum)
            .collect::<Result<Vec<MetricDatum>, SinkError>>()?;

        self.client
            .put_metric_data()
            .namespace(namespace)
            .set_metric_data(Some(metric_data))
            .send()
            .await
            .map_err(|e| {
                let e = aws_sdk_cloudwatch::error::DisplayErrorContext(e);
                error!("failed to put metric data to {}: {}", namespace, e);
                SinkError::Backend(e.to_string())
            })?;

        histogram!("meeting_event_samples_batch_size").record(samples.len() as f64);
        counter!("meeting_event_samples_published_total").increment(samples.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn converts_samples_to_datums() {
        let sample = MetricSample {
            metric_name: "meetingStartDurationMs",
            timestamp: datetime!(1970-01-01 0:00:01 UTC),
            value: 250.0,
            unit: MetricUnit::Milliseconds,
            sdk_name: "ios".to_string(),
        };

        let datum = format!("{:?}", to_datum(&sample).unwrap());
        assert!(datum.contains("meetingStartDurationMs"), "{datum}");
        assert!(datum.contains("250.0"), "{datum}");
        assert!(datum.contains("Milliseconds"), "{datum}");
        assert!(datum.contains("sdkName"), "{datum}");
        assert!(datum.contains("ios"), "{datum}");
    }
}
