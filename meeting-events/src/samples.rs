use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::instrument;

use crate::api::UploadError;
use crate::event::{MeetingEvent, MeetingEventBatch};
use crate::sinks::{MetricSink, SinkError};

pub const MEETING_START_SUCCEEDED: &str = "meetingStartSucceeded";
pub const MEETING_START_DURATION_METRIC: &str = "meetingStartDurationMs";
pub const SDK_NAME_DIMENSION: &str = "sdkName";

const ISO_MILLIS: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricUnit {
    Milliseconds,
}

/// A numeric data point derived from one metric-eligible event.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricSample {
    pub metric_name: &'static str,
    pub timestamp: OffsetDateTime,
    pub value: f64,
    pub unit: MetricUnit,
    pub sdk_name: String,
}

impl MetricSample {
    pub fn timestamp_millis(&self) -> i64 {
        let millis = self.timestamp.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis).unwrap_or(i64::MAX)
    }

    /// ISO-8601 rendering of the timestamp, e.g. `1970-01-01T00:00:01.000Z`.
    pub fn iso_timestamp(&self) -> Result<String, SinkError> {
        self.timestamp
            .format(ISO_MILLIS)
            .map_err(|e| SinkError::InvalidRecord(e.to_string()))
    }

    pub fn dimensions(&self) -> [(&'static str, &str); 1] {
        [(SDK_NAME_DIMENSION, self.sdk_name.as_str())]
    }
}

/// The start duration of a metric-eligible event: a `meetingStartSucceeded` with a
/// positive `meetingStartDurationMs`.
fn eligible_duration(event: &MeetingEvent) -> Option<f64> {
    if event.name() != Some(MEETING_START_SUCCEEDED) {
        return None;
    }
    event
        .meeting_start_duration_ms()
        .filter(|duration| *duration > 0.0)
}

fn to_sample(event: &MeetingEvent, duration_ms: f64) -> Result<MetricSample, SinkError> {
    let timestamp_ms = event
        .timestamp_ms()
        .ok_or_else(|| SinkError::InvalidRecord(String::from("missing timestampMs")))?;
    let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .map_err(|e| SinkError::InvalidRecord(format!("invalid timestampMs: {e}")))?;
    let sdk_name = event
        .sdk_name()
        .ok_or_else(|| SinkError::InvalidRecord(String::from("missing sdkName")))?;

    Ok(MetricSample {
        metric_name: MEETING_START_DURATION_METRIC,
        timestamp,
        value: duration_ms,
        unit: MetricUnit::Milliseconds,
        sdk_name: sdk_name.to_owned(),
    })
}

/// Keeps the metric-eligible events and turns each into a sample. Other events are
/// dropped silently.
pub fn extract_samples(batch: &MeetingEventBatch) -> Result<Vec<MetricSample>, SinkError> {
    batch
        .events
        .iter()
        .filter_map(|event| {
            eligible_duration(event).map(|duration| to_sample(event, duration))
        })
        .collect()
}

/// Submits the samples of a batch in a single write. Returns how many were sent;
/// a batch without eligible events never reaches the sink.
#[instrument(skip_all, fields(events = batch.len(), samples))]
pub async fn publish_metric_data(
    sink: &(dyn MetricSink + Send + Sync),
    namespace: &str,
    batch: &MeetingEventBatch,
) -> Result<usize, UploadError> {
    let samples = extract_samples(batch).map_err(UploadError::MetricPublishFailed)?;
    tracing::Span::current().record("samples", samples.len());

    if samples.is_empty() {
        return Ok(0);
    }

    let count = samples.len();
    sink.write_samples(namespace, samples)
        .await
        .map_err(UploadError::MetricPublishFailed)?;

    Ok(count)
}
