use std::fmt;

use tracing::instrument;

use crate::api::UploadError;
use crate::event::MeetingEventBatch;
use crate::sinks::{LogSink, SinkError};
use crate::time::TimeSource;

/// One entry appended to a log stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub timestamp_ms: i64,
}

/// Name of the stream holding a single upload.
///
/// Two uploads for the same meeting and attendee within the same millisecond
/// collide; the second stream creation then fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogStreamIdentity {
    pub meeting_id: String,
    pub attendee_id: String,
    pub created_at_ms: i64,
}

impl LogStreamIdentity {
    pub fn new(batch: &MeetingEventBatch, created_at_ms: i64) -> LogStreamIdentity {
        LogStreamIdentity {
            meeting_id: batch.meeting_id.clone(),
            attendee_id: batch.attendee_id.clone(),
            created_at_ms,
        }
    }
}

impl fmt::Display for LogStreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/meeting-events/{}/{}/{}",
            self.meeting_id, self.attendee_id, self.created_at_ms
        )
    }
}

/// Turns every event into a record, keeping batch order. Timestamps are passed
/// through untouched, the backend decides what to do with out of order records.
pub fn build_records(batch: &MeetingEventBatch) -> Result<Vec<LogRecord>, SinkError> {
    batch
        .events
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let timestamp_ms = event.timestamp_ms().ok_or_else(|| {
                SinkError::InvalidRecord(format!("event {index} has no integer timestampMs"))
            })?;
            let message = serde_json::to_string(event)
                .map_err(|e| SinkError::InvalidRecord(e.to_string()))?;

            Ok(LogRecord {
                message,
                timestamp_ms,
            })
        })
        .collect()
}

/// Creates a fresh stream for the batch and appends every event to it.
#[instrument(skip_all, fields(events = batch.len(), stream))]
pub async fn publish_log_events(
    sink: &(dyn LogSink + Send + Sync),
    timesource: &(dyn TimeSource + Send + Sync),
    group: &str,
    batch: &MeetingEventBatch,
) -> Result<LogStreamIdentity, UploadError> {
    let records = build_records(batch).map_err(UploadError::LogPublishFailed)?;

    let identity = LogStreamIdentity::new(batch, timesource.now_millis());
    let stream = identity.to_string();
    tracing::Span::current().record("stream", stream.as_str());

    sink.create_stream(group, &stream)
        .await
        .map_err(UploadError::LogPublishFailed)?;
    sink.append_records(group, &stream, records)
        .await
        .map_err(UploadError::LogPublishFailed)?;

    Ok(identity)
}
