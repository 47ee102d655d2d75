use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::UploadError;

pub const NAME: &str = "name";
pub const MEETING_ID: &str = "meetingId";
pub const ATTENDEE_ID: &str = "attendeeId";
pub const TIMESTAMP_MS: &str = "timestampMs";
pub const MEETING_START_DURATION_MS: &str = "meetingStartDurationMs";
pub const SDK_NAME: &str = "sdkName";

/// One occurrence reported by a meeting client.
///
/// Everything besides `attributes`, `name` included, is kept as sent so the event
/// can be logged verbatim.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MeetingEvent {
    pub attributes: Map<String, Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl MeetingEvent {
    /// The event name, when the client sent one as a string.
    pub fn name(&self) -> Option<&str> {
        self.other.get(NAME).and_then(Value::as_str)
    }

    fn identity_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn meeting_id(&self) -> Option<&str> {
        self.identity_attribute(MEETING_ID)
    }

    pub fn attendee_id(&self) -> Option<&str> {
        self.identity_attribute(ATTENDEE_ID)
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        self.attributes.get(TIMESTAMP_MS).and_then(Value::as_i64)
    }

    pub fn meeting_start_duration_ms(&self) -> Option<f64> {
        self.attributes
            .get(MEETING_START_DURATION_MS)
            .and_then(Value::as_f64)
    }

    pub fn sdk_name(&self) -> Option<&str> {
        self.attributes.get(SDK_NAME).and_then(Value::as_str)
    }
}

/// A validated upload: every event, plus the identity read off the first one.
#[derive(Clone, Debug, PartialEq)]
pub struct MeetingEventBatch {
    pub meeting_id: String,
    pub attendee_id: String,
    pub events: Vec<MeetingEvent>,
}

impl MeetingEventBatch {
    /// Parses a request body. `Ok(None)` is an empty batch, which needs no publishing.
    pub fn from_bytes(
        bytes: &[u8],
        enforce_consistent_identity: bool,
    ) -> Result<Option<MeetingEventBatch>, UploadError> {
        tracing::debug!(len = bytes.len(), "decoding meeting events");

        let payload: Value = serde_json::from_slice(bytes)?;
        if !payload.is_array() {
            return Err(UploadError::MalformedPayload(String::from(
                "body is not a JSON array",
            )));
        }

        let events: Vec<MeetingEvent> = serde_json::from_value(payload)?;
        let Some(first) = events.first() else {
            return Ok(None);
        };

        let (Some(meeting_id), Some(attendee_id)) = (first.meeting_id(), first.attendee_id())
        else {
            return Err(UploadError::MissingIdentity);
        };
        let (meeting_id, attendee_id) = (meeting_id.to_owned(), attendee_id.to_owned());

        let batch = MeetingEventBatch {
            meeting_id,
            attendee_id,
            events,
        };

        if enforce_consistent_identity {
            batch.verify_identity()?;
        }

        Ok(Some(batch))
    }

    /// Checks that no event claims a different meeting or attendee than the first.
    /// Events without identity attributes are taken to belong to the batch.
    pub fn verify_identity(&self) -> Result<(), UploadError> {
        let mismatched = self.events.iter().any(|event| {
            event.meeting_id().is_some_and(|id| id != self.meeting_id)
                || event.attendee_id().is_some_and(|id| id != self.attendee_id)
        });

        if mismatched {
            return Err(UploadError::InconsistentIdentity);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
