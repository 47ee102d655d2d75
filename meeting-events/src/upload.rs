use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::instrument;

use crate::api::{ErrorResponse, UploadError, UploadResponse};
use crate::event::MeetingEventBatch;
use crate::logs::publish_log_events;
use crate::prometheus::report_dropped_batch;
use crate::router;
use crate::samples::publish_metric_data;

/// What happened to an accepted batch.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to publish.
    Empty,
    Published { events: usize, samples: usize },
}

/// Validates a body and fans it out to both sinks.
///
/// Both publishes always run to completion, even when the other one fails. A
/// failure on either side fails the whole batch, without undoing what the other
/// side already wrote.
#[instrument(skip_all, fields(batch_size, meeting_id, attendee_id))]
pub async fn process_batch(state: &router::State, body: &[u8]) -> Result<Outcome, UploadError> {
    let batch =
        match MeetingEventBatch::from_bytes(body, state.settings.enforce_consistent_identity)? {
            None => return Ok(Outcome::Empty),
            Some(batch) => batch,
        };

    let span = tracing::Span::current();
    span.record("batch_size", batch.len());
    span.record("meeting_id", batch.meeting_id.as_str());
    span.record("attendee_id", batch.attendee_id.as_str());

    counter!("meeting_events_received_total").increment(batch.len() as u64);
    histogram!("meeting_event_batch_size").record(batch.len() as f64);

    let (logged, published) = tokio::join!(
        publish_log_events(
            state.log_sink.as_ref(),
            state.timesource.as_ref(),
            &state.settings.log_group_name,
            &batch,
        ),
        publish_metric_data(
            state.metric_sink.as_ref(),
            &state.settings.metric_namespace,
            &batch,
        ),
    );

    match (logged, published) {
        (Ok(stream), Ok(samples)) => {
            tracing::debug!(stream = %stream, samples, "published batch");
            Ok(Outcome::Published {
                events: batch.len(),
                samples,
            })
        }
        (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
        (Err(log_err), Err(metric_err)) => {
            tracing::error!("both sinks failed, log sink: {}", log_err);
            Err(metric_err)
        }
    }
}

pub async fn upload(
    State(state): State<router::State>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!("failed to read request body: {}", rejection.body_text());
            let status = rejection.status();
            let error = ErrorResponse {
                error: rejection.body_text(),
            };
            return state.envelope.wrap((status, Json(error)));
        }
    };

    let result = match process_batch(&state, &body).await {
        Ok(_) => Ok(Json(UploadResponse::default())),
        Err(err) => {
            log_rejection(&err);
            Err(err)
        }
    };

    state.envelope.wrap(result)
}

pub async fn options(State(state): State<router::State>) -> Response {
    state.envelope.wrap(Json(UploadResponse::default()))
}

fn log_rejection(err: &UploadError) {
    match err {
        UploadError::LogPublishFailed(_) | UploadError::MetricPublishFailed(_) => {
            tracing::error!("failed to publish meeting events: {}", err);
        }
        _ => tracing::warn!("rejected invalid payload: {}", err),
    }
    report_dropped_batch(err.cause());
}
