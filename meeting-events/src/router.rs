use std::future::ready;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::api::ResponseEnvelope;
use crate::config::UploadSettings;
use crate::prometheus::track_metrics;
use crate::sinks::{LogSink, MetricSink};
use crate::time::TimeSource;
use crate::upload;

pub const UPLOAD_PATH: &str = "/meeting-events";

#[derive(Clone)]
pub struct State {
    pub log_sink: Arc<dyn LogSink + Send + Sync>,
    pub metric_sink: Arc<dyn MetricSink + Send + Sync>,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
    pub settings: Arc<UploadSettings>,
    pub envelope: ResponseEnvelope,
}

async fn index() -> &'static str {
    "meeting-events"
}

pub fn router<TZ: TimeSource + Send + Sync + 'static>(
    timesource: TZ,
    log_sink: Arc<dyn LogSink + Send + Sync>,
    metric_sink: Arc<dyn MetricSink + Send + Sync>,
    settings: UploadSettings,
    envelope: ResponseEnvelope,
    max_body_size: usize,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = State {
        log_sink,
        metric_sink,
        timesource: Arc::new(timesource),
        settings: Arc::new(settings),
        envelope,
    };

    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index)) // no background loops to watch
        .route(
            UPLOAD_PATH,
            post(upload::upload)
                .options(upload::options)
                .layer(DefaultBodyLimit::max(max_body_size)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // The recorder is global, so it is only installed by the binary and never by tests
    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}
