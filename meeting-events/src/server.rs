use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::api::ResponseEnvelope;
use crate::config::Config;
use crate::prometheus::setup_metrics_recorder;
use crate::router;
use crate::sinks::cloudwatch::{load_aws_config, CloudWatchLogsSink, CloudWatchMetricsSink};
use crate::sinks::print::PrintSink;
use crate::sinks::{LogSink, MetricSink};

type Sinks = (
    Arc<dyn LogSink + Send + Sync>,
    Arc<dyn MetricSink + Send + Sync>,
);

async fn create_sinks(config: &Config) -> Sinks {
    if config.print_sink {
        tracing::warn!("print sink enabled, meeting events will only be logged locally");
        let sink = Arc::new(PrintSink {});
        let log_sink: Arc<dyn LogSink + Send + Sync> = sink.clone();
        let metric_sink: Arc<dyn MetricSink + Send + Sync> = sink;
        (log_sink, metric_sink)
    } else {
        let aws_config = load_aws_config(config.aws_endpoint_url_override.clone()).await;
        let log_sink: Arc<dyn LogSink + Send + Sync> =
            Arc::new(CloudWatchLogsSink::new(&aws_config));
        let metric_sink: Arc<dyn MetricSink + Send + Sync> =
            Arc::new(CloudWatchMetricsSink::new(&aws_config));
        (log_sink, metric_sink)
    }
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let envelope = ResponseEnvelope::new(&config.access_control_allow_origin)
        .context("invalid ACCESS_CONTROL_ALLOW_ORIGIN")?;

    let metrics = if config.export_prometheus {
        Some(setup_metrics_recorder().context("failed to install metrics recorder")?)
    } else {
        None
    };

    let (log_sink, metric_sink) = create_sinks(&config).await;

    let app = router::router(
        crate::time::SystemTime {},
        log_sink,
        metric_sink,
        config.upload_settings(),
        envelope,
        config.max_body_size,
        metrics,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
