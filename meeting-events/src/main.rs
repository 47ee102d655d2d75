use std::time::Duration;

use anyhow::Context;
use envconfig::Envconfig;
use opentelemetry::trace::TraceError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, Tracer};
use opentelemetry_sdk::{runtime, Resource};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::level_filters::LevelFilter;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use meeting_events::config::Config;
use meeting_events::server::serve;

const OTEL_EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

async fn shutdown() {
    let (mut term, mut interrupt) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(interrupt)) => (term, interrupt),
        (Err(err), _) | (_, Err(err)) => {
            tracing::error!("cannot listen for shutdown signals: {}", err);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("shutting down gracefully");
}

/// OTLP exporter for the spans of this service, when `OTEL_URL` is set.
fn otlp_tracer(config: &Config) -> Result<Option<Tracer>, TraceError> {
    let Some(endpoint) = &config.otel_url else {
        return Ok(None);
    };

    let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
        config.otel_sampling_rate,
    )));
    let resource = Resource::new([KeyValue::new(
        "service.name",
        config.otel_service_name.clone(),
    )]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(sampler)
                .with_resource(resource),
        )
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_timeout(OTEL_EXPORT_TIMEOUT),
        )
        .install_batch(runtime::Tokio)
        .map(Some)
}

/// Stdout logs filtered by `RUST_LOG`, plus OTLP spans at `LOG_LEVEL` and above.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let stdout = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );
    let otlp = otlp_tracer(config)
        .context("failed to install OTLP tracer")?
        .map(|tracer| {
            OpenTelemetryLayer::new(tracer).with_filter(LevelFilter::from_level(config.log_level))
        });

    tracing_subscriber::registry()
        .with(stdout)
        .with(otlp)
        .try_init()
        .context("failed to install tracing subscriber")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env().context("invalid configuration")?;
    init_tracing(&config)?;

    let listener = TcpListener::bind(config.address)
        .await
        .with_context(|| format!("could not bind {}", config.address))?;

    if let Err(err) = serve(config, listener, shutdown()).await {
        tracing::error!("meeting-events server failed: {:#}", err);
        return Err(err);
    }
    Ok(())
}
