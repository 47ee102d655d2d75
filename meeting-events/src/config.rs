use std::net::SocketAddr;

use envconfig::Envconfig;
use tracing::Level;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "false")]
    pub print_sink: bool,

    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    pub log_group_name: String,
    pub meeting_event_metric_namespace: String,

    #[envconfig(default = "*")]
    pub access_control_allow_origin: String,

    pub aws_endpoint_url_override: Option<String>, // localstack and friends

    #[envconfig(default = "false")]
    pub enforce_consistent_identity: bool,

    #[envconfig(default = "1048576")]
    pub max_body_size: usize,

    // Used for integration tests
    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "meeting-events")]
    pub otel_service_name: String,

    #[envconfig(default = "info")]
    pub log_level: Level,
}

impl Config {
    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            log_group_name: self.log_group_name.clone(),
            metric_namespace: self.meeting_event_metric_namespace.clone(),
            enforce_consistent_identity: self.enforce_consistent_identity,
        }
    }
}

/// The part of the configuration the upload path reads on every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSettings {
    pub log_group_name: String,
    pub metric_namespace: String,
    pub enforce_consistent_identity: bool,
}
