pub mod api;
pub mod config;
pub mod event;
pub mod logs;
pub mod prometheus;
pub mod router;
pub mod samples;
pub mod server;
pub mod sinks;
pub mod time;
pub mod upload;
