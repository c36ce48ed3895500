mod init;
pub mod metrics;

pub use init::{TelemetryGuard, init_telemetry};
