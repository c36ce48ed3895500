use std::path::Path;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,h2=warn,tonic=warn,opentelemetry=warn";

struct OtelProviders {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: SdkLoggerProvider,
}

/// Keeps the log file writer and the OpenTelemetry providers alive. Call
/// [`TelemetryGuard::shutdown`] before exiting so buffered data is flushed.
pub struct TelemetryGuard {
    otel: Option<OtelProviders>,
    _file_guard: Option<WorkerGuard>,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Some(otel) = self.otel {
            if let Err(e) = otel.tracer.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
            if let Err(e) = otel.meter.shutdown() {
                eprintln!("failed to shut down meter provider: {e}");
            }
            if let Err(e) = otel.logger.shutdown() {
                eprintln!("failed to shut down logger provider: {e}");
            }
        }
    }
}

pub fn init_telemetry(config: &Config) -> anyhow::Result<TelemetryGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Console logs go to stderr, stdout carries the report itself.
    let fmt_layer = if config.is_production() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, file_guard) = match &config.log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let otel = if config.otel_enabled {
        Some(init_otel(config)?)
    } else {
        None
    };

    let trace_layer = otel.as_ref().map(|providers| {
        OpenTelemetryLayer::new(providers.tracer.tracer(config.otel_service_name.clone()))
    });
    let log_bridge = otel
        .as_ref()
        .map(|providers| OpenTelemetryTracingBridge::new(&providers.logger));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(trace_layer)
        .with(log_bridge)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        service = %config.otel_service_name,
        otel_enabled = config.otel_enabled,
        endpoint = %config.otel_exporter_endpoint,
        log_file = ?config.log_file,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        otel,
        _file_guard: file_guard,
    })
}

fn file_writer(
    path: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("LOG_FILE must name a file, got {}", path.display()))?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn init_otel(config: &Config) -> anyhow::Result<OtelProviders> {
    let resource = Resource::builder()
        .with_service_name(config.otel_service_name.clone())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .with_attribute(KeyValue::new(
            "deployment.environment",
            config.environment.clone(),
        ))
        .build();

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_exporter_endpoint)
        .with_timeout(Duration::from_secs(10))
        .build()?;
    let tracer = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();
    global::set_tracer_provider(tracer.clone());

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_exporter_endpoint)
        .build()?;
    let meter = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .with_resource(resource.clone())
        .build();
    global::set_meter_provider(meter.clone());

    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_exporter_endpoint)
        .build()?;
    let logger = SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(resource)
        .build();

    Ok(OtelProviders {
        tracer,
        meter,
        logger,
    })
}
