//! # Telemetry
//!
//! Console logging is always on through `tracing_subscriber::fmt`, filtered
//! by `RUST_LOG` (default `info`). OpenTelemetry export is opt-in:
//!
//! - `tracing`: spans for every `AllocateBlock` call.
//! - `metrics`: block and counter totals, request errors and latency.
//! - `honeycomb`: OTLP/gRPC exporter configured from `HONEYCOMB_*` variables.
//! - `stdout`: human-readable exporter for local debugging.
//!
//! An exporter feature without `tracing` or `metrics` is a build error.
//!
//! ```bash
//! cargo run --features tracing,metrics,honeycomb -- --era 1
//! ```

#[cfg(all(
    feature = "honeycomb",
    not(any(feature = "tracing", feature = "metrics"))
))]
compile_error!(
    "The 'honeycomb' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "tracing")))]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};
#[cfg(all(feature = "honeycomb", feature = "metrics"))]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "tracing")))]
use tonic::{metadata::MetadataMap, transport::ClientTlsConfig};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "gdid-authority";

/// Providers that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every enabled provider. Failures are printed
    /// to stderr since the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber and any enabled OpenTelemetry providers.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder("gdid")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .compact(),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        init_metric_handles(&opentelemetry::global::meter_with_scope(scope));
        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

/// Connection settings shared by the Honeycomb span and metric exporters.
#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "tracing")))]
struct HoneycombSettings {
    metadata: MetadataMap,
    endpoint: String,
    compression: Compression,
}

#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "tracing")))]
impl HoneycombSettings {
    fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;
        use std::str::FromStr;

        let var = |name: &str| std::env::var(name).with_context(|| format!("missing `{name}`"));

        let mut metadata = MetadataMap::new();
        metadata.insert(
            "x-honeycomb-team",
            var("HONEYCOMB_API_KEY")?
                .parse()
                .context("invalid API key")?,
        );
        metadata.insert(
            "x-honeycomb-dataset",
            var("HONEYCOMB_DATASET")?
                .parse()
                .context("invalid dataset")?,
        );

        let compression = var("HONEYCOMB_COMPRESSION")
            .map(|raw| raw.to_ascii_lowercase())
            .unwrap_or_else(|_| "zstd".to_owned());

        Ok(Self {
            metadata,
            endpoint: var("HONEYCOMB_ENDPOINT")?,
            compression: Compression::from_str(&compression)?,
        })
    }
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let reader =
            sdkmetrics::PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
                .with_interval(std::time::Duration::from_secs(5))
                .build();
        builder.with_reader(reader)
    };

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let settings = HoneycombSettings::from_env()?;
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_metadata(settings.metadata)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(settings.compression)
            .with_endpoint(settings.endpoint)
            .with_protocol(Protocol::Grpc)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;
        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
fn batch_processor<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: opentelemetry_sdk::trace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(std::time::Duration::from_secs(5))
                .with_max_queue_size(2048)
                .build(),
        )
        .build()
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_span_processor(batch_processor(
        opentelemetry_stdout::SpanExporter::default(),
    ));

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let settings = HoneycombSettings::from_env()?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_metadata(settings.metadata)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(settings.compression)
            .with_endpoint(settings.endpoint)
            .with_protocol(Protocol::Grpc)
            .build()
            .context("failed to build tracer exporter")?;
        builder.with_span_processor(batch_processor(exporter))
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
static BLOCKS_ISSUED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static COUNTERS_ISSUED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUEST_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUEST_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = BLOCKS_ISSUED.set(
        meter
            .u64_counter("blocks_issued")
            .with_description("Counter blocks handed out")
            .build(),
    );
    let _ = COUNTERS_ISSUED.set(
        meter
            .u64_counter("counters_issued")
            .with_description("Counter values reserved across all blocks")
            .build(),
    );
    let _ = REQUEST_ERRORS.set(
        meter
            .u64_counter("request_errors")
            .with_description("Rejected AllocateBlock calls")
            .build(),
    );
    let _ = REQUEST_DURATION_MS.set(
        meter
            .f64_histogram("request_duration")
            .with_unit("ms")
            .with_description("AllocateBlock handling time")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_blocks_issued() {
    if let Some(counter) = BLOCKS_ISSUED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_blocks_issued() {}

#[cfg(feature = "metrics")]
pub fn increment_counters_issued(count: u64) {
    if let Some(counter) = COUNTERS_ISSUED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_counters_issued(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_request_errors() {
    if let Some(counter) = REQUEST_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_request_errors() {}

#[cfg(feature = "metrics")]
pub fn record_request_duration(duration_ms: f64) {
    if let Some(histogram) = REQUEST_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_request_duration(_duration_ms: f64) {}
