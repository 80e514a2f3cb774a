//! Logging and trace export.
//!
//! Every process gets an `EnvFilter`-driven fmt layer. When trace export is
//! on, an OTLP layer is stacked on the same registry so `resolve_batch`
//! spans and per-ticker events reach the collector with the service's
//! name and version attached.
//!
//! Variables read by [`TelemetrySettings::from_env`]:
//!
//! - `OTEL_ENABLED`: "false" turns trace export off (default: on)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector address (default: http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: reported service name (default: cream-market-price-service)
//! - `RUST_LOG`: filter directives, combined with the service defaults

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "cream-market-price-service";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Directives applied on top of `RUST_LOG`.
const DEFAULT_DIRECTIVES: [&str; 4] = [
    "market_price_service=info",
    "tower_http=info",
    "h2=warn",
    "hyper=warn",
];

/// Where and as whom traces are exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtlpExport {
    /// Collector gRPC endpoint.
    pub endpoint: String,
    /// `service.name` resource attribute.
    pub service_name: String,
}

impl Default for OtlpExport {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

/// Telemetry settings. `export: None` means console logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// Trace export target.
    pub export: Option<OtlpExport>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            export: Some(OtlpExport::default()),
        }
    }
}

impl TelemetrySettings {
    /// Read settings from the `OTEL_*` variables. Blank values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let disabled = read("OTEL_ENABLED").is_some_and(|v| v.eq_ignore_ascii_case("false"));
        if disabled {
            return Self { export: None };
        }

        let defaults = OtlpExport::default();
        Self {
            export: Some(OtlpExport {
                endpoint: read("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.endpoint),
                service_name: read("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            }),
        }
    }
}

/// Keeps the trace pipeline alive; flushes and shuts it down on drop.
#[must_use = "dropping the guard stops trace export"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("trace provider shutdown failed: {e}");
        }
    }
}

/// Install the global subscriber using [`TelemetrySettings::from_env`].
pub fn init() -> TelemetryGuard {
    init_with(&TelemetrySettings::from_env())
}

/// Install the global subscriber.
///
/// If the OTLP exporter cannot be built the service keeps running with
/// console logging only.
pub fn init_with(settings: &TelemetrySettings) -> TelemetryGuard {
    let provider = settings.export.as_ref().and_then(tracer_provider);
    let otel_layer = match (&provider, &settings.export) {
        (Some(provider), Some(export)) => Some(
            tracing_opentelemetry::layer().with_tracer(provider.tracer(export.service_name.clone())),
        ),
        _ => None,
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(otel_layer)
        .init();

    if let Some(export) = &settings.export {
        tracing::debug!(
            endpoint = %export.endpoint,
            exporting = provider.is_some(),
            "Trace export configured"
        );
    }

    TelemetryGuard { provider }
}

fn tracer_provider(export: &OtlpExport) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(export.endpoint.clone())
        .build();

    match exporter {
        Ok(exporter) => Some(
            SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(
                    Resource::builder()
                        .with_service_name(export.service_name.clone())
                        .with_attribute(KeyValue::new(
                            "service.version",
                            env!("CARGO_PKG_VERSION"),
                        ))
                        .build(),
                )
                .build(),
        ),
        Err(e) => {
            eprintln!("OTLP exporter unavailable ({e:?}); logging to console only");
            None
        }
    }
}

fn env_filter() -> EnvFilter {
    DEFAULT_DIRECTIVES
        .iter()
        .filter_map(|raw| raw.parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}
