#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, runtime, trace, Resource};
use opentelemetry_semantic_conventions::resource;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use tracing::*;

const DEFAULT_FILTER: &str = "info,otel::tracing=trace,sqlx=warn,saldo_ledger=info";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    pub service_name: String,
    /// OTLP/HTTP collector. Spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "saldo".to_string(),
            otlp_endpoint: None,
        }
    }
}

pub fn init_tracer(config: TracingConfig) -> anyhow::Result<()> {
    let telemetry = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            global::set_text_map_propagator(TraceContextPropagator::new());
            let provider = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .http()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(trace::Config::default().with_resource(telemetry_resource(&config)))
                .install_batch(runtime::Tokio)?;
            global::set_tracer_provider(provider.clone());
            let tracer = provider.tracer(config.service_name.clone());
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let fmt_layer = fmt::layer().json();
    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(telemetry)
        .try_init()?;

    Ok(())
}

/// Flushes spans still buffered in the batch exporter.
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

fn telemetry_resource(config: &TracingConfig) -> Resource {
    Resource::default().merge(&Resource::new(vec![
        KeyValue::new(resource::SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(resource::SERVICE_NAMESPACE, "saldo"),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exporter_is_opt_in() {
        let config: TracingConfig = serde_yaml::from_str("service_name: saldo-test").unwrap();
        assert_eq!(config.service_name, "saldo-test");
        assert!(config.otlp_endpoint.is_none());
        assert!(TracingConfig::default().otlp_endpoint.is_none());
    }
}
