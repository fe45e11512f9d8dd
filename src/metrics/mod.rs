//! Metrics for the inspection pipeline
//!
//! Each pipeline phase owns a submodule with its counters and histograms.
//! Names follow `fi_{phase}_{metric}` and are produced by [`phase_metric!`]
//! so the convention cannot drift between call sites.

pub mod ingest;
pub mod load;

pub use ingest::IngestMetrics;
pub use load::LoadMetrics;

use crate::constants;
use std::collections::HashMap;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Install the Prometheus exporter when an address is configured.
///
/// Idempotent. Without `FOOD_INSPECTIONS_METRICS_ADDR` the macros record into
/// the no-op recorder, which keeps batch runs and tests free of listeners.
/// Must be called from within a Tokio runtime.
pub fn init_metrics() {
    INIT.call_once(|| {
        let addr_str = match std::env::var(constants::ENV_METRICS_ADDR) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => {
                info!("metrics exporter disabled ({} not set)", constants::ENV_METRICS_ADDR);
                return;
            }
        };

        let addr = match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr_str, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                info!("Prometheus exporter listening at http://{}/metrics", addr);
                register_all_metrics();
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Implemented by each phase so its metrics appear before first use.
pub trait PhaseMetrics {
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Builds a metric name following `fi_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("fi_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("fi_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();
    register_phase_metrics::<IngestMetrics>(&mut all_metrics);
    register_phase_metrics::<LoadMetrics>(&mut all_metrics);
    info!("Registered {} metrics across all phases", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict: '{}' registered twice (phase '{}')",
                doc.name,
                T::phase_name()
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "ingest", "pages_fetched"),
            "fi_ingest_pages_fetched_total"
        );
        assert_eq!(
            phase_metric!(histogram, "load", "write_duration_seconds"),
            "fi_load_write_duration_seconds"
        );
    }

    #[test]
    fn test_phase_metric_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for doc in IngestMetrics::metrics_documentation()
            .into_iter()
            .chain(LoadMetrics::metrics_documentation())
        {
            assert!(seen.insert(doc.name), "duplicate metric {}", doc.name);
        }
    }
}
