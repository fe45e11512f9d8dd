//! Ingestion phase metrics: page fetches against the open-data API.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_page(rows: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "pages_fetched")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "ingest", "records_fetched")).increment(rows as u64);
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "page_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_rejected(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "records_rejected")).increment(rows as u64);
    }

    pub fn record_retry(reason: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "page_retries"), "reason" => reason)
            .increment(1);
    }

    pub fn record_failure() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "page_failures")).increment(1);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "ingest", "pages_fetched"));
        let _ = ::metrics::counter!(phase_metric!(counter, "ingest", "records_fetched"));
        let _ = ::metrics::counter!(phase_metric!(counter, "ingest", "records_rejected"));
        let _ = ::metrics::counter!(phase_metric!(counter, "ingest", "page_failures"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "ingest", "page_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "pages_fetched"),
                metric_type: MetricType::Counter,
                help: "Pages returned by the source",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "records_fetched"),
                metric_type: MetricType::Counter,
                help: "Raw inspection records received",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "records_rejected"),
                metric_type: MetricType::Counter,
                help: "Rows skipped because they could not be decoded",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "page_retries"),
                metric_type: MetricType::Counter,
                help: "Page requests retried after a transient failure",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "page_failures"),
                metric_type: MetricType::Counter,
                help: "Page requests abandoned",
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "page_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one successful page request",
            },
        ]
    }
}
