//! Load phase metrics: relational and warehouse writes.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct LoadMetrics;

impl LoadMetrics {
    pub fn record_write(table: &'static str, rows_written: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "load", "rows_written"), "table" => table)
            .increment(rows_written as u64);
        ::metrics::histogram!(phase_metric!(histogram, "load", "write_duration_seconds"), "table" => table)
            .record(duration_secs);
    }

    pub fn record_write_failure(table: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "load", "write_failures"), "table" => table)
            .increment(1);
    }

    pub fn record_resolution_miss(kind: &'static str, count: usize) {
        ::metrics::counter!(phase_metric!(counter, "load", "resolution_misses"), "kind" => kind)
            .increment(count as u64);
    }
}

impl PhaseMetrics for LoadMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "load", "rows_written"));
        let _ = ::metrics::counter!(phase_metric!(counter, "load", "write_failures"));
        let _ = ::metrics::counter!(phase_metric!(counter, "load", "resolution_misses"));
    }

    fn phase_name() -> &'static str {
        "load"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "load", "rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows inserted per table (ignored duplicates excluded)",
            },
            MetricDoc {
                name: phase_metric!(counter, "load", "write_failures"),
                metric_type: MetricType::Counter,
                help: "Table writes rolled back",
            },
            MetricDoc {
                name: phase_metric!(counter, "load", "resolution_misses"),
                metric_type: MetricType::Counter,
                help: "Foreign keys that could not be resolved",
            },
            MetricDoc {
                name: phase_metric!(histogram, "load", "write_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one table write transaction",
            },
        ]
    }
}
