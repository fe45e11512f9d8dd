use crate::app::ports::{DateFilter, InspectionSource};
use crate::error::Result;
use crate::pipeline::export::Exporter;
use crate::pipeline::ingestion::paginator::{Paginator, RetryPolicy};
use crate::pipeline::ingestion::rate_limiter::RateLimiter;
use crate::pipeline::loader::RelationalLoader;
use crate::pipeline::processing::catalog::EntityResolver;
use crate::pipeline::run::{PipelineRun, RunSummary};
use crate::pipeline::storage::Storage;
use crate::pipeline::warehouse::AnalyticalTransformer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Knobs for a single batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub filter: Option<DateFilter>,
    pub page_size: u64,
    pub output_dir: PathBuf,
    pub skip_export: bool,
}

/// Fetch → resolve → load → warehouse → export.
pub struct Pipeline {
    source: Arc<dyn InspectionSource>,
    storage: Arc<dyn Storage>,
    retry: RetryPolicy,
    requests_per_min: Option<u64>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn InspectionSource>, storage: Arc<dyn Storage>, retry: RetryPolicy) -> Self {
        Self {
            source,
            storage,
            retry,
            requests_per_min: None,
        }
    }

    pub fn with_rate_limit(mut self, requests_per_min: Option<u64>) -> Self {
        self.requests_per_min = requests_per_min;
        self
    }

    #[instrument(skip(self, options), fields(page_size = options.page_size))]
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let mut run = PipelineRun::new(options.filter);
        info!(
            run_id = %run.run_id,
            filter = ?options.filter.map(|f| f.to_soql()),
            "🚀 Starting food inspections run"
        );

        // Step 1: pull every page into the run context
        let mut paginator = Paginator::new(
            self.source.as_ref(),
            options.page_size,
            options.filter,
            self.retry.clone(),
        )
        .with_rate_limiter(RateLimiter::new(self.requests_per_min));
        loop {
            match paginator.next_page().await {
                Ok(Some(page)) => {
                    run.add_page(page);
                }
                Ok(None) => break,
                Err(e) => {
                    run.record_page_stats(paginator.stats());
                    error!(
                        run_id = %run.run_id,
                        records = run.counters.records,
                        "❌ Ingestion stopped: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }
        run.record_page_stats(paginator.stats());
        info!(
            "📡 Fetched {} records ({} duplicates dropped, {} rejected) in {} pages",
            run.counters.records,
            run.counters.duplicates,
            run.counters.rejected_records,
            run.counters.pages
        );

        // Step 2: dedupe reference entities
        let resolution = EntityResolver::resolve(run.records());
        run.record_resolution(&resolution.stats);

        // Step 3: OLTP load, references before facts
        let loader = RelationalLoader::new(self.storage.as_ref());
        run.counters.references = loader.persist_references(&resolution.references).await?;
        let facts = loader.persist_facts(&resolution).await?;
        run.record_facts(facts);

        // Step 4: OLAP
        run.counters.warehouse = AnalyticalTransformer::new(self.storage.as_ref()).run().await?;

        // Step 5: flat files
        let export = if options.skip_export {
            None
        } else {
            Some(
                Exporter::new(self.storage.as_ref(), options.output_dir.clone())
                    .export_all()
                    .await?,
            )
        };

        let summary = run.finish(export);
        info!(
            run_id = %summary.run_id,
            elapsed_secs = summary.elapsed_secs,
            "✅ Run complete: {} inspections, {} violation links, {} facts",
            summary.counters.inspections_written,
            summary.counters.inspection_violations_written,
            summary.counters.warehouse.fact_rows
        );
        Ok(summary)
    }
}
