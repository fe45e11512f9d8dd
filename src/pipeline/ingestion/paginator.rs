use crate::app::ports::{DateFilter, InspectionSource, PageQuery, SourceError};
use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::IngestMetrics;
use crate::pipeline::ingestion::rate_limiter::RateLimiter;
use crate::types::SourcePage;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// No waiting between attempts; used by tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max`, plus up to 25% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(2u32.saturating_pow(attempt.min(16)));
        let capped = exp.min(self.max);
        let jitter_ms = (capped.as_millis() as u64) / 4;
        if jitter_ms == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Page statistics accumulated while draining a [`Paginator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub requests: u32,
    pub pages: u32,
    pub retries: u32,
    pub records: usize,
    pub rejected: usize,
}

/// Lazily walks the dataset one bounded page at a time.
///
/// The offset only advances after a page succeeds, so a failed request is
/// retried at the same offset and earlier pages are never refetched.
pub struct Paginator<'a> {
    source: &'a dyn InspectionSource,
    page_size: u64,
    filter: Option<DateFilter>,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
    offset: u64,
    exhausted: bool,
    stats: PageStats,
}

impl<'a> Paginator<'a> {
    pub fn new(
        source: &'a dyn InspectionSource,
        page_size: u64,
        filter: Option<DateFilter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            filter,
            retry,
            rate_limiter: RateLimiter::unlimited(),
            offset: 0,
            exhausted: false,
            stats: PageStats::default(),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn stats(&self) -> PageStats {
        self.stats
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fetch the next page. `Ok(None)` once a short page has been seen.
    pub async fn next_page(&mut self) -> Result<Option<SourcePage>> {
        if self.exhausted {
            return Ok(None);
        }

        let query = PageQuery {
            limit: self.page_size,
            offset: self.offset,
            filter: self.filter,
        };

        let mut attempt = 0u32;
        loop {
            self.rate_limiter.acquire().await;
            self.stats.requests += 1;
            let t0 = Instant::now();

            match self.source.fetch_page(&query).await {
                Ok(page) => {
                    // Rejected rows still occupy their place in the result set
                    let n = page.len();
                    IngestMetrics::record_page(n, t0.elapsed().as_secs_f64());
                    if !page.rejected.is_empty() {
                        IngestMetrics::record_rejected(page.rejected.len());
                    }
                    self.stats.pages += 1;
                    self.stats.records += page.records.len();
                    self.stats.rejected += page.rejected.len();
                    self.offset += self.page_size;
                    // A full page may be followed by an empty one; only a
                    // short page ends the walk.
                    if (n as u64) < self.page_size {
                        self.exhausted = true;
                    }
                    debug!(
                        offset = query.offset,
                        rows = n,
                        rejected = page.rejected.len(),
                        total = self.stats.records,
                        "page fetched"
                    );
                    return Ok(Some(page));
                }
                Err(SourceError::Transient(message)) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    self.stats.retries += 1;
                    IngestMetrics::record_retry("transient");
                    warn!(
                        offset = query.offset,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "page fetch failed, retrying: {}",
                        message
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(SourceError::Transient(message)) => {
                    IngestMetrics::record_failure();
                    return Err(PipelineError::TransientNetwork {
                        offset: query.offset,
                        attempts: attempt + 1,
                        records_fetched: self.stats.records,
                        message,
                    });
                }
                Err(SourceError::Fatal(message)) => {
                    IngestMetrics::record_failure();
                    return Err(PipelineError::Source {
                        offset: query.offset,
                        message,
                    });
                }
            }
        }
    }

    /// Drain every remaining page into one batch.
    pub async fn fetch_all(&mut self) -> Result<SourcePage> {
        let start = Instant::now();
        let mut batch = SourcePage::default();
        while let Some(page) = self.next_page().await? {
            batch.extend(page);
        }
        info!(
            "Fetched {} records ({} rejected) in {} pages ({} retries) in {:.1}s",
            batch.records.len(),
            batch.rejected.len(),
            self.stats.pages,
            self.stats.retries,
            start.elapsed().as_secs_f64()
        );
        Ok(batch)
    }
}
