//! The crawl orchestrator.
//!
//! One [`Crawler`] owns a fetch backend, an output writer, and the shared
//! pacing state; each call to [`Crawler::crawl`] builds a fresh
//! [`CrawlContext`] (frontier, scope, dedup) so crawls never leak state
//! into one another. Workers are bounded by the concurrency setting and
//! the crawl ends when the frontier is empty and no worker is in flight,
//! evaluated together.

mod ratelimit;

pub use ratelimit::RateLimiter;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use url::Url;

use crate::config::Options;
use crate::dedup::DedupFilter;
use crate::engine::{Backend, BrowserBackend, PlainBackend, RobotsProbe};
use crate::frontier::Frontier;
use crate::navigation::Request;
use crate::output::{CrawlResult, ErrorRecord, Writer};
use crate::parser::{parse_response, CandidateSink, CustomField};
use crate::scope::ScopeManager;
use crate::{FetchError, SpinneretError};

/// Optional fingerprinting collaborator. The crawler only records what a
/// detector reports; it never interprets the names.
pub trait TechnologyDetector: Send + Sync {
    fn fingerprint(&self, headers: &[(String, String)], body: &[u8]) -> Vec<String>;
}

/// Shared state of one crawl: the frontier, the filters, the sink, and
/// the cancellation signal. Everything a worker or backend needs crosses
/// task boundaries inside one `Arc<CrawlContext>`.
pub struct CrawlContext {
    root_hostname: String,
    frontier: Frontier,
    scope: ScopeManager,
    dedup: DedupFilter,
    options: Arc<Options>,
    writer: Arc<dyn Writer>,
    detector: Option<Arc<dyn TechnologyDetector>>,
    custom_fields: Vec<CustomField>,
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl CrawlContext {
    pub fn new(
        root_hostname: String,
        options: Arc<Options>,
        writer: Arc<dyn Writer>,
        detector: Option<Arc<dyn TechnologyDetector>>,
    ) -> crate::Result<Self> {
        let scope = ScopeManager::new(
            &options.scope,
            &options.out_of_scope,
            options.field_scope,
            options.no_scope,
        )?;
        let custom_fields = options
            .compiled_custom_fields()
            .map_err(SpinneretError::Config)?;
        let deadline = (options.crawl_duration > 0)
            .then(|| Instant::now() + Duration::from_secs(options.crawl_duration));
        Ok(CrawlContext {
            root_hostname,
            frontier: Frontier::new(options.strategy),
            scope,
            dedup: DedupFilter::new(),
            options,
            writer,
            detector,
            custom_fields,
            cancelled: AtomicBool::new(false),
            deadline,
        })
    }

    pub fn root_hostname(&self) -> &str {
        &self.root_hostname
    }

    /// Admits a candidate: dedup, cycle check, scope, report, enqueue.
    pub fn accept(&self, request: Request) {
        self.record(request, true);
    }

    /// Like [`CrawlContext::accept`] but never enqueues: redirect hops
    /// are already being followed by the backend that reports them.
    pub fn record_hop(&self, request: Request) {
        self.record(request, false);
    }

    fn record(&self, request: Request, enqueue: bool) {
        if self.is_cancelled() {
            return;
        }
        let Ok(parsed) = Url::parse(&request.url) else {
            return;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return;
        }

        let identity = request.request_url();
        let novel = self.dedup.unique_url(&identity);
        // Repeats only pass when they carry custom-field matches the
        // first sighting may not have had.
        if !novel && request.custom_fields.is_empty() {
            return;
        }
        if self.dedup.is_cycle(&identity) {
            tracing::debug!("Dropping likely crawler trap: {}", request.url);
            return;
        }

        let in_scope = self.scope.validate(&parsed, &self.root_hostname);
        if in_scope || self.options.display_out_scope {
            if let Err(e) = self.writer.write(&CrawlResult::from_request(&request)) {
                tracing::warn!("Failed to write result for {}: {}", request.url, e);
            }
        }

        let within_depth =
            self.options.max_depth == 0 || request.depth < self.options.max_depth;
        if enqueue && novel && in_scope && within_depth {
            self.frontier.push(request);
        }
    }

    /// Runs the extraction pipeline over a response, feeding candidates
    /// back into this context.
    pub fn process_response(&self, response: &crate::navigation::Response) {
        parse_response(response, self, &self.custom_fields);
    }

    pub fn unique_content(&self, body: &[u8]) -> bool {
        self.dedup.unique_content(body)
    }

    pub fn fingerprint(&self, headers: &[(String, String)], body: &[u8]) -> Vec<String> {
        match &self.detector {
            Some(detector) => detector.fingerprint(headers, body),
            None => Vec::new(),
        }
    }

    pub fn report_error(&self, request: &Request, error: &FetchError) {
        let record = ErrorRecord {
            timestamp: Utc::now(),
            endpoint: request.url.clone(),
            source: request.source.clone(),
            error: error.to_string(),
        };
        if let Err(e) = self.writer.write_err(&record) {
            tracing::warn!("Failed to write error record for {}: {}", request.url, e);
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancelled.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Time left in the crawl's budget, if one was configured.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn pop(&self) -> Option<Request> {
        self.frontier.pop()
    }
}

impl CandidateSink for CrawlContext {
    fn emit(&self, request: Request) {
        self.accept(request);
    }
}

/// A configured crawler: one backend, one writer, any number of crawls.
pub struct Crawler {
    options: Arc<Options>,
    writer: Arc<dyn Writer>,
    backend: Arc<Backend>,
    detector: Option<Arc<dyn TechnologyDetector>>,
    limiter: Option<RateLimiter>,
    robots: Option<RobotsProbe>,
}

impl Crawler {
    pub async fn new(options: Options, writer: Arc<dyn Writer>) -> crate::Result<Self> {
        Self::with_detector(options, writer, None).await
    }

    pub async fn with_detector(
        options: Options,
        writer: Arc<dyn Writer>,
        detector: Option<Arc<dyn TechnologyDetector>>,
    ) -> crate::Result<Self> {
        let backend = if options.headless.enabled {
            Backend::Browser(BrowserBackend::launch(&options).await?)
        } else {
            Backend::Plain(PlainBackend::new(&options)?)
        };
        let limiter = if options.rate_limit > 0 {
            Some(RateLimiter::per_second(options.rate_limit))
        } else if options.rate_limit_minute > 0 {
            Some(RateLimiter::per_minute(options.rate_limit_minute))
        } else {
            None
        };
        let robots = if options.known_files {
            Some(RobotsProbe::new(&options)?)
        } else {
            None
        };
        Ok(Crawler {
            options: Arc::new(options),
            writer,
            backend: Arc::new(backend),
            detector,
            limiter,
            robots,
        })
    }

    /// Crawls one seed to completion.
    ///
    /// Per-request failures are reported and skipped; the only error
    /// surfaces here are an unusable seed and an exhausted time budget.
    pub async fn crawl(&self, seed: &str) -> crate::Result<()> {
        let root_url = Url::parse(seed).map_err(|e| SpinneretError::InvalidSeed {
            url: seed.to_string(),
            message: e.to_string(),
        })?;
        let root_hostname = root_url
            .host_str()
            .ok_or_else(|| SpinneretError::InvalidSeed {
                url: seed.to_string(),
                message: "missing host".to_string(),
            })?
            .to_string();

        let ctx = Arc::new(CrawlContext::new(
            root_hostname,
            Arc::clone(&self.options),
            Arc::clone(&self.writer),
            self.detector.clone(),
        )?);

        tracing::info!("Starting crawl of {}", root_url);
        self.backend.begin_crawl().await;
        let outcome = self.run(&ctx, &root_url).await;
        self.backend.end_crawl().await;

        match &outcome {
            Ok(()) => tracing::info!("Finished crawl of {}", root_url),
            Err(e) => tracing::warn!("Crawl of {} ended early: {}", root_url, e),
        }
        outcome
    }

    async fn run(&self, ctx: &Arc<CrawlContext>, root_url: &Url) -> crate::Result<()> {
        ctx.accept(Request::seed(root_url.as_str(), ctx.root_hostname()));
        if let Some(robots) = &self.robots {
            robots.probe(root_url, ctx).await;
        }

        let mut in_flight = FuturesUnordered::new();
        loop {
            while in_flight.len() < self.options.concurrency && !ctx.is_cancelled() {
                let Some(request) = ctx.pop() else { break };
                in_flight.push(self.spawn_worker(request, ctx));
            }

            // Frontier empty and nothing in flight, checked as one
            // condition: a finishing worker may still push candidates.
            if in_flight.is_empty() {
                break;
            }
            if let Some(Err(e)) = in_flight.next().await {
                tracing::error!("Worker task panicked: {}", e);
            }
        }

        if ctx.is_cancelled() {
            return Err(SpinneretError::CrawlCancelled);
        }
        Ok(())
    }

    fn spawn_worker(
        &self,
        request: Request,
        ctx: &Arc<CrawlContext>,
    ) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(ctx);
        let backend = Arc::clone(&self.backend);
        let limiter = self.limiter.clone();
        let delay = Duration::from_secs(self.options.delay);

        tokio::spawn(async move {
            if let Some(limiter) = &limiter {
                limiter.acquire().await;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if ctx.is_cancelled() {
                return;
            }

            // Bound the fetch by the remaining budget so cancellation
            // reaches workers mid-request, not just between requests.
            let fetched = match ctx.remaining_time() {
                Some(budget) => {
                    match tokio::time::timeout(budget, backend.fetch(&request, &ctx)).await {
                        Ok(result) => result,
                        Err(_) => {
                            ctx.cancel();
                            return;
                        }
                    }
                }
                None => backend.fetch(&request, &ctx).await,
            };

            match fetched {
                Ok(Some(response)) => ctx.process_response(&response),
                Ok(None) => {}
                Err(error) => ctx.report_error(&request, &error),
            }
        })
    }

    /// Releases backend resources. Call once after the last crawl.
    pub async fn close(&self) {
        self.backend.close().await;
        if let Err(e) = self.writer.close() {
            tracing::warn!("Failed to flush output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryWriter;

    fn context_with(options: Options) -> (Arc<CrawlContext>, Arc<MemoryWriter>) {
        let writer = Arc::new(MemoryWriter::new());
        let ctx = CrawlContext::new(
            "example.com".to_string(),
            Arc::new(options),
            writer.clone(),
            None,
        )
        .unwrap();
        (Arc::new(ctx), writer)
    }

    fn candidate(url: &str, depth: usize) -> Request {
        Request {
            method: "GET".to_string(),
            url: url.to_string(),
            depth,
            root_hostname: "example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_accept_reports_and_enqueues_in_scope() {
        let (ctx, writer) = context_with(Options::default());
        ctx.accept(candidate("http://example.com/a", 1));
        assert_eq!(writer.results().len(), 1);
        assert_eq!(ctx.frontier.len(), 1);
    }

    #[test]
    fn test_accept_drops_out_of_scope_silently() {
        let (ctx, writer) = context_with(Options::default());
        ctx.accept(candidate("http://other.test/a", 1));
        assert!(writer.results().is_empty());
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_display_out_scope_reports_without_enqueueing() {
        let options = Options {
            display_out_scope: true,
            ..Default::default()
        };
        let (ctx, writer) = context_with(options);
        ctx.accept(candidate("http://other.test/a", 1));
        assert_eq!(writer.results().len(), 1);
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_duplicate_identity_reported_once() {
        let (ctx, writer) = context_with(Options::default());
        ctx.accept(candidate("http://example.com/a", 1));
        ctx.accept(candidate("http://example.com/a", 2));
        assert_eq!(writer.results().len(), 1);
        assert_eq!(ctx.frontier.len(), 1);
    }

    #[test]
    fn test_depth_ceiling_reports_but_never_enqueues() {
        let options = Options {
            max_depth: 2,
            ..Default::default()
        };
        let (ctx, writer) = context_with(options);
        ctx.accept(candidate("http://example.com/deep", 2));
        assert_eq!(writer.results().len(), 1);
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_record_hop_never_enqueues() {
        let (ctx, writer) = context_with(Options::default());
        ctx.record_hop(candidate("http://example.com/moved", 1));
        assert_eq!(writer.results().len(), 1);
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_non_web_schemes_dropped() {
        let (ctx, writer) = context_with(Options::default());
        ctx.accept(candidate("ftp://example.com/file", 1));
        ctx.accept(candidate("not a url", 1));
        assert!(writer.results().is_empty());
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_cancelled_context_accepts_nothing() {
        let (ctx, writer) = context_with(Options::default());
        ctx.cancel();
        ctx.accept(candidate("http://example.com/a", 1));
        assert!(writer.results().is_empty());
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_repeat_with_custom_fields_reported_again() {
        let (ctx, writer) = context_with(Options::default());
        ctx.accept(candidate("http://example.com/a", 1));
        let mut repeat = candidate("http://example.com/a", 2);
        repeat
            .custom_fields
            .insert("email".to_string(), vec!["a@b.c".to_string()]);
        ctx.accept(repeat);
        assert_eq!(writer.results().len(), 2);
        // Still only one frontier entry; the repeat is report-only.
        assert_eq!(ctx.frontier.len(), 1);
    }
}
