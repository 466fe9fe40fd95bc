// src/mirror/crawler.rs
// =============================================================================
// The crawl orchestrator: seeds the frontier, runs a pool of fetch workers
// until the frontier drains, then reports.
//
// Life of a crawl:
//   Seeded   - the start URL is in the frontier
//   Running  - N workers loop: dequeue, fetch, extract links (HTML only),
//              rewrite links (HTML, --convert-links), mark_done
//   Draining - the frontier saw its last unit of work settle; every
//              worker's dequeue() returns None and the worker exits
//   Done     - workers joined, broken conversions repaired, report built
//
// A failure on one resource is logged and counted, nothing more. The crawl
// as a whole only fails when the seed is unusable, or when it's cancelled.
//
// Cancelling (Ctrl-C or the deadline) abandons downloads still on the wire
// and drops the queue; all of those count as failed, and the repair pass
// still runs so converted pages only link to files that made it to disk.
// =============================================================================

use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::config::MirrorConfig;
use super::extract;
use super::fetcher::{describe_error, Fetcher};
use super::frontier::Frontier;
use super::resource::{Resource, UrlFilter};
use super::rewrite::{self, RewrittenLink};
use crate::error::{MirrorError, Result};

/// Summary of a finished crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub seed: String,
    pub output_dir: PathBuf,
    pub fetched: usize,
    pub failed: usize,
    /// Links skipped by the host, exclude or reject rules.
    pub filtered: usize,
    pub rewritten_pages: usize,
    /// Converted links put back because their target failed to download.
    pub restored_links: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Default)]
struct Stats {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    filtered: AtomicUsize,
}

// Links converted in one page, kept until the crawl is over in case a
// target fails later on
#[derive(Debug)]
struct ConvertedPage {
    path: PathBuf,
    links: Vec<RewrittenLink>,
}

// Everything the workers share
#[derive(Debug)]
struct Shared {
    config: MirrorConfig,
    frontier: Frontier,
    fetcher: Fetcher,
    stats: Stats,
    converted: Mutex<Vec<ConvertedPage>>,
}

/// Mirrors one site. Build it with [`Crawler::new`], then call
/// [`Crawler::run`] or [`Crawler::run_until`].
#[derive(Debug)]
pub struct Crawler {
    seed: Url,
    shared: Arc<Shared>,
}

impl Crawler {
    /// Validates the seed and prepares the frontier and HTTP client.
    pub fn new(config: MirrorConfig) -> Result<Self> {
        let seed = parse_seed(&config.seed)?;

        let output_dir = match &config.output_dir {
            Some(dir) => dir.clone(),
            // parse_seed guarantees a host
            None => PathBuf::from(seed.host_str().unwrap_or_default()),
        };

        let filter = UrlFilter::new(&seed, &config.reject_extensions, &config.exclude_prefixes);
        let fetcher = Fetcher::new(&config)?;

        Ok(Crawler {
            seed,
            shared: Arc::new(Shared {
                frontier: Frontier::new(filter, output_dir),
                fetcher,
                stats: Stats::default(),
                converted: Mutex::new(Vec::new()),
                config,
            }),
        })
    }

    pub fn output_dir(&self) -> &std::path::Path {
        self.shared.frontier.output_dir()
    }

    /// Runs the crawl to completion (or until the configured deadline).
    pub async fn run(self) -> Result<CrawlReport> {
        self.run_until(CancellationToken::new()).await
    }

    /// Runs the crawl until it drains or `cancel` fires.
    pub async fn run_until(self, cancel: CancellationToken) -> Result<CrawlReport> {
        let started = Instant::now();
        let shared = self.shared;

        // Seeded
        shared.frontier.seed(self.seed.clone());
        info!(
            seed = %self.seed,
            output = %shared.frontier.output_dir().display(),
            workers = shared.config.workers,
            "mirroring"
        );

        let deadline = shared.config.deadline.map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        warn!(?limit, "deadline reached, cancelling crawl");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        // Running
        let workers: Vec<_> = (0..shared.config.workers)
            .map(|id| {
                let shared = shared.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { worker(id, shared, cancel).await })
            })
            .collect();

        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                warn!("worker task ended abnormally: {}", e);
            }
        }

        if let Some(handle) = deadline {
            handle.abort();
        }

        // Done
        let restored_links = repair_conversions(&shared).await;

        if cancel.is_cancelled() {
            info!(restored = restored_links, "crawl cancelled");
            return Err(MirrorError::Cancelled);
        }

        if shared.frontier.has_failed(&self.seed) {
            return Err(MirrorError::SeedUnreachable(self.seed.to_string()));
        }

        let rewritten_pages = lock_converted(&shared).len();

        let report = CrawlReport {
            seed: self.seed.to_string(),
            output_dir: shared.frontier.output_dir().to_path_buf(),
            fetched: shared.stats.fetched.load(Ordering::Relaxed),
            failed: shared.stats.failed.load(Ordering::Relaxed),
            filtered: shared.stats.filtered.load(Ordering::Relaxed),
            rewritten_pages,
            restored_links,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            fetched = report.fetched,
            failed = report.failed,
            filtered = report.filtered,
            "mirror complete"
        );
        Ok(report)
    }
}

fn parse_seed(raw: &str) -> Result<Url> {
    let invalid = |reason: &str| MirrorError::InvalidSeed {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let mut seed = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(invalid("only http and https are supported"));
    }
    if seed.host_str().is_none() {
        return Err(invalid("URL has no host"));
    }
    seed.set_fragment(None);
    Ok(seed)
}

// Settles the unit of work on every exit path, including a panic
struct Settle<'a>(&'a Frontier);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.0.mark_done();
    }
}

async fn worker(id: usize, shared: Arc<Shared>, cancel: CancellationToken) {
    debug!(worker = id, "worker started");
    let frontier = &shared.frontier;
    let delay = shared.config.politeness_delay;

    loop {
        let resource = tokio::select! {
            next = frontier.dequeue() => match next {
                Some(resource) => resource,
                None => break,
            },
            _ = cancel.cancelled() => {
                frontier.cancel();
                break;
            }
        };

        let settle = Settle(frontier);
        let document = tokio::select! {
            document = download(&shared, &resource) => document,
            _ = cancel.cancelled() => {
                debug!(worker = id, url = %resource.url(), "abandoned");
                frontier.mark_failed(resource.url());
                frontier.cancel();
                None
            }
        };
        // Local work only, so it always runs to the end: a page rewritten
        // here is recorded for the repair pass even during a cancel
        if let Some(document) = document {
            follow_links(&shared, &resource, document).await;
        }
        drop(settle);

        // Polite crawling: small delay between requests
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    debug!(worker = id, "worker finished");
}

// Saves one resource and returns its body if it is a page to follow.
// Never fails, only logs
async fn download(shared: &Shared, resource: &Resource) -> Option<Vec<u8>> {
    let fetched = match shared.fetcher.fetch(resource).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(url = %resource.url(), "download failed: {}", describe_error(&e));
            shared.frontier.mark_failed(resource.url());
            shared.stats.failed.fetch_add(1, Ordering::Relaxed);
            return None;
        }
    };

    shared.stats.fetched.fetch_add(1, Ordering::Relaxed);
    info!(
        url = %resource.url(),
        path = %resource.local_path().display(),
        bytes = fetched.bytes_written,
        "saved"
    );

    fetched.document
}

// extract -> rewrite for a saved page
async fn follow_links(shared: &Shared, resource: &Resource, document: Vec<u8>) {
    let frontier = &shared.frontier;

    let discovery = extract::discover(frontier, &document, resource.url());
    shared
        .stats
        .filtered
        .fetch_add(discovery.filtered, Ordering::Relaxed);
    debug!(
        url = %resource.url(),
        found = discovery.found,
        queued = discovery.queued,
        duplicates = discovery.duplicates,
        "links extracted"
    );
    drop(document);

    if !shared.config.convert_links {
        return;
    }

    let lookup = |url: &Url| frontier.mirrored_path(url);
    match rewrite::rewrite_file(resource.local_path(), resource.url(), lookup).await {
        Ok(links) if links.is_empty() => {}
        Ok(links) => {
            debug!(url = %resource.url(), converted = links.len(), "links converted");
            lock_converted(shared).push(ConvertedPage {
                path: resource.local_path().to_path_buf(),
                links,
            });
        }
        Err(e) => warn!(url = %resource.url(), "link conversion failed: {}", e),
    }
}

// Pages are converted right after their own download, before their targets
// are fetched. Targets that failed afterwards get their original text back
// so no link points at a file that isn't there.
async fn repair_conversions(shared: &Shared) -> usize {
    let broken: Vec<(PathBuf, Vec<RewrittenLink>)> = lock_converted(shared)
        .iter()
        .filter_map(|page| {
            let failed: Vec<RewrittenLink> = page
                .links
                .iter()
                .filter(|link| shared.frontier.has_failed(&link.target))
                .cloned()
                .collect();
            (!failed.is_empty()).then(|| (page.path.clone(), failed))
        })
        .collect();

    let mut restored = 0;
    for (path, links) in broken {
        match rewrite::restore_file(&path, &links).await {
            Ok(count) => {
                debug!(path = %path.display(), count, "restored links to failed downloads");
                restored += count;
            }
            Err(e) => warn!("could not restore links: {}", e),
        }
    }
    restored
}

fn lock_converted(shared: &Shared) -> std::sync::MutexGuard<'_, Vec<ConvertedPage>> {
    shared.converted.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a crawler and runs it, cancelling on Ctrl-C.
pub async fn mirror_site(config: MirrorConfig) -> Result<CrawlReport> {
    let crawler = Crawler::new(config)?;
    let cancel = CancellationToken::new();

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping workers");
                cancel.cancel();
            }
        })
    };

    let result = crawler.run_until(cancel).await;
    ctrl_c.abort();
    result
}

/// Wall-clock helper for log output.
pub fn format_elapsed(secs: f64) -> String {
    let elapsed = Duration::from_secs_f64(secs.max(0.0));
    if elapsed.as_secs() >= 60 {
        format!("{}m{:02}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60)
    } else {
        format!("{:.2}s", secs)
    }
}
