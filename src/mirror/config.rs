// src/mirror/config.rs
// =============================================================================
// Crawl parameters. Built once from the command line and never changed while
// the crawl runs (workers only ever see it behind an Arc).
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLITENESS_DELAY: Duration = Duration::from_millis(100);

/// Everything a crawl needs to know up front.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Start URL, as typed by the user.
    pub seed: String,
    /// Root of the mirror. `None` means "name it after the seed host".
    pub output_dir: Option<PathBuf>,
    /// Extensions never downloaded (`-R jpg,gif`).
    pub reject_extensions: Vec<String>,
    /// URL path prefixes never downloaded (`-X /private,/tmp`).
    pub exclude_prefixes: Vec<String>,
    /// Rewrite links in fetched pages so the copy browses offline.
    pub convert_links: bool,
    /// Number of fetch workers sharing the frontier.
    pub workers: usize,
    pub request_timeout: Duration,
    /// Pause between two requests of the same worker.
    pub politeness_delay: Duration,
    /// Crawl-wide deadline, after which the crawl is cancelled.
    pub deadline: Option<Duration>,
    pub user_agent: String,
}

impl MirrorConfig {
    pub fn new(seed: impl Into<String>) -> Self {
        MirrorConfig {
            seed: seed.into(),
            output_dir: None,
            reject_extensions: Vec::new(),
            exclude_prefixes: Vec::new(),
            convert_links: false,
            workers: DEFAULT_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            politeness_delay: DEFAULT_POLITENESS_DELAY,
            deadline: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_reject_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reject_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_convert_links(mut self, convert: bool) -> Self {
        self.convert_links = convert;
        self
    }

    /// At least one worker always runs.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}
