// src/error.rs
// =============================================================================
// Error types for the library side of the mirror.
//
// The binary (main.rs) works with anyhow::Result like before, but the crawl
// engine needs to tell callers *why* something failed: a bad seed URL is
// fatal, a cancelled crawl is not really an error, and per-resource failures
// never leave a worker at all (they are logged and counted instead).
// =============================================================================

use std::path::PathBuf;

/// Everything that can go wrong inside the mirror and download engines.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The seed URL could not be parsed or is not an http(s) URL with a host.
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    /// A URL given to the plain downloader could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The seed itself failed to download, so the mirror is empty.
    #[error("seed URL '{0}' could not be fetched")]
    SeedUnreachable(String),

    /// The crawl was stopped by Ctrl-C or by its deadline.
    #[error("crawl cancelled before it finished")]
    Cancelled,

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not rewrite links in {}: {reason}", .path.display())]
    Rewrite { path: PathBuf, reason: String },

    #[error("invalid rate limit '{0}' (expected e.g. 400k, 2M or 1000)")]
    InvalidRate(String),
}

impl MirrorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        MirrorError::Http {
            url: url.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
