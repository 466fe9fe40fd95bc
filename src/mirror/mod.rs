// src/mirror/mod.rs
// =============================================================================
// This module mirrors a website for offline browsing (`--mirror`).
//
// Submodules:
// - config: crawl parameters (output dir, -R, -X, --convert-links, workers)
// - resource: Resource, URL canonicalization, URL -> file path, filters
// - frontier: shared work queue with dedup and termination detection
// - fetcher: downloads one resource to disk
// - extract: finds links in a fetched page and feeds them to the frontier
// - rewrite: converts links in saved pages to relative file paths
// - crawler: the worker pool tying it all together
//
// Control flow:
//   Crawler seeds Frontier -> workers dequeue -> Fetcher writes the file ->
//   (HTML) extract pushes new resources -> (HTML, --convert-links) rewrite
//   the file in place -> worker calls mark_done() -> Frontier drains
// =============================================================================

mod config;
mod crawler;
mod extract;
mod fetcher;
mod frontier;
mod resource;
mod rewrite;

pub use config::{MirrorConfig, DEFAULT_POLITENESS_DELAY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS};
pub use crawler::{format_elapsed, mirror_site, CrawlReport, Crawler};
pub use extract::{discover, extract_links, link_attribute, Discovery, LINK_ATTRIBUTES};
pub use fetcher::{describe_error, Fetched, Fetcher};
pub use frontier::{Admission, Frontier};
pub use resource::{
    canonicalize, extension, is_html_path, local_path, Resource, UrlFilter, Verdict,
    DIRECTORY_INDEX,
};
pub use rewrite::{relative_link, restore_file, rewrite_file, RewrittenLink};

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why are the submodules private but their items re-exported?
//    - Callers write `mirror::Frontier` instead of `mirror::frontier::Frontier`
//    - We can move code between files without breaking anyone
//
// 2. Why Arc<Shared> in the crawler?
//    - Every worker is a separate tokio task that may outlive the function
//      that spawned it, so they can't borrow from its stack
//    - Arc gives each task a cheap, reference-counted handle instead
// -----------------------------------------------------------------------------
