// src/lib.rs
// =============================================================================
// Library root. The binary in main.rs is a thin CLI on top of this:
//
// - mirror: the recursive site mirror (crawl engine)
// - download: plain single-file / list downloads with progress and rate limit
// - error: the error type shared by both
// =============================================================================

pub mod download;
pub mod error;
pub mod mirror;

pub use error::{MirrorError, Result};
