// src/mirror/resource.rs
// =============================================================================
// The data model shared by every part of the mirror:
//
// - Resource: one URL we decided to download, plus where it lives on disk
// - canonicalize(): turns a raw href/src into the dedup key
// - local_path(): maps a canonical URL to a file under the output directory
// - UrlFilter: the same-host / exclude / reject rules
//
// local_path() must stay a pure function of (URL, output dir). The link
// rewriter recomputes paths with it long after the fetch happened, and it
// only finds the right file if both sides agree.
// =============================================================================

use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

/// File name used for URLs that name a directory (`/`, `/docs/`).
pub const DIRECTORY_INDEX: &str = "index.html";

/// A URL scheduled for download. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    url: Url,
    local_path: PathBuf,
    is_html: bool,
}

impl Resource {
    /// Builds a resource from an already canonical URL.
    pub fn new(url: Url, output_dir: &Path, is_html: bool) -> Self {
        let local_path = local_path(&url, output_dir);
        Resource {
            url,
            local_path,
            is_html,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Whether the URL looks like an HTML page (extension html/htm or none).
    pub fn is_html(&self) -> bool {
        self.is_html
    }
}

// Resolves a raw attribute value against the page it was found on
//
// Returns None for:
//   - empty values and fragment-only links ("#top")
//   - anything that isn't http/https (mailto:, javascript:, data:, tel:)
//   - values the url crate can't make sense of
//
// The fragment is stripped, so "/a.html#x" and "/a.html" share one key.
pub fn canonicalize(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let mut url = base.join(raw).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    if url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}

/// Maps a canonical URL to `<output_dir>/<host>/<path>`.
///
/// Directory URLs get [`DIRECTORY_INDEX`] as their file name, and a query
/// string stays part of the file name (`page?id=2`) so that two URLs that
/// only differ in their query never share a file.
pub fn local_path(url: &Url, output_dir: &Path) -> PathBuf {
    let mut path = output_dir.join(url.host_str().unwrap_or("unknown-host"));

    let raw_path = url.path();
    let mut segments: Vec<String> = raw_path
        .split('/')
        .filter_map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            match decoded.as_ref() {
                // Never let a URL climb out of the host directory
                "" | "." | ".." => None,
                name => Some(name.replace(['/', '\\', '\0'], "_")),
            }
        })
        .collect();

    let mut file_name = if raw_path.ends_with('/') {
        DIRECTORY_INDEX.to_string()
    } else {
        segments
            .pop()
            .unwrap_or_else(|| DIRECTORY_INDEX.to_string())
    };

    if let Some(query) = url.query() {
        file_name = format!("{}?{}", file_name, query);
    }

    for segment in segments {
        path.push(segment);
    }
    path.push(file_name);
    path
}

/// Lower-cased extension of the last path segment, without the dot.
pub fn extension(url: &Url) -> Option<String> {
    let last = url.path().rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Extensionless paths are assumed to be routed HTML pages.
pub fn is_html_path(url: &Url) -> bool {
    match extension(url).as_deref() {
        None | Some("html") | Some("htm") => true,
        Some(_) => false,
    }
}

/// Why a URL was (or wasn't) allowed into the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    OtherHost,
    ExcludedPath,
    RejectedExtension,
}

/// Same-host, exclude-prefix and reject-extension rules of one crawl.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    host: String,
    port: Option<u16>,
    reject_extensions: HashSet<String>,
    exclude_prefixes: Vec<String>,
}

impl UrlFilter {
    pub fn new(seed: &Url, reject_extensions: &[String], exclude_prefixes: &[String]) -> Self {
        UrlFilter {
            host: seed.host_str().unwrap_or_default().to_string(),
            port: seed.port_or_known_default(),
            reject_extensions: reject_extensions
                .iter()
                .filter_map(|ext| normalize_extension(ext))
                .collect(),
            exclude_prefixes: exclude_prefixes
                .iter()
                .filter_map(|prefix| normalize_prefix(prefix))
                .collect(),
        }
    }

    pub fn check(&self, url: &Url) -> Verdict {
        if url.host_str() != Some(self.host.as_str()) || url.port_or_known_default() != self.port {
            return Verdict::OtherHost;
        }

        let path = url.path();
        if self
            .exclude_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Verdict::ExcludedPath;
        }

        if let Some(ext) = extension(url) {
            if self.reject_extensions.contains(&ext) {
                return Verdict::RejectedExtension;
            }
        }

        Verdict::Accept
    }

    pub fn accepts(&self, url: &Url) -> bool {
        self.check(url) == Verdict::Accept
    }
}

// "-R .JPG, png" style input becomes {"jpg", "png"}
fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

// "-X assets" and "-X /assets" both mean the URL path prefix "/assets"
fn normalize_prefix(raw: &str) -> Option<String> {
    let prefix = raw.trim();
    if prefix.is_empty() {
        None
    } else if prefix.starts_with('/') {
        Some(prefix.to_string())
    } else {
        Some(format!("/{}", prefix))
    }
}
