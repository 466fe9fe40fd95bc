// src/mirror/fetcher.rs
// =============================================================================
// Downloads one resource and stores it at its local path.
//
// Key functionality:
// - One GET per resource, redirects followed by reqwest
// - Anything but 2xx is an error (not retried, the worker logs it and moves on)
// - Parent directories are created before the body is written
// - The body is streamed into a hidden ".part" file next to the target and
//   renamed over it only once complete. A failed or abandoned download
//   leaves nothing behind, and never clobbers an earlier good copy
// - HTML bodies are also kept in memory so the link extractor doesn't have
//   to read the file back
// =============================================================================

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::config::MirrorConfig;
use super::resource::Resource;
use crate::error::{MirrorError, Result};

/// Result of a successful fetch.
#[derive(Debug)]
pub struct Fetched {
    pub bytes_written: u64,
    /// The page body when the resource turned out to be HTML.
    pub document: Option<Vec<u8>>,
}

/// HTTP side of the crawl. Cheap to clone (reqwest's Client is an Arc).
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &MirrorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MirrorError::http(config.seed.clone(), e))?;
        Ok(Fetcher { client })
    }

    /// Downloads `resource` to its local path.
    pub async fn fetch(&self, resource: &Resource) -> Result<Fetched> {
        let url = resource.url().as_str();
        let response = self
            .client
            .get(resource.url().clone())
            .send()
            .await
            .map_err(|e| MirrorError::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let keep_document = treat_as_html(content_type.as_deref(), resource.is_html());

        let path = resource.local_path();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .await
            .map_err(|e| MirrorError::io(dir, e))?;

        // Dropping `part` on any early return (or when the worker abandons
        // this future) deletes the temporary file
        let (partial, part) = tempfile::Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| MirrorError::io(dir, e))?
            .into_parts();
        let mut file = File::from_std(partial);
        let mut document = keep_document.then(Vec::new);
        let mut bytes_written = 0u64;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| MirrorError::http(url, e))?;
            write_chunk(&mut file, path, &chunk).await?;
            bytes_written += chunk.len() as u64;
            if let Some(doc) = document.as_mut() {
                doc.extend_from_slice(&chunk);
            }
        }

        file.flush().await.map_err(|e| MirrorError::io(path, e))?;
        drop(file);
        part.persist(path).map_err(|e| MirrorError::io(path, e.error))?;

        Ok(Fetched {
            bytes_written,
            document,
        })
    }
}

async fn write_chunk(file: &mut File, path: &Path, chunk: &[u8]) -> Result<()> {
    file.write_all(chunk)
        .await
        .map_err(|e| MirrorError::io(path, e))
}

// The server's Content-Type wins; without one we trust the URL's extension
fn treat_as_html(content_type: Option<&str>, guessed_html: bool) -> bool {
    match content_type {
        Some(value) => {
            let mime = value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        }
        None => guessed_html,
    }
}

/// Short human description of a failed fetch, for log lines.
pub fn describe_error(error: &MirrorError) -> String {
    match error {
        MirrorError::Http { source, .. } if source.is_timeout() => "request timed out".to_string(),
        MirrorError::Http { source, .. } if source.is_redirect() => "too many redirects".to_string(),
        MirrorError::Http { source, .. } if source.is_connect() => "connection failed".to_string(),
        MirrorError::Status { status, .. } => format!("HTTP {}", status),
        other => other.to_string(),
    }
}
