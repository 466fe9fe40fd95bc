// src/download/mod.rs
// =============================================================================
// Plain (non-mirror) downloads: one URL, or every URL listed in a file (-i).
//
// What happens for one URL:
// 1. GET it and require a 2xx answer
// 2. Pick a file name (-O, or the last path segment of the URL)
// 3. Stream the body to disk, honouring --rate-limit
// 4. Show a progress bar unless we're running in the background (-B)
// =============================================================================

mod progress;
mod rate;

pub use progress::progress_bar;
pub use rate::{parse_rate_limit, RateLimiter};

use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{MirrorError, Result};
use crate::mirror::DIRECTORY_INDEX;

/// How many files of an -i list are downloaded at the same time.
pub const LIST_CONCURRENCY: usize = 8;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// -O: file name to save as.
    pub output_file: Option<String>,
    /// -P: directory to save into.
    pub output_dir: Option<PathBuf>,
    /// --rate-limit, already parsed to bytes per second.
    pub rate_limit: Option<u64>,
    /// Log instead of printing, and skip the progress bar (-B).
    pub quiet: bool,
}

impl DownloadOptions {
    // Status lines go to stdout in the foreground and to the log file with -B
    fn say(&self, message: &str) {
        if self.quiet {
            tracing::info!("{}", message);
        } else {
            println!("{}", message);
        }
    }
}

/// Local file name for a URL: its last path segment, or index.html.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| {
            percent_encoding::percent_decode_str(name)
                .decode_utf8_lossy()
                .replace(['/', '\\'], "_")
        })
        .unwrap_or_else(|| DIRECTORY_INDEX.to_string())
}

/// Downloads one URL and returns where it was saved.
pub async fn download_file(client: &Client, raw_url: &str, options: &DownloadOptions) -> Result<PathBuf> {
    let url = Url::parse(raw_url.trim()).map_err(|e| MirrorError::InvalidUrl {
        url: raw_url.to_string(),
        reason: e.to_string(),
    })?;

    options.say(&format!("start at {}", chrono::Local::now().format(TIMESTAMP_FORMAT)));

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| MirrorError::http(url.as_str(), e))?;

    let status = response.status();
    options.say(&format!("sending request, awaiting response... status {}", status));
    if !status.is_success() {
        return Err(MirrorError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = response.content_length();
    match total {
        Some(len) => options.say(&format!(
            "content size: {} [~{:.2}MB]",
            len,
            len as f64 / (1024.0 * 1024.0)
        )),
        None => options.say("content size: unknown"),
    }

    let file_name = options
        .output_file
        .clone()
        .unwrap_or_else(|| file_name_for(&url));
    let path = match &options.output_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| MirrorError::io(dir, e))?;
            dir.join(&file_name)
        }
        None => PathBuf::from(&file_name),
    };
    options.say(&format!("saving file to: {}", path.display()));

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| MirrorError::io(&path, e))?;
    let bar = progress_bar(total, options.quiet);
    let mut limiter = options.rate_limit.map(RateLimiter::new);

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| MirrorError::http(url.as_str(), e))?;
        if let Some(limiter) = limiter.as_mut() {
            limiter.throttle(chunk.len()).await;
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| MirrorError::io(&path, e))?;
        bar.inc(chunk.len() as u64);
    }
    file.flush().await.map_err(|e| MirrorError::io(&path, e))?;
    bar.finish();

    options.say(&format!("Downloaded [{}]", url));
    options.say(&format!("finished at {}", chrono::Local::now().format(TIMESTAMP_FORMAT)));

    Ok(path)
}

/// Reads URLs from `list` (one per line) and downloads them concurrently.
/// Returns how many downloads failed; each failure is logged.
pub async fn download_list(client: &Client, list: &Path, options: &DownloadOptions) -> Result<usize> {
    let content = tokio::fs::read_to_string(list)
        .await
        .map_err(|e| MirrorError::io(list, e))?;
    let urls = read_url_list(&content);

    // Parallel progress bars would overwrite each other
    let options = DownloadOptions {
        output_file: None,
        quiet: true,
        ..options.clone()
    };

    let failures = stream::iter(urls)
        .map(|url| {
            let options = &options;
            async move {
                match download_file(client, &url, options).await {
                    Ok(path) => {
                        println!("Downloaded [{}] -> {}", url, path.display());
                        0
                    }
                    Err(e) => {
                        tracing::error!(url = %url, "download failed: {}", e);
                        1
                    }
                }
            }
        })
        .buffer_unordered(LIST_CONCURRENCY)
        .fold(0usize, |acc, failed| async move { acc + failed })
        .await;

    Ok(failures)
}

// Non-empty, trimmed lines; '#' starts a comment line
fn read_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for() {
        let url = Url::parse("https://example.test/files/archive.tar.gz").unwrap();
        assert_eq!(file_name_for(&url), "archive.tar.gz");

        let url = Url::parse("https://example.test/").unwrap();
        assert_eq!(file_name_for(&url), "index.html");

        let url = Url::parse("https://example.test/docs/").unwrap();
        assert_eq!(file_name_for(&url), "index.html");

        let url = Url::parse("https://example.test/my%20photo.png?size=big").unwrap();
        assert_eq!(file_name_for(&url), "my photo.png");
    }

    #[test]
    fn test_read_url_list() {
        let content = "https://a.test/1\n\n  https://a.test/2  \n# comment\n";
        assert_eq!(
            read_url_list(content),
            vec!["https://a.test/1".to_string(), "https://a.test/2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_download_file_saves_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/data.bin")
            .with_status(200)
            .with_body("0123456789")
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let options = DownloadOptions {
            output_dir: Some(dir.path().to_path_buf()),
            quiet: true,
            ..DownloadOptions::default()
        };

        let url = format!("{}/files/data.bin", server.url());
        let path = download_file(&Client::new(), &url, &options).await.unwrap();

        assert_eq!(path, dir.path().join("data.bin"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "0123456789");
    }

    #[tokio::test]
    async fn test_download_file_honours_output_name_and_status() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/a")
            .with_status(200)
            .with_body("A")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let options = DownloadOptions {
            output_file: Some("renamed.txt".to_string()),
            output_dir: Some(dir.path().to_path_buf()),
            quiet: true,
            ..DownloadOptions::default()
        };

        let client = Client::new();
        let path = download_file(&client, &format!("{}/a", server.url()), &options)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("renamed.txt"));

        let err = download_file(&client, &format!("{}/gone", server.url()), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_download_list_counts_failures() {
        let mut server = mockito::Server::new_async().await;
        let _one = server
            .mock("GET", "/one.txt")
            .with_status(200)
            .with_body("1")
            .create_async()
            .await;
        let _two = server
            .mock("GET", "/two.txt")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(
            &list,
            format!("{0}/one.txt\n{0}/two.txt\n", server.url()),
        )
        .unwrap();

        let options = DownloadOptions {
            output_dir: Some(dir.path().join("out")),
            ..DownloadOptions::default()
        };
        let failures = download_list(&Client::new(), &list, &options).await.unwrap();

        assert_eq!(failures, 1);
        assert!(dir.path().join("out/one.txt").exists());
        assert!(!dir.path().join("out/two.txt").exists());
    }
}
