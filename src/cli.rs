// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The flags follow wget's spelling, so the short ones are single letters:
//
//   site-mirror https://example.com/file.zip -O out.zip -P downloads
//   site-mirror -i urls.txt --rate-limit 400k
//   site-mirror --mirror https://example.com -R jpg,gif -X /private --convert-links
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Derive macros: Automatically generate code for our types
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version,
    about = "Download files or mirror a whole website for offline browsing",
    long_about = "site-mirror downloads single files (with progress and rate limiting) \
                  or recursively mirrors a website on one host, optionally converting \
                  links so the copy can be browsed offline."
)]
pub struct Cli {
    /// URL to download (or the start page with --mirror)
    pub url: Option<String>,

    /// Save the download under this file name
    #[arg(short = 'O', value_name = "FILE")]
    pub output_file: Option<String>,

    /// Directory to save into (for --mirror, defaults to the site's host name)
    #[arg(short = 'P', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Run in the background: log to "wget-log" instead of the terminal
    #[arg(short = 'B')]
    pub background: bool,

    /// Maximum download speed, e.g. 400k or 2M (bytes per second)
    #[arg(long = "rate-limit", value_name = "RATE")]
    pub rate_limit: Option<String>,

    /// Download every URL listed in FILE (one per line)
    #[arg(short = 'i', value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    /// Recursively mirror the website starting at URL
    #[arg(long)]
    pub mirror: bool,

    /// File extensions to skip while mirroring, comma separated (jpg,gif)
    #[arg(short = 'R', value_name = "EXT,...", value_delimiter = ',')]
    pub reject: Vec<String>,

    /// URL path prefixes to skip while mirroring, comma separated (/private,/tmp)
    #[arg(short = 'X', value_name = "PREFIX,...", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Rewrite links in mirrored pages so they work offline
    #[arg(long = "convert-links")]
    pub convert_links: bool,

    /// Number of parallel fetch workers for --mirror
    #[arg(long, default_value_t = site_mirror::mirror::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Give up on a mirror after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Print the mirror report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_flags() {
        let cli = Cli::try_parse_from([
            "site-mirror",
            "--mirror",
            "-R",
            "jpg,gif",
            "-X",
            "/private,/tmp",
            "--convert-links",
            "-P",
            "out",
            "https://example.com",
        ])
        .unwrap();

        assert!(cli.mirror);
        assert!(cli.convert_links);
        assert_eq!(cli.reject, vec!["jpg", "gif"]);
        assert_eq!(cli.exclude, vec!["/private", "/tmp"]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.url.as_deref(), Some("https://example.com"));
        assert_eq!(cli.workers, site_mirror::mirror::DEFAULT_WORKERS);
    }

    #[test]
    fn test_download_flags() {
        let cli = Cli::try_parse_from([
            "site-mirror",
            "-B",
            "-O",
            "file.zip",
            "--rate-limit",
            "400k",
            "https://example.com/file.zip",
        ])
        .unwrap();

        assert!(cli.background);
        assert!(!cli.mirror);
        assert_eq!(cli.output_file.as_deref(), Some("file.zip"));
        assert_eq!(cli.rate_limit.as_deref(), Some("400k"));
    }

    #[test]
    fn test_input_file_without_url() {
        let cli = Cli::try_parse_from(["site-mirror", "-i", "urls.txt"]).unwrap();
        assert_eq!(cli.input_file, Some(PathBuf::from("urls.txt")));
        assert!(cli.url.is_none());
    }
}
