// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (terminal, or ./wget-log with -B)
// 3. Dispatch: --mirror, -i <file>, or a single download
// 4. Exit with proper code (0 = success, 1 = download/mirror failed, 2 = error)
// =============================================================================

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use site_mirror::download::{self, DownloadOptions};
use site_mirror::mirror::{self, CrawlReport, MirrorConfig};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.background)?;

    let rate_limit = cli
        .rate_limit
        .as_deref()
        .map(download::parse_rate_limit)
        .transpose()
        .context("bad --rate-limit")?;

    if cli.mirror {
        let Some(url) = cli.url.clone() else {
            eprintln!("--mirror needs a start URL");
            return Ok(1);
        };
        return handle_mirror(&cli, url).await;
    }

    let options = DownloadOptions {
        output_file: cli.output_file.clone(),
        output_dir: cli.output_dir.clone(),
        rate_limit,
        quiet: cli.background,
    };
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("cannot build HTTP client")?;

    if let Some(list) = &cli.input_file {
        let failures = download::download_list(&client, list, &options).await?;
        return Ok(if failures > 0 { 1 } else { 0 });
    }

    let Some(url) = cli.url.as_deref() else {
        eprintln!("Please provide a URL or use -i with a file of URLs");
        return Ok(1);
    };

    match download::download_file(&client, url, &options).await {
        Ok(_) => Ok(0),
        Err(e) => {
            tracing::error!("{}", e);
            Ok(1)
        }
    }
}

async fn handle_mirror(cli: &Cli, url: String) -> Result<i32> {
    let mut config = MirrorConfig::new(url)
        .with_reject_extensions(cli.reject.iter().cloned())
        .with_exclude_prefixes(cli.exclude.iter().cloned())
        .with_convert_links(cli.convert_links)
        .with_workers(cli.workers)
        .with_deadline(cli.timeout.map(Duration::from_secs));
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_dir(dir.clone());
    }

    match mirror::mirror_site(config).await {
        Ok(report) => {
            print_report(&report, cli.json)?;
            Ok(0)
        }
        Err(e) => {
            tracing::error!("{}", e);
            Ok(1)
        }
    }
}

fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Mirrored {} into {}", report.seed, report.output_dir.display());
    println!("   Saved: {}", report.fetched);
    println!("   Failed: {}", report.failed);
    println!("   Skipped links: {}", report.filtered);
    if report.rewritten_pages > 0 || report.restored_links > 0 {
        println!(
            "   Converted pages: {} ({} links restored)",
            report.rewritten_pages, report.restored_links
        );
    }
    println!("   Took: {}", mirror::format_elapsed(report.elapsed_secs));
    Ok(())
}
