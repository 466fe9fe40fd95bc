// src/logging.rs
// =============================================================================
// Sets up tracing for the binary.
//
// - Foreground: human-readable lines on stderr, so stdout stays clean for
//   progress bars and --json output
// - Background (-B): everything goes to ./wget-log, without colours
//
// The level comes from RUST_LOG and defaults to "info".
// =============================================================================

use anyhow::{Context, Result};
use std::fs::File;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const BACKGROUND_LOG: &str = "wget-log";

pub fn init(background: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if background {
        let file = File::create(BACKGROUND_LOG)
            .with_context(|| format!("cannot create {}", BACKGROUND_LOG))?;
        println!("Output will be written to \"{}\".", BACKGROUND_LOG);

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
