// src/download/progress.rs
// =============================================================================
// The one-line progress bar shown while a plain download runs:
//
//  12.00 KiB / 48.00 KiB [============                                      ] 25% 6.00 KiB/s 6s
//
// indicatif does the drawing and the speed/ETA bookkeeping; we only pick the
// layout. Without a Content-Length there is nothing to fill, so the line just
// counts bytes.
// =============================================================================

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const KNOWN_SIZE: &str =
    " {binary_bytes} / {binary_total_bytes} [{bar:50}] {percent}% {binary_bytes_per_sec} {eta}";
const UNKNOWN_SIZE: &str = " {binary_bytes} transferred at {binary_bytes_per_sec}";

/// Bar for a body of `total` bytes, drawn on stdout. `hidden` (-B, -i)
/// still counts bytes but never draws.
pub fn progress_bar(total: Option<u64>, hidden: bool) -> ProgressBar {
    let total = total.filter(|t| *t > 0);
    let target = if hidden {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stdout()
    };

    let bar = ProgressBar::with_draw_target(total, target);
    bar.set_style(style(if total.is_some() { KNOWN_SIZE } else { UNKNOWN_SIZE }));
    bar
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .map(|style| style.progress_chars("= "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
