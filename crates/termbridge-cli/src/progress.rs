//! Progress feedback utilities for CLI commands
//!
//! Provides spinners and progress bars for long-running operations.
//! All progress output is suppressed when --quiet flag is set.

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::OnceCell;
use std::time::Duration;

/// Create a spinner with a message
pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Create a row-count progress bar for a store rebuild
pub fn rows_bar(total: u64, message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {human_pos}/{human_len} rows ({percent}%, {eta})")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(message.to_string());
    Some(pb)
}

/// Row progress bar that is only drawn once rows actually start loading.
///
/// A store that is already current never reports progress, so no bar appears.
pub struct LazyRowsBar {
    total: u64,
    message: String,
    quiet: bool,
    bar: OnceCell<Option<ProgressBar>>,
}

impl LazyRowsBar {
    pub fn new(total: u64, message: &str, quiet: bool) -> Self {
        Self {
            total,
            message: message.to_string(),
            quiet,
            bar: OnceCell::new(),
        }
    }

    /// Move the bar to `loaded` rows, creating it on first use
    pub fn set_position(&self, loaded: u64) {
        let bar = self
            .bar
            .get_or_init(|| rows_bar(self.total, &self.message, self.quiet));
        if let Some(pb) = bar {
            pb.set_position(loaded);
        }
    }

    /// Whether the bar has been drawn
    pub fn is_started(&self) -> bool {
        matches!(self.bar.get(), Some(Some(_)))
    }

    pub fn finish(self) {
        if let Some(bar) = self.bar.into_inner() {
            finish_progress(bar);
        }
    }
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        if let Ok(style) = ProgressStyle::default_spinner().template("{prefix:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_prefix("✓");
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a progress bar
pub fn finish_progress(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}
