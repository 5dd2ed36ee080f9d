//! Progress renderers.
//!
//! - [`ConsoleProgress`]: indicatif bars and styled headings for the CLI
//! - [`TracingProgress`]: structured log lines, for non-interactive runs

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::kernel::BaseProgress;

// =============================================================================
// Console
// =============================================================================

#[derive(Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Create a progress bar for batch processing
fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    let (pb, template) = match total {
        Some(total) => (
            ProgressBar::new(total),
            "{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}",
        ),
        None => (ProgressBar::new_spinner(), "{spinner:.cyan} {pos} {msg}"),
    };

    let bar_style = ProgressStyle::default_bar()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(bar_style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

impl BaseProgress for ConsoleProgress {
    fn title(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
    }

    fn text(&self, text: &str) {
        println!("  {}", text);
    }

    fn note(&self, text: &str) {
        println!("  {} {}", style("ℹ").blue(), text);
    }

    fn start(&self, total: Option<u64>) {
        let mut bar = self.bar.lock().unwrap();
        if let Some(previous) = bar.take() {
            previous.finish_and_clear();
        }
        *bar = Some(create_progress_bar(total));
    }

    fn advance(&self) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.inc(1);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

// =============================================================================
// Tracing
// =============================================================================

/// Logs headings and notes; bar ticks are summarized on finish.
#[derive(Default)]
pub struct TracingProgress {
    position: Mutex<(u64, Option<u64>)>,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaseProgress for TracingProgress {
    fn title(&self, text: &str) {
        info!(title = %text, "step");
    }

    fn text(&self, text: &str) {
        info!("{}", text);
    }

    fn note(&self, text: &str) {
        info!(note = %text, "note");
    }

    fn start(&self, total: Option<u64>) {
        *self.position.lock().unwrap() = (0, total);
    }

    fn advance(&self) {
        self.position.lock().unwrap().0 += 1;
    }

    fn finish(&self) {
        let (done, total) = *self.position.lock().unwrap();
        info!(done, total = ?total, "progress finished");
    }
}
