//! Progress reporting for curation runs
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::distributor::{RunProgress, RunResult, WorkerStatus};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &RunProgress) {
        let totals = &progress.totals;
        let msg = format!(
            "Visited: {} | Curated: {} | Failed: {} | Rate: {:.0}/s | Workers: {}/{}",
            format_number(totals.visited),
            format_number(totals.curated),
            format_number(totals.failed),
            progress.nodes_per_second(),
            progress.active_workers,
            progress.total_workers,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run
pub fn print_summary(result: &RunResult, report_path: Option<&str>) {
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.visited as f64 / duration_secs
    } else {
        0.0
    };

    let title = if result.failed_workers == 0 {
        style("Curation Complete").green().bold()
    } else {
        style("Curation Incomplete").red().bold()
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Visited:").bold(), format_number(result.visited));
    println!("  {} {}", style("Curated:").bold(), format_number(result.curated));
    println!("  {} {}", style("Skipped:").bold(), format_number(result.skipped));
    println!(
        "  {} {:.1}s ({:.0} nodes/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if result.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(result.failed)
        );
    }
    if result.unresolved > 0 {
        println!(
            "  {} {}",
            style("Unresolved:").yellow().bold(),
            format_number(result.unresolved)
        );
    }
    for exit in &result.exits {
        if let WorkerStatus::Failed(reason) = &exit.status {
            println!(
                "  {} worker {} ({} subtrees): {}",
                style("Aborted:").red().bold(),
                exit.id,
                exit.assigned,
                reason
            );
        }
    }
    if let Some(path) = report_path {
        println!(
            "  {} {} ({} records)",
            style("Report:").bold(),
            path,
            format_number(result.records)
        );
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(store: &str, root: &str, curator: &str, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("hierarchy-curator").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Store:").bold(), store);
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Curator:").bold(), curator);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}
