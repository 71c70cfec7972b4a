//! Console statistics for a finished crawl

use crate::output::summary::CrawlSummary;
use crate::state::PageState;
use std::fmt::Write;

/// Formats statistics for terminal output
///
/// # Arguments
///
/// * `summary` - The statistics to display
pub fn format_statistics(summary: &CrawlSummary) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "=== Crawl Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Status: {}", summary.status);
    let _ = writeln!(out, "  Total pages seen: {}", summary.total_pages);
    let _ = writeln!(out, "  Records extracted: {}", summary.total_records);
    let _ = writeln!(
        out,
        "  Requests: {} ({} successful, {} page retries)",
        summary.requests, summary.successful_requests, summary.retries
    );
    let _ = writeln!(out, "  New links found: {}", summary.new_links_found);
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages by State:");
    // Sort states by count (descending)
    let mut state_counts = summary.pages_by_state.clone();
    state_counts.sort_by(|a, b| b.1.cmp(&a.1));

    for (state, count) in state_counts {
        let percentage = if summary.total_pages > 0 {
            (count as f64 / summary.total_pages as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", state, count, percentage);
    }
    let _ = writeln!(out);

    if !summary.tables.is_empty() {
        let _ = writeln!(out, "Dataset:");
        for (table, rows) in &summary.tables {
            let _ = writeln!(out, "  {}: {} row(s)", table, rows);
        }
        let _ = writeln!(out);
    }

    if summary.pending > 0 {
        let _ = writeln!(out, "Unprocessed pages: {}\n", summary.pending);
    }

    let _ = writeln!(
        out,
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        summary.success_rate(),
        summary.count(PageState::Done),
        summary.total_terminal_pages()
    );

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(summary: &CrawlSummary) {
    print!("{}", format_statistics(summary));
}
