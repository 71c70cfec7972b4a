//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results,
//! including statistics, dataset tables, and failed pages.

use crate::output::summary::CrawlSummary;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failed pages listed before the rest are summarized as a count
const MAX_LISTED_FAILURES: usize = 50;

/// Generates a markdown summary from crawl statistics
///
/// # Arguments
///
/// * `summary` - The crawl summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Crab Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at));
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        summary.duration_seconds,
        summary.duration_seconds as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Pages**: {}\n", summary.total_pages));
    md.push_str(&format!("- **Total Records**: {}\n", summary.total_records));
    md.push_str(&format!(
        "- **Requests**: {} ({} successful)\n",
        summary.requests, summary.successful_requests
    ));
    md.push_str(&format!("- **Retries**: {}\n", summary.retries));
    md.push_str(&format!(
        "- **New Links Found**: {}\n",
        summary.new_links_found
    ));
    if summary.pending > 0 {
        md.push_str(&format!("- **Unprocessed Pages**: {}\n", summary.pending));
    }
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!("- **Error Rate**: {:.2}%\n\n", summary.error_rate()));

    // State breakdown
    md.push_str("## Page State Breakdown\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for (state, count) in &summary.pages_by_state {
        md.push_str(&format!("| {} | {} |\n", state, count));
    }
    md.push('\n');

    // Dataset tables
    if !summary.tables.is_empty() {
        md.push_str("## Dataset\n\n");
        md.push_str("| Table | Rows |\n");
        md.push_str("|-------|------|\n");
        for (table, rows) in &summary.tables {
            md.push_str(&format!("| {} | {} |\n", table, rows));
        }
        md.push('\n');
    }

    // Failed pages
    if !summary.failures.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Type | Reason | Attempts |\n");
        md.push_str("|-----|------|--------|----------|\n");

        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                failure.url,
                failure.page_type,
                failure.reason.replace('|', "\\|"),
                failure.attempts
            ));
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md
}
