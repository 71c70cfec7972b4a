//! Output module for exporting crawl results
//!
//! This module handles:
//! - Exporting dataset tables as CSV files
//! - Generating markdown summaries of crawl results
//! - Printing crawl statistics

mod markdown;
pub mod stats;
mod summary;
pub mod table;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{format_statistics, print_statistics};
pub use summary::{CrawlSummary, FailureLine};
pub use table::{write_dataset, ColumnFilter, Table};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
