//! Summary data derived from a crawl report

use crate::crawler::CrawlReport;
use crate::plugin::PageTypeId;
use crate::state::PageState;

/// A failed page, flattened for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureLine {
    pub url: String,
    pub page_type: PageTypeId,
    pub reason: String,
    pub attempts: u32,
}

/// Summary statistics for a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    // Run metadata
    pub started_at: String,
    pub finished_at: String,
    pub duration_seconds: i64,
    pub status: String,
    pub config_hash: Option<String>,

    // Overall statistics
    pub total_pages: usize,
    pub total_records: usize,
    pub requests: u64,
    pub successful_requests: u64,
    pub retries: u64,
    pub new_links_found: u64,
    pub pending: usize,

    // State breakdown, in lifecycle order
    pub pages_by_state: Vec<(PageState, usize)>,

    // Rows per dataset table, in key order
    pub tables: Vec<(String, usize)>,

    pub failures: Vec<FailureLine>,
}

impl CrawlSummary {
    /// Builds a summary from a finished run
    ///
    /// # Arguments
    ///
    /// * `report` - The crawl report
    /// * `config_hash` - Hash of the configuration file, if the run used one
    pub fn from_report(report: &CrawlReport, config_hash: Option<&str>) -> Self {
        let status = if report.cancelled {
            "cancelled"
        } else {
            "completed"
        };

        Self {
            started_at: report.started_at.to_rfc3339(),
            finished_at: report.finished_at.to_rfc3339(),
            duration_seconds: report.duration_seconds(),
            status: status.to_string(),
            config_hash: config_hash.map(str::to_string),
            total_pages: report.pages_seen(),
            total_records: report.dataset.total_records(),
            requests: report.stats.requests,
            successful_requests: report.stats.successful_requests,
            retries: report.stats.retries,
            new_links_found: report.stats.new_links_found,
            pending: report.pending,
            pages_by_state: report
                .state_counts
                .iter()
                .map(|(state, count)| (*state, *count))
                .collect(),
            tables: report
                .dataset
                .iter()
                .map(|(key, rows)| (key.to_string(), rows.len()))
                .collect(),
            failures: report
                .failed
                .iter()
                .map(|failed| FailureLine {
                    url: failed.page.url().to_string(),
                    page_type: failed.page.type_id,
                    reason: failed.reason.to_string(),
                    attempts: failed.attempts,
                })
                .collect(),
        }
    }

    pub fn count(&self, state: PageState) -> usize {
        self.pages_by_state
            .iter()
            .find(|(s, _)| *s == state)
            .map_or(0, |(_, count)| *count)
    }

    /// Returns the total number of pages in terminal states
    pub fn total_terminal_pages(&self) -> usize {
        self.count(PageState::Done) + self.count(PageState::Failed)
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.count(PageState::Done) as f64 / terminal as f64) * 100.0
    }

    /// Returns the error rate as a percentage
    pub fn error_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.count(PageState::Failed) as f64 / terminal as f64) * 100.0
    }
}
