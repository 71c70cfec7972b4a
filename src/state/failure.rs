use crate::plugin::PageTypeId;
use crate::state::PageRef;
use std::fmt;

/// Why a page ended in [`crate::state::PageState::Failed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Fetching kept failing, or the server answered with a client error
    Fetch(String),

    /// The page parser rejected the content on every attempt
    ValidationFailed,

    /// No page parser is registered for the page type
    UnknownType(PageTypeId),

    /// The page parser returned an error or panicked
    Plugin(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(cause) => write!(f, "fetch failed: {}", cause),
            Self::ValidationFailed => f.write_str("validation failed"),
            Self::UnknownType(id) => write!(f, "unknown page type {}", id),
            Self::Plugin(message) => write!(f, "page parser error: {}", message),
        }
    }
}

/// A page that will not be attempted again, as listed in the crawl report
#[derive(Debug, Clone)]
pub struct FailedPage {
    pub page: PageRef,
    pub reason: FailureReason,
    /// Number of times the page was taken from the frontier
    pub attempts: u32,
}

impl fmt::Display for FailedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} attempt{})",
            self.page.url(),
            self.reason,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}
