//! Page state definitions for tracking crawl progress
//!
//! ```text
//! Queued -> Fetching -> Fetched -> Valid -> Parsed -> Done
//!              |           |
//!              |           +-> Invalid -> Queued (retry) | Failed
//!              +-> Queued (fetch retry) | Failed
//! ```
use std::fmt;

/// Represents the current state of a page in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageState {
    // ===== Active States =====
    /// Page is waiting in the frontier queue
    Queued,

    /// A worker took the page and is fetching it
    Fetching,

    /// Content arrived and awaits validation
    Fetched,

    /// The page parser rejected the content
    Invalid,

    /// The page parser accepted the content
    Valid,

    /// Records and links were extracted
    Parsed,

    // ===== Terminal States =====
    /// Records and links were published
    Done,

    /// The page will not be attempted again
    Failed,
}

impl PageState {
    /// Returns true if no further processing will happen for this page
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if a worker currently owns the page
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Fetching | Self::Fetched | Self::Invalid | Self::Valid | Self::Parsed
        )
    }

    /// Checks whether moving from `self` to `next` follows the page lifecycle
    pub fn can_transition_to(&self, next: PageState) -> bool {
        use PageState::*;

        match (self, next) {
            (Queued, Fetching) => true,
            // Fetch failures go straight back to the queue or to Failed
            (Fetching, Fetched | Queued | Failed) => true,
            (Fetched, Valid | Invalid | Failed) => true,
            (Invalid, Queued | Failed) => true,
            (Valid, Parsed | Failed) => true,
            (Parsed, Done | Failed) => true,
            _ => false,
        }
    }

    /// Returns the lowercase label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Invalid => "invalid",
            Self::Valid => "valid",
            Self::Parsed => "parsed",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> [Self; 8] {
        [
            Self::Queued,
            Self::Fetching,
            Self::Fetched,
            Self::Invalid,
            Self::Valid,
            Self::Parsed,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
