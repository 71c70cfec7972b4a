//! State module for tracking crawl progress
//!
//! This module provides state management for pages and hosts during the crawl process.
//!
//! # Components
//!
//! - `PageRef`: A URL paired with the page type it is parsed as
//! - `PageState`: Lifecycle of a page (queued, fetching, valid, done, etc.)
//! - `FailedPage`: A page that ended in `Failed`, with its reason
//! - `HostState`: Per-host request spacing

mod failure;
mod host_state;
mod page_ref;
mod page_state;

// Re-export main types
pub use failure::{FailedPage, FailureReason};
pub use host_state::HostState;
pub use page_ref::PageRef;
pub use page_state::PageState;
