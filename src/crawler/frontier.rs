//! Crawl frontier: the shared work queue and visited set
//!
//! This module handles:
//! - FIFO scheduling of pages (breadth-first bias)
//! - At-most-once admission of every normalized URL
//! - Bounded re-queueing of pages whose visit failed
//! - Page state bookkeeping for the final report
//! - Detecting when the crawl has run out of work
//!
//! # Termination
//!
//! Every page returned by [`Frontier::take`] is in flight until the worker
//! hands it back through exactly one of [`Frontier::retry`],
//! [`Frontier::mark_done`], [`Frontier::mark_failed`] or
//! [`Frontier::release`]. The crawl is over when the queue is empty and no
//! page is in flight; `take` then returns `None` to every worker.

use crate::config::CrawlerConfig;
use crate::state::{FailedPage, FailureReason, PageRef, PageState};
use crate::{CrabError, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Bookkeeping for one admitted URL
#[derive(Debug)]
struct Entry {
    state: PageState,
    /// Shallowest depth the page was offered at
    depth: u16,
    /// Times the page was handed to a worker
    attempts: u32,
    /// Times the page was put back into the queue
    retries: u32,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<PageRef>,
    /// Visited set: a key is present iff the page was ever enqueued
    entries: HashMap<String, Entry>,
    failed: Vec<FailedPage>,
    in_flight: usize,
}

/// Result of asking the frontier to admit a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The URL was scheduled before
    Duplicate,
    /// The page is deeper than the configured depth limit
    TooDeep,
    /// The configured page limit was reached
    LimitReached,
}

/// What `take` found under the lock
enum Poll {
    Ready(PageRef),
    Wait,
    Exhausted,
}

/// Shared work queue of the crawl
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    cancel: CancellationToken,
    max_retries: u32,
    max_depth: Option<u16>,
    max_pages: Option<usize>,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the retry budget and the depth/page limits
    /// * `cancel` - Token that stops `take` from handing out more work
    pub fn new(config: &CrawlerConfig, cancel: CancellationToken) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            cancel,
            max_retries: config.validate_retries,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, inner: &mut Inner, page: PageRef) -> Admission {
        if let Some(entry) = inner.entries.get_mut(page.key()) {
            if page.depth < entry.depth && !entry.state.is_terminal() {
                entry.depth = page.depth;
                if let Some(queued) = inner.queue.iter_mut().find(|q| q.key() == page.key()) {
                    queued.depth = page.depth;
                }
            }
            return Admission::Duplicate;
        }
        if matches!(self.max_depth, Some(max) if page.depth > max) {
            return Admission::TooDeep;
        }
        if matches!(self.max_pages, Some(max) if inner.entries.len() >= max) {
            return Admission::LimitReached;
        }

        inner.entries.insert(
            page.key().to_string(),
            Entry {
                state: PageState::Queued,
                depth: page.depth,
                attempts: 0,
                retries: 0,
            },
        );
        inner.queue.push_back(page);
        Admission::Admitted
    }

    /// Admits the starting pages in the given order
    ///
    /// # Returns
    ///
    /// Number of seeds admitted (duplicates are skipped)
    pub fn seed<I>(&self, pages: I) -> usize
    where
        I: IntoIterator<Item = PageRef>,
    {
        let admitted = self.offer_all(pages);
        tracing::debug!("Seeded frontier with {} page(s)", admitted);
        admitted
    }

    /// Admits a page unless its URL was scheduled before
    ///
    /// The visited check and the insert happen under one lock, so two workers
    /// offering the same URL concurrently cannot both succeed. Offering a known
    /// page at a smaller depth lowers its recorded depth until it is done.
    ///
    /// # Returns
    ///
    /// * `true` - The page was enqueued
    /// * `false` - The page was a duplicate or exceeded a limit
    pub fn offer(&self, page: PageRef) -> bool {
        self.offer_with_outcome(page) == Admission::Admitted
    }

    pub fn offer_with_outcome(&self, page: PageRef) -> Admission {
        let outcome = {
            let mut inner = self.lock();
            self.admit(&mut inner, page)
        };
        if outcome == Admission::Admitted {
            self.notify.notify_waiters();
        }
        outcome
    }

    /// Admits a batch of pages under a single lock
    ///
    /// # Returns
    ///
    /// Number of pages admitted
    pub fn offer_all<I>(&self, pages: I) -> usize
    where
        I: IntoIterator<Item = PageRef>,
    {
        let admitted = {
            let mut inner = self.lock();
            pages
                .into_iter()
                .filter(|page| {
                    let outcome = self.admit(&mut inner, page.clone());
                    if outcome == Admission::TooDeep || outcome == Admission::LimitReached {
                        tracing::trace!("Not admitting {}: {:?}", page, outcome);
                    }
                    outcome == Admission::Admitted
                })
                .count()
        };
        if admitted > 0 {
            self.notify.notify_waiters();
        }
        admitted
    }

    /// Takes the next page to visit
    ///
    /// Suspends while the queue is empty but other pages are still in flight,
    /// since those may discover more work.
    ///
    /// # Returns
    ///
    /// * `Some(page)` - The page is now `Fetching` and owned by the caller
    /// * `None` - The crawl is exhausted or was cancelled
    pub async fn take(&self) -> Option<PageRef> {
        loop {
            // Registered before inspecting the queue so a push between the
            // check and the await still wakes us.
            let notified = self.notify.notified();

            let poll = {
                let mut inner = self.lock();
                if self.cancel.is_cancelled() {
                    return None;
                }
                match inner.queue.pop_front() {
                    Some(page) => {
                        if let Some(entry) = inner.entries.get_mut(page.key()) {
                            entry.state = PageState::Fetching;
                            entry.attempts += 1;
                        }
                        inner.in_flight += 1;
                        Poll::Ready(page)
                    }
                    None if inner.in_flight == 0 => Poll::Exhausted,
                    None => Poll::Wait,
                }
            };

            match poll {
                Poll::Ready(page) => return Some(page),
                Poll::Exhausted => {
                    self.notify.notify_waiters();
                    return None;
                }
                Poll::Wait => {
                    tokio::select! {
                        _ = notified => {}
                        _ = self.cancel.cancelled() => return None,
                    }
                }
            }
        }
    }

    /// Applies a checked state change requested by a worker
    ///
    /// # Returns
    ///
    /// * `Err(CrabError::UnknownPage)` - The page was never admitted
    /// * `Err(CrabError::InvalidTransition)` - The lifecycle forbids the move
    pub fn transition(&self, page: &PageRef, next: PageState) -> Result<()> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(page.key())
            .ok_or_else(|| CrabError::UnknownPage {
                url: page.key().to_string(),
            })?;
        move_entry(entry, page, next)
    }

    /// Hands a failed visit back for another attempt
    ///
    /// # Returns
    ///
    /// * `true` - The page went back to the tail of the queue
    /// * `false` - The retry budget is spent; the page is now `Failed`
    pub fn retry(&self, page: &PageRef, reason: FailureReason) -> bool {
        let requeued = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.in_flight = inner.in_flight.saturating_sub(1);

            match inner.entries.get_mut(page.key()) {
                None => {
                    tracing::warn!("Retry requested for untracked page {}", page.url());
                    false
                }
                Some(entry) if entry.retries < self.max_retries => {
                    entry.retries += 1;
                    if let Err(e) = move_entry(entry, page, PageState::Queued) {
                        tracing::warn!("{}", e);
                        entry.state = PageState::Queued;
                    }
                    let mut page = page.clone();
                    page.depth = entry.depth;
                    inner.queue.push_back(page);
                    true
                }
                Some(entry) => {
                    entry.state = PageState::Failed;
                    inner.failed.push(FailedPage {
                        page: page.clone(),
                        reason,
                        attempts: entry.attempts,
                    });
                    false
                }
            }
        };
        self.notify.notify_waiters();
        requeued
    }

    /// Records that a page finished successfully
    pub fn mark_done(&self, page: &PageRef) -> Result<()> {
        let result = {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            match inner.entries.get_mut(page.key()) {
                Some(entry) => move_entry(entry, page, PageState::Done),
                None => Err(CrabError::UnknownPage {
                    url: page.key().to_string(),
                }),
            }
        };
        self.notify.notify_waiters();
        result
    }

    /// Records a failure that is not worth retrying
    pub fn mark_failed(&self, page: &PageRef, reason: FailureReason) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            let attempts = match inner.entries.get_mut(page.key()) {
                Some(entry) => {
                    entry.state = PageState::Failed;
                    entry.attempts
                }
                None => 0,
            };
            inner.failed.push(FailedPage {
                page: page.clone(),
                reason,
                attempts,
            });
        }
        self.notify.notify_waiters();
    }

    /// Gives up ownership of an in-flight page without a verdict
    ///
    /// Used when the crawl is cancelled mid-visit. The page returns to the
    /// queue and counts as unprocessed; its retry budget is untouched.
    pub fn release(&self, page: &PageRef) {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.in_flight = inner.in_flight.saturating_sub(1);
            if let Some(entry) = inner.entries.get_mut(page.key()) {
                if entry.state.is_in_flight() {
                    entry.state = PageState::Queued;
                    let mut page = page.clone();
                    page.depth = entry.depth;
                    inner.queue.push_front(page);
                }
            }
        }
        self.notify.notify_waiters();
    }

    /// Stops handing out work and wakes every waiting worker
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pages that ended in `Failed`, in the order they failed
    pub fn failed_pages(&self) -> Vec<FailedPage> {
        self.lock().failed.clone()
    }

    /// Number of admitted pages in every state that has at least one page
    pub fn state_counts(&self) -> BTreeMap<PageState, usize> {
        let inner = self.lock();
        let mut counts = BTreeMap::new();
        for entry in inner.entries.values() {
            *counts.entry(entry.state).or_insert(0) += 1;
        }
        counts
    }

    pub fn state_of(&self, page: &PageRef) -> Option<PageState> {
        self.lock().entries.get(page.key()).map(|entry| entry.state)
    }

    /// Shallowest depth the page is known at
    pub fn depth_of(&self, page: &PageRef) -> Option<u16> {
        self.lock().entries.get(page.key()).map(|entry| entry.depth)
    }

    /// Times the page was handed to a worker
    pub fn attempts(&self, page: &PageRef) -> u32 {
        self.lock()
            .entries
            .get(page.key())
            .map_or(0, |entry| entry.attempts)
    }

    /// Size of the visited set
    pub fn visited_count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}

fn move_entry(entry: &mut Entry, page: &PageRef, next: PageState) -> Result<()> {
    if !entry.state.can_transition_to(next) {
        return Err(CrabError::InvalidTransition {
            url: page.key().to_string(),
            from: entry.state,
            to: next,
        });
    }
    entry.state = next;
    Ok(())
}
