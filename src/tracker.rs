//! Completion tracking for one submit.
//!
//! A submit asks for several session types at once. Each response is
//! recorded here; the tracker says when the last one arrived and whether
//! the merchant should hear about it. The first error ends the submit and
//! anything that arrives after it is dropped.
//!
//! Every [`reset`](SessionCompletionTracker::reset) starts a new flow with
//! a new id, so stragglers from an earlier submit cannot complete a later
//! one.

use crate::error::AccessCheckoutError;
use crate::session::SessionType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Identifies one submit.
pub type FlowId = u64;

/// What the merchant should be told after a response is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Other responses are still outstanding.
    Pending,
    /// The last response arrived and all succeeded.
    Succeeded(HashMap<SessionType, String>),
    /// This is the first error of the flow.
    Failed(AccessCheckoutError),
    /// Nothing to report: the flow already failed, or belongs to an older
    /// submit.
    Ignored,
}

/// Counts responses of the current submit.
///
/// Share it as an `Arc` between the tasks of one client.
#[derive(Debug, Default)]
pub struct SessionCompletionTracker {
    flow: AtomicU64,
    expected: AtomicUsize,
    completed: AtomicUsize,
    error_delivered: AtomicBool,
    responses: Mutex<HashMap<SessionType, String>>,
}

impl SessionCompletionTracker {
    /// A tracker with no flow in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a flow expecting `expected` responses.
    pub fn reset(&self, expected: usize) -> FlowId {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        responses.clear();
        self.expected.store(expected, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.error_delivered.store(false, Ordering::SeqCst);
        self.flow.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Records the outcome of one session request.
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::session::SessionType;
    /// use access_checkout::tracker::{Completion, SessionCompletionTracker};
    ///
    /// let tracker = SessionCompletionTracker::new();
    /// let flow = tracker.reset(2);
    ///
    /// let first = tracker.record(flow, SessionType::Card, Ok("https://example.com/card".into()));
    /// assert_eq!(first, Completion::Pending);
    ///
    /// match tracker.record(flow, SessionType::Cvc, Ok("https://example.com/cvc".into())) {
    ///     Completion::Succeeded(sessions) => assert_eq!(sessions.len(), 2),
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    pub fn record(
        &self,
        flow: FlowId,
        session_type: SessionType,
        result: Result<String, AccessCheckoutError>,
    ) -> Completion {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if flow != self.flow.load(Ordering::SeqCst) {
            return Completion::Ignored;
        }

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        match result {
            Ok(href) => {
                responses.insert(session_type, href);
            }
            Err(error) => {
                return if self.error_delivered.swap(true, Ordering::SeqCst) {
                    Completion::Ignored
                } else {
                    Completion::Failed(error)
                };
            }
        }

        if self.error_delivered.load(Ordering::SeqCst) {
            Completion::Ignored
        } else if completed >= self.expected.load(Ordering::SeqCst) {
            Completion::Succeeded(responses.clone())
        } else {
            Completion::Pending
        }
    }

    /// Id of the current flow.
    pub fn current_flow(&self) -> FlowId {
        self.flow.load(Ordering::SeqCst)
    }

    /// Responses recorded in the current flow so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Whether every expected response has been recorded.
    pub fn is_complete(&self) -> bool {
        self.completed() >= self.expected.load(Ordering::SeqCst)
    }

    /// Successful responses of the current flow.
    pub fn responses(&self) -> HashMap<SessionType, String> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
