//! Trailing-edge debouncing for search-as-you-type.
//!
//! The debouncer does not own a timer. Each keystroke returns the delay the
//! caller should wait; when that delay elapses the caller reports the ticket
//! back, and the debouncer releases a query only if no newer keystroke arrived
//! in between. The same ticket later guards the search response against being
//! overwritten by a slower, superseded request.

use std::time::Duration;

use crate::types::SearchTicket;

/// Default quiet period before a query is sent.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// What the caller should do after a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceDecision {
    /// The query is empty: drop current results now, no request.
    Clear,
    /// Wait `delay`, then report `ticket` via [`SearchDebouncer::timer_elapsed`].
    Schedule { ticket: SearchTicket, delay: Duration },
}

/// A query released for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub ticket: SearchTicket,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    window: Duration,
    latest: SearchTicket,
    pending: Option<String>,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

impl SearchDebouncer {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            latest: SearchTicket::new(0),
            pending: None,
        }
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Records a keystroke. Every call supersedes all earlier tickets.
    pub fn on_input(&mut self, query: &str) -> DebounceDecision {
        self.latest = self.latest.next();
        if query.is_empty() {
            self.pending = None;
            return DebounceDecision::Clear;
        }
        self.pending = Some(query.to_string());
        DebounceDecision::Schedule {
            ticket: self.latest,
            delay: self.window,
        }
    }

    /// Releases the pending query if `ticket` is still the newest keystroke.
    pub fn timer_elapsed(&mut self, ticket: SearchTicket) -> Option<SearchRequest> {
        if ticket != self.latest {
            tracing::trace!(%ticket, latest = %self.latest, "debounce timer superseded");
            return None;
        }
        self.pending.take().map(|query| SearchRequest { ticket, query })
    }

    /// Whether a response for `ticket` may replace the current results.
    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        ticket == self.latest
    }

    /// Invalidates all outstanding timers and responses.
    pub fn reset(&mut self) {
        self.latest = self.latest.next();
        self.pending = None;
    }
}
