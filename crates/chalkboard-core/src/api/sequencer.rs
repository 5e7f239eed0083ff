//! Last-request-wins bookkeeping for superseded requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Ticket identifying one issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Issues increasing tickets and accepts a result only when it is newer
/// than every result accepted before it.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
    accepted: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Record `ticket` as answered. False means a newer request already
    /// answered and this result must be dropped.
    pub fn accept(&self, ticket: Ticket) -> bool {
        self.accepted.fetch_max(ticket.0, Ordering::SeqCst) < ticket.0
    }

    /// True if no request was issued after `ticket`
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_results_accepted() {
        let seq = RequestSequencer::new();
        let a = seq.issue();
        assert!(seq.accept(a));
        let b = seq.issue();
        assert!(seq.accept(b));
    }

    #[test]
    fn test_stale_result_discarded() {
        let seq = RequestSequencer::new();
        let first = seq.issue();
        let second = seq.issue();

        // The later request answers first
        assert!(seq.accept(second));
        assert!(!seq.accept(first));
    }

    #[test]
    fn test_out_of_order_but_newer_is_kept() {
        let seq = RequestSequencer::new();
        let first = seq.issue();
        let second = seq.issue();
        assert!(seq.accept(first));
        assert!(seq.accept(second));
    }

    #[test]
    fn test_same_ticket_accepted_once() {
        let seq = RequestSequencer::new();
        let t = seq.issue();
        assert!(seq.accept(t));
        assert!(!seq.accept(t));
    }

    #[test]
    fn test_is_latest() {
        let seq = RequestSequencer::new();
        let a = seq.issue();
        assert!(seq.is_latest(a));
        let b = seq.issue();
        assert!(!seq.is_latest(a));
        assert!(seq.is_latest(b));
    }
}
