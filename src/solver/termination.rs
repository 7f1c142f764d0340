//! Deadline and cancellation shared by every search phase.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag, cloned into every phase and chain.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a phase stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The whole search space was explored.
    Exhausted,
    NodeLimit,
    LeafLimit,
    StepLimit,
    /// No new best for too many steps.
    Unimproved,
    TimeLimit,
    Cancelled,
}

impl StopReason {
    /// Returns `true` if the stop depended on wall-clock time or an outside signal.
    pub fn is_external(self) -> bool {
        matches!(self, StopReason::TimeLimit | StopReason::Cancelled)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Exhausted => "exhausted",
            StopReason::NodeLimit => "node limit",
            StopReason::LeafLimit => "leaf limit",
            StopReason::StepLimit => "step limit",
            StopReason::Unimproved => "unimproved step limit",
            StopReason::TimeLimit => "time limit",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Deadline plus cancel flag for one solve call.
#[derive(Debug, Clone)]
pub struct Termination {
    started: Instant,
    time_limit: Option<Duration>,
    cancel: CancelToken,
}

impl Termination {
    pub fn new(time_limit: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            started: Instant::now(),
            time_limit,
            cancel,
        }
    }

    /// No deadline, never cancelled.
    pub fn unbounded() -> Self {
        Self::new(None, CancelToken::new())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns the reason to stop, if any. Cancellation wins over the deadline.
    pub fn check(&self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.time_limit {
            Some(limit) if self.started.elapsed() >= limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_stops() {
        assert_eq!(Termination::unbounded().check(), None);
    }

    #[test]
    fn test_cancel_is_shared() {
        let token = CancelToken::new();
        let termination = Termination::new(Some(Duration::from_secs(60)), token.clone());
        token.cancel();
        assert_eq!(termination.check(), Some(StopReason::Cancelled));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_zero_deadline_expires() {
        let termination = Termination::new(Some(Duration::ZERO), CancelToken::new());
        assert_eq!(termination.check(), Some(StopReason::TimeLimit));
        assert!(StopReason::TimeLimit.is_external());
        assert!(!StopReason::NodeLimit.is_external());
    }
}
