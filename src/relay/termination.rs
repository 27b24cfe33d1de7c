//! Process-wide termination flags.
//!
//! Both flags only ever go from `false` to `true`. The first transition also
//! cancels a token so readers blocked in a read wake up immediately instead of
//! waiting for their next byte.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Shared `{interrupted, broken_pipe}` state.
///
/// Written by the signal handler and by output writers; read by every loop.
#[derive(Debug, Default)]
pub struct TerminationState {
    interrupted: AtomicBool,
    broken_pipe: AtomicBool,
    cancel: CancellationToken,
}

impl TerminationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interrupt request (SIGINT from apt).
    pub fn interrupt(&self) {
        if !self.interrupted.swap(true, Ordering::SeqCst) {
            log::debug!(
                target: "apt_tlog::shutdown",
                "Received SIGINT, setting interrupted"
            );
        }
        self.cancel.cancel();
    }

    /// Record that a peer closed the stream we were writing to.
    pub fn mark_broken_pipe(&self) {
        if !self.broken_pipe.swap(true, Ordering::SeqCst) {
            log::debug!(
                target: "apt_tlog::shutdown",
                "Peer closed its read side, setting broken_pipe"
            );
        }
        self.cancel.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn is_broken_pipe(&self) -> bool {
        self.broken_pipe.load(Ordering::SeqCst)
    }

    /// Whether either flag is set.
    pub fn is_terminating(&self) -> bool {
        self.is_interrupted() || self.is_broken_pipe()
    }

    /// Token cancelled as soon as either flag is set.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}
