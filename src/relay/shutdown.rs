//! Child transport shutdown.
//!
//! The coordinator is the only component that signals the child. After the
//! relay has drained it:
//!
//! 1. Sends exactly one SIGINT if the relay was interrupted or hit a broken
//!    pipe (the child may otherwise keep waiting on a peer that is gone)
//! 2. Waits up to the configured grace period for the child to exit
//! 3. Kills it if it is still running, then reaps it

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

use super::termination::TerminationState;

pub struct ShutdownCoordinator {
    child: Child,
    signaled: bool,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(child: Child, grace: Duration) -> Self {
        Self {
            child,
            signaled: false,
            grace,
        }
    }

    /// Interrupt the child if the relay is terminating.
    ///
    /// Returns whether the child was interrupted by this call.
    pub fn drain(&mut self, termination: &TerminationState) -> bool {
        if !termination.is_terminating() {
            return false;
        }
        log::debug!(
            target: "apt_tlog::shutdown",
            "Relay SIGINT to https subprocess (interrupted: {}, broken pipe: {})",
            termination.is_interrupted(),
            termination.is_broken_pipe()
        );
        self.interrupt_once()
    }

    /// Deliver SIGINT to the child at most once over the coordinator's life.
    pub fn interrupt_once(&mut self) -> bool {
        if self.signaled {
            return false;
        }
        let Some(pid) = self.child.id() else {
            // Already reaped.
            return false;
        };
        self.signaled = true;

        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
                log::warn!(
                    target: "apt_tlog::shutdown",
                    "SIGINT to child {} failed: {}",
                    pid,
                    e
                );
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = self.child.start_kill() {
                log::warn!(
                    target: "apt_tlog::shutdown",
                    "Terminating child {} failed: {}",
                    pid,
                    e
                );
            }
        }

        true
    }

    /// Wait for the child to exit within the grace period, killing it
    /// afterwards. `None` if the exit status could not be collected.
    pub async fn reap(mut self) -> Option<ExitStatus> {
        match tokio::time::timeout(self.grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                log::debug!(target: "apt_tlog::shutdown", "https subprocess exited: {}", status);
                return Some(status);
            }
            Ok(Err(e)) => {
                log::warn!(target: "apt_tlog::shutdown", "Waiting for child failed: {}", e);
            }
            Err(_) => {
                log::warn!(
                    target: "apt_tlog::shutdown",
                    "https subprocess still running after {:?}, killing it",
                    self.grace
                );
            }
        }

        if let Err(e) = self.child.kill().await {
            log::warn!(target: "apt_tlog::shutdown", "Killing child failed: {}", e);
        }
        match self.child.wait().await {
            Ok(status) => {
                log::debug!(target: "apt_tlog::shutdown", "https subprocess reaped: {}", status);
                Some(status)
            }
            Err(e) => {
                log::warn!(target: "apt_tlog::shutdown", "Reaping child failed: {}", e);
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;
    use tokio::process::Command;

    fn spawn(program: &str, args: &[&str]) -> Child {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn clean_exit_needs_no_signal() {
        let termination = TerminationState::new();
        let mut coordinator = ShutdownCoordinator::new(spawn("true", &[]), Duration::from_secs(5));

        assert!(!coordinator.drain(&termination));
        let status = coordinator.reap().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn interrupted_relay_sends_sigint_exactly_once() {
        let termination = TerminationState::new();
        termination.interrupt();
        let mut coordinator =
            ShutdownCoordinator::new(spawn("sleep", &["30"]), Duration::from_secs(5));

        assert!(coordinator.drain(&termination));
        assert!(!coordinator.drain(&termination));
        assert!(!coordinator.interrupt_once());

        let status = coordinator.reap().await.unwrap();
        assert_eq!(status.signal(), Some(2));
    }

    #[tokio::test]
    async fn broken_pipe_also_interrupts_child() {
        let termination = TerminationState::new();
        termination.mark_broken_pipe();
        let mut coordinator =
            ShutdownCoordinator::new(spawn("sleep", &["30"]), Duration::from_secs(5));

        assert!(coordinator.drain(&termination));
        assert_eq!(coordinator.reap().await.unwrap().signal(), Some(2));
    }

    #[tokio::test]
    async fn child_ignoring_sigint_is_killed_after_grace() {
        let termination = TerminationState::new();
        termination.interrupt();
        let child = spawn("sh", &["-c", "trap '' INT; sleep 30"]);
        let mut coordinator = ShutdownCoordinator::new(child, Duration::from_millis(200));

        // Give the shell a moment to install its trap.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(coordinator.drain(&termination));

        let status = coordinator.reap().await.unwrap();
        assert_eq!(status.signal(), Some(9));
    }
}
