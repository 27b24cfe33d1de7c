//! The dispatch loop.
//!
//! Pulls frames from both inbound queues, runs interception on everything
//! that decodes, and hands the original bytes to the paired output writer.
//! The loop ends once both queues are closed, i.e. both readers finished.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::termination::TerminationState;
use crate::intercept::{Action, Decision, Interceptor, StatusEmitter};
use crate::protocol::{Direction, RawFrame, deserialize};

/// Frame counts of one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub forwarded: usize,
    pub suppressed: usize,
    pub decode_failures: usize,
    pub intercepted: usize,
}

/// Channel ends owned by the dispatch loop.
pub(crate) struct DispatchQueues {
    pub(crate) from_frontend: UnboundedReceiver<RawFrame>,
    pub(crate) from_child: UnboundedReceiver<RawFrame>,
    pub(crate) to_child: UnboundedSender<RawFrame>,
    pub(crate) to_frontend: UnboundedSender<RawFrame>,
}

/// Output senders still open. Status frames always go to apt.
struct Outputs {
    to_child: Option<UnboundedSender<RawFrame>>,
    to_frontend: Option<UnboundedSender<RawFrame>>,
}

impl Outputs {
    fn forward(&self, direction: Direction) -> Option<&UnboundedSender<RawFrame>> {
        match direction {
            Direction::ToChild => self.to_child.as_ref(),
            Direction::ToFrontend => self.to_frontend.as_ref(),
        }
    }

    fn status(&self) -> StatusEmitter {
        self.to_frontend
            .clone()
            .map(StatusEmitter::new)
            .unwrap_or_else(StatusEmitter::disconnected)
    }
}

pub(crate) struct Dispatcher {
    interceptor: Arc<Interceptor>,
    termination: Arc<TerminationState>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub(crate) fn new(interceptor: Arc<Interceptor>, termination: Arc<TerminationState>) -> Self {
        Self {
            interceptor,
            termination,
            stats: DispatchStats::default(),
        }
    }

    /// Run until both inbound queues are closed.
    ///
    /// Dropping an outbound sender closes that writer's queue, so an output
    /// is closed as soon as the inbound queue feeding it is exhausted.
    pub(crate) async fn run(mut self, queues: DispatchQueues) -> DispatchStats {
        let DispatchQueues {
            mut from_frontend,
            mut from_child,
            to_child,
            to_frontend,
        } = queues;
        let mut outputs = Outputs {
            to_child: Some(to_child),
            to_frontend: Some(to_frontend),
        };
        let mut frontend_open = true;
        let mut child_open = true;

        loop {
            tokio::select! {
                biased;

                frame = from_frontend.recv(), if frontend_open => match frame {
                    Some(frame) => {
                        self.dispatch(Direction::ToChild, frame, &outputs).await;
                    }
                    None => {
                        log::debug!(target: "apt_tlog::dispatch", "apt stream ended, closing child input");
                        frontend_open = false;
                        outputs.to_child = None;
                    }
                },
                frame = from_child.recv(), if child_open => match frame {
                    Some(frame) => {
                        self.dispatch(Direction::ToFrontend, frame, &outputs).await;
                    }
                    None => {
                        log::debug!(target: "apt_tlog::dispatch", "https stream ended, closing apt output");
                        child_open = false;
                        outputs.to_frontend = None;
                    }
                },
                else => break,
            }
        }

        log::debug!(
            target: "apt_tlog::dispatch",
            "Both readers finished (interrupted: {}, broken pipe: {}), {:?}",
            self.termination.is_interrupted(),
            self.termination.is_broken_pipe(),
            self.stats
        );
        self.stats
    }

    async fn dispatch(&mut self, direction: Direction, frame: RawFrame, outputs: &Outputs) {
        log::debug!(
            target: "apt_tlog::dispatch",
            "{} sent message:\n{:?}",
            direction.source(),
            frame
        );

        if !frame.is_terminated() {
            log::debug!(
                target: "apt_tlog::dispatch",
                "{} stream ended mid-frame",
                direction.source()
            );
        }

        let decision = match deserialize(frame.as_bytes()) {
            Ok(message) => {
                log::debug!(target: "apt_tlog::dispatch", "Handling message: {}", message.code);
                match self.interceptor.classify(&message) {
                    Action::Forward => Decision::Forward,
                    Action::Verify(request) => {
                        self.stats.intercepted += 1;
                        let emitter = outputs.status();
                        let interceptor = Arc::clone(&self.interceptor);
                        let task = tokio::task::spawn_blocking(move || {
                            interceptor.verify(&request, &emitter)
                        });
                        match task.await {
                            Ok(decision) => decision,
                            Err(e) => {
                                log::error!(
                                    target: "apt_tlog::dispatch",
                                    "Interception task failed: {}, forwarding",
                                    e
                                );
                                Decision::Forward
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::debug!(target: "apt_tlog::dispatch", "Cannot handle message, reason is {}", e);
                self.stats.decode_failures += 1;
                Decision::Forward
            }
        };

        if !decision.is_forward() {
            self.stats.suppressed += 1;
            return;
        }

        match outputs.forward(direction) {
            Some(tx) if tx.send(frame).is_ok() => self.stats.forwarded += 1,
            _ => log::debug!(
                target: "apt_tlog::dispatch",
                "{} output closed, dropping frame",
                direction
            ),
        }
    }
}
