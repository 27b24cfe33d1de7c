//! Writer tasks for the two output streams.
//!
//! Each output has exactly one writer task consuming a FIFO queue, so frames
//! from the dispatch loop and status frames emitted during interception never
//! interleave mid-frame.
//!
//! # Broken pipes
//!
//! When a peer closes its read side, the first failing write sets
//! `broken_pipe` and the sink switches to discarding. Every later frame for
//! that stream is dropped silently instead of failing again.
//!
//! # Termination
//!
//! A write or flush still pending when the relay starts terminating is
//! abandoned and the sink discards from then on. A peer that stopped reading
//! must not keep the relay from signalling and reaping the child.

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::termination::TerminationState;
use crate::protocol::RawFrame;

enum SinkState<W> {
    Open(W),
    Discarding,
}

/// Output stream that degrades to a discard target after a broken pipe.
pub(crate) struct FrameSink<W> {
    name: &'static str,
    state: SinkState<W>,
    termination: Arc<TerminationState>,
    written: usize,
    discarded: usize,
}

impl<W: AsyncWrite + Unpin> FrameSink<W> {
    pub(crate) fn new(name: &'static str, writer: W, termination: Arc<TerminationState>) -> Self {
        Self {
            name,
            state: SinkState::Open(writer),
            termination,
            written: 0,
            discarded: 0,
        }
    }

    /// Write one frame and flush it.
    pub(crate) async fn write_frame(&mut self, frame: &RawFrame) {
        let SinkState::Open(writer) = &mut self.state else {
            self.discarded += 1;
            return;
        };

        let io = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await
        };
        let result = tokio::select! {
            biased;
            _ = self.termination.cancelled() => None,
            result = io => Some(result),
        };

        let Some(result) = result else {
            log::debug!(
                target: "apt_tlog::writer",
                "Relay terminating, abandoning {:?} to {}",
                frame,
                self.name
            );
            self.state = SinkState::Discarding;
            self.discarded += 1;
            return;
        };

        match result {
            Ok(()) => self.written += 1,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                log::debug!(
                    target: "apt_tlog::writer",
                    "BrokenPipe while writing {:?} to {}, discarding further output",
                    frame,
                    self.name
                );
                self.termination.mark_broken_pipe();
                self.state = SinkState::Discarding;
                self.discarded += 1;
            }
            Err(e) => {
                log::warn!(
                    target: "apt_tlog::writer",
                    "Write error on {}: {}",
                    self.name,
                    e
                );
            }
        }
    }

    /// Flush and release the underlying stream.
    ///
    /// Dropping a child's stdin is what lets the child see end of input.
    pub(crate) async fn close(mut self) -> WriterStats {
        if let SinkState::Open(mut writer) = std::mem::replace(&mut self.state, SinkState::Discarding)
        {
            let result = tokio::select! {
                biased;
                _ = self.termination.cancelled() => Ok(()),
                result = writer.shutdown() => result,
            };
            if let Err(e) = result {
                log::debug!(
                    target: "apt_tlog::writer",
                    "Shutdown of {} failed: {}",
                    self.name,
                    e
                );
            }
        }
        WriterStats {
            written: self.written,
            discarded: self.discarded,
        }
    }

    #[cfg(test)]
    fn is_discarding(&self) -> bool {
        matches!(self.state, SinkState::Discarding)
    }
}

/// Frame counts of one writer task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: usize,
    pub discarded: usize,
}

/// Spawn the single writer for one output stream.
///
/// The task runs until every sender of `rx` is dropped, then closes the
/// stream.
pub(crate) fn spawn_writer_task<W>(
    sink: FrameSink<W>,
    rx: UnboundedReceiver<RawFrame>,
) -> JoinHandle<WriterStats>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(writer_loop(sink, rx))
}

async fn writer_loop<W: AsyncWrite + Unpin>(
    mut sink: FrameSink<W>,
    mut rx: UnboundedReceiver<RawFrame>,
) -> WriterStats {
    while let Some(frame) = rx.recv().await {
        sink.write_frame(&frame).await;
    }

    let name = sink.name;
    let stats = sink.close().await;
    log::debug!(
        target: "apt_tlog::writer",
        "{} writer closed ({} written, {} discarded)",
        name,
        stats.written,
        stats.discarded
    );
    stats
}
