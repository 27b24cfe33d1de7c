//! Reader tasks turning a byte stream into frames.
//!
//! # Framing
//!
//! A frame ends at the first blank-line terminator (`"\n\n"`) after the
//! previous frame. Reads may deliver any number of bytes, so one read can
//! complete several frames or stop in the middle of a line; the accumulator
//! only ever emits complete frames, plus at most one unterminated tail when the
//! stream ends.
//!
//! # Shutdown
//!
//! The read is raced against [`TerminationState::cancelled`], so an interrupt
//! or broken pipe ends the stream without waiting for the peer. A read that
//! already completed is processed before the flag is observed.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::termination::TerminationState;
use crate::protocol::RawFrame;

const READ_CHUNK: usize = 4096;

/// Splits a byte stream into frames.
#[derive(Debug, Default)]
pub(crate) struct FrameAccumulator {
    buf: Vec<u8>,
}

impl FrameAccumulator {
    /// Feed bytes, returning every frame they complete.
    pub(crate) fn extend(&mut self, bytes: &[u8]) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            self.buf.push(byte);
            if self.buf.ends_with(b"\n\n") {
                frames.push(RawFrame::new(std::mem::take(&mut self.buf)));
            }
        }
        frames
    }

    /// Take whatever was read after the last complete frame.
    pub(crate) fn take_partial(&mut self) -> Option<RawFrame> {
        if self.buf.is_empty() {
            None
        } else {
            Some(RawFrame::new(std::mem::take(&mut self.buf)))
        }
    }
}

/// Lazy, finite sequence of frames read from one stream.
///
/// Once [`FrameReader::next_frame`] has returned `None` it keeps doing so.
pub struct FrameReader<R> {
    stream: R,
    accumulator: FrameAccumulator,
    pending: VecDeque<RawFrame>,
    termination: Arc<TerminationState>,
    finished: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R, termination: Arc<TerminationState>) -> Self {
        Self {
            stream,
            accumulator: FrameAccumulator::default(),
            pending: VecDeque::new(),
            termination,
            finished: false,
        }
    }

    /// Next frame, or `None` at end of stream or once termination is set.
    pub async fn next_frame(&mut self) -> Option<RawFrame> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.finished {
                return None;
            }
            if self.termination.is_terminating() {
                return self.finish();
            }

            let read = tokio::select! {
                biased;

                _ = self.termination.cancelled() => None,
                result = self.stream.read(&mut chunk) => Some(result),
            };

            match read {
                None | Some(Ok(0)) => return self.finish(),
                Some(Ok(n)) => {
                    let frames = self.accumulator.extend(&chunk[..n]);
                    self.pending.extend(frames);
                }
                Some(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Some(Err(e)) => {
                    log::warn!(
                        target: "apt_tlog::reader",
                        "Read error: {}, treating as end of stream",
                        e
                    );
                    return self.finish();
                }
            }
        }
    }

    fn finish(&mut self) -> Option<RawFrame> {
        self.finished = true;
        self.accumulator.take_partial()
    }
}

/// Spawn a task pushing every frame of `stream` into `queue`.
///
/// The task ends at end of stream; dropping its sender closes the queue,
/// which is how the dispatch loop learns that this direction is exhausted.
pub(crate) fn spawn_reader_task<R>(
    name: &'static str,
    stream: R,
    queue: UnboundedSender<RawFrame>,
    termination: Arc<TerminationState>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(reader_loop(name, FrameReader::new(stream, termination), queue))
}

async fn reader_loop<R: AsyncRead + Unpin>(
    name: &'static str,
    mut reader: FrameReader<R>,
    queue: UnboundedSender<RawFrame>,
) {
    let mut count = 0usize;
    while let Some(frame) = reader.next_frame().await {
        count += 1;
        if queue.send(frame).is_err() {
            log::debug!(
                target: "apt_tlog::reader",
                "{} queue closed, stopping reader",
                name
            );
            break;
        }
    }

    log::debug!(
        target: "apt_tlog::reader",
        "{} reader finished after {} frames",
        name,
        count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_test::io::Builder;

    fn text(frame: &RawFrame) -> &str {
        std::str::from_utf8(frame.as_bytes()).unwrap()
    }

    #[test]
    fn accumulator_emits_one_frame_per_terminator() {
        let mut acc = FrameAccumulator::default();
        let frames = acc.extend(b"100 Capabilities\nVersion: 1.2\n\n102 Status\n\n201 URI");

        assert_eq!(frames.len(), 2);
        assert_eq!(text(&frames[0]), "100 Capabilities\nVersion: 1.2\n\n");
        assert_eq!(text(&frames[1]), "102 Status\n\n");
        assert_eq!(acc.take_partial(), Some(RawFrame::from("201 URI")));
        assert_eq!(acc.take_partial(), None);
    }

    #[test]
    fn accumulator_handles_terminator_split_across_reads() {
        let mut acc = FrameAccumulator::default();
        assert!(acc.extend(b"101 Log\nMessage: hi\n").is_empty());
        let frames = acc.extend(b"\n");
        assert_eq!(frames, vec![RawFrame::from("101 Log\nMessage: hi\n\n")]);
    }

    #[tokio::test]
    async fn reader_reassembles_frames_split_mid_line() {
        let stream = Builder::new()
            .read(b"201 URI Do")
            .read(b"ne\nURI: http://example/dists/stable/InRel")
            .read(b"ease\n\n600 URI Acquire\n\n102 Sta")
            .read(b"tus\n\n")
            .build();
        let mut reader = FrameReader::new(stream, Arc::new(TerminationState::new()));

        let first = reader.next_frame().await.unwrap();
        assert_eq!(
            text(&first),
            "201 URI Done\nURI: http://example/dists/stable/InRelease\n\n"
        );
        assert_eq!(text(&reader.next_frame().await.unwrap()), "600 URI Acquire\n\n");
        assert_eq!(text(&reader.next_frame().await.unwrap()), "102 Status\n\n");
        assert_eq!(reader.next_frame().await, None);
        assert_eq!(reader.next_frame().await, None);
    }

    #[tokio::test]
    async fn reader_emits_unterminated_tail_at_eof() {
        let stream = Builder::new().read(b"101 Log\n\n102 Status\n").build();
        let mut reader = FrameReader::new(stream, Arc::new(TerminationState::new()));

        assert_eq!(reader.next_frame().await, Some(RawFrame::from("101 Log\n\n")));
        assert_eq!(reader.next_frame().await, Some(RawFrame::from("102 Status\n")));
        assert_eq!(reader.next_frame().await, None);
    }

    #[tokio::test]
    async fn reader_stops_when_termination_is_set() {
        let termination = Arc::new(TerminationState::new());
        // Never-ending stream: the write half stays open for the whole test.
        let (_writer, stream) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(stream, Arc::clone(&termination));

        let next = tokio::spawn(async move { reader.next_frame().await });
        termination.interrupt();

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), next)
            .await
            .expect("reader should observe termination")
            .unwrap();
        assert_eq!(frame, None);
    }

    #[tokio::test]
    async fn reader_task_pushes_frames_in_order_then_closes_queue() {
        let stream = Builder::new()
            .read(b"600 URI Acquire\nURI: a\n\n")
            .read(b"600 URI Acquire\nURI: b\n\n600 URI Acquire\nURI: c\n\n")
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = spawn_reader_task("apt", stream, tx, Arc::new(TerminationState::new()));
        handle.await.unwrap();

        let mut uris = Vec::new();
        while let Some(frame) = rx.recv().await {
            uris.push(text(&frame).lines().nth(1).unwrap().to_string());
        }
        assert_eq!(uris, vec!["URI: a", "URI: b", "URI: c"]);
    }
}
