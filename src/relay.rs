//! Bidirectional relay between apt and the child transport.
//!
//! # Architecture
//!
//! ```text
//!   apt stdin ──reader("apt")──► queue ─┐               ┌─► writer ──► child stdin
//!                                       ├─ dispatcher ──┤
//!   child stdout ─reader("https")► queue┘               └─► writer ──► apt stdout
//! ```
//!
//! Readers, dispatcher and writers are separate tokio tasks connected by
//! unbounded channels. Each output has one writer, so order is preserved per
//! direction; there is no ordering between directions.
//!
//! # Lifecycle
//!
//! Running while either reader is alive. Once both inbound queues are closed
//! the relay drains: writers flush and close, and the child is interrupted if
//! the run ended because of SIGINT or a broken pipe. Then the child is reaped.

mod dispatch;
mod reader;
mod shutdown;
mod termination;
mod writer;

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use dispatch::DispatchStats;
pub use reader::FrameReader;
pub use shutdown::ShutdownCoordinator;
pub use termination::TerminationState;
pub use writer::WriterStats;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::intercept::Interceptor;
use dispatch::{DispatchQueues, Dispatcher};
use reader::spawn_reader_task;
use writer::{FrameSink, spawn_writer_task};

/// The four byte streams the relay connects.
pub struct RelayStreams<FI, FO, CI, CO> {
    /// Frames from apt.
    pub frontend_in: FI,
    /// Frames to apt.
    pub frontend_out: FO,
    /// The child's stdin.
    pub child_in: CI,
    /// The child's stdout.
    pub child_out: CO,
}

/// Counts gathered over one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub dispatch: DispatchStats,
    pub to_child: WriterStats,
    pub to_frontend: WriterStats,
}

/// Result of a complete run including the child transport.
#[derive(Debug)]
pub struct RelayOutcome {
    pub report: RelayReport,
    pub child_status: Option<ExitStatus>,
    pub interrupted: bool,
    pub broken_pipe: bool,
}

pub struct Relay {
    interceptor: Arc<Interceptor>,
    termination: Arc<TerminationState>,
}

impl Relay {
    pub fn new(interceptor: Arc<Interceptor>, termination: Arc<TerminationState>) -> Self {
        Self {
            interceptor,
            termination,
        }
    }

    /// Relay frames until both inputs have ended, then close both outputs.
    pub async fn run<FI, FO, CI, CO>(&self, streams: RelayStreams<FI, FO, CI, CO>) -> RelayReport
    where
        FI: AsyncRead + Unpin + Send + 'static,
        FO: AsyncWrite + Unpin + Send + 'static,
        CI: AsyncWrite + Unpin + Send + 'static,
        CO: AsyncRead + Unpin + Send + 'static,
    {
        let (apt_tx, from_frontend) = mpsc::unbounded_channel();
        let (https_tx, from_child) = mpsc::unbounded_channel();
        let (to_child, child_rx) = mpsc::unbounded_channel();
        let (to_frontend, frontend_rx) = mpsc::unbounded_channel();

        let readers = [
            spawn_reader_task(
                "apt",
                streams.frontend_in,
                apt_tx,
                Arc::clone(&self.termination),
            ),
            spawn_reader_task(
                "https",
                streams.child_out,
                https_tx,
                Arc::clone(&self.termination),
            ),
        ];
        let child_writer = spawn_writer_task(
            FrameSink::new("https", streams.child_in, Arc::clone(&self.termination)),
            child_rx,
        );
        let frontend_writer = spawn_writer_task(
            FrameSink::new("apt", streams.frontend_out, Arc::clone(&self.termination)),
            frontend_rx,
        );

        let dispatch = Dispatcher::new(
            Arc::clone(&self.interceptor),
            Arc::clone(&self.termination),
        )
        .run(DispatchQueues {
            from_frontend,
            from_child,
            to_child,
            to_frontend,
        })
        .await;

        for reader in readers {
            if let Err(e) = reader.await {
                log::warn!(target: "apt_tlog::reader", "Reader task failed: {}", e);
            }
        }

        RelayReport {
            dispatch,
            to_child: join_writer(child_writer).await,
            to_frontend: join_writer(frontend_writer).await,
        }
    }
}

async fn join_writer(handle: JoinHandle<WriterStats>) -> WriterStats {
    handle.await.unwrap_or_else(|e| {
        log::warn!(target: "apt_tlog::writer", "Writer task failed: {}", e);
        WriterStats::default()
    })
}

/// Set `interrupted` on every SIGINT for the rest of the process.
fn spawn_interrupt_listener(termination: Arc<TerminationState>) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!(
                    target: "apt_tlog::shutdown",
                    "Cannot listen for SIGINT: {}",
                    e
                );
                return;
            }
            termination.interrupt();
        }
    });
}

/// Run the method: spawn the child transport, relay stdin/stdout through it,
/// then shut the child down.
pub async fn run(config: &RelayConfig, argv0: Option<&OsStr>) -> RelayResult<RelayOutcome> {
    let termination = Arc::new(TerminationState::new());
    spawn_interrupt_listener(Arc::clone(&termination));

    let child_path = config.child_path(argv0);
    log::debug!(
        target: "apt_tlog::shutdown",
        "Starting child transport {}",
        child_path.display()
    );
    let mut child = Command::new(&child_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| RelayError::Spawn {
            path: child_path.clone(),
            source,
        })?;

    let child_in = child
        .stdin
        .take()
        .ok_or(RelayError::ChildStream { stream: "stdin" })?;
    let child_out = child
        .stdout
        .take()
        .ok_or(RelayError::ChildStream { stream: "stdout" })?;
    let mut coordinator = ShutdownCoordinator::new(child, config.child_exit_grace());

    let interceptor = Arc::new(Interceptor::from_settings(config.intercept.clone()));
    let relay = Relay::new(interceptor, Arc::clone(&termination));
    let report = relay
        .run(RelayStreams {
            frontend_in: tokio::io::stdin(),
            frontend_out: tokio::io::stdout(),
            child_in,
            child_out,
        })
        .await;

    coordinator.drain(&termination);
    let child_status = coordinator.reap().await;

    Ok(RelayOutcome {
        report,
        child_status,
        interrupted: termination.is_interrupted(),
        broken_pipe: termination.is_broken_pipe(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterceptSettings;
    use crate::error::InterceptError;
    use crate::intercept::{CompanionFetcher, SignatureVerifier};
    use crate::logging::OperatorSink;
    use std::path::Path;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct NoFetch;

    impl CompanionFetcher for NoFetch {
        fn fetch(&self, uri: &str) -> Result<Vec<u8>, InterceptError> {
            Err(InterceptError::fetch(uri, "offline"))
        }
    }

    struct NoVerify;

    impl SignatureVerifier for NoVerify {
        fn verify(&self, _artifact: &Path) -> Result<(), InterceptError> {
            Ok(())
        }
    }

    struct NoOperator;

    impl OperatorSink for NoOperator {
        fn line(&self, _text: &str) {}
    }

    fn relay(termination: Arc<TerminationState>) -> Relay {
        let interceptor = Interceptor::new(
            InterceptSettings::default(),
            Arc::new(NoFetch),
            Arc::new(NoVerify),
            Arc::new(NoOperator),
        );
        Relay::new(Arc::new(interceptor), termination)
    }

    #[tokio::test]
    async fn relays_both_directions_until_inputs_end() {
        let (mut apt, frontend) = tokio::io::duplex(1024);
        let (frontend_in, frontend_out) = tokio::io::split(frontend);
        let (mut https, child) = tokio::io::duplex(1024);
        let (child_out, child_in) = tokio::io::split(child);

        let handle = tokio::spawn(async move {
            relay(Arc::new(TerminationState::new()))
                .run(RelayStreams {
                    frontend_in,
                    frontend_out,
                    child_in,
                    child_out,
                })
                .await
        });

        const CONFIGURATION: &[u8] = b"601 Configuration\nConfig-Item: Acquire::Retries=3\n\n";
        const CAPABILITIES: &[u8] = b"100 Capabilities\nVersion: 1.2\n\n";

        apt.write_all(CONFIGURATION).await.unwrap();
        let mut received = vec![0u8; CONFIGURATION.len()];
        https.read_exact(&mut received).await.unwrap();
        assert_eq!(received, CONFIGURATION);

        https.write_all(CAPABILITIES).await.unwrap();
        let mut received = vec![0u8; CAPABILITIES.len()];
        apt.read_exact(&mut received).await.unwrap();
        assert_eq!(received, CAPABILITIES);

        drop(apt);
        drop(https);

        let report = handle.await.unwrap();
        assert_eq!(report.dispatch.forwarded, 2);
        assert_eq!(report.to_child.written, 1);
        assert_eq!(report.to_frontend.written, 1);
    }

    #[tokio::test]
    async fn interrupt_ends_the_relay_with_open_inputs() {
        let termination = Arc::new(TerminationState::new());
        let (_apt, frontend) = tokio::io::duplex(1024);
        let (frontend_in, frontend_out) = tokio::io::split(frontend);
        let (_https, child) = tokio::io::duplex(1024);
        let (child_out, child_in) = tokio::io::split(child);

        let relay = relay(Arc::clone(&termination));
        let handle = tokio::spawn(async move {
            relay
                .run(RelayStreams {
                    frontend_in,
                    frontend_out,
                    child_in,
                    child_out,
                })
                .await
        });

        termination.interrupt();
        let report = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("relay should stop after interrupt")
            .unwrap();
        assert_eq!(report.dispatch, DispatchStats::default());
    }

    #[tokio::test]
    async fn interrupt_ends_the_relay_while_the_child_stops_reading() {
        let termination = Arc::new(TerminationState::new());
        let (mut apt, frontend) = tokio::io::duplex(4096);
        let (frontend_in, frontend_out) = tokio::io::split(frontend);
        // The child never reads, so its 64-byte pipe fills on the first frame.
        let (_https, child) = tokio::io::duplex(64);
        let (child_out, child_in) = tokio::io::split(child);

        let relay = relay(Arc::clone(&termination));
        let handle = tokio::spawn(async move {
            relay
                .run(RelayStreams {
                    frontend_in,
                    frontend_out,
                    child_in,
                    child_out,
                })
                .await
        });

        let mut configuration = b"601 Configuration\n".to_vec();
        while configuration.len() < 1024 {
            configuration.extend_from_slice(b"Config-Item: Acquire::Retries=3\n");
        }
        configuration.push(b'\n');
        apt.write_all(&configuration).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        termination.interrupt();
        let report = tokio::time::timeout(std::time::Duration::from_secs(3), handle)
            .await
            .expect("relay should stop after interrupt")
            .unwrap();
        assert_eq!(report.dispatch.forwarded, 1);
        assert_eq!(report.to_child, WriterStats { written: 0, discarded: 1 });
    }
}
