//! `URI Done` interception.
//!
//! Every frame coming back from the child is classified. Only a `201 URI Done`
//! for a watched index file that was actually downloaded (no `IMS-Hit: true`)
//! is verified; everything else passes through untouched and without side
//! effects.
//!
//! Verification is a strict sequence: report progress, derive the companion
//! URI, download it next to the artifact, report progress again, run the
//! verifier, print the operator confirmation. The first failing step ends the
//! attempt. Whether the original frame is then still forwarded depends on
//! `fail_closed`.

pub mod companion;
pub mod fetch;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

pub use fetch::{CompanionFetcher, HttpFetcher};
pub use verify::{CommandVerifier, SignatureVerifier};

use crate::config::InterceptSettings;
use crate::error::InterceptError;
use crate::logging::{OperatorSink, StderrSink};
use crate::protocol::{Message, RawFrame, StatusCode, escape_value, serialize};

/// What happens to the frame that was inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forward,
    Suppress,
}

impl Decision {
    pub fn is_forward(self) -> bool {
        matches!(self, Decision::Forward)
    }
}

/// Outcome of classifying a message, before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Forward,
    Verify(VerifyRequest),
}

/// A `URI Done` that needs its companion signature checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub uri: String,
    pub filename: Option<String>,
}

/// Handle for writing status frames towards the front-end.
///
/// Frames go through the front-end writer's queue, so they are written before
/// the `URI Done` that triggered them is forwarded.
#[derive(Debug, Clone, Default)]
pub struct StatusEmitter {
    tx: Option<UnboundedSender<RawFrame>>,
}

impl StatusEmitter {
    pub fn new(tx: UnboundedSender<RawFrame>) -> Self {
        Self { tx: Some(tx) }
    }

    /// An emitter whose frames go nowhere (front-end output already closed).
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// `102 Status` with `Message` and `URI`.
    pub fn status(&self, uri: &str, text: &str) {
        self.emit(
            Message::new(StatusCode::Status)
                .with_field("Message", escape_value(text))
                .with_field("URI", escape_value(uri)),
        );
    }

    /// `400 URI Failure` with `URI` and `Message`.
    pub fn uri_failure(&self, uri: &str, text: &str) {
        self.emit(
            Message::new(StatusCode::UriFailure)
                .with_field("URI", escape_value(uri))
                .with_field("Message", escape_value(text)),
        );
    }

    fn emit(&self, message: Message) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(RawFrame::from(serialize(&message))).is_err() {
            log::debug!(
                target: "apt_tlog::intercept",
                "Front-end writer gone, dropping {} frame",
                message.code
            );
        }
    }
}

/// Verifies watched index files against their companion signatures.
pub struct Interceptor {
    settings: InterceptSettings,
    fetcher: Arc<dyn CompanionFetcher>,
    verifier: Arc<dyn SignatureVerifier>,
    operator: Arc<dyn OperatorSink>,
}

impl Interceptor {
    pub fn new(
        settings: InterceptSettings,
        fetcher: Arc<dyn CompanionFetcher>,
        verifier: Arc<dyn SignatureVerifier>,
        operator: Arc<dyn OperatorSink>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            verifier,
            operator,
        }
    }

    /// Production wiring: HTTP download, external verifier, stderr.
    pub fn from_settings(settings: InterceptSettings) -> Self {
        let verifier = CommandVerifier::new(&settings.verifier_program, &settings.verifier_key);
        Self::new(
            settings,
            Arc::new(HttpFetcher),
            Arc::new(verifier),
            Arc::new(StderrSink),
        )
    }

    /// Decide whether `message` needs verification. No side effects.
    pub fn classify(&self, message: &Message) -> Action {
        if message.code != StatusCode::UriDone {
            return Action::Forward;
        }

        let Some(uri) = message.field("URI") else {
            return Action::Forward;
        };
        if !uri.ends_with(self.settings.watched_suffix.as_str()) {
            return Action::Forward;
        }
        if message.field("IMS-Hit") == Some("true") {
            log::debug!(
                target: "apt_tlog::intercept",
                "{} unchanged since last fetch, skipping verification",
                uri
            );
            return Action::Forward;
        }

        Action::Verify(VerifyRequest {
            uri: uri.to_string(),
            filename: message.field("Filename").map(str::to_string),
        })
    }

    /// Run one verification attempt. Blocks on network and process I/O.
    pub fn verify(&self, request: &VerifyRequest, emitter: &StatusEmitter) -> Decision {
        match self.try_verify(request, emitter) {
            Ok(()) => Decision::Forward,
            Err(error) if self.settings.fail_closed => {
                log::error!(
                    target: "apt_tlog::intercept",
                    "Rejecting {}: {}",
                    request.uri,
                    error
                );
                emitter.uri_failure(&request.uri, &error.to_string());
                Decision::Suppress
            }
            Err(error) => {
                log::error!(
                    target: "apt_tlog::intercept",
                    "Verification of {} failed, forwarding anyway: {}",
                    request.uri,
                    error
                );
                Decision::Forward
            }
        }
    }

    /// Classify and, if needed, verify in one step.
    pub fn inspect(&self, message: &Message, emitter: &StatusEmitter) -> Decision {
        match self.classify(message) {
            Action::Forward => Decision::Forward,
            Action::Verify(request) => self.verify(&request, emitter),
        }
    }

    fn try_verify(
        &self,
        request: &VerifyRequest,
        emitter: &StatusEmitter,
    ) -> Result<(), InterceptError> {
        let uri = request.uri.as_str();
        emitter.status(uri, &self.progress_text("Fetching"));

        let companion_uri = companion::derive_companion_uri(uri, &self.settings)?;
        let filename = request
            .filename
            .as_deref()
            .ok_or(InterceptError::MissingField { field: "Filename" })?;

        log::debug!(
            target: "apt_tlog::intercept",
            "Fetching {} for {}",
            companion_uri,
            filename
        );
        let body = self.fetcher.fetch(&companion_uri)?;

        let path = companion::companion_path(filename, &self.settings);
        std::fs::write(&path, &body).map_err(|source| InterceptError::Persist {
            path: path.clone(),
            source,
        })?;

        emitter.status(uri, &self.progress_text("Verifying"));
        self.verifier.verify(Path::new(filename))?;

        log::debug!(target: "apt_tlog::intercept", "Verified {}", filename);
        self.operator
            .line(&companion::confirmation_line(uri, &self.settings));
        Ok(())
    }

    /// e.g. "Fetching InRelease file spicy signature".
    fn progress_text(&self, verb: &str) -> String {
        format!(
            "{} {} file {} signature",
            verb,
            companion::watched_name(&self.settings),
            self.settings.companion_suffix.trim_start_matches('.')
        )
    }
}
