//! Status codes of the apt method interface.

use std::fmt;

/// Message type, identified by its status code.
///
/// The codes 402 and 403 require the method to keep reading 6xx messages
/// until the matching 602/603 arrives, so any number of 600 messages may
/// precede them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Method capabilities
    Capabilities,
    /// General logging
    Log,
    /// Inter-URI status reporting (progress)
    Status,
    /// URI is starting acquire
    UriStart,
    /// URI is finished acquire
    UriDone,
    /// URI has failed to acquire
    UriFailure,
    /// Method did not like something sent to it
    GeneralFailure,
    /// Method requires user/pass authorization for the URI
    AuthorizationRequired,
    /// Method requires a media change
    MediaFailure,
    /// Request a URI be acquired
    UriAcquire,
    /// Sends the configuration space
    Configuration,
    /// Response to 402
    AuthorizationCredentials,
    /// Response to 403
    MediaChanged,
}

impl StatusCode {
    /// Every known status code, in table order.
    pub const ALL: [StatusCode; 13] = [
        StatusCode::Capabilities,
        StatusCode::Log,
        StatusCode::Status,
        StatusCode::UriStart,
        StatusCode::UriDone,
        StatusCode::UriFailure,
        StatusCode::GeneralFailure,
        StatusCode::AuthorizationRequired,
        StatusCode::MediaFailure,
        StatusCode::UriAcquire,
        StatusCode::Configuration,
        StatusCode::AuthorizationCredentials,
        StatusCode::MediaChanged,
    ];

    /// Look up a status code by its numeric value.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Numeric value as it appears on the wire.
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Capabilities => 100,
            StatusCode::Log => 101,
            StatusCode::Status => 102,
            StatusCode::UriStart => 200,
            StatusCode::UriDone => 201,
            StatusCode::UriFailure => 400,
            StatusCode::GeneralFailure => 401,
            StatusCode::AuthorizationRequired => 402,
            StatusCode::MediaFailure => 403,
            StatusCode::UriAcquire => 600,
            StatusCode::Configuration => 601,
            StatusCode::AuthorizationCredentials => 602,
            StatusCode::MediaChanged => 603,
        }
    }

    /// Canonical info string that follows the code in a header line.
    pub fn info(self) -> &'static str {
        match self {
            StatusCode::Capabilities => "Capabilities",
            StatusCode::Log => "Log",
            StatusCode::Status => "Status",
            StatusCode::UriStart => "URI Start",
            StatusCode::UriDone => "URI Done",
            StatusCode::UriFailure => "URI Failure",
            StatusCode::GeneralFailure => "General Failure",
            StatusCode::AuthorizationRequired => "Authorization Required",
            StatusCode::MediaFailure => "Media Failure",
            StatusCode::UriAcquire => "URI Acquire",
            StatusCode::Configuration => "Configuration",
            StatusCode::AuthorizationCredentials => "Authorization Credentials",
            StatusCode::MediaChanged => "Media Changed",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.info())
    }
}
