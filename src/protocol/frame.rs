//! Undecoded frames and relay directions.

use std::fmt;

/// Blank-line terminator that closes every frame.
pub(crate) const FRAME_TERMINATOR: &[u8] = b"\n\n";

/// One wire-encoded frame exactly as it was read.
///
/// Frames are forwarded verbatim; decoding only happens on a copy so a lossy
/// decode/encode cycle can never alter what the peer receives.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame(Vec<u8>);

impl RawFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Whether the frame carries its blank-line terminator.
    ///
    /// Only the last frame of a stream may be incomplete.
    pub fn is_terminated(&self) -> bool {
        self.0.ends_with(FRAME_TERMINATOR)
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for RawFrame {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Which output stream a frame is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Front-end stdin → child transport stdin
    ToChild,
    /// Child transport stdout → front-end stdout
    ToFrontend,
}

impl Direction {
    /// Name of the peer that produced frames travelling in this direction.
    pub fn source(self) -> &'static str {
        match self {
            Direction::ToChild => "apt",
            Direction::ToFrontend => "https",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToChild => f.write_str("frontend→child"),
            Direction::ToFrontend => f.write_str("child→frontend"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_frames_end_with_blank_line() {
        assert!(RawFrame::from("100 Capabilities\n\n").is_terminated());
        assert!(!RawFrame::from("100 Capabilities\n").is_terminated());
        assert!(!RawFrame::from("").is_terminated());
    }

    #[test]
    fn debug_output_is_readable_text() {
        let frame = RawFrame::from("101 Log\n\n");
        assert_eq!(format!("{:?}", frame), "RawFrame(\"101 Log\\n\\n\")");
    }
}
