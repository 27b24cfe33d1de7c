//! Message codec for single frames.
//!
//! Field values are NOT interpreted here: `Last-Modified` stays a string and
//! `Config-Item` stays an unparsed `item=value` pair.

use thiserror::Error;

use super::status::StatusCode;

/// Reasons a frame cannot be decoded into a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,

    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid message header: {header:?}")]
    MalformedHeader { header: String },

    #[error("invalid message header status code: {token:?}")]
    UnknownStatus { token: String },

    #[error("invalid message header info for status code {code}: {info:?}")]
    InfoMismatch { code: u16, info: String },

    #[error("invalid header field: {line:?}")]
    MalformedField { line: String },
}

/// A decoded apt method message.
///
/// Fields keep their wire order and may repeat (e.g. several `Config-Item`
/// entries in a `601 Configuration`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: StatusCode,
    pub info: String,
    pub fields: Vec<(String, String)>,
}

impl Message {
    /// Create a message with the canonical info string and no fields.
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            info: code.info().to_string(),
            fields: Vec::new(),
        }
    }

    /// Append a field, keeping insertion order.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Value of the named field.
    ///
    /// When a name repeats, the last occurrence wins.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parse one raw frame (as read from a stream, trailing blank line included).
pub fn deserialize(raw: &[u8]) -> Result<Message, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;

    let mut lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Err(DecodeError::Empty);
    }

    let header = lines.remove(0);
    let mut tokens = header.split_whitespace();
    let (Some(code_token), Some(first_info)) = (tokens.next(), tokens.next()) else {
        return Err(DecodeError::MalformedHeader {
            header: header.to_string(),
        });
    };

    let code = code_token
        .parse::<u16>()
        .ok()
        .and_then(StatusCode::from_code)
        .ok_or_else(|| DecodeError::UnknownStatus {
            token: code_token.to_string(),
        })?;

    let info = std::iter::once(first_info)
        .chain(tokens)
        .collect::<Vec<_>>()
        .join(" ");
    if info != code.info() {
        return Err(DecodeError::InfoMismatch {
            code: code.code(),
            info,
        });
    }

    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut fields = Vec::with_capacity(lines.len());
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(DecodeError::MalformedField {
                line: line.to_string(),
            });
        };
        fields.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(Message { code, info, fields })
}

/// Encode a message as a complete frame.
///
/// An empty `info` falls back to the canonical string for the code. Values
/// are written as-is; use [`escape_value`] for text that may contain line
/// breaks.
pub fn serialize(message: &Message) -> String {
    let info = if message.info.is_empty() {
        message.code.info()
    } else {
        message.info.as_str()
    };

    let mut out = format!("{} {}\n", message.code.code(), info);
    for (name, value) in &message.fields {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Escape LF and CR so a value cannot break the line-oriented framing.
///
/// The method interface nominally follows RFC 822, which would allow folded
/// continuation lines, but apt splits strictly on LF.
pub fn escape_value(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}
