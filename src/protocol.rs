//! apt method interface wire protocol.
//!
//! Every frame is a header line `"<code> <info>"`, zero or more
//! `"<Name>: <value>"` field lines, and a terminating blank line. The first
//! three digits of the header carry the usual HTTP-like meaning (1xx
//! informational, 2xx success, 4xx failure); 6xx codes are only ever sent
//! *to* a method.
//!
//! # Components
//!
//! - `StatusCode`: the fixed status table and its canonical info strings
//! - `Message`: a decoded frame with ordered, possibly duplicated fields
//! - `RawFrame`: the undecoded bytes exchanged between readers and writers

mod frame;
mod message;
mod status;

pub use frame::{Direction, RawFrame};
pub use message::{DecodeError, Message, deserialize, escape_value, serialize};
pub use status::StatusCode;
