//! apt method that relays between apt and the stock `https` method and checks
//! each freshly downloaded `InRelease` file against a transparency-log
//! ("spicy") signature before apt gets to see it.

pub mod config;
pub mod error;
pub mod intercept;
pub mod logging;
pub mod protocol;
pub mod relay;

pub use config::{InterceptSettings, RelayConfig};
pub use error::{DecodeError, InterceptError, RelayError, RelayResult};
pub use intercept::{Decision, Interceptor};
pub use protocol::{Message, RawFrame, StatusCode, deserialize, serialize};
pub use relay::{Relay, RelayOutcome, RelayStreams, TerminationState, run};
