//! Default configuration values.
//!
//! These reproduce the behaviour of a stock install: relay to the `https`
//! method and verify Debian `InRelease` files against the public spicy log.

use super::{InterceptSettings, RelayConfig};
use std::path::PathBuf;

/// File name of the child transport, looked up next to the relay executable.
pub const CHILD_METHOD_NAME: &str = "https";

pub const LOG_FILE: &str = "/var/log/apt/tlog.log";

pub const CHILD_EXIT_GRACE_MS: u64 = 2000;

pub const WATCHED_SUFFIX: &str = "/InRelease";

pub const MARKER: &str = "/dists/";

pub const COMPANION_BASE: &str = "https://debian-spicy-signatures.fly.storage.tigris.dev/debian/";

pub const COMPANION_SUFFIX: &str = ".spicy";

pub const VERIFIER_PROGRAM: &str = "spicy";

pub const VERIFIER_KEY: &str =
    "filippo.io/debian-archive+6c61b70b+Aaw9ASjgICSzfKJDcCqz7l3FtSpKvQYCvaRfdfOiIRun";

pub fn default_config() -> RelayConfig {
    RelayConfig {
        child_method: None,
        log_file: Some(PathBuf::from(LOG_FILE)),
        child_exit_grace_ms: CHILD_EXIT_GRACE_MS,
        intercept: default_intercept_settings(),
    }
}

pub fn default_intercept_settings() -> InterceptSettings {
    InterceptSettings {
        watched_suffix: WATCHED_SUFFIX.to_string(),
        marker: MARKER.to_string(),
        companion_base: COMPANION_BASE.to_string(),
        companion_suffix: COMPANION_SUFFIX.to_string(),
        verifier_program: VERIFIER_PROGRAM.to_string(),
        verifier_key: VERIFIER_KEY.to_string(),
        fail_closed: false,
    }
}
