//! Relay configuration.
//!
//! apt starts methods without arguments, so everything has a working default
//! (see [`defaults`]). An optional TOML file may override any of them:
//!
//! ```toml
//! child_method = "/usr/lib/apt/methods/https"
//! log_file = "/var/log/apt/tlog.log"
//!
//! [intercept]
//! companion_base = "https://mirror.example/spicy/debian/"
//! fail_closed = true
//! ```

pub mod defaults;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RelayError, RelayResult};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "APT_TLOG_CONFIG";

/// Configuration file picked up when nothing else is specified.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/apt/tlog.toml";

/// Top-level relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Child transport executable. `None` means the `https` method next to
    /// the invoking executable.
    pub child_method: Option<PathBuf>,
    /// Debug log destination. An empty path disables the file sink.
    pub log_file: Option<PathBuf>,
    /// How long to wait for the child to exit before killing it.
    pub child_exit_grace_ms: u64,
    pub intercept: InterceptSettings,
}

/// Settings of the `URI Done` interception.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptSettings {
    /// Trailing path segment of index files subject to verification.
    pub watched_suffix: String,
    /// Path segment after which the URI is re-rooted under `companion_base`.
    pub marker: String,
    /// Remote base of companion signature resources.
    pub companion_base: String,
    /// Suffix of both the companion URI and the local companion file.
    pub companion_suffix: String,
    /// External verifier executable.
    pub verifier_program: String,
    /// Verifier key / log origin passed to `-verify`.
    pub verifier_key: String,
    /// Suppress `URI Done` and report `URI Failure` when verification fails.
    pub fail_closed: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        defaults::default_config()
    }
}

impl Default for InterceptSettings {
    fn default() -> Self {
        defaults::default_intercept_settings()
    }
}

impl RelayConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> RelayResult<Self> {
        toml::from_str(content).map_err(|e| RelayError::config(e.to_string()))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| RelayError::config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve the configuration source.
    ///
    /// Precedence: `explicit` (usually `--config`), then `$APT_TLOG_CONFIG`,
    /// then [`SYSTEM_CONFIG_PATH`] if it exists, then built-in defaults. An
    /// explicitly named file that cannot be read is an error.
    pub fn discover(explicit: Option<&Path>) -> RelayResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
            return Self::load(Path::new(&path));
        }

        let system = Path::new(SYSTEM_CONFIG_PATH);
        if system.is_file() {
            return Self::load(system);
        }

        Ok(Self::default())
    }

    /// Path of the child transport.
    ///
    /// Without an explicit `child_method`, this is the `https` method
    /// installed next to `argv0`.
    pub fn child_path(&self, argv0: Option<&OsStr>) -> PathBuf {
        if let Some(path) = &self.child_method {
            return path.clone();
        }

        let dir = argv0
            .map(Path::new)
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        dir.join(defaults::CHILD_METHOD_NAME)
    }

    /// Log file to append diagnostics to, if enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn child_exit_grace(&self) -> Duration {
        Duration::from_millis(self.child_exit_grace_ms)
    }
}
