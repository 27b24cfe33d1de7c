//! Mapping between acquired index files and their companion signatures.

use std::path::PathBuf;

use crate::config::InterceptSettings;
use crate::error::InterceptError;

/// Companion signature URI for an acquired index URI.
///
/// Everything up to and including the last marker segment is replaced by the
/// companion base, and the companion suffix is appended:
/// `tlog://deb.debian.org/debian/dists/bookworm/InRelease` becomes
/// `<base>bookworm/InRelease.spicy`. A URI without the marker is rejected
/// rather than turned into a malformed URI.
pub fn derive_companion_uri(
    uri: &str,
    settings: &InterceptSettings,
) -> Result<String, InterceptError> {
    let Some((_, tail)) = uri.rsplit_once(settings.marker.as_str()) else {
        return Err(InterceptError::companion_uri(
            uri,
            format!("no {:?} segment", settings.marker),
        ));
    };

    let derived = format!(
        "{}{}{}",
        settings.companion_base, tail, settings.companion_suffix
    );
    url::Url::parse(&derived).map_err(|e| {
        InterceptError::companion_uri(uri, format!("{:?} is not a valid URL: {}", derived, e))
    })?;

    Ok(derived)
}

/// Local path the companion artifact is stored at: the artifact path with the
/// companion suffix appended (not substituted for an extension).
pub fn companion_path(filename: &str, settings: &InterceptSettings) -> PathBuf {
    PathBuf::from(format!("{}{}", filename, settings.companion_suffix))
}

/// Name of the watched index file, e.g. `InRelease`.
pub fn watched_name(settings: &InterceptSettings) -> &str {
    settings.watched_suffix.trim_start_matches('/')
}

/// Operator line printed after a successful verification.
///
/// Mirrors apt's own `Get:`/`Hit:` lines: `<archive base> <suite> InRelease.spicy`.
pub fn confirmation_line(uri: &str, settings: &InterceptSettings) -> String {
    let (base, rest) = uri
        .split_once(settings.marker.as_str())
        .unwrap_or((uri, ""));
    let suite = rest.split('/').next().unwrap_or("");

    format!(
        "\r 🌶️    {} {} {}{}",
        base,
        suite,
        watched_name(settings),
        settings.companion_suffix
    )
}
