//! Download of companion signature resources.

use crate::error::InterceptError;

/// Fetches one companion resource.
///
/// Implementations are called from the blocking pool and may block.
pub trait CompanionFetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, InterceptError>;
}

/// Plain HTTP(S) GET; any non-2xx status is a failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl CompanionFetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, InterceptError> {
        let response =
            reqwest::blocking::get(uri).map_err(|e| InterceptError::fetch(uri, e.to_string()))?;

        if !response.status().is_success() {
            return Err(InterceptError::fetch(
                uri,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|e| InterceptError::fetch(uri, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const COMPANION_PATH: &str = "/spicy/bookworm/InRelease.spicy";

    #[test]
    fn fetch_returns_body_on_success() {
        let server = MockServer::start();
        let companion = server.mock(|when, then| {
            when.method(GET).path(COMPANION_PATH);
            then.status(200).body("signature");
        });

        let body = HttpFetcher.fetch(&server.url(COMPANION_PATH)).unwrap();

        assert_eq!(body, b"signature");
        companion.assert_calls(1);
    }

    #[test]
    fn fetch_fails_on_non_success_status() {
        let server = MockServer::start();
        let companion = server.mock(|when, then| {
            when.method(GET).path(COMPANION_PATH);
            then.status(404);
        });
        let uri = server.url(COMPANION_PATH);

        let error = HttpFetcher.fetch(&uri).unwrap_err();

        match error {
            InterceptError::Fetch { uri: failed, reason } => {
                assert_eq!(failed, uri);
                assert!(reason.contains("404"), "reason: {}", reason);
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
        companion.assert_calls(1);
    }

    #[test]
    fn fetch_fails_on_unparseable_uri() {
        let result = HttpFetcher.fetch("not a uri");
        assert!(matches!(result, Err(InterceptError::Fetch { .. })));
    }
}
