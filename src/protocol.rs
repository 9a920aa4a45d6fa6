use url::Url;

use crate::credentials::FragmentParams;

/// Custom URI scheme this app registers with the OS.
pub const CUSTOM_SCHEME: &str = "myapp";

/// Prefix used to spot a redirect URI among forwarded launch arguments.
pub const SCHEME_PREFIX: &str = "myapp://";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RedirectError {
    /// The URI could not be parsed or carried the wrong scheme. Recovered
    /// locally: the invocation is logged and dropped, never a crash.
    #[error("Malformed redirect: {0}")]
    MalformedRedirect(String),
}

/// Parse a custom-scheme redirect URI into its fragment parameters.
///
/// The implicit grant returns the token in the fragment (after `#`), not the
/// query string, so only the fragment is consulted.
pub fn parse(uri: &str) -> Result<FragmentParams, RedirectError> {
    let parsed = Url::parse(uri)
        .map_err(|e| RedirectError::MalformedRedirect(format!("unparseable URI: {}", e)))?;

    if parsed.scheme() != CUSTOM_SCHEME {
        return Err(RedirectError::MalformedRedirect(format!(
            "unexpected scheme '{}' (expected '{}')",
            parsed.scheme(),
            CUSTOM_SCHEME
        )));
    }

    let fragment = parsed.fragment().unwrap_or("");
    Ok(url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect())
}

/// Scan forwarded launch arguments for a custom-scheme URI.
pub fn find_redirect_in_args<I, S>(args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| a.as_ref().to_string())
        .find(|a| a.starts_with(SCHEME_PREFIX))
}

/// Single-slot buffer for a redirect that arrived before the main window
/// existed. Only the newest redirect is meaningful, so buffering a second
/// one overwrites the first (last wins); the slot is consumed exactly once
/// when the window becomes ready.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum PendingRedirect {
    #[default]
    None,
    Buffered(String),
}

impl PendingRedirect {
    pub fn buffer(&mut self, uri: String) {
        if let PendingRedirect::Buffered(old) = self {
            log::info!("Replacing buffered redirect {} with newer one", old);
        }
        *self = PendingRedirect::Buffered(uri);
    }

    /// Take the buffered URI, leaving the slot empty.
    pub fn take(&mut self) -> Option<String> {
        match std::mem::take(self) {
            PendingRedirect::None => None,
            PendingRedirect::Buffered(uri) => Some(uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_fragment_params() {
        let params = parse("myapp://cb#access_token=XYZ&expires_in=3600").unwrap();
        assert_eq!(params.get("access_token").map(String::as_str), Some("XYZ"));
        assert_eq!(params.get("expires_in").map(String::as_str), Some("3600"));
    }

    #[test]
    fn test_parse_ignores_query_string() {
        // Implicit grant tokens live in the fragment; a query-only variant
        // yields no parameters rather than a token.
        let params = parse("myapp://cb?access_token=XYZ&expires_in=3600").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_scheme() {
        let err = parse("https://example.com/cb#access_token=XYZ").unwrap_err();
        assert!(matches!(err, RedirectError::MalformedRedirect(_)));
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("not a uri at all").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_parse_decodes_percent_encoding() {
        let params = parse("myapp://cb#access_token=a%2Bb&expires_in=60").unwrap();
        assert_eq!(params.get("access_token").map(String::as_str), Some("a+b"));
    }

    #[test]
    fn test_find_redirect_in_args() {
        let args = vec![
            "/usr/bin/spotify-remote",
            "--flag",
            "myapp://cb#access_token=XYZ",
        ];
        assert_eq!(
            find_redirect_in_args(args),
            Some("myapp://cb#access_token=XYZ".to_string())
        );
        assert_eq!(find_redirect_in_args(["a", "b"]), None);
    }

    #[test]
    fn test_pending_redirect_last_wins() {
        let mut slot = PendingRedirect::default();
        assert_eq!(slot.take(), None);

        slot.buffer("myapp://cb#first".to_string());
        slot.buffer("myapp://cb#second".to_string());
        assert_eq!(slot.take(), Some("myapp://cb#second".to_string()));

        // Consumed exactly once.
        assert_eq!(slot.take(), None);
    }
}
