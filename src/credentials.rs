use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters extracted from a redirect URI's fragment.
pub type FragmentParams = HashMap<String, String>;

/// A captured Spotify access token together with its absolute expiry instant.
///
/// Constructed only with both fields present: a token without a known expiry
/// cannot exist, which is the invariant the implicit grant requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Redirect carried a non-numeric expires_in value: {0:?}")]
    MalformedExpiry(String),
}

/// Outcome of feeding redirect fragment parameters to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A token was present and is now the current credential.
    Stored,
    /// No `access_token` in the fragment (e.g. the user denied consent).
    /// Expected occasionally; the previous credential is untouched.
    NoToken,
}

/// Holds the single current credential and answers "is it usable now?".
///
/// Expiry is not a background timer: a credential found expired at the moment
/// validity is evaluated is cleared on the spot, which is what drives the UI
/// back to the login prompt.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the store from persisted values (token + epoch milliseconds).
    /// An incomplete or already-expired pair loads as empty.
    pub fn from_persisted(
        token: Option<String>,
        expiration_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        let current = match (token, expiration_ms) {
            (Some(access_token), Some(ms)) if !access_token.is_empty() => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(|expires_at| Credential {
                    access_token,
                    expires_at,
                })
                .filter(|c| c.is_valid_at(now)),
            _ => None,
        };
        Self { current }
    }

    /// Extract `access_token` and `expires_in` from redirect fragment
    /// parameters and make them the current credential.
    ///
    /// A fragment without `access_token` is a no-op ([`CaptureOutcome::NoToken`]).
    /// A token with a missing or non-numeric `expires_in` is a malformed
    /// redirect rather than a credential with a guessed lifetime.
    pub fn capture_at(
        &mut self,
        params: &FragmentParams,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome, CredentialError> {
        let Some(access_token) = params.get("access_token").filter(|t| !t.is_empty()) else {
            log::info!("Redirect fragment carried no access token; ignoring");
            return Ok(CaptureOutcome::NoToken);
        };

        let raw_expiry = params.get("expires_in").cloned().unwrap_or_default();
        let expires_in: i64 = raw_expiry
            .parse()
            .map_err(|_| CredentialError::MalformedExpiry(raw_expiry.clone()))?;

        self.current = Some(Credential {
            access_token: access_token.clone(),
            expires_at: now + Duration::seconds(expires_in),
        });
        log::info!("Access token captured (expires in {}s)", expires_in);
        Ok(CaptureOutcome::Stored)
    }

    pub fn capture(&mut self, params: &FragmentParams) -> Result<CaptureOutcome, CredentialError> {
        self.capture_at(params, Utc::now())
    }

    /// True iff a token is stored and not yet expired. Finding the stored
    /// credential expired clears it as a side effect.
    pub fn is_valid_at(&mut self, now: DateTime<Utc>) -> bool {
        match &self.current {
            Some(credential) if credential.is_valid_at(now) => true,
            Some(_) => {
                log::info!("Stored access token has expired; clearing it");
                self.current = None;
                false
            }
            None => false,
        }
    }

    pub fn is_valid(&mut self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// The current token, or `None` (clearing an expired credential first).
    pub fn token_at(&mut self, now: DateTime<Utc>) -> Option<String> {
        if self.is_valid_at(now) {
            self.current.as_ref().map(|c| c.access_token.clone())
        } else {
            None
        }
    }

    pub fn token(&mut self) -> Option<String> {
        self.token_at(Utc::now())
    }

    /// Drop the stored credential. Returns true if there was one to drop.
    pub fn invalidate(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// Snapshot for persistence: (token, expiry epoch milliseconds).
    pub fn persisted_form(&self) -> Option<(String, i64)> {
        self.current
            .as_ref()
            .map(|c| (c.access_token.clone(), c.expires_at.timestamp_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> FragmentParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_capture_stores_token_until_expiry() {
        let mut store = CredentialStore::new();
        let outcome = store
            .capture_at(
                &params(&[("access_token", "T"), ("expires_in", "3600")]),
                t0(),
            )
            .unwrap();
        assert_eq!(outcome, CaptureOutcome::Stored);

        // Valid right up to (but not at) the expiry instant.
        assert_eq!(store.token_at(t0()), Some("T".to_string()));
        assert_eq!(
            store.token_at(t0() + Duration::seconds(3599)),
            Some("T".to_string())
        );
        assert_eq!(store.token_at(t0() + Duration::seconds(3600)), None);
    }

    #[test]
    fn test_expired_credential_is_cleared_on_evaluation() {
        let mut store = CredentialStore::new();
        store
            .capture_at(&params(&[("access_token", "T"), ("expires_in", "10")]), t0())
            .unwrap();

        assert!(!store.is_valid_at(t0() + Duration::seconds(11)));
        // The clear is sticky: even asking again at an earlier instant finds nothing.
        assert!(!store.is_valid_at(t0()));
        assert_eq!(store.persisted_form(), None);
    }

    #[test]
    fn test_capture_without_token_is_a_noop() {
        let mut store = CredentialStore::new();
        store
            .capture_at(
                &params(&[("access_token", "KEEP"), ("expires_in", "3600")]),
                t0(),
            )
            .unwrap();

        let outcome = store
            .capture_at(&params(&[("error", "access_denied")]), t0())
            .unwrap();
        assert_eq!(outcome, CaptureOutcome::NoToken);
        assert_eq!(store.token_at(t0()), Some("KEEP".to_string()));
    }

    #[test]
    fn test_non_numeric_expires_in_is_malformed() {
        let mut store = CredentialStore::new();
        let err = store
            .capture_at(
                &params(&[("access_token", "T"), ("expires_in", "soon")]),
                t0(),
            )
            .unwrap_err();
        assert_eq!(err, CredentialError::MalformedExpiry("soon".to_string()));
        assert!(!store.is_valid_at(t0()));
    }

    #[test]
    fn test_missing_expires_in_is_malformed() {
        let mut store = CredentialStore::new();
        let err = store
            .capture_at(&params(&[("access_token", "T")]), t0())
            .unwrap_err();
        assert_eq!(err, CredentialError::MalformedExpiry(String::new()));
    }

    #[test]
    fn test_invalidate_clears_token() {
        let mut store = CredentialStore::new();
        store
            .capture_at(
                &params(&[("access_token", "T"), ("expires_in", "3600")]),
                t0(),
            )
            .unwrap();
        assert!(store.invalidate());
        assert!(!store.invalidate());
        assert_eq!(store.token_at(t0()), None);
    }

    #[test]
    fn test_persisted_round_trip() {
        let mut store = CredentialStore::new();
        store
            .capture_at(
                &params(&[("access_token", "T"), ("expires_in", "3600")]),
                t0(),
            )
            .unwrap();
        let (token, ms) = store.persisted_form().unwrap();

        let mut restored = CredentialStore::from_persisted(Some(token), Some(ms), t0());
        assert_eq!(restored.token_at(t0()), Some("T".to_string()));
    }

    #[test]
    fn test_persisted_expired_pair_loads_empty() {
        let stale_ms = (t0() - Duration::hours(1)).timestamp_millis();
        let mut restored =
            CredentialStore::from_persisted(Some("T".to_string()), Some(stale_ms), t0());
        assert_eq!(restored.token_at(t0()), None);
    }

    #[test]
    fn test_persisted_partial_pair_loads_empty() {
        let mut restored = CredentialStore::from_persisted(Some("T".to_string()), None, t0());
        assert_eq!(restored.token_at(t0()), None);
    }
}
