//! Authorization flow from a raw redirect URI to a live credential,
//! including the pre-window buffering the app performs during startup.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::credentials::{CaptureOutcome, CredentialError, CredentialStore};
use crate::protocol::{self, PendingRedirect};
use crate::session::Session;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// What `deliver_redirect` does, with an injected clock: parse the URI and
/// feed the fragment parameters to the session.
fn deliver(
    session: &Session,
    uri: &str,
    now: DateTime<Utc>,
) -> Result<CaptureOutcome, String> {
    let params = protocol::parse(uri).map_err(|e| e.to_string())?;
    session
        .capture_redirect_at(&params, now)
        .map_err(|e| e.to_string())
}

#[test]
fn test_redirect_uri_becomes_live_credential() {
    let session = Session::new(CredentialStore::new());

    let outcome = deliver(
        &session,
        "myapp://callback#access_token=BQabc123&expires_in=3600",
        t0(),
    )
    .unwrap();
    assert_eq!(outcome, CaptureOutcome::Stored);

    assert_eq!(
        session.current_token_at(t0() + Duration::minutes(59)),
        Some("BQabc123".to_string())
    );
    assert_eq!(session.current_token_at(t0() + Duration::hours(1)), None);
}

#[test]
fn test_consent_denied_redirect_changes_nothing() {
    let session = Session::new(CredentialStore::new());
    deliver(
        &session,
        "myapp://callback#access_token=KEEP&expires_in=3600",
        t0(),
    )
    .unwrap();

    let outcome = deliver(&session, "myapp://callback#error=access_denied", t0()).unwrap();
    assert_eq!(outcome, CaptureOutcome::NoToken);
    assert_eq!(session.current_token_at(t0()), Some("KEEP".to_string()));
}

#[test]
fn test_malformed_expiry_is_rejected_and_previous_token_survives() {
    let session = Session::new(CredentialStore::new());
    deliver(
        &session,
        "myapp://callback#access_token=OLD&expires_in=3600",
        t0(),
    )
    .unwrap();

    let err = deliver(
        &session,
        "myapp://callback#access_token=NEW&expires_in=soon",
        t0(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CredentialError::MalformedExpiry("soon".to_string()).to_string()
    );
    assert_eq!(session.current_token_at(t0()), Some("OLD".to_string()));
}

#[test]
fn test_wrong_scheme_uri_is_dropped() {
    let session = Session::new(CredentialStore::new());
    assert!(deliver(
        &session,
        "https://attacker.example/#access_token=EVIL&expires_in=3600",
        t0(),
    )
    .is_err());
    assert_eq!(session.current_token_at(t0()), None);
}

#[test]
fn test_forwarded_launch_args_buffered_and_replayed_last_wins() {
    // Two second-launch argument lists arrive before the window is ready.
    let first_args = vec![
        "spotify-remote".to_string(),
        "myapp://callback#access_token=FIRST&expires_in=3600".to_string(),
    ];
    let second_args = vec![
        "spotify-remote".to_string(),
        "myapp://callback#access_token=SECOND&expires_in=3600".to_string(),
    ];

    let mut slot = PendingRedirect::default();
    for args in [&first_args, &second_args] {
        if let Some(uri) = protocol::find_redirect_in_args(args) {
            slot.buffer(uri);
        }
    }

    // Window ready: the slot yields only the newest redirect, exactly once.
    let session = Session::new(CredentialStore::new());
    let uri = slot.take().unwrap();
    deliver(&session, &uri, t0()).unwrap();
    assert_eq!(slot.take(), None);
    assert_eq!(session.current_token_at(t0()), Some("SECOND".to_string()));
}

#[test]
fn test_persisted_credential_survives_restart_until_expiry() {
    let session = Session::new(CredentialStore::new());
    deliver(
        &session,
        "myapp://callback#access_token=T&expires_in=3600",
        t0(),
    )
    .unwrap();
    let (token, expiration_ms) = session.credential_persisted_form().unwrap();

    // "Restart" shortly after: the credential comes back.
    let restored = Session::new(CredentialStore::from_persisted(
        Some(token.clone()),
        Some(expiration_ms),
        t0() + Duration::minutes(5),
    ));
    assert_eq!(
        restored.current_token_at(t0() + Duration::minutes(5)),
        Some("T".to_string())
    );

    // "Restart" after expiry: nothing is loaded.
    let stale = Session::new(CredentialStore::from_persisted(
        Some(token),
        Some(expiration_ms),
        t0() + Duration::hours(2),
    ));
    assert_eq!(stale.current_token_at(t0() + Duration::hours(2)), None);
}
