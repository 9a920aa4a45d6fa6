//! Session facade: the one surface the UI/API layer talks to.
//!
//! Wraps the credential store behind subscription-based change notification
//! and fans out logical shortcut actions to whoever wants them. All work here
//! is synchronous and fast; anything slow (network calls) happens in
//! subscribers, fire-and-forget.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;

use crate::credentials::{CaptureOutcome, Credential, CredentialError, CredentialStore, FragmentParams};
use crate::settings::Action;

type CredentialListener = Box<dyn Fn(Option<&Credential>) + Send>;
type ActionListener = Box<dyn Fn(Action) + Send>;

/// Process-wide session object: created at startup, mutated only through
/// these methods, torn down at shutdown.
pub struct Session {
    credentials: Mutex<CredentialStore>,
    credential_listeners: Mutex<Vec<CredentialListener>>,
    action_listeners: Mutex<Vec<ActionListener>>,
}

impl Session {
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials: Mutex::new(credentials),
            credential_listeners: Mutex::new(Vec::new()),
            action_listeners: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to credential capture/invalidation. The callback receives
    /// the new credential, or `None` when it was cleared.
    pub fn on_credential_change<F>(&self, f: F)
    where
        F: Fn(Option<&Credential>) + Send + 'static,
    {
        self.credential_listeners.lock().unwrap().push(Box::new(f));
    }

    /// Subscribe to logical shortcut actions. This is the sole bridge from
    /// the shortcut registry to the code issuing the corresponding API call.
    pub fn on_action<F>(&self, f: F)
    where
        F: Fn(Action) + Send + 'static,
    {
        self.action_listeners.lock().unwrap().push(Box::new(f));
    }

    /// The current token, or `None`. Evaluating this on an expired
    /// credential clears it and notifies subscribers.
    pub fn current_token(&self) -> Option<String> {
        self.current_token_at(Utc::now())
    }

    pub fn current_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        let (token, expired) = {
            let mut store = self.credentials.lock().unwrap();
            let had_credential = store.persisted_form().is_some();
            let token = store.token_at(now);
            (token.clone(), had_credential && token.is_none())
        };
        if expired {
            self.notify_credential_change();
        }
        token
    }

    /// Feed parsed redirect fragment parameters to the credential store and
    /// notify subscribers if a token was captured.
    pub fn capture_redirect(
        &self,
        params: &FragmentParams,
    ) -> Result<CaptureOutcome, CredentialError> {
        self.capture_redirect_at(params, Utc::now())
    }

    pub fn capture_redirect_at(
        &self,
        params: &FragmentParams,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome, CredentialError> {
        let outcome = self.credentials.lock().unwrap().capture_at(params, now)?;
        if outcome == CaptureOutcome::Stored {
            self.notify_credential_change();
        }
        Ok(outcome)
    }

    /// Explicitly clear the credential (logout, or a 401 from the API).
    pub fn invalidate(&self) {
        let cleared = self.credentials.lock().unwrap().invalidate();
        if cleared {
            self.notify_credential_change();
        }
    }

    /// Publish a logical action to all subscribers.
    pub fn dispatch_action(&self, action: Action) {
        log::info!("Shortcut action fired: {}", action);
        for listener in self.action_listeners.lock().unwrap().iter() {
            listener(action);
        }
    }

    /// Snapshot of the credential for persistence: (token, expiry epoch ms).
    pub fn credential_persisted_form(&self) -> Option<(String, i64)> {
        self.credentials.lock().unwrap().persisted_form()
    }

    fn notify_credential_change(&self) {
        // Take a snapshot first so listeners never run under the store lock.
        let snapshot = {
            let store = self.credentials.lock().unwrap();
            store.persisted_form().map(|(token, ms)| Credential {
                access_token: token,
                expires_at: Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now),
            })
        };
        for listener in self.credential_listeners.lock().unwrap().iter() {
            listener(snapshot.as_ref());
        }
    }
}
