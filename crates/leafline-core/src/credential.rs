// ── Credential manager ──
//
// Owns the auth-token half of a session: pairing, persistence, and
// invalidation. A token the device has rejected is dropped from memory
// and from the backing store so it is never sent again.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::DeviceAddress;
use crate::connector::Connector;
use crate::error::CoreError;
use crate::session::SessionHandle;

// ── Credential ──────────────────────────────────────────────────────

/// Opaque bearer token issued by the device during pairing.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token, for URL construction and explicit display.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

// ── Persistence seam ────────────────────────────────────────────────

/// Where credentials outlive the process.
///
/// Keys come from [`SessionContext::storage_key`](crate::SessionContext::storage_key).
pub trait CredentialStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Credential>, CoreError>;
    fn save(&self, key: &str, credential: &Credential) -> Result<(), CoreError>;
    /// Remove the stored credential. Removing nothing is not an error.
    fn clear(&self, key: &str) -> Result<(), CoreError>;
}

/// In-process store; credentials die with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Credential>, CoreError> {
        Ok(self.entries.get(key).map(|c| c.value().clone()))
    }

    fn save(&self, key: &str, credential: &Credential) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), credential.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ── Pairing errors ──────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PairError {
    /// The device is not in pairing mode.
    #[error("pairing window closed")]
    WindowClosed,

    #[error("device unreachable: {reason}")]
    Unreachable { reason: String },
}

// ── Manager ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CredentialManager {
    session: SessionHandle,
    store: Arc<dyn CredentialStore>,
    connector: Connector,
    origin: Option<String>,
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("context", self.session.context())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(session: SessionHandle, store: Arc<dyn CredentialStore>, connector: Connector) -> Self {
        Self {
            session,
            store,
            connector,
            origin: None,
        }
    }

    /// Also forget `key` when the session's credential is invalidated.
    ///
    /// Set when the installed credential was read from a store entry other
    /// than this session's own, so a rejected token cannot come back on the
    /// next start.
    #[must_use]
    pub fn with_origin(mut self, key: Option<String>) -> Self {
        self.origin = key;
        self
    }

    fn key(&self) -> String {
        self.session.context().storage_key()
    }

    /// Exchange an open pairing window for a new credential.
    ///
    /// On success the credential is installed in the session and persisted.
    /// A persistence failure is logged, not returned: the credential is
    /// still good for this process.
    pub async fn pair(&self, address: &DeviceAddress) -> Result<Credential, PairError> {
        let client = self
            .connector
            .client_for(address)
            .map_err(|e| PairError::Unreachable {
                reason: e.to_string(),
            })?;

        info!(%address, "requesting auth token");
        let token = match client.add_user().await {
            Ok(token) => token,
            Err(leafline_api::Error::PairingWindowClosed) => {
                warn!(%address, "device refused pairing: window not open");
                return Err(PairError::WindowClosed);
            }
            Err(e) => {
                warn!(%address, error = %e, "pairing failed");
                return Err(PairError::Unreachable {
                    reason: e.to_string(),
                });
            }
        };

        let credential = Credential::new(token);
        self.session.set_credential(credential.clone());
        if let Err(e) = self.store.save(&self.key(), &credential) {
            warn!(error = %e, "could not persist new credential");
        }
        info!(%address, "paired");
        Ok(credential)
    }

    /// Install a credential obtained elsewhere (config file, environment).
    pub fn install(&self, credential: Credential) {
        self.session.set_credential(credential);
    }

    /// Load a persisted credential into an empty session.
    pub fn restore(&self) -> Option<Credential> {
        if let Some(existing) = self.current() {
            return Some(existing);
        }
        match self.store.load(&self.key()) {
            Ok(Some(credential)) => {
                debug!(context = %self.session.context(), "restored persisted credential");
                self.session.set_credential(credential.clone());
                Some(credential)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not read persisted credential");
                None
            }
        }
    }

    /// Clear the credential. Idempotent.
    pub fn invalidate(&self) {
        let previous = self.current();
        if self.session.clear_credential() {
            info!(context = %self.session.context(), "credential invalidated");
        }
        self.forget_persisted(previous.as_ref());
    }

    /// Clear `rejected` if it is still current. Returns whether it was.
    pub(crate) fn invalidate_rejected(&self, rejected: &Credential) -> bool {
        let cleared = self.session.clear_credential_if(rejected);
        if cleared {
            warn!(context = %self.session.context(), "device rejected credential; invalidated");
            self.forget_persisted(Some(rejected));
        }
        cleared
    }

    pub fn current(&self) -> Option<Credential> {
        self.session.snapshot().credential.clone()
    }

    /// Clear this session's entry, and the origin entry if it still holds
    /// `dropped`. A newer token saved under the origin key is left alone.
    fn forget_persisted(&self, dropped: Option<&Credential>) {
        let own = self.key();
        if let Err(e) = self.store.clear(&own) {
            warn!(error = %e, "could not clear persisted credential");
        }

        let Some(origin) = self.origin.as_deref().filter(|k| *k != own) else {
            return;
        };
        match self.store.load(origin) {
            Ok(Some(stored)) if dropped.is_none_or(|d| *d == stored) => {
                if let Err(e) = self.store.clear(origin) {
                    warn!(key = origin, error = %e, "could not clear persisted credential");
                } else {
                    debug!(key = origin, "cleared origin credential entry");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(key = origin, error = %e, "could not read persisted credential"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::{DeviceSession, SessionContext};

    fn manager() -> (CredentialManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let session = SessionHandle::new(SessionContext::Process, DeviceSession::default());
        let connector = Connector::new(&leafline_api::TransportConfig::default()).unwrap();
        (
            CredentialManager::new(session, store.clone(), connector),
            store,
        )
    }

    #[test]
    fn debug_never_prints_token() {
        let c = Credential::new("super-secret");
        assert_eq!(format!("{c:?}"), "Credential(***)");
    }

    #[test]
    fn invalidate_twice_is_harmless() {
        let (mgr, _) = manager();
        mgr.install(Credential::new("abc123"));

        mgr.invalidate();
        assert!(mgr.current().is_none());
        mgr.invalidate();
        assert!(mgr.current().is_none());
    }

    #[test]
    fn restore_prefers_session_then_store() {
        let (mgr, store) = manager();
        store.save("default", &Credential::new("persisted")).unwrap();

        assert_eq!(mgr.restore().unwrap().expose(), "persisted");

        mgr.install(Credential::new("live"));
        assert_eq!(mgr.restore().unwrap().expose(), "live");
    }

    #[test]
    fn rejected_credential_is_removed_from_store() {
        let (mgr, store) = manager();
        let cred = Credential::new("abc123");
        mgr.install(cred.clone());
        store.save("default", &cred).unwrap();

        assert!(mgr.invalidate_rejected(&cred));
        assert!(mgr.current().is_none());
        assert!(store.load("default").unwrap().is_none());

        assert!(!mgr.invalidate_rejected(&cred));
    }

    #[test]
    fn rejection_clears_the_entry_the_token_came_from() {
        let (mgr, store) = manager();
        let mgr = mgr.with_origin(Some("10.0.0.7:16021".into()));
        let cred = Credential::new("stale");
        store.save("10.0.0.7:16021", &cred).unwrap();
        mgr.install(cred.clone());

        assert!(mgr.invalidate_rejected(&cred));
        assert!(store.load("10.0.0.7:16021").unwrap().is_none());
    }

    #[test]
    fn newer_token_under_origin_key_survives_rejection() {
        let (mgr, store) = manager();
        let mgr = mgr.with_origin(Some("10.0.0.7:16021".into()));
        let cred = Credential::new("stale");
        mgr.install(cred.clone());
        store.save("10.0.0.7:16021", &Credential::new("fresh")).unwrap();

        assert!(mgr.invalidate_rejected(&cred));
        assert_eq!(store.load("10.0.0.7:16021").unwrap().unwrap().expose(), "fresh");
    }
}
