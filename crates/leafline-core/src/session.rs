// ── Device session ──
//
// The {address, credential} pair that gates every outbound device call.
// Readers take one snapshot at the start of an operation and never look
// again, so a concurrent invalidation cannot tear a call in half. Writes
// go through `ArcSwap::rcu`; only the credential manager and the
// controller's address setters call them.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use tracing::debug;

use crate::address::DeviceAddress;
use crate::credential::Credential;

/// Snapshot of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSession {
    pub address: Option<DeviceAddress>,
    pub credential: Option<Credential>,
}

impl DeviceSession {
    pub fn is_configured(&self) -> bool {
        self.address.is_some() && self.credential.is_some()
    }

    /// Both coordinates, or what is missing.
    pub fn ready(&self) -> Result<SessionReady, NotConfigured> {
        match (&self.address, &self.credential) {
            (Some(address), Some(credential)) => Ok(SessionReady {
                address: address.clone(),
                credential: credential.clone(),
            }),
            (None, Some(_)) => Err(NotConfigured {
                missing: Missing::Address,
            }),
            (Some(_), None) => Err(NotConfigured {
                missing: Missing::Credential,
            }),
            (None, None) => Err(NotConfigured {
                missing: Missing::Both,
            }),
        }
    }
}

/// A complete session, ready to build one device API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReady {
    pub address: DeviceAddress,
    pub credential: Credential,
}

/// Which half of the session is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Missing {
    Address,
    Credential,
    Both,
}

impl Missing {
    /// What the user has to do next.
    pub fn hint(self) -> &'static str {
        match self {
            Self::Address => "discover the device or set its address",
            Self::Credential => "pair with the device",
            Self::Both => "discover the device, then pair with it",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotConfigured {
    pub missing: Missing,
}

impl fmt::Display for NotConfigured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not configured: {}", self.missing.hint())
    }
}

impl std::error::Error for NotConfigured {}

// ── Context ─────────────────────────────────────────────────────────

/// Storage scope of a session.
///
/// `Process` is the one shared session a single-device deployment uses.
/// `Host` is a session bound to a caller-supplied address, for relays that
/// receive the target device with each request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionContext {
    Process,
    Host(DeviceAddress),
}

impl SessionContext {
    /// Key under which this context's credential is persisted.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Process => "default".into(),
            Self::Host(address) => address.to_string(),
        }
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => f.write_str("process"),
            Self::Host(address) => write!(f, "host {address}"),
        }
    }
}

// ── Handle ──────────────────────────────────────────────────────────

/// Shared, cheaply cloneable reference to one session's storage.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<ArcSwap<DeviceSession>>,
    context: SessionContext,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("context", &self.context)
            .field("session", &*self.state.load())
            .finish()
    }
}

impl SessionHandle {
    pub fn new(context: SessionContext, initial: DeviceSession) -> Self {
        Self {
            state: Arc::new(ArcSwap::from_pointee(initial)),
            context,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Consistent point-in-time view.
    pub fn snapshot(&self) -> Arc<DeviceSession> {
        self.state.load_full()
    }

    /// Gate for every outbound device call.
    pub fn require(&self) -> Result<SessionReady, NotConfigured> {
        self.state.load().ready()
    }

    pub(crate) fn set_address(&self, address: DeviceAddress) {
        debug!(context = %self.context, %address, "session address set");
        self.state.rcu(|current| DeviceSession {
            address: Some(address.clone()),
            credential: current.credential.clone(),
        });
    }

    pub(crate) fn set_credential(&self, credential: Credential) {
        debug!(context = %self.context, "session credential set");
        self.state.rcu(|current| DeviceSession {
            address: current.address.clone(),
            credential: Some(credential.clone()),
        });
    }

    /// Clear the credential. Returns whether one was present.
    pub(crate) fn clear_credential(&self) -> bool {
        let previous = self.state.rcu(|current| DeviceSession {
            address: current.address.clone(),
            credential: None,
        });
        previous.credential.is_some()
    }

    /// Clear the credential only if it is still `rejected`.
    ///
    /// A pairing that completed while the rejected call was in flight
    /// installs a new credential; that one must survive.
    pub(crate) fn clear_credential_if(&self, rejected: &Credential) -> bool {
        let previous = self.state.rcu(|current| {
            if current.credential.as_ref() == Some(rejected) {
                Arc::new(DeviceSession {
                    address: current.address.clone(),
                    credential: None,
                })
            } else {
                Arc::clone(current)
            }
        });
        previous.credential.as_ref() == Some(rejected)
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Hands out one `SessionHandle` per `SessionContext`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionContext, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `context`, created on first use.
    ///
    /// Host-scoped sessions start with their host as address and no credential.
    pub fn acquire(&self, context: &SessionContext) -> SessionHandle {
        self.acquire_tracked(context).0
    }

    /// Like [`acquire`](Self::acquire), also reporting whether the session
    /// was created by this call.
    pub(crate) fn acquire_tracked(&self, context: &SessionContext) -> (SessionHandle, bool) {
        if let Some(existing) = self.sessions.get(context) {
            return (existing.value().clone(), false);
        }
        let mut created = false;
        let handle = self
            .sessions
            .entry(context.clone())
            .or_insert_with(|| {
                created = true;
                let initial = match context {
                    SessionContext::Process => DeviceSession::default(),
                    SessionContext::Host(address) => DeviceSession {
                        address: Some(address.clone()),
                        credential: None,
                    },
                };
                SessionHandle::new(context.clone(), initial)
            })
            .clone();
        (handle, created)
    }

    /// Drop a scoped session. The process session cannot be forgotten.
    pub fn forget(&self, context: &SessionContext) -> bool {
        if matches!(context, SessionContext::Process) {
            return false;
        }
        self.sessions.remove(context).is_some()
    }

    pub fn contains(&self, context: &SessionContext) -> bool {
        self.sessions.contains_key(context)
    }

    /// Number of host-scoped sessions.
    pub fn host_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| matches!(entry.key(), SessionContext::Host(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
