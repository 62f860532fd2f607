// ── Controller ──
//
// Entry point for the CLI and the relay server. Owns the shared pieces
// (HTTP pool, mDNS locator, credential store, session registry) and hands
// out a `ControlScope` per session context. Every intent of the panel
// maps to exactly one `ControlScope` method returning an `Outcome`.

use std::sync::Arc;

use leafline_api::TransportConfig;
use tracing::{debug, info};

use crate::address::DeviceAddress;
use crate::config::CoreConfig;
use crate::connector::Connector;
use crate::credential::{Credential, CredentialManager, CredentialStore, MemoryStore, PairError};
use crate::error::CoreError;
use crate::intent::{AppliedValue, ControlIntent};
use crate::locator::{DeviceLocator, LocateError, MdnsBrowser, ServiceBrowser};
use crate::outcome::Outcome;
use crate::reader::{FullState, StateReader};
use crate::relay::CommandRelay;
use crate::session::{DeviceSession, Missing, SessionContext, SessionHandle, SessionRegistry};

/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: CoreConfig,
    registry: SessionRegistry,
    connector: Connector,
    locator: DeviceLocator,
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("sessions", &self.inner.registry.len())
            .field("locator", &self.inner.locator)
            .finish_non_exhaustive()
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Assembles a [`Controller`]. Defaults: mDNS discovery, in-memory store.
pub struct ControllerBuilder {
    config: CoreConfig,
    browser: Option<Arc<dyn ServiceBrowser>>,
    store: Option<Arc<dyn CredentialStore>>,
}

impl ControllerBuilder {
    pub fn browser(mut self, browser: Arc<dyn ServiceBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Controller, CoreError> {
        let transport = TransportConfig::default().with_timeout(self.config.request_timeout);
        let connector = Connector::new(&transport)?;
        let browser: Arc<dyn ServiceBrowser> = match self.browser {
            Some(browser) => browser,
            None => Arc::new(MdnsBrowser::new()),
        };
        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let locator = DeviceLocator::new(
            browser,
            self.config.service_type.clone(),
            self.config.default_port,
        );

        let controller = Controller {
            inner: Arc::new(ControllerInner {
                config: self.config,
                registry: SessionRegistry::new(),
                connector,
                locator,
                store,
            }),
        };
        controller.seed_process_session();
        Ok(controller)
    }
}

impl Controller {
    pub fn builder(config: CoreConfig) -> ControllerBuilder {
        ControllerBuilder {
            config,
            browser: None,
            store: None,
        }
    }

    /// mDNS discovery, credentials kept in memory.
    pub fn new(config: CoreConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Install the startup address and credential, then fall back to the
    /// store for a credential the config did not supply.
    fn seed_process_session(&self) {
        let scope = self.process();
        if let Some(address) = self.inner.config.address.clone() {
            scope.session.set_address(address);
        }
        match self.inner.config.credential.clone() {
            Some(credential) => scope.credentials.install(credential),
            None => {
                scope.credentials.restore();
            }
        }
        let snap = scope.session.snapshot();
        debug!(
            address = ?snap.address.as_ref().map(ToString::to_string),
            has_credential = snap.credential.is_some(),
            "process session seeded"
        );
    }

    /// The shared single-device session.
    pub fn process(&self) -> ControlScope {
        self.scope(&SessionContext::Process)
    }

    /// Session for `context`, created and restored from the store on first use.
    pub fn scope(&self, context: &SessionContext) -> ControlScope {
        let (session, created) = self.inner.registry.acquire_tracked(context);
        let origin = match context {
            SessionContext::Process => self.inner.config.credential_key.clone(),
            SessionContext::Host(_) => None,
        };
        let credentials = CredentialManager::new(
            session.clone(),
            Arc::clone(&self.inner.store),
            self.inner.connector.clone(),
        )
        .with_origin(origin);
        if created && !matches!(context, SessionContext::Process) {
            credentials.restore();
        }
        let bounds = self.inner.config.ct_bounds;
        ControlScope {
            controller: self.clone(),
            relay: CommandRelay::new(
                session.clone(),
                credentials.clone(),
                self.inner.connector.clone(),
                bounds,
            ),
            reader: StateReader::new(
                session.clone(),
                credentials.clone(),
                self.inner.connector.clone(),
                bounds,
            ),
            session,
            credentials,
        }
    }

    /// Whether a session for `context` already exists.
    pub fn has_scope(&self, context: &SessionContext) -> bool {
        self.inner.registry.contains(context)
    }

    /// Host-scoped sessions currently held in memory.
    pub fn host_sessions(&self) -> usize {
        self.inner.registry.host_count()
    }

    /// Drop a host-scoped session from memory. Its persisted credential stays.
    pub fn forget(&self, context: &SessionContext) -> bool {
        self.inner.registry.forget(context)
    }

    /// Abort a running discovery. Idempotent.
    pub fn stop_discovery(&self) {
        self.inner.locator.stop();
    }

    /// Browse for a device without touching any session.
    pub async fn locate(&self) -> Outcome<DeviceAddress> {
        let timeout = self.inner.config.discovery_timeout;
        match self.inner.locator.locate(timeout).await {
            Ok(address) => Outcome::local(address),
            Err(LocateError::Timeout { timeout_ms }) => Outcome::DiscoveryTimeout { timeout_ms },
            Err(e) => Outcome::unreachable(e.to_string()),
        }
    }
}

// ── Scope ───────────────────────────────────────────────────────────

/// The intent surface bound to one session.
#[derive(Clone)]
pub struct ControlScope {
    controller: Controller,
    session: SessionHandle,
    credentials: CredentialManager,
    relay: CommandRelay,
    reader: StateReader,
}

impl std::fmt::Debug for ControlScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlScope")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ControlScope {
    pub fn context(&self) -> &SessionContext {
        self.session.context()
    }

    pub fn snapshot(&self) -> Arc<DeviceSession> {
        self.session.snapshot()
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    // ── Control ─────────────────────────────────────────────────────

    pub async fn execute(&self, intent: &ControlIntent) -> Outcome<AppliedValue> {
        self.relay.execute(intent).await
    }

    pub async fn set_power(&self, on: bool) -> Outcome<AppliedValue> {
        self.execute(&ControlIntent::SetPower(on)).await
    }

    pub async fn set_brightness(&self, value: i64) -> Outcome<AppliedValue> {
        self.execute(&ControlIntent::SetBrightness(value)).await
    }

    pub async fn set_color_temperature(&self, kelvin: i64) -> Outcome<AppliedValue> {
        self.execute(&ControlIntent::SetColorTemperature(kelvin)).await
    }

    pub async fn set_hue(&self, degrees: i64) -> Outcome<AppliedValue> {
        self.execute(&ControlIntent::SetHue(degrees)).await
    }

    pub async fn set_saturation(&self, value: i64) -> Outcome<AppliedValue> {
        self.execute(&ControlIntent::SetSaturation(value)).await
    }

    pub async fn select_effect(&self, name: &str) -> Outcome<AppliedValue> {
        self.execute(&ControlIntent::SelectEffect(name.to_owned())).await
    }

    // ── Read ────────────────────────────────────────────────────────

    pub async fn get_state(&self) -> Outcome<FullState> {
        self.reader.read_state().await
    }

    pub async fn get_effects_list(&self) -> Outcome<Vec<String>> {
        self.reader.read_effects_list().await
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Pair with the session's device. Needs an address; any existing
    /// credential is replaced on success.
    pub async fn pair(&self) -> Outcome<Credential> {
        let Some(address) = self.session.snapshot().address.clone() else {
            return Outcome::NotConfigured {
                missing: Missing::Address,
            };
        };
        match self.credentials.pair(&address).await {
            Ok(credential) => Outcome::success(credential, 200),
            Err(PairError::WindowClosed) => Outcome::PairingWindowClosed,
            Err(PairError::Unreachable { reason }) => Outcome::unreachable(reason),
        }
    }

    /// Locate a device and make it this session's address.
    pub async fn discover(&self) -> Outcome<DeviceAddress> {
        let outcome = self.controller.locate().await;
        if let Outcome::Success { value, .. } = &outcome {
            self.session.set_address(value.clone());
        }
        outcome
    }

    /// Accept a manually entered `host:port`.
    pub fn set_address(&self, input: &str) -> Outcome<DeviceAddress> {
        match input.parse::<DeviceAddress>() {
            Ok(address) => {
                info!(context = %self.context(), %address, "address set manually");
                self.session.set_address(address.clone());
                Outcome::local(address)
            }
            Err(e) => Outcome::validation(e.to_string()),
        }
    }

    /// Install a credential obtained out of band.
    pub fn set_credential(&self, credential: Credential) {
        self.credentials.install(credential);
    }

    /// Forget the credential here and in the store. Idempotent.
    pub fn invalidate(&self) {
        self.credentials.invalidate();
    }

    pub fn current_credential(&self) -> Option<Credential> {
        self.credentials.current()
    }
}
