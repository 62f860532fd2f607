// leafline-core: Device session, pairing, discovery and command relay for
// Nanoleaf panels. Sits between leafline-api and the consumers (CLI, relay
// server); every intent returns an `Outcome`.

pub mod address;
pub mod config;
pub mod connector;
pub mod controller;
pub mod credential;
pub mod error;
pub mod intent;
pub mod locator;
pub mod outcome;
pub mod reader;
pub mod relay;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use address::{DEFAULT_API_PORT, DeviceAddress};
pub use config::{ColorTempBounds, CoreConfig, DEFAULT_DISCOVERY_TIMEOUT, NANOLEAF_SERVICE_TYPE};
pub use controller::{ControlScope, Controller, ControllerBuilder};
pub use credential::{Credential, CredentialManager, CredentialStore, MemoryStore, PairError};
pub use error::CoreError;
pub use intent::{AppliedValue, ControlIntent};
pub use locator::{Advertisement, DeviceLocator, LocateError, MdnsBrowser, ServiceBrowser};
pub use outcome::Outcome;
pub use reader::{FullState, StateReader};
pub use relay::CommandRelay;
pub use session::{DeviceSession, Missing, NotConfigured, SessionContext, SessionHandle, SessionReady, SessionRegistry};

// Wire types consumers need without depending on leafline-api directly.
pub use leafline_api::DeviceInfo;
