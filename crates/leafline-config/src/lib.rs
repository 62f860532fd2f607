//! Shared configuration for the leafline CLI and relay server.
//!
//! A single TOML file, environment overrides, credential resolution
//! (env + keyring + plaintext), and translation to
//! `leafline_core::CoreConfig`. The binary layers its flag overrides on top.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use leafline_core::{
    ColorTempBounds, CoreConfig, CoreError, Credential, CredentialStore, DEFAULT_API_PORT,
    DeviceAddress, NANOLEAF_SERVICE_TYPE,
};

/// Keyring service name all credentials live under.
pub const KEYRING_SERVICE: &str = "leafline";

/// Token variable the original `.env`-based relay read.
pub const LEGACY_TOKEN_VAR: &str = "NANOLEAF_TOKEN";

/// Host variable the original `.env`-based relay read.
pub const LEGACY_HOST_VAR: &str = "NANOLEAF_HOST";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub discovery: DiscoverySection,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub server: ServerSection,

    /// Per-request timeout for device API calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceSection::default(),
            discovery: DiscoverySection::default(),
            limits: Limits::default(),
            server: ServerSection::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceSection {
    /// `host:port` of the device; discovered when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Auth token (plaintext; prefer the keyring or an env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the auth token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DiscoverySection {
    #[serde(default = "default_discovery_timeout")]
    pub timeout_ms: u64,

    /// Used when an advertisement carries no port.
    #[serde(default = "default_port")]
    pub default_port: u16,

    #[serde(default = "default_service_type")]
    pub service_type: String,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            timeout_ms: default_discovery_timeout(),
            default_port: default_port(),
            service_type: default_service_type(),
        }
    }
}

fn default_discovery_timeout() -> u64 {
    10_000
}
fn default_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_service_type() -> String {
    NANOLEAF_SERVICE_TYPE.into()
}

/// Colour temperature bounds in Kelvin.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Limits {
    #[serde(default = "default_ct_min")]
    pub ct_min: i64,

    #[serde(default = "default_ct_max")]
    pub ct_max: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            ct_min: default_ct_min(),
            ct_max: default_ct_max(),
        }
    }
}

fn default_ct_min() -> i64 {
    ColorTempBounds::DEFAULT_MIN
}
fn default_ct_max() -> i64 {
    ColorTempBounds::DEFAULT_MAX
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Browser origins allowed besides the relay's own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,

    /// Honour the per-request `X-Nanoleaf-Host` header.
    #[serde(default = "default_host_header")]
    pub host_header: bool,

    /// Upper bound on sessions opened through the host header.
    #[serde(default = "default_max_host_sessions")]
    pub max_host_sessions: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: Vec::new(),
            host_header: default_host_header(),
            max_host_sessions: default_max_host_sessions(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8778".into()
}
fn default_host_header() -> bool {
    true
}
fn default_max_host_sessions() -> usize {
    16
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "leafline", "leafline").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("leafline.toml");
            p
        },
        |dirs| dirs.config_dir().join("leafline.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("leafline");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources for `path`: defaults, file, `LEAFLINE_*`, legacy host.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LEAFLINE_").split("__"))
        .merge(
            Env::raw()
                .only(&[LEGACY_HOST_VAR])
                .map(|_| "device.address".into()),
        )
}

/// Load and validate the config from `path`, or the canonical location.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading config");
    let config: Config = figment_for(&path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Read only the TOML file at `path`, filling absent keys with defaults.
///
/// Environment layers are left out: this is the view to patch and write
/// back, and it must not pick up `LEAFLINE_*` or `NANOLEAF_*` values.
pub fn load_file_config(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path` or the canonical location.
pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}

/// Record `address` in the config file, keeping everything else in it.
///
/// An unreadable or invalid file is an error and is left untouched.
pub fn save_device_address(address: &DeviceAddress, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let mut cfg = load_file_config(&path)?;
    cfg.device.address = Some(address.to_string());
    cfg.validate()?;
    debug!(path = %path.display(), %address, "saving device address");
    save_config(&cfg, Some(&path))
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.address()?;
        self.ct_bounds()?;
        self.bind_addr()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "request_timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.discovery.timeout_ms == 0 {
            return Err(ConfigError::Validation {
                field: "discovery.timeout_ms".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn address(&self) -> Result<Option<DeviceAddress>, ConfigError> {
        self.device
            .address
            .as_deref()
            .map(str::parse::<DeviceAddress>)
            .transpose()
            .map_err(|e| ConfigError::Validation {
                field: "device.address".into(),
                reason: e.to_string(),
            })
    }

    pub fn ct_bounds(&self) -> Result<ColorTempBounds, ConfigError> {
        ColorTempBounds::new(self.limits.ct_min, self.limits.ct_max).map_err(|e| {
            ConfigError::Validation {
                field: "limits".into(),
                reason: e.to_string(),
            }
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "server.bind".into(),
                reason: format!("expected ip:port, got '{}'", self.server.bind),
            })
    }

    /// Build a `CoreConfig`, resolving the credential through the full
    /// chain with `store` standing in for the keyring.
    pub fn to_core_config(&self, store: &dyn CredentialStore) -> Result<CoreConfig, ConfigError> {
        self.to_core_config_with(store, |name| std::env::var(name).ok())
    }

    /// [`Config::to_core_config`] over an explicit environment.
    pub fn to_core_config_with(
        &self,
        store: &dyn CredentialStore,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<CoreConfig, ConfigError> {
        let address = self.address()?;
        let resolved = resolve_token_source(self, address.as_ref(), store, env);
        let (credential, credential_key) = match resolved {
            Some((credential, key)) => (Some(credential), key),
            None => (None, None),
        };
        Ok(CoreConfig {
            service_type: self.discovery.service_type.clone(),
            default_port: self.discovery.default_port,
            discovery_timeout: Duration::from_millis(self.discovery.timeout_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ct_bounds: self.ct_bounds()?,
            address,
            credential,
            credential_key,
        })
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the auth token without CLI flags.
///
/// Order: `device.token_env` → `NANOLEAF_TOKEN` → keyring (address entry,
/// then `default`) → plaintext `device.token`.
pub fn resolve_token(cfg: &Config, address: Option<&DeviceAddress>) -> Option<Credential> {
    resolve_token_with(cfg, address, &KeyringStore::new(), |name| std::env::var(name).ok())
}

/// [`resolve_token`] over an explicit store and environment.
pub fn resolve_token_with(
    cfg: &Config,
    address: Option<&DeviceAddress>,
    store: &dyn CredentialStore,
    env: impl Fn(&str) -> Option<String>,
) -> Option<Credential> {
    resolve_token_source(cfg, address, store, env).map(|(credential, _)| credential)
}

/// The resolved token and, when it came from the store, the key it was
/// read from.
fn resolve_token_source(
    cfg: &Config,
    address: Option<&DeviceAddress>,
    store: &dyn CredentialStore,
    env: impl Fn(&str) -> Option<String>,
) -> Option<(Credential, Option<String>)> {
    let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(ref env_name) = cfg.device.token_env {
        if let Some(val) = lookup(env_name) {
            return Some((Credential::new(val), None));
        }
        debug!(var = %env_name, "token_env set but variable is empty");
    }

    if let Some(val) = lookup(LEGACY_TOKEN_VAR) {
        return Some((Credential::new(val), None));
    }

    let keys = address
        .map(ToString::to_string)
        .into_iter()
        .chain(std::iter::once("default".to_owned()));
    for key in keys {
        match store.load(&key) {
            Ok(Some(credential)) => return Some((credential, Some(key))),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "keyring lookup failed"),
        }
    }

    cfg.device
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| (Credential::new(t), None))
}

// ── Keyring store ───────────────────────────────────────────────────

/// `CredentialStore` backed by the OS keyring, one entry per session key.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, CoreError> {
        keyring::Entry::new(&self.service, key).map_err(persistence)
    }
}

fn persistence(err: keyring::Error) -> CoreError {
    CoreError::Persistence {
        message: err.to_string(),
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self, key: &str) -> Result<Option<Credential>, CoreError> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(Credential::new(secret))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(persistence(e)),
        }
    }

    fn save(&self, key: &str, credential: &Credential) -> Result<(), CoreError> {
        self.entry(key)?
            .set_password(credential.expose())
            .map_err(persistence)
    }

    fn clear(&self, key: &str) -> Result<(), CoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(persistence(e)),
        }
    }
}
