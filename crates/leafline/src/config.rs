//! Flag overrides on top of the shared `leafline-config` layers.
//!
//! Precedence, later wins: defaults, config file, `LEAFLINE_*` env, the
//! legacy `NANOLEAF_*` variables, then `--host` / `--token` / `--timeout`.

use std::path::PathBuf;
use std::sync::Arc;

use leafline_config::{Config, ConfigError, KeyringStore, config_path, figment_for};
use leafline_core::{CoreConfig, Credential, DeviceAddress};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command needs to build a controller.
pub struct Resolved {
    pub file: Config,
    pub core: CoreConfig,
    pub store: Arc<KeyringStore>,
}

/// The config file this invocation reads.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the layered config and apply CLI flags, then validate.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = active_path(global);
    tracing::debug!(path = %path.display(), "loading config");
    let mut cfg: Config = figment_for(&path).extract().map_err(ConfigError::from)?;

    if let Some(ref host) = global.host {
        cfg.device.address = Some(normalize_host(host, cfg.discovery.default_port)?.to_string());
    }
    if let Some(secs) = global.timeout {
        cfg.request_timeout_secs = secs;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Load config and translate it for the core, resolving the credential.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let file = load(global)?;
    let store = Arc::new(KeyringStore::new());
    let mut core = file.to_core_config(store.as_ref())?;

    if let Some(token) = global.token.as_deref().filter(|t| !t.trim().is_empty()) {
        core.credential = Some(Credential::new(token.trim()));
        core.credential_key = None;
    }
    Ok(Resolved { file, core, store })
}

/// Accept `host:port`, `[v6]:port`, or a bare host / IP on the default port.
pub fn normalize_host(input: &str, default_port: u16) -> Result<DeviceAddress, CliError> {
    let input = input.trim();
    if let Ok(address) = input.parse::<DeviceAddress>() {
        return Ok(address);
    }
    let bare = match input.parse::<std::net::IpAddr>() {
        Ok(ip) => DeviceAddress::from_ip(ip, default_port),
        Err(_) => DeviceAddress::new(input, default_port),
    };
    bare.map_err(|e| CliError::Validation {
        field: "host".into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn explicit_port_is_kept() {
        let addr = normalize_host("192.168.1.50:16022", 16021).unwrap();
        assert_eq!(addr.to_string(), "192.168.1.50:16022");
    }

    #[test]
    fn bare_hosts_get_default_port() {
        assert_eq!(normalize_host("192.168.1.50", 16021).unwrap().to_string(), "192.168.1.50:16021");
        assert_eq!(normalize_host("shapes.local", 16021).unwrap().to_string(), "shapes.local:16021");
        assert_eq!(normalize_host("fe80::1", 16021).unwrap().to_string(), "[fe80::1]:16021");
    }

    #[test]
    fn garbage_is_a_validation_error() {
        assert!(matches!(
            normalize_host("my host", 16021),
            Err(CliError::Validation { ref field, .. }) if field == "host"
        ));
        assert!(normalize_host("host:abc", 16021).is_err());
    }
}
