// ── Device locator ──
//
// Finds the device's API endpoint through mDNS. One browse runs at a time;
// the listening socket is released on success, on timeout, and when the
// calling future is dropped.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::address::DeviceAddress;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("no device advertised within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The browse was stopped before a device answered.
    #[error("discovery stopped")]
    Stopped,

    #[error("mDNS browser failed: {0}")]
    Browser(String),
}

// ── Advertisement ───────────────────────────────────────────────────

/// One resolved service announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub name: String,
    pub addresses: Vec<IpAddr>,
    /// `None` when the record carried no usable port.
    pub port: Option<u16>,
}

impl Advertisement {
    /// The address to use, preferring IPv4. Falls back to `default_port`
    /// when the record omits one.
    pub fn resolve(&self, default_port: u16) -> Option<DeviceAddress> {
        let ip = self
            .addresses
            .iter()
            .filter(|ip| !ip.is_unspecified())
            .min_by_key(|ip| ip.is_ipv6())?;
        let port = self.port.filter(|p| *p != 0).unwrap_or(default_port);
        DeviceAddress::from_ip(*ip, port).ok()
    }
}

// ── Browser seam ────────────────────────────────────────────────────

/// Source of service advertisements.
///
/// `start` begins listening and returns a channel of resolved records;
/// the channel closes when the browse ends. `stop` must tolerate being
/// called for a browse that has already ended.
pub trait ServiceBrowser: Send + Sync {
    fn start(&self, service_type: &str) -> Result<mpsc::Receiver<Advertisement>, LocateError>;
    fn stop(&self, service_type: &str) -> Result<(), LocateError>;
}

/// Stops its browse exactly once, explicitly or on drop.
struct BrowseGuard {
    browser: Arc<dyn ServiceBrowser>,
    service_type: String,
    stopped: AtomicBool,
}

impl BrowseGuard {
    fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Err(e) = self.browser.stop(&self.service_type) {
            warn!(error = %e, "failed to stop mDNS browse");
        }
        debug!(service = %self.service_type, "browse stopped");
        true
    }
}

impl Drop for BrowseGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the locator's in-flight slot when `locate` returns or is dropped.
struct Release<'a> {
    slot: &'a ArcSwapOption<BrowseGuard>,
    guard: Arc<BrowseGuard>,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.guard.stop();
        self.slot.store(None);
    }
}

// ── Locator ─────────────────────────────────────────────────────────

pub struct DeviceLocator {
    browser: Arc<dyn ServiceBrowser>,
    service_type: String,
    default_port: u16,
    in_flight: tokio::sync::Mutex<()>,
    current: ArcSwapOption<BrowseGuard>,
}

impl std::fmt::Debug for DeviceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLocator")
            .field("service_type", &self.service_type)
            .field("default_port", &self.default_port)
            .field("browsing", &self.is_browsing())
            .finish_non_exhaustive()
    }
}

impl DeviceLocator {
    pub fn new(browser: Arc<dyn ServiceBrowser>, service_type: impl Into<String>, default_port: u16) -> Self {
        Self {
            browser,
            service_type: service_type.into(),
            default_port,
            in_flight: tokio::sync::Mutex::new(()),
            current: ArcSwapOption::empty(),
        }
    }

    pub fn is_browsing(&self) -> bool {
        self.current.load().is_some()
    }

    /// Wait up to `timeout` for the first advertisement with a usable
    /// address. A concurrent caller waits for the running attempt to finish
    /// and then starts its own.
    pub async fn locate(&self, timeout: Duration) -> Result<DeviceAddress, LocateError> {
        let _serial = self.in_flight.lock().await;

        let mut rx = self.browser.start(&self.service_type)?;
        let guard = Arc::new(BrowseGuard {
            browser: Arc::clone(&self.browser),
            service_type: self.service_type.clone(),
            stopped: AtomicBool::new(false),
        });
        self.current.store(Some(Arc::clone(&guard)));
        let _release = Release {
            slot: &self.current,
            guard,
        };

        debug!(service = %self.service_type, ?timeout, "browsing");
        let first = async {
            while let Some(ad) = rx.recv().await {
                match ad.resolve(self.default_port) {
                    Some(address) => return Some((ad.name, address)),
                    None => debug!(name = %ad.name, "advertisement without address, ignoring"),
                }
            }
            None
        };

        match tokio::time::timeout(timeout, first).await {
            Ok(Some((name, address))) => {
                info!(%name, %address, "device located");
                Ok(address)
            }
            Ok(None) => Err(LocateError::Stopped),
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                info!(timeout_ms, "discovery timed out");
                Err(LocateError::Timeout { timeout_ms })
            }
        }
    }

    /// Abort the running browse, if any. Idempotent.
    pub fn stop(&self) {
        if let Some(guard) = self.current.swap(None) {
            guard.stop();
        }
    }
}

// ── mDNS ────────────────────────────────────────────────────────────

/// `ServiceBrowser` over a lazily started `mdns-sd` daemon.
#[derive(Default)]
pub struct MdnsBrowser {
    daemon: Mutex<Option<ServiceDaemon>>,
}

impl MdnsBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_daemon<T>(
        &self,
        f: impl FnOnce(&ServiceDaemon) -> Result<T, mdns_sd::Error>,
    ) -> Result<T, LocateError> {
        let mut slot = self
            .daemon
            .lock()
            .map_err(|_| LocateError::Browser("daemon lock poisoned".into()))?;
        if slot.is_none() {
            let daemon = ServiceDaemon::new().map_err(|e| LocateError::Browser(e.to_string()))?;
            *slot = Some(daemon);
        }
        match slot.as_ref() {
            Some(daemon) => f(daemon).map_err(|e| LocateError::Browser(e.to_string())),
            None => Err(LocateError::Browser("daemon unavailable".into())),
        }
    }
}

impl ServiceBrowser for MdnsBrowser {
    fn start(&self, service_type: &str) -> Result<mpsc::Receiver<Advertisement>, LocateError> {
        let events = self.with_daemon(|d| d.browse(service_type))?;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        let addresses: BTreeSet<IpAddr> = info.get_addresses().iter().copied().collect();
                        let ad = Advertisement {
                            name: info.get_fullname().to_owned(),
                            addresses: addresses.into_iter().collect(),
                            port: Some(info.get_port()),
                        };
                        if tx.send(ad).await.is_err() {
                            break;
                        }
                    }
                    ServiceEvent::SearchStopped(_) => break,
                    _ => {}
                }
            }
        });

        Ok(rx)
    }

    fn stop(&self, service_type: &str) -> Result<(), LocateError> {
        let slot = self
            .daemon
            .lock()
            .map_err(|_| LocateError::Browser("daemon lock poisoned".into()))?;
        match slot.as_ref() {
            Some(daemon) => daemon
                .stop_browse(service_type)
                .map_err(|e| LocateError::Browser(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        let daemon = match self.daemon.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(daemon) = daemon {
            let _ = daemon.shutdown();
        }
    }
}
