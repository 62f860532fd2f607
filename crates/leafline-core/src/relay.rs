// ── Command relay ──
//
// validate → require → one device call → Outcome. At most once: nothing
// here retries. A rejected credential is invalidated before the outcome
// is returned, so the next caller sees `NotConfigured`.

use tracing::{debug, warn};

use crate::config::ColorTempBounds;
use crate::connector::Connector;
use crate::credential::{Credential, CredentialManager};
use crate::intent::{AppliedValue, ControlIntent, DeviceAction};
use crate::outcome::Outcome;
use crate::session::{SessionHandle, SessionReady};

#[derive(Debug, Clone)]
pub struct CommandRelay {
    session: SessionHandle,
    credentials: CredentialManager,
    connector: Connector,
    ct_bounds: ColorTempBounds,
}

impl CommandRelay {
    pub fn new(
        session: SessionHandle,
        credentials: CredentialManager,
        connector: Connector,
        ct_bounds: ColorTempBounds,
    ) -> Self {
        Self {
            session,
            credentials,
            connector,
            ct_bounds,
        }
    }

    pub async fn execute(&self, intent: &ControlIntent) -> Outcome<AppliedValue> {
        let validated = match intent.validate(&self.ct_bounds) {
            Ok(v) => v,
            Err(reason) => {
                debug!(intent = intent.name(), %reason, "rejected before send");
                return Outcome::validation(reason);
            }
        };

        let ready = match self.session.require() {
            Ok(ready) => ready,
            Err(nc) => return nc.into(),
        };

        let client = match self.connector.client_for(&ready.address) {
            Ok(client) => client,
            Err(e) => return Outcome::unreachable(e.to_string()),
        };

        let token = ready.credential.secret();
        let result = match &validated.action {
            DeviceAction::State(write) => client.put_state(token, write).await,
            DeviceAction::Effect(name) => client.select_effect(token, name).await,
        };

        settle(&self.credentials, &ready, intent.name(), result.map(|status| (validated.applied, status)))
    }
}

/// Fold one device call's result into an `Outcome`, invalidating the
/// credential that was sent if the device rejected it.
pub(crate) fn settle<T>(
    credentials: &CredentialManager,
    ready: &SessionReady,
    operation: &str,
    result: Result<(T, u16), leafline_api::Error>,
) -> Outcome<T> {
    match result {
        Ok((value, status)) => {
            debug!(operation, status, address = %ready.address, "device accepted");
            Outcome::success(value, status)
        }
        Err(e) => {
            let outcome = Outcome::from_api_error(&e);
            if matches!(outcome, Outcome::Unauthorized) {
                reject(credentials, &ready.credential);
            } else {
                warn!(operation, address = %ready.address, error = %e, "device call failed");
            }
            outcome
        }
    }
}

fn reject(credentials: &CredentialManager, sent: &Credential) {
    if !credentials.invalidate_rejected(sent) {
        debug!("rejected credential already replaced or cleared");
    }
}
