// Turns a `DeviceAddress` into an API client over one shared HTTP pool.

use leafline_api::{ClientFactory, NanoleafClient, TransportConfig};

use crate::address::DeviceAddress;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct Connector {
    factory: ClientFactory,
}

impl Connector {
    pub fn new(transport: &TransportConfig) -> Result<Self, CoreError> {
        Ok(Self {
            factory: ClientFactory::new(transport)?,
        })
    }

    pub fn client_for(&self, address: &DeviceAddress) -> Result<NanoleafClient, CoreError> {
        Ok(self.factory.client(address.base_url()?))
    }
}
