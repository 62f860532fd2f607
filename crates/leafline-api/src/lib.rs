// leafline-api: Async Rust client for the Nanoleaf local HTTP API

pub mod client;
pub mod device;
pub mod error;
pub mod models;
pub mod pairing;
pub mod transport;

pub use client::NanoleafClient;
pub use error::Error;
pub use models::{
    DeviceInfo, DeviceState, Effects, FlagValue, RangedValue, StateField, StateValue, StateWrite,
};
pub use transport::{ClientFactory, TransportConfig};
