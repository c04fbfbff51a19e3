//! gattemu - GATT peripheral emulation
//!
//! This library models the server side of a Bluetooth Low Energy peripheral:
//! services and characteristics with typed values, a registry exposing them,
//! and a dispatcher that pushes value changes to subscribed remote devices
//! through a pluggable transport. Radio access is left to the transport.

pub mod config;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod profiles;
pub mod uuid;

// Re-export common types for convenience
pub use config::{AdvertiseSettings, ConfigStore, MemoryConfigStore, PeripheralDefinition};
pub use error::{GattError, GattResult};
pub use gap::{BdAddr, DeviceId};
pub use gatt::{
    AttributeTable, Characteristic, CharacteristicProperties, DeliveryReport, NotificationDispatcher,
    NotifyDelegate, Service, ServiceRegistry, SubscriptionMode, Transport, TransportError,
    ValueFormat,
};
pub use profiles::TemperatureService;
pub use uuid::Uuid;
