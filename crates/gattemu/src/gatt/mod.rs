//! GATT peripheral model
//!
//! Characteristics, descriptors and services, the registry exposing them,
//! and the dispatcher pushing value changes to subscribed devices.

pub mod characteristic;
pub mod constants;
pub mod descriptor;
pub mod dispatcher;
pub mod format;
pub mod registry;
pub mod service;
pub mod table;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use characteristic::Characteristic;
pub use descriptor::{Descriptor, DescriptorKind};
pub use dispatcher::{
    DeliveryError, DeliveryFailure, DeliveryReport, DispatcherConfig, NotificationDispatcher,
    NotifyDelegate,
};
pub use format::{EncodingError, ValueFormat};
pub use registry::ServiceRegistry;
pub use service::Service;
pub use table::AttributeTable;
pub use transport::{Transport, TransportError};
pub use types::{CharacteristicProperties, DeliveryKind, Operation, ServiceType, SubscriptionMode};
