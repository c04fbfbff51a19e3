//! Transport contract
//!
//! The transport is the platform GATT server (or a test double). It owns the
//! links to remote devices; the core only asks it to push a value.

use super::types::DeliveryKind;
use crate::gap::DeviceId;
use crate::uuid::Uuid;
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a transport for one device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("device {0} is not connected")]
    NotConnected(DeviceId),

    #[error("value of {0} bytes does not fit the link MTU")]
    ValueTooLong(usize),

    #[error("indication was not confirmed")]
    NotConfirmed,

    #[error("transport failure: {0}")]
    Failed(String),
}

/// Pushes characteristic values to connected remote devices
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `value` of `characteristic` to `device`. For indications the
    /// call completes once the device confirmed.
    async fn deliver(
        &self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
        kind: DeliveryKind,
    ) -> Result<(), TransportError>;
}
