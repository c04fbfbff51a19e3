//! Error types for the gattemu library
//!
//! Structural failures (duplicate registration, unknown ids, permission
//! violations, encoding problems) are returned synchronously as [`GattError`].
//! Per-device delivery failures are not errors of the whole operation; they
//! are collected in a `DeliveryReport` by the dispatcher.

use crate::gatt::format::EncodingError;
use crate::gatt::types::Operation;
use crate::uuid::Uuid;
use thiserror::Error;

/// Errors returned by the emulation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GattError {
    #[error("value encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("{operation} is not permitted on characteristic {characteristic}")]
    OperationNotPermitted {
        characteristic: Uuid,
        operation: Operation,
    },

    #[error("service {0} is already registered")]
    DuplicateService(Uuid),

    #[error("characteristic {0} is already defined")]
    DuplicateCharacteristic(Uuid),

    #[error("characteristic {characteristic} already has a {descriptor} descriptor")]
    DuplicateDescriptor {
        characteristic: Uuid,
        descriptor: Uuid,
    },

    #[error("characteristic {0} is not registered")]
    UnknownCharacteristic(Uuid),

    #[error("service {0} is not registered")]
    UnknownService(Uuid),

    #[error("no attribute at handle 0x{0:04X}")]
    InvalidHandle(u16),

    #[error("attribute table is full")]
    AttributeTableFull,

    #[error("invalid client characteristic configuration value: {0:02x?}")]
    InvalidCccdValue(Vec<u8>),

    #[error("MAC address format should be 11:22:33:44:55:66, got {0:?}")]
    InvalidMacAddress(String),
}

/// Result alias used throughout the crate
pub type GattResult<T> = Result<T, GattError>;
