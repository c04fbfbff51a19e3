//! Characteristic descriptors

use super::constants::*;
use super::types::SubscriptionMode;
use crate::error::{GattError, GattResult};
use crate::uuid::Uuid;
use byteorder::{ByteOrder, LittleEndian};

/// Kind of a descriptor; a characteristic carries at most one of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Client Characteristic Configuration (0x2902)
    ClientConfiguration,
    /// Characteristic User Description (0x2901)
    UserDescription,
    /// Characteristic Presentation Format (0x2904)
    PresentationFormat,
    Other(Uuid),
}

impl DescriptorKind {
    pub fn uuid(&self) -> Uuid {
        match self {
            DescriptorKind::ClientConfiguration => Uuid::from_u16(CLIENT_CHAR_CONFIG_UUID),
            DescriptorKind::UserDescription => Uuid::from_u16(CHAR_USER_DESC_UUID),
            DescriptorKind::PresentationFormat => Uuid::from_u16(CHAR_FORMAT_UUID),
            DescriptorKind::Other(uuid) => *uuid,
        }
    }
}

impl From<Uuid> for DescriptorKind {
    fn from(uuid: Uuid) -> Self {
        match uuid.as_u16() {
            Some(CLIENT_CHAR_CONFIG_UUID) => DescriptorKind::ClientConfiguration,
            Some(CHAR_USER_DESC_UUID) => DescriptorKind::UserDescription,
            Some(CHAR_FORMAT_UUID) => DescriptorKind::PresentationFormat,
            _ => DescriptorKind::Other(uuid),
        }
    }
}

/// A descriptor attached to a characteristic
///
/// The value is fixed at definition time. Client Characteristic
/// Configuration is per connection and is answered by the dispatcher, the
/// stored value only serves as the disabled default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    kind: DescriptorKind,
    value: Vec<u8>,
}

impl Descriptor {
    /// Creates a descriptor. Well-known UUIDs given as `Other` are mapped
    /// to their kind.
    pub fn new(kind: DescriptorKind, value: Vec<u8>) -> Self {
        Self {
            kind: DescriptorKind::from(kind.uuid()),
            value,
        }
    }

    /// Client Characteristic Configuration descriptor, initially disabled.
    pub fn client_configuration() -> Self {
        Self::new(
            DescriptorKind::ClientConfiguration,
            encode_cccd(SubscriptionMode::None).to_vec(),
        )
    }

    pub fn user_description(text: &str) -> Self {
        Self::new(DescriptorKind::UserDescription, text.as_bytes().to_vec())
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn uuid(&self) -> Uuid {
        self.kind.uuid()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// Encodes a subscription mode as a CCCD value.
pub fn encode_cccd(mode: SubscriptionMode) -> [u8; 2] {
    let flags = match mode {
        SubscriptionMode::None => 0,
        SubscriptionMode::Notify => CCCD_NOTIFY,
        SubscriptionMode::Indicate => CCCD_INDICATE,
    };
    let mut raw = [0u8; 2];
    LittleEndian::write_u16(&mut raw, flags);
    raw
}

/// Decodes a raw CCCD write. When both bits are set the device is
/// subscribed for indications.
pub fn decode_cccd(raw: &[u8]) -> GattResult<SubscriptionMode> {
    if raw.len() != 2 {
        return Err(GattError::InvalidCccdValue(raw.to_vec()));
    }
    let flags = LittleEndian::read_u16(raw);
    if flags & !(CCCD_NOTIFY | CCCD_INDICATE) != 0 {
        return Err(GattError::InvalidCccdValue(raw.to_vec()));
    }

    let mode = if flags & CCCD_INDICATE != 0 {
        SubscriptionMode::Indicate
    } else if flags & CCCD_NOTIFY != 0 {
        SubscriptionMode::Notify
    } else {
        SubscriptionMode::None
    };
    Ok(mode)
}
