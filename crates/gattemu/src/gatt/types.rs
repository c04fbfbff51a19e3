//! Common types for the GATT model

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Characteristic properties as carried in the characteristic declaration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharacteristicProperties {
    pub fn can_read(&self) -> bool {
        self.contains(Self::READ)
    }

    pub fn can_write(&self) -> bool {
        self.intersects(Self::WRITE | Self::WRITE_WITHOUT_RESPONSE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(Self::NOTIFY)
    }

    pub fn can_indicate(&self) -> bool {
        self.contains(Self::INDICATE)
    }

    /// Whether a remote device may subscribe with `mode`.
    pub fn allows_subscription(&self, mode: SubscriptionMode) -> bool {
        match mode {
            SubscriptionMode::None => true,
            SubscriptionMode::Notify => self.can_notify(),
            SubscriptionMode::Indicate => self.can_indicate(),
        }
    }
}

/// Operations gated by characteristic properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Notify,
    Indicate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "READ",
            Operation::Write => "WRITE",
            Operation::Notify => "NOTIFY",
            Operation::Indicate => "INDICATE",
        };
        f.write_str(name)
    }
}

/// Primary or secondary service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceType {
    #[default]
    Primary,
    Secondary,
}

/// Subscription state of one device for one characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionMode {
    #[default]
    None,
    Notify,
    Indicate,
}

impl SubscriptionMode {
    pub fn is_active(&self) -> bool {
        !matches!(self, SubscriptionMode::None)
    }

    /// Delivery kind used for a subscriber in this mode.
    pub fn delivery_kind(&self) -> Option<DeliveryKind> {
        match self {
            SubscriptionMode::None => None,
            SubscriptionMode::Notify => Some(DeliveryKind::Notification),
            SubscriptionMode::Indicate => Some(DeliveryKind::Indication),
        }
    }
}

/// How a value update is pushed to a device; acknowledgement of
/// indications is handled by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Notification,
    Indication,
}
