use crate::error::GattError;
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a connected remote device, assigned by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<BdAddr> for DeviceId {
    fn from(addr: BdAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Bluetooth device address, stored little-endian as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = GattError;

    /// Parses six colon-separated two-digit hex octets, most significant
    /// first (`11:22:33:44:55:66`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GattError::InvalidMacAddress(s.to_string());

        let octets: Vec<&str> = s.split(':').collect();
        if octets.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, octet) in octets.iter().enumerate() {
            if octet.len() != 2 {
                return Err(invalid());
            }
            hex::decode_to_slice(octet, &mut bytes[5 - i..6 - i]).map_err(|_| invalid())?;
        }
        Ok(Self { bytes })
    }
}

/// Whether `s` matches `^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$`.
pub fn is_valid_mac_address(s: &str) -> bool {
    s.parse::<BdAddr>().is_ok()
}
