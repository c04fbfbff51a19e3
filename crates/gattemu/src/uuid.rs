//! Bluetooth UUIDs
//!
//! Every UUID is stored as 128 bits in little-endian order. 16-bit and 32-bit
//! SIG-assigned values are expanded against the Bluetooth base UUID
//! `00000000-0000-1000-8000-00805F9B34FB`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit Bluetooth UUID.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// Base UUID in little-endian order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16/32-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// Creates a UUID from 16 little-endian bytes.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a UUID from 16 big-endian bytes (the order of the textual form).
    pub const fn from_bytes_be(bytes: [u8; 16]) -> Self {
        let mut le = [0u8; 16];
        let mut i = 0;
        while i < 16 {
            le[i] = bytes[15 - i];
            i += 1;
        }
        Uuid { bytes: le }
    }

    /// Creates a UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        Self::from_u32(uuid16 as u32)
    }

    /// Creates a UUID from a 32-bit SIG-assigned value.
    pub const fn from_u32(uuid32: u32) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid32 as u8;
        bytes[BASE_OFFSET + 1] = (uuid32 >> 8) as u8;
        bytes[BASE_OFFSET + 2] = (uuid32 >> 16) as u8;
        bytes[BASE_OFFSET + 3] = (uuid32 >> 24) as u8;
        Uuid { bytes }
    }

    /// Little-endian bytes.
    pub const fn as_bytes_le(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Big-endian bytes.
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    fn is_sig_assigned(&self) -> bool {
        self.bytes[0..BASE_OFFSET] == BASE_UUID_BYTES[0..BASE_OFFSET]
    }

    /// Returns the 16-bit alias when this UUID is a SIG-assigned 16-bit UUID.
    pub fn as_u16(&self) -> Option<u16> {
        match self.as_u32() {
            Some(value) => u16::try_from(value).ok(),
            None => None,
        }
    }

    /// Returns the 32-bit alias when this UUID is derived from the base UUID.
    pub fn as_u32(&self) -> Option<u32> {
        if !self.is_sig_assigned() {
            return None;
        }
        Some(u32::from_le_bytes([
            self.bytes[BASE_OFFSET],
            self.bytes[BASE_OFFSET + 1],
            self.bytes[BASE_OFFSET + 2],
            self.bytes[BASE_OFFSET + 3],
        ]))
    }

    /// Shortest wire encoding: 2 bytes for 16-bit aliases, 16 bytes otherwise.
    pub fn to_att_bytes(&self) -> Vec<u8> {
        match self.as_u16() {
            Some(short) => short.to_le_bytes().to_vec(),
            None => self.bytes.to_vec(),
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u32> for Uuid {
    fn from(uuid32: u32) -> Self {
        Uuid::from_u32(uuid32)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes_be();
        write!(
            f,
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16])
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u32() {
            Some(short) if short <= u16::MAX as u32 => write!(f, "Uuid(0x{:04X})", short),
            Some(short) => write!(f, "Uuid(0x{:08X})", short),
            None => write!(f, "Uuid({})", self),
        }
    }
}

/// Errors produced while parsing a UUID string
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UuidParseError {
    #[error("expected 4, 8 or 32 hex digits, found {0}")]
    InvalidLength(usize),

    #[error("invalid hex in UUID: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Accepts `180D`, `0000180D` and the hyphenated 128-bit form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 => {
                let mut short = [0u8; 2];
                hex::decode_to_slice(&cleaned, &mut short)?;
                Ok(Uuid::from_u16(u16::from_be_bytes(short)))
            }
            8 => {
                let mut short = [0u8; 4];
                hex::decode_to_slice(&cleaned, &mut short)?;
                Ok(Uuid::from_u32(u32::from_be_bytes(short)))
            }
            32 => {
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            other => Err(UuidParseError::InvalidLength(other)),
        }
    }
}
