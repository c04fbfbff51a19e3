//! Device addressing
//!
//! Remote devices are identified by opaque [`DeviceId`]s handed in by the
//! transport. [`BdAddr`] covers the peripheral's own advertised address.

pub mod types;

pub use types::{is_valid_mac_address, BdAddr, DeviceId};
