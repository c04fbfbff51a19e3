//! Built-in peripheral profiles

pub mod temperature;

use crate::config::PeripheralDefinition;

pub use temperature::TemperatureService;

/// Names of the peripherals that can be emulated, in menu order
pub const PERIPHERAL_NAMES: [&str; 1] = [temperature::PERIPHERAL_NAME];

/// Looks up a peripheral definition by (case-insensitive) name.
pub fn peripheral(name: &str) -> Option<PeripheralDefinition> {
    if name.eq_ignore_ascii_case(temperature::PERIPHERAL_NAME) {
        Some(temperature::definition())
    } else {
        None
    }
}
