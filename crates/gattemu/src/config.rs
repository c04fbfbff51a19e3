//! Peripheral configuration
//!
//! A [`PeripheralDefinition`] is the static description of the GATT tree a
//! peripheral exposes; [`PeripheralDefinition::build_registry`] turns it into
//! a [`ServiceRegistry`]. [`AdvertiseSettings`] holds the address put into
//! advertisements, persisted through an injected [`ConfigStore`].

use crate::error::{GattError, GattResult};
use crate::gap::is_valid_mac_address;
use crate::gatt::{
    Characteristic, CharacteristicProperties, Descriptor, DescriptorKind, Service,
    ServiceRegistry, ServiceType, ValueFormat,
};
use crate::uuid::Uuid;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Descriptor attached to a characteristic at build time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorDefinition {
    pub kind: DescriptorKind,
    pub value: Vec<u8>,
}

impl DescriptorDefinition {
    pub fn client_configuration() -> Self {
        Self {
            kind: DescriptorKind::ClientConfiguration,
            value: vec![0x00, 0x00],
        }
    }

    pub fn user_description(text: &str) -> Self {
        Self {
            kind: DescriptorKind::UserDescription,
            value: text.as_bytes().to_vec(),
        }
    }
}

/// Initial value of a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialValue {
    Int(i64),
    /// IEEE-11073 mantissa and exponent
    Float { mantissa: i32, exponent: i8 },
}

impl Default for InitialValue {
    fn default() -> Self {
        InitialValue::Int(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDefinition {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub format: ValueFormat,
    pub offset: usize,
    pub initial_value: InitialValue,
    pub descriptors: Vec<DescriptorDefinition>,
}

impl CharacteristicDefinition {
    pub fn new(uuid: Uuid, properties: CharacteristicProperties, format: ValueFormat) -> Self {
        Self {
            uuid,
            properties,
            format,
            offset: 0,
            initial_value: InitialValue::default(),
            descriptors: Vec::new(),
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_initial_value(mut self, value: i64) -> Self {
        self.initial_value = InitialValue::Int(value);
        self
    }

    pub fn with_initial_float(mut self, mantissa: i32, exponent: i8) -> Self {
        self.initial_value = InitialValue::Float { mantissa, exponent };
        self
    }

    pub fn with_descriptor(mut self, descriptor: DescriptorDefinition) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Adds a Client Characteristic Configuration descriptor.
    pub fn with_cccd(self) -> Self {
        self.with_descriptor(DescriptorDefinition::client_configuration())
    }

    fn build(&self) -> GattResult<Characteristic> {
        let mut characteristic =
            Characteristic::new(self.uuid, self.properties, self.format, self.offset)?;
        match self.initial_value {
            InitialValue::Int(value) => characteristic.set_value(value, self.format, self.offset)?,
            InitialValue::Float { mantissa, exponent } => {
                characteristic.set_float_value(mantissa, exponent, self.format, self.offset)?
            }
        }
        for descriptor in &self.descriptors {
            characteristic.add_descriptor(Descriptor::new(descriptor.kind, descriptor.value.clone()))?;
        }
        Ok(characteristic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub uuid: Uuid,
    pub service_type: ServiceType,
    pub characteristics: Vec<CharacteristicDefinition>,
}

impl ServiceDefinition {
    pub fn primary(uuid: Uuid) -> Self {
        Self {
            uuid,
            service_type: ServiceType::Primary,
            characteristics: Vec::new(),
        }
    }

    pub fn secondary(uuid: Uuid) -> Self {
        Self {
            uuid,
            service_type: ServiceType::Secondary,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: CharacteristicDefinition) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    pub fn build(&self) -> GattResult<Service> {
        let mut service = Service::new(self.uuid, self.service_type);
        for definition in &self.characteristics {
            service.add_characteristic(definition.build()?)?;
        }
        Ok(service)
    }
}

/// Static description of an emulated peripheral
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeripheralDefinition {
    pub name: String,
    pub services: Vec<ServiceDefinition>,
}

impl PeripheralDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: ServiceDefinition) -> Self {
        self.services.push(service);
        self
    }

    pub fn service(&self, uuid: &Uuid) -> GattResult<&ServiceDefinition> {
        self.services
            .iter()
            .find(|s| s.uuid == *uuid)
            .ok_or(GattError::UnknownService(*uuid))
    }

    /// Builds every service in order and registers it.
    pub fn build_registry(&self) -> GattResult<ServiceRegistry> {
        let mut registry = ServiceRegistry::new();
        for definition in &self.services {
            registry.register_service(definition.build()?)?;
        }
        debug!("built {} with {} service(s)", self.name, registry.len());
        Ok(registry)
    }
}

/// Keyed string storage for persisted settings
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory [`ConfigStore`]
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

pub const ADVERTISE_MAC_ADDRESS_KEY: &str = "AdvertiseMacAddress";
pub const DEFAULT_MAC_ADDRESS: &str = "11:22:33:44:55:66";

/// Addresses offered for quick selection
pub const PRESET_MAC_ADDRESSES: [&str; 11] = [
    "11:11:11:11:11:11",
    "22:22:22:22:22:22",
    "33:33:33:33:33:33",
    "44:44:44:44:44:44",
    "55:55:55:55:55:55",
    "66:66:66:66:66:66",
    "77:77:77:77:77:77",
    "88:88:88:88:88:88",
    "99:99:99:99:99:99",
    "00:00:00:00:00:00",
    "30:0e:db:48:b4:b0",
];

/// Advertised address setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiseSettings {
    mac_address: String,
}

impl Default for AdvertiseSettings {
    fn default() -> Self {
        Self {
            mac_address: DEFAULT_MAC_ADDRESS.to_string(),
        }
    }
}

impl AdvertiseSettings {
    /// Loads the stored address, falling back to the default when nothing
    /// valid is stored.
    pub fn load(store: &dyn ConfigStore) -> Self {
        match store.get(ADVERTISE_MAC_ADDRESS_KEY) {
            Some(mac_address) if is_valid_mac_address(&mac_address) => Self { mac_address },
            _ => Self::default(),
        }
    }

    /// Validates and persists a new address. The string is stored as given.
    pub fn set_mac_address(&mut self, store: &dyn ConfigStore, mac_address: &str) -> GattResult<()> {
        if !is_valid_mac_address(mac_address) {
            return Err(GattError::InvalidMacAddress(mac_address.to_string()));
        }
        store.set(ADVERTISE_MAC_ADDRESS_KEY, mac_address);
        info!("advertise address set to {}", mac_address);
        self.mac_address = mac_address.to_string();
        Ok(())
    }

    /// Selects one of [`PRESET_MAC_ADDRESSES`].
    pub fn select_preset(&mut self, store: &dyn ConfigStore, index: usize) -> GattResult<()> {
        let preset = PRESET_MAC_ADDRESSES
            .get(index)
            .ok_or_else(|| GattError::InvalidMacAddress(format!("preset #{}", index)))?;
        self.set_mac_address(store, preset)
    }

    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }
}
