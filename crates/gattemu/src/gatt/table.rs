//! Attribute table adapter
//!
//! Flattens a [`ServiceRegistry`] into the handle-addressed attribute layout
//! a GATT server exposes over ATT: a service declaration, then for every
//! characteristic its declaration, its value and its descriptors. Transports
//! that speak raw ATT use this to map handles back to domain objects; the
//! domain model itself never sees handles.

use super::characteristic::Characteristic;
use super::constants::*;
use super::descriptor::DescriptorKind;
use super::dispatcher::NotificationDispatcher;
use super::registry::ServiceRegistry;
use super::transport::Transport;
use crate::error::{GattError, GattResult};
use crate::gap::DeviceId;
use crate::uuid::Uuid;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What lives at a handle
#[derive(Debug, Clone)]
pub enum AttributeRole {
    ServiceDeclaration { service: Uuid },
    CharacteristicDeclaration { characteristic: Uuid },
    CharacteristicValue { characteristic: Arc<Characteristic> },
    Descriptor {
        characteristic: Arc<Characteristic>,
        kind: DescriptorKind,
    },
}

/// One row of the table
#[derive(Debug, Clone)]
pub struct Attribute {
    pub handle: u16,
    /// Attribute type (declaration UUID, characteristic UUID or descriptor UUID)
    pub type_: Uuid,
    pub role: AttributeRole,
    /// Value of declarations; dynamic attributes read through their owner
    static_value: Option<Vec<u8>>,
}

/// Handle range covered by a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceGroup {
    pub service: Uuid,
    pub start_handle: u16,
    pub end_handle: u16,
}

#[derive(Debug, Default)]
pub struct AttributeTable {
    attributes: BTreeMap<u16, Attribute>,
    groups: Vec<ServiceGroup>,
    value_handles: HashMap<Uuid, u16>,
    cccd_handles: HashMap<u16, Uuid>,
}

struct HandleAllocator {
    next: Option<u16>,
}

impl HandleAllocator {
    fn next(&mut self) -> GattResult<u16> {
        let handle = self.next.ok_or(GattError::AttributeTableFull)?;
        self.next = handle.checked_add(1);
        Ok(handle)
    }
}

impl AttributeTable {
    /// Lays out every registered service in registration order starting at
    /// handle 0x0001.
    pub fn build(registry: &ServiceRegistry) -> GattResult<Self> {
        let mut table = AttributeTable::default();
        let mut handles = HandleAllocator {
            next: Some(ATT_HANDLE_MIN),
        };

        for service in registry.services() {
            let start_handle = handles.next()?;
            let declaration_type = if service.is_primary() {
                PRIMARY_SERVICE_UUID
            } else {
                SECONDARY_SERVICE_UUID
            };
            table.insert(
                start_handle,
                Uuid::from_u16(declaration_type),
                AttributeRole::ServiceDeclaration {
                    service: service.uuid(),
                },
                Some(service.uuid().to_att_bytes()),
            );
            let mut end_handle = start_handle;

            for characteristic in service.characteristics() {
                let declaration_handle = handles.next()?;
                let value_handle = handles.next()?;

                let mut declaration = vec![characteristic.properties().bits()];
                declaration.extend_from_slice(&value_handle.to_le_bytes());
                declaration.extend_from_slice(&characteristic.uuid().to_att_bytes());
                table.insert(
                    declaration_handle,
                    Uuid::from_u16(CHARACTERISTIC_UUID),
                    AttributeRole::CharacteristicDeclaration {
                        characteristic: characteristic.uuid(),
                    },
                    Some(declaration),
                );
                table.insert(
                    value_handle,
                    characteristic.uuid(),
                    AttributeRole::CharacteristicValue {
                        characteristic: characteristic.clone(),
                    },
                    None,
                );
                table
                    .value_handles
                    .insert(characteristic.uuid(), value_handle);
                end_handle = value_handle;

                for descriptor in characteristic.descriptors() {
                    let handle = handles.next()?;
                    table.insert(
                        handle,
                        descriptor.uuid(),
                        AttributeRole::Descriptor {
                            characteristic: characteristic.clone(),
                            kind: descriptor.kind(),
                        },
                        None,
                    );
                    if descriptor.kind() == DescriptorKind::ClientConfiguration {
                        table.cccd_handles.insert(handle, characteristic.uuid());
                    }
                    end_handle = handle;
                }
            }

            table.groups.push(ServiceGroup {
                service: service.uuid(),
                start_handle,
                end_handle,
            });
        }
        Ok(table)
    }

    fn insert(&mut self, handle: u16, type_: Uuid, role: AttributeRole, static_value: Option<Vec<u8>>) {
        self.attributes.insert(
            handle,
            Attribute {
                handle,
                type_,
                role,
                static_value,
            },
        );
    }

    /// Attributes in handle order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> + '_ {
        self.attributes.values()
    }

    pub fn attribute(&self, handle: u16) -> Option<&Attribute> {
        self.attributes.get(&handle)
    }

    pub fn service_groups(&self) -> &[ServiceGroup] {
        &self.groups
    }

    pub fn value_handle(&self, characteristic: &Uuid) -> Option<u16> {
        self.value_handles.get(characteristic).copied()
    }

    /// Characteristic whose Client Characteristic Configuration descriptor
    /// lives at `handle`, if any. Transports forward writes to such handles
    /// to the dispatcher.
    pub fn cccd_owner(&self, handle: u16) -> Option<Uuid> {
        self.cccd_handles.get(&handle).copied()
    }

    /// Reads the attribute at `handle` for `device`. Characteristic values
    /// are subject to the characteristic's READ property; Client
    /// Characteristic Configuration handles answer with the subscription
    /// `device` holds in `dispatcher`.
    pub fn read<T: Transport + ?Sized>(
        &self,
        handle: u16,
        device: &DeviceId,
        dispatcher: &NotificationDispatcher<T>,
    ) -> GattResult<Vec<u8>> {
        let attribute = self
            .attributes
            .get(&handle)
            .ok_or(GattError::InvalidHandle(handle))?;

        if let Some(value) = &attribute.static_value {
            return Ok(value.clone());
        }
        if let Some(owner) = self.cccd_owner(handle) {
            return Ok(dispatcher.cccd_value(device, &owner)?.to_vec());
        }
        match &attribute.role {
            AttributeRole::CharacteristicValue { characteristic } => characteristic.read(),
            AttributeRole::Descriptor {
                characteristic,
                kind,
            } => characteristic
                .descriptor(*kind)
                .map(|d| d.value().to_vec())
                .ok_or(GattError::InvalidHandle(handle)),
            _ => Err(GattError::InvalidHandle(handle)),
        }
    }

    /// Writes a characteristic value at `handle`, subject to the
    /// characteristic's WRITE property and declared width.
    pub fn write_value(&self, handle: u16, value: &[u8]) -> GattResult<()> {
        match self.attributes.get(&handle).map(|a| &a.role) {
            Some(AttributeRole::CharacteristicValue { characteristic }) => {
                characteristic.write(value)
            }
            _ => Err(GattError::InvalidHandle(handle)),
        }
    }
}
