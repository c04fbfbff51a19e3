//! Service registry
//!
//! The registry is the peripheral's exposed GATT tree. It is filled through
//! `&mut self` during startup and then shared behind an `Arc`, which makes
//! every registration happen-before any concurrent lookup without a runtime
//! lock. Services cannot be removed; changing the tree means building a new
//! registry (a peripheral restart).

use super::characteristic::Characteristic;
use super::service::Service;
use crate::error::{GattError, GattResult};
use crate::uuid::Uuid;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
    service_index: HashMap<Uuid, usize>,
    characteristics: HashMap<Uuid, Arc<Characteristic>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service to the GATT tree. Fails without side effects when the
    /// service UUID, or one of its characteristic UUIDs, is already exposed.
    pub fn register_service(&mut self, service: Service) -> GattResult<()> {
        if self.service_index.contains_key(&service.uuid()) {
            return Err(GattError::DuplicateService(service.uuid()));
        }
        if let Some(taken) = service
            .characteristics()
            .iter()
            .find(|c| self.characteristics.contains_key(&c.uuid()))
        {
            return Err(GattError::DuplicateCharacteristic(taken.uuid()));
        }

        for characteristic in service.characteristics() {
            self.characteristics
                .insert(characteristic.uuid(), characteristic.clone());
        }
        debug!(
            "registered service {} with {} characteristic(s)",
            service.uuid(),
            service.characteristics().len()
        );
        self.service_index.insert(service.uuid(), self.services.len());
        self.services.push(service);
        Ok(())
    }

    pub fn service(&self, uuid: &Uuid) -> Option<&Service> {
        self.service_index.get(uuid).map(|&index| &self.services[index])
    }

    /// Services in registration order. The iterator is lazy and can be
    /// restarted by calling this again (or cloning it).
    pub fn services(&self) -> std::slice::Iter<'_, Service> {
        self.services.iter()
    }

    pub fn characteristic(&self, uuid: &Uuid) -> Option<&Arc<Characteristic>> {
        self.characteristics.get(uuid)
    }

    /// Every characteristic, in service registration then definition order.
    pub fn characteristics(&self) -> impl Iterator<Item = &Arc<Characteristic>> + '_ {
        self.services.iter().flat_map(|s| s.characteristics().iter())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
