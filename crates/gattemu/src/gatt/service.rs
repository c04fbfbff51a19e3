//! GATT services

use super::characteristic::Characteristic;
use super::types::ServiceType;
use crate::error::{GattError, GattResult};
use crate::uuid::Uuid;
use std::sync::Arc;

/// A service and the characteristics it owns
///
/// Characteristics are added while the service is being defined. Once the
/// service is registered its composition is fixed; only values and
/// descriptor contents change afterwards.
#[derive(Debug)]
pub struct Service {
    uuid: Uuid,
    service_type: ServiceType,
    characteristics: Vec<Arc<Characteristic>>,
}

impl Service {
    pub fn new(uuid: Uuid, service_type: ServiceType) -> Self {
        Self {
            uuid,
            service_type,
            characteristics: Vec::new(),
        }
    }

    pub fn primary(uuid: Uuid) -> Self {
        Self::new(uuid, ServiceType::Primary)
    }

    /// Adds a characteristic, rejecting a second one with the same UUID.
    pub fn add_characteristic(
        &mut self,
        characteristic: Characteristic,
    ) -> GattResult<Arc<Characteristic>> {
        if self.characteristic(&characteristic.uuid()).is_some() {
            return Err(GattError::DuplicateCharacteristic(characteristic.uuid()));
        }
        let characteristic = Arc::new(characteristic);
        self.characteristics.push(characteristic.clone());
        Ok(characteristic)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn is_primary(&self) -> bool {
        self.service_type == ServiceType::Primary
    }

    /// Characteristics in definition order.
    pub fn characteristics(&self) -> &[Arc<Characteristic>] {
        &self.characteristics
    }

    pub fn characteristic(&self, uuid: &Uuid) -> Option<&Arc<Characteristic>> {
        self.characteristics.iter().find(|c| c.uuid() == *uuid)
    }
}
