//! Temperature peripheral
//!
//! Exposes the measurement through the Heart Rate service layout
//! (service 0x180D, measurement 0x2A37). The first byte of the value is the
//! Heart Rate flags field and stays zero, the reading itself is a uint8 at
//! offset 1.

use crate::config::{CharacteristicDefinition, PeripheralDefinition, ServiceDefinition};
use crate::error::{GattError, GattResult};
use crate::gatt::{
    Characteristic, CharacteristicProperties, DeliveryReport, NotifyDelegate, ServiceRegistry,
    ValueFormat,
};
use crate::uuid::Uuid;
use log::debug;
use std::sync::Arc;

pub const PERIPHERAL_NAME: &str = "Temperature";

pub const TEMPERATURE_SERVICE_UUID: Uuid = Uuid::from_u16(0x180D);
pub const TEMPERATURE_MEASUREMENT_UUID: Uuid = Uuid::from_u16(0x2A37);
pub const TEMPERATURE_MEASUREMENT_FORMAT: ValueFormat = ValueFormat::Uint8;
pub const TEMPERATURE_MEASUREMENT_OFFSET: usize = 1;
pub const INITIAL_TEMPERATURE: i64 = 37;

pub fn service_definition() -> ServiceDefinition {
    ServiceDefinition::primary(TEMPERATURE_SERVICE_UUID).with_characteristic(
        CharacteristicDefinition::new(
            TEMPERATURE_MEASUREMENT_UUID,
            CharacteristicProperties::NOTIFY,
            TEMPERATURE_MEASUREMENT_FORMAT,
        )
        .with_offset(TEMPERATURE_MEASUREMENT_OFFSET)
        .with_initial_value(INITIAL_TEMPERATURE)
        .with_cccd(),
    )
}

pub fn definition() -> PeripheralDefinition {
    PeripheralDefinition::new(PERIPHERAL_NAME).with_service(service_definition())
}

/// Drives the temperature measurement of a running peripheral
pub struct TemperatureService<D: NotifyDelegate + ?Sized> {
    measurement: Arc<Characteristic>,
    delegate: Arc<D>,
}

impl<D: NotifyDelegate + ?Sized> TemperatureService<D> {
    /// Binds to the measurement characteristic registered in `registry`.
    pub fn new(registry: &ServiceRegistry, delegate: Arc<D>) -> GattResult<Self> {
        let service = registry
            .service(&TEMPERATURE_SERVICE_UUID)
            .ok_or(GattError::UnknownService(TEMPERATURE_SERVICE_UUID))?;
        let measurement = service
            .characteristic(&TEMPERATURE_MEASUREMENT_UUID)
            .ok_or(GattError::UnknownCharacteristic(TEMPERATURE_MEASUREMENT_UUID))?
            .clone();
        Ok(Self {
            measurement,
            delegate,
        })
    }

    pub fn measurement(&self) -> &Arc<Characteristic> {
        &self.measurement
    }

    /// Stores a new reading without notifying anyone.
    pub fn set_temperature(&self, temperature: i64) -> GattResult<()> {
        self.measurement.set_value(
            temperature,
            TEMPERATURE_MEASUREMENT_FORMAT,
            TEMPERATURE_MEASUREMENT_OFFSET,
        )?;
        debug!("temperature set to {}", temperature);
        Ok(())
    }

    pub fn temperature(&self) -> GattResult<i64> {
        self.measurement
            .int_value(TEMPERATURE_MEASUREMENT_FORMAT, TEMPERATURE_MEASUREMENT_OFFSET)
    }

    /// Pushes the current reading to subscribed devices.
    pub async fn notify(&self) -> GattResult<DeliveryReport> {
        self.delegate
            .send_notification_to_devices(&TEMPERATURE_MEASUREMENT_UUID)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingDelegate {
        requests: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl NotifyDelegate for CountingDelegate {
        async fn send_notification_to_devices(
            &self,
            characteristic: &Uuid,
        ) -> GattResult<DeliveryReport> {
            self.requests.lock().unwrap().push(*characteristic);
            Ok(DeliveryReport::default())
        }
    }

    #[tokio::test]
    async fn test_set_and_notify() {
        let registry = definition().build_registry().unwrap();
        let delegate = Arc::new(CountingDelegate::default());
        let service = TemperatureService::new(&registry, delegate.clone()).unwrap();

        assert_eq!(service.measurement().value(), vec![0, 37]);
        assert_eq!(service.temperature().unwrap(), INITIAL_TEMPERATURE);

        service.set_temperature(40).unwrap();
        assert_eq!(service.measurement().value(), vec![0, 40]);

        assert!(matches!(
            service.set_temperature(256),
            Err(GattError::Encoding(_))
        ));
        assert_eq!(service.temperature().unwrap(), 40);

        service.notify().await.unwrap();
        assert_eq!(
            *delegate.requests.lock().unwrap(),
            vec![TEMPERATURE_MEASUREMENT_UUID]
        );
    }

    #[test]
    fn test_requires_temperature_service() {
        let registry = ServiceRegistry::new();
        let delegate = Arc::new(CountingDelegate::default());
        assert!(matches!(
            TemperatureService::new(&registry, delegate),
            Err(GattError::UnknownService(uuid)) if uuid == TEMPERATURE_SERVICE_UUID
        ));
    }
}
