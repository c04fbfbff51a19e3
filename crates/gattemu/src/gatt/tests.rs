//! Scenario tests for the GATT model and notification dispatcher

use super::*;
use crate::error::GattError;
use crate::gap::DeviceId;
use crate::uuid::Uuid;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SERVICE: Uuid = Uuid::from_u16(0x180D);
const MEASUREMENT: Uuid = Uuid::from_u16(0x2A37);
const CONTROL: Uuid = Uuid::from_u16(0x2A39);
const ALERT: Uuid = Uuid::from_u16(0x2A46);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Start(DeviceId),
    Delivered(DeviceId, Uuid, Vec<u8>, DeliveryKind),
}

/// Transport double recording every delivery
#[derive(Default)]
struct RecordingTransport {
    events: Mutex<Vec<Event>>,
    failing: Mutex<HashSet<DeviceId>>,
    delays: Mutex<HashMap<DeviceId, Duration>>,
}

impl RecordingTransport {
    fn fail(&self, device: &DeviceId) {
        self.failing.lock().unwrap().insert(device.clone());
    }

    fn delay(&self, device: &DeviceId, delay: Duration) {
        self.delays.lock().unwrap().insert(device.clone(), delay);
    }

    fn delivered_to(&self, device: &DeviceId) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::Delivered(d, _, value, _) if d == device => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    fn deliveries(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::Delivered(..)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(
        &self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
        kind: DeliveryKind,
    ) -> Result<(), TransportError> {
        self.events.lock().unwrap().push(Event::Start(device.clone()));
        let delay = self.delays.lock().unwrap().get(device).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(device) {
            return Err(TransportError::NotConnected(device.clone()));
        }
        self.events.lock().unwrap().push(Event::Delivered(
            device.clone(),
            characteristic,
            value.to_vec(),
            kind,
        ));
        Ok(())
    }
}

struct Fixture {
    registry: Arc<ServiceRegistry>,
    transport: Arc<RecordingTransport>,
    dispatcher: NotificationDispatcher<RecordingTransport>,
}

impl Fixture {
    fn new() -> Self {
        let mut measurement = Characteristic::new(
            MEASUREMENT,
            CharacteristicProperties::NOTIFY,
            ValueFormat::Uint8,
            0,
        )
        .unwrap();
        measurement.set_value(37, ValueFormat::Uint8, 0).unwrap();
        measurement
            .add_descriptor(Descriptor::client_configuration())
            .unwrap();

        let control = Characteristic::new(
            CONTROL,
            CharacteristicProperties::INDICATE | CharacteristicProperties::WRITE,
            ValueFormat::Uint8,
            0,
        )
        .unwrap();
        let alert = Characteristic::new(
            ALERT,
            CharacteristicProperties::NOTIFY | CharacteristicProperties::INDICATE,
            ValueFormat::Uint16,
            0,
        )
        .unwrap();

        let mut service = Service::primary(SERVICE);
        service.add_characteristic(measurement).unwrap();
        service.add_characteristic(control).unwrap();
        service.add_characteristic(alert).unwrap();

        let mut registry = ServiceRegistry::new();
        registry.register_service(service).unwrap();
        let registry = Arc::new(registry);

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new(registry.clone(), transport.clone());
        Self {
            registry,
            transport,
            dispatcher,
        }
    }

    fn measurement(&self) -> &Arc<Characteristic> {
        self.registry.characteristic(&MEASUREMENT).unwrap()
    }

    fn subscribe(&self, device: &DeviceId) {
        self.dispatcher
            .on_subscription_write(device, &MEASUREMENT, SubscriptionMode::Notify)
            .unwrap();
    }
}

fn sorted(mut devices: Vec<DeviceId>) -> Vec<DeviceId> {
    devices.sort();
    devices
}

#[tokio::test]
async fn test_temperature_scenario() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    fixture.subscribe(&dev1);

    fixture
        .measurement()
        .set_value(40, ValueFormat::Uint8, 0)
        .unwrap();
    let report = fixture.dispatcher.notify(&MEASUREMENT).await.unwrap();

    assert_eq!(fixture.measurement().value(), vec![40]);
    assert_eq!(report.value, vec![40]);
    assert_eq!(report.delivered, vec![dev1.clone()]);
    assert!(report.is_success());
    assert_eq!(
        fixture.transport.deliveries(),
        vec![Event::Delivered(
            dev1,
            MEASUREMENT,
            vec![40],
            DeliveryKind::Notification
        )]
    );
}

#[tokio::test]
async fn test_disconnected_device_receives_nothing() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    let dev2 = DeviceId::from("dev2");
    fixture.subscribe(&dev1);
    fixture.subscribe(&dev2);

    assert_eq!(fixture.dispatcher.on_device_disconnected(&dev2), 1);
    let report = fixture.dispatcher.notify(&MEASUREMENT).await.unwrap();

    assert_eq!(report.delivered, vec![dev1.clone()]);
    assert_eq!(fixture.transport.delivered_to(&dev1), vec![vec![37]]);
    assert!(fixture.transport.delivered_to(&dev2).is_empty());
    assert_eq!(
        fixture.dispatcher.subscription(&dev2, &MEASUREMENT),
        SubscriptionMode::None
    );
}

#[tokio::test]
async fn test_notify_without_subscribers() {
    let fixture = Fixture::new();
    let report = fixture.dispatcher.notify(&MEASUREMENT).await.unwrap();
    assert!(report.delivered.is_empty());
    assert!(report.is_success());
    assert!(fixture.transport.deliveries().is_empty());
}

#[tokio::test]
async fn test_notify_requires_notify_property() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    fixture
        .dispatcher
        .on_subscription_write(&dev1, &CONTROL, SubscriptionMode::Indicate)
        .unwrap();

    let err = fixture.dispatcher.notify(&CONTROL).await.unwrap_err();
    assert_eq!(
        err,
        GattError::OperationNotPermitted {
            characteristic: CONTROL,
            operation: Operation::Notify,
        }
    );
    assert!(fixture.transport.deliveries().is_empty());

    let unknown = Uuid::from_u16(0x2A00);
    assert_eq!(
        fixture.dispatcher.notify(&unknown).await.unwrap_err(),
        GattError::UnknownCharacteristic(unknown)
    );
}

#[test]
fn test_subscription_writes() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    let unknown = Uuid::from_u16(0x2A00);

    assert_eq!(
        fixture
            .dispatcher
            .on_subscription_write(&dev1, &unknown, SubscriptionMode::Notify),
        Err(GattError::UnknownCharacteristic(unknown))
    );
    assert!(matches!(
        fixture
            .dispatcher
            .on_subscription_write(&dev1, &MEASUREMENT, SubscriptionMode::Indicate),
        Err(GattError::OperationNotPermitted {
            operation: Operation::Indicate,
            ..
        })
    ));

    fixture.subscribe(&dev1);
    fixture.subscribe(&dev1);
    assert_eq!(
        fixture.dispatcher.subscribers(&MEASUREMENT).unwrap(),
        vec![(dev1.clone(), SubscriptionMode::Notify)]
    );
    assert_eq!(
        fixture.dispatcher.cccd_value(&dev1, &MEASUREMENT).unwrap(),
        [0x01, 0x00]
    );

    fixture
        .dispatcher
        .on_subscription_write(&dev1, &MEASUREMENT, SubscriptionMode::None)
        .unwrap();
    assert!(fixture.dispatcher.subscribers(&MEASUREMENT).unwrap().is_empty());
    assert_eq!(
        fixture.dispatcher.cccd_value(&dev1, &MEASUREMENT).unwrap(),
        [0x00, 0x00]
    );
}

#[test]
fn test_cccd_value_is_per_device() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    let dev2 = DeviceId::from("dev2");

    fixture.subscribe(&dev1);
    fixture
        .dispatcher
        .on_cccd_write(&dev2, &MEASUREMENT, &[0x00, 0x00])
        .unwrap();
    assert_eq!(
        fixture.dispatcher.subscription(&dev1, &MEASUREMENT),
        SubscriptionMode::Notify
    );
    assert_eq!(
        fixture.dispatcher.cccd_value(&dev1, &MEASUREMENT).unwrap(),
        [0x01, 0x00]
    );
    assert_eq!(
        fixture.dispatcher.cccd_value(&dev2, &MEASUREMENT).unwrap(),
        [0x00, 0x00]
    );

    // Nothing stays enabled once every subscriber has left.
    fixture.dispatcher.on_device_disconnected(&dev1);
    fixture.subscribe(&dev2);
    fixture.dispatcher.on_device_disconnected(&dev2);
    for device in [&dev1, &dev2] {
        assert_eq!(
            fixture.dispatcher.cccd_value(device, &MEASUREMENT).unwrap(),
            [0x00, 0x00]
        );
    }
    // The declared descriptor keeps its disabled default.
    let cccd = fixture
        .measurement()
        .descriptor(DescriptorKind::ClientConfiguration)
        .unwrap();
    assert_eq!(cccd.value(), &[0x00, 0x00]);

    let unknown = Uuid::from_u16(0x2A00);
    assert_eq!(
        fixture.dispatcher.cccd_value(&dev1, &unknown),
        Err(GattError::UnknownCharacteristic(unknown))
    );
}

#[test]
fn test_raw_cccd_writes() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");

    assert_eq!(
        fixture
            .dispatcher
            .on_cccd_write(&dev1, &MEASUREMENT, &[0x01, 0x00])
            .unwrap(),
        SubscriptionMode::Notify
    );
    assert_eq!(
        fixture.dispatcher.subscription(&dev1, &MEASUREMENT),
        SubscriptionMode::Notify
    );
    assert_eq!(
        fixture.dispatcher.on_cccd_write(&dev1, &MEASUREMENT, &[0x01]),
        Err(GattError::InvalidCccdValue(vec![0x01]))
    );
    assert_eq!(
        fixture.dispatcher.subscription(&dev1, &MEASUREMENT),
        SubscriptionMode::Notify
    );
}

#[tokio::test]
async fn test_failed_device_does_not_block_others() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    let dev2 = DeviceId::from("dev2");
    fixture.subscribe(&dev1);
    fixture.subscribe(&dev2);
    fixture.transport.fail(&dev1);

    let report = fixture.dispatcher.notify(&MEASUREMENT).await.unwrap();

    assert_eq!(report.delivered, vec![dev2.clone()]);
    assert_eq!(
        report.failed,
        vec![DeliveryFailure {
            device: dev1.clone(),
            error: DeliveryError::Transport(TransportError::NotConnected(dev1.clone())),
        }]
    );
    assert!(!report.is_success());
    // Not retried, still subscribed.
    assert_eq!(report.failed_devices(), vec![&dev1]);
    assert_eq!(
        fixture.dispatcher.subscription(&dev1, &MEASUREMENT),
        SubscriptionMode::Notify
    );
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let fixture = Fixture::new();
    let slow = DeviceId::from("slow");
    let fast = DeviceId::from("fast");
    fixture.subscribe(&slow);
    fixture.subscribe(&fast);
    fixture.transport.delay(&slow, Duration::from_secs(10));

    let timeout = Duration::from_millis(50);
    let report = fixture
        .dispatcher
        .notify_with_timeout(&MEASUREMENT, timeout)
        .await
        .unwrap();

    assert_eq!(report.delivered, vec![fast]);
    assert_eq!(
        report.failed,
        vec![DeliveryFailure {
            device: slow.clone(),
            error: DeliveryError::Timeout(timeout),
        }]
    );
    assert!(fixture.transport.delivered_to(&slow).is_empty());
}

#[tokio::test]
async fn test_successive_notifies_keep_order_per_device() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    fixture.subscribe(&dev1);
    fixture.transport.delay(&dev1, Duration::from_millis(20));

    let (first, second) = tokio::join!(
        fixture.dispatcher.notify(&MEASUREMENT),
        fixture.dispatcher.notify(&MEASUREMENT)
    );
    assert_eq!(first.unwrap().delivered, vec![dev1.clone()]);
    assert_eq!(second.unwrap().delivered, vec![dev1.clone()]);

    // The second delivery only starts once the first one completed.
    let events = fixture.transport.events.lock().unwrap().clone();
    let kinds: Vec<_> = events
        .iter()
        .map(|e| matches!(e, Event::Start(_)))
        .collect();
    assert_eq!(kinds, vec![true, false, true, false]);

    for value in [41, 42, 43] {
        fixture
            .measurement()
            .set_value(value, ValueFormat::Uint8, 0)
            .unwrap();
        fixture.dispatcher.notify(&MEASUREMENT).await.unwrap();
    }
    assert_eq!(
        fixture.transport.delivered_to(&dev1),
        vec![vec![37], vec![37], vec![41], vec![42], vec![43]]
    );
}

#[tokio::test]
async fn test_fan_out_delivers_one_snapshot() {
    let fixture = Fixture::new();
    let slow = DeviceId::from("slow");
    let fast = DeviceId::from("fast");
    fixture.subscribe(&slow);
    fixture.subscribe(&fast);
    fixture.transport.delay(&slow, Duration::from_millis(100));

    let update = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        fixture
            .measurement()
            .set_value(50, ValueFormat::Uint8, 0)
            .unwrap();
    };
    let (report, _) = tokio::join!(fixture.dispatcher.notify(&MEASUREMENT), update);

    let report = report.unwrap();
    assert_eq!(report.value, vec![37]);
    assert_eq!(sorted(report.delivered), vec![fast.clone(), slow.clone()]);
    assert_eq!(fixture.transport.delivered_to(&fast), vec![vec![37]]);
    assert_eq!(fixture.transport.delivered_to(&slow), vec![vec![37]]);
    assert_eq!(fixture.measurement().value(), vec![50]);
}

#[tokio::test]
async fn test_disconnect_during_fan_out() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    let dev2 = DeviceId::from("dev2");
    fixture.subscribe(&dev1);
    fixture.subscribe(&dev2);
    fixture.transport.delay(&dev1, Duration::from_millis(100));

    let disconnect = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        fixture.dispatcher.on_device_disconnected(&dev2);
    };
    let (first, second, _) = tokio::join!(
        fixture.dispatcher.notify(&MEASUREMENT),
        fixture.dispatcher.notify(&MEASUREMENT),
        disconnect
    );

    assert_eq!(
        sorted(first.unwrap().delivered),
        vec![dev1.clone(), dev2.clone()]
    );
    let second = second.unwrap();
    assert_eq!(second.delivered, vec![dev1.clone()]);
    assert_eq!(fixture.transport.delivered_to(&dev2).len(), 1);
    assert_eq!(fixture.transport.delivered_to(&dev1).len(), 2);
}

#[tokio::test]
async fn test_cancelled_fan_out_reports_partial_delivery() {
    let fixture = Fixture::new();
    let fast = DeviceId::from("fast");
    let slow = DeviceId::from("slow");
    fixture.subscribe(&fast);
    fixture.subscribe(&slow);
    fixture.transport.delay(&slow, Duration::from_secs(10));

    let report = fixture
        .dispatcher
        .notify_until(
            &MEASUREMENT,
            Duration::from_secs(30),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert_eq!(report.delivered, vec![fast]);
    assert!(report.failed.is_empty());
    assert!(fixture.transport.delivered_to(&slow).is_empty());

    // The lane is free again afterwards.
    fixture.transport.delay(&slow, Duration::ZERO);
    let report = fixture.dispatcher.notify(&MEASUREMENT).await.unwrap();
    assert_eq!(report.delivered.len(), 2);
}

#[tokio::test]
async fn test_indicate_reaches_indicate_subscribers_only() {
    let fixture = Fixture::new();
    let notified = DeviceId::from("notified");
    let indicated = DeviceId::from("indicated");
    fixture
        .dispatcher
        .on_subscription_write(&notified, &ALERT, SubscriptionMode::Notify)
        .unwrap();
    fixture
        .dispatcher
        .on_subscription_write(&indicated, &ALERT, SubscriptionMode::Indicate)
        .unwrap();

    let report = fixture.dispatcher.indicate(&ALERT).await.unwrap();
    assert_eq!(report.delivered, vec![indicated.clone()]);

    let report = fixture.dispatcher.notify(&ALERT).await.unwrap();
    assert_eq!(
        sorted(report.delivered),
        vec![indicated.clone(), notified.clone()]
    );

    let kinds: Vec<_> = fixture
        .transport
        .deliveries()
        .into_iter()
        .filter_map(|e| match e {
            Event::Delivered(device, _, _, kind) if device == notified => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![DeliveryKind::Notification]);

    assert!(matches!(
        fixture.dispatcher.indicate(&MEASUREMENT).await,
        Err(GattError::OperationNotPermitted {
            operation: Operation::Indicate,
            ..
        })
    ));
}

#[tokio::test]
async fn test_dispatcher_as_notify_delegate() {
    let fixture = Fixture::new();
    let dev1 = DeviceId::from("dev1");
    fixture.subscribe(&dev1);

    let delegate: &dyn NotifyDelegate = &fixture.dispatcher;
    let report = delegate
        .send_notification_to_devices(&MEASUREMENT)
        .await
        .unwrap();
    assert_eq!(report.delivered, vec![dev1]);
}
