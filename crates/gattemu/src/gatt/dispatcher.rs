//! Notification dispatcher
//!
//! Tracks which remote devices subscribed to which characteristics and fans
//! value updates out to them through a [`Transport`].
//!
//! The subscription table is sharded per characteristic. Each shard also has
//! a fan-out lane: successive `notify` calls on one characteristic are
//! delivered one after the other, so every device sees them in call order,
//! while characteristics never wait on each other. Deliveries inside a single
//! fan-out run concurrently, each bounded by a timeout.
//!
//! `on_device_disconnected` must be called by the transport on every
//! disconnect; otherwise the device's subscriptions stay in the table.

use super::characteristic::Characteristic;
use super::descriptor::{decode_cccd, encode_cccd};
use super::registry::ServiceRegistry;
use super::transport::{Transport, TransportError};
use super::types::{DeliveryKind, Operation, SubscriptionMode};
use crate::error::{GattError, GattResult};
use crate::gap::DeviceId;
use crate::uuid::Uuid;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Default bound for a single device delivery
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Timeout applied to each device delivery by `notify` and `indicate`
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// Why a delivery to one device failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub device: DeviceId,
    pub error: DeliveryError,
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// The value snapshot sent to every device
    pub value: Vec<u8>,
    pub delivered: Vec<DeviceId>,
    pub failed: Vec<DeliveryFailure>,
    /// Devices that unsubscribed or disconnected before their delivery
    pub skipped: Vec<DeviceId>,
    /// Set when the fan-out was cancelled before every delivery finished
    pub cancelled: bool,
}

impl DeliveryReport {
    fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// True when nothing failed and nothing was cancelled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub fn failed_devices(&self) -> Vec<&DeviceId> {
        self.failed.iter().map(|f| &f.device).collect()
    }
}

/// Lets a profile ask for its characteristic to be pushed to subscribers
/// without knowing who performs the fan-out.
#[async_trait]
pub trait NotifyDelegate: Send + Sync {
    async fn send_notification_to_devices(
        &self,
        characteristic: &Uuid,
    ) -> GattResult<DeliveryReport>;
}

enum Outcome {
    Delivered,
    Skipped,
    Failed(DeliveryError),
}

type KindFilter = fn(SubscriptionMode) -> Option<DeliveryKind>;

fn any_subscriber(mode: SubscriptionMode) -> Option<DeliveryKind> {
    mode.delivery_kind()
}

fn indicate_subscriber(mode: SubscriptionMode) -> Option<DeliveryKind> {
    (mode == SubscriptionMode::Indicate).then_some(DeliveryKind::Indication)
}

struct Shard {
    characteristic: Arc<Characteristic>,
    subscribers: RwLock<HashMap<DeviceId, SubscriptionMode>>,
    lane: tokio::sync::Mutex<()>,
}

impl Shard {
    fn new(characteristic: Arc<Characteristic>) -> Self {
        Self {
            characteristic,
            subscribers: RwLock::new(HashMap::new()),
            lane: tokio::sync::Mutex::new(()),
        }
    }

    fn mode_of(&self, device: &DeviceId) -> SubscriptionMode {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device)
            .copied()
            .unwrap_or_default()
    }

    fn targets(&self, filter: KindFilter) -> Vec<DeviceId> {
        let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
        let mut devices: Vec<DeviceId> = subscribers
            .iter()
            .filter(|(_, mode)| filter(**mode).is_some())
            .map(|(device, _)| device.clone())
            .collect();
        devices.sort();
        devices
    }
}

/// Subscription table and notification fan-out for one registry
pub struct NotificationDispatcher<T: ?Sized> {
    registry: Arc<ServiceRegistry>,
    shards: HashMap<Uuid, Shard>,
    transport: Arc<T>,
    config: DispatcherConfig,
}

impl<T: Transport + ?Sized> NotificationDispatcher<T> {
    pub fn new(registry: Arc<ServiceRegistry>, transport: Arc<T>) -> Self {
        Self::with_config(registry, transport, DispatcherConfig::default())
    }

    pub fn with_config(
        registry: Arc<ServiceRegistry>,
        transport: Arc<T>,
        config: DispatcherConfig,
    ) -> Self {
        let shards = registry
            .characteristics()
            .map(|c| (c.uuid(), Shard::new(c.clone())))
            .collect();
        Self {
            registry,
            shards,
            transport,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn shard(&self, characteristic: &Uuid) -> GattResult<&Shard> {
        self.shards
            .get(characteristic)
            .ok_or(GattError::UnknownCharacteristic(*characteristic))
    }

    /// Records a subscription change written by `device`. Writing
    /// [`SubscriptionMode::None`] removes the entry; repeating a mode is a
    /// no-op.
    pub fn on_subscription_write(
        &self,
        device: &DeviceId,
        characteristic: &Uuid,
        mode: SubscriptionMode,
    ) -> GattResult<()> {
        let shard = self.shard(characteristic)?;
        let properties = shard.characteristic.properties();
        let operation = match mode {
            SubscriptionMode::Indicate => Operation::Indicate,
            _ => Operation::Notify,
        };
        shard
            .characteristic
            .require(properties.allows_subscription(mode), operation)?;

        let mut subscribers = shard
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = if mode.is_active() {
            subscribers.insert(device.clone(), mode)
        } else {
            subscribers.remove(device)
        };
        if previous.unwrap_or_default() != mode {
            debug!("{} subscription on {} is now {:?}", device, characteristic, mode);
        }
        Ok(())
    }

    /// Decodes a raw Client Characteristic Configuration write and applies it.
    pub fn on_cccd_write(
        &self,
        device: &DeviceId,
        characteristic: &Uuid,
        raw: &[u8],
    ) -> GattResult<SubscriptionMode> {
        let mode = decode_cccd(raw)?;
        self.on_subscription_write(device, characteristic, mode)?;
        Ok(mode)
    }

    /// Drops every subscription held by `device`. Returns how many entries
    /// were removed.
    pub fn on_device_disconnected(&self, device: &DeviceId) -> usize {
        let removed = self
            .shards
            .values()
            .filter(|shard| {
                shard
                    .subscribers
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(device)
                    .is_some()
            })
            .count();
        info!("{} disconnected, dropped {} subscription(s)", device, removed);
        removed
    }

    /// Client Characteristic Configuration value as seen by `device`.
    pub fn cccd_value(&self, device: &DeviceId, characteristic: &Uuid) -> GattResult<[u8; 2]> {
        let shard = self.shard(characteristic)?;
        Ok(encode_cccd(shard.mode_of(device)))
    }

    pub fn subscription(&self, device: &DeviceId, characteristic: &Uuid) -> SubscriptionMode {
        self.shards
            .get(characteristic)
            .map(|shard| shard.mode_of(device))
            .unwrap_or_default()
    }

    /// Active subscribers of a characteristic, ordered by device id.
    pub fn subscribers(&self, characteristic: &Uuid) -> GattResult<Vec<(DeviceId, SubscriptionMode)>> {
        let shard = self.shard(characteristic)?;
        let subscribers = shard
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<_> = subscribers
            .iter()
            .map(|(device, mode)| (device.clone(), *mode))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(list)
    }

    /// Pushes the current value to every NOTIFY or INDICATE subscriber.
    pub async fn notify(&self, characteristic: &Uuid) -> GattResult<DeliveryReport> {
        self.notify_with_timeout(characteristic, self.config.delivery_timeout)
            .await
    }

    pub async fn notify_with_timeout(
        &self,
        characteristic: &Uuid,
        timeout: Duration,
    ) -> GattResult<DeliveryReport> {
        self.notify_until(characteristic, timeout, future::pending())
            .await
    }

    /// Like [`notify_with_timeout`](Self::notify_with_timeout), but stops as
    /// soon as `cancel` resolves. Deliveries already completed stay in the
    /// report and `cancelled` is set.
    pub async fn notify_until<F>(
        &self,
        characteristic: &Uuid,
        timeout: Duration,
        cancel: F,
    ) -> GattResult<DeliveryReport>
    where
        F: Future<Output = ()>,
    {
        let shard = self.shard(characteristic)?;
        shard
            .characteristic
            .require(shard.characteristic.properties().can_notify(), Operation::Notify)?;
        Ok(self.fan_out(shard, any_subscriber, timeout, cancel).await)
    }

    /// Pushes the current value to INDICATE subscribers only.
    pub async fn indicate(&self, characteristic: &Uuid) -> GattResult<DeliveryReport> {
        let shard = self.shard(characteristic)?;
        shard.characteristic.require(
            shard.characteristic.properties().can_indicate(),
            Operation::Indicate,
        )?;
        Ok(self
            .fan_out(
                shard,
                indicate_subscriber,
                self.config.delivery_timeout,
                future::pending(),
            )
            .await)
    }

    async fn fan_out<F>(
        &self,
        shard: &Shard,
        filter: KindFilter,
        timeout: Duration,
        cancel: F,
    ) -> DeliveryReport
    where
        F: Future<Output = ()>,
    {
        let uuid = shard.characteristic.uuid();
        let value = shard.characteristic.value();
        let mut report = DeliveryReport::new(value.clone());
        tokio::pin!(cancel);

        let _lane = tokio::select! {
            guard = shard.lane.lock() => guard,
            _ = &mut cancel => {
                report.cancelled = true;
                return report;
            }
        };

        let value = &value;
        let mut pending: FuturesUnordered<_> = shard
            .targets(filter)
            .into_iter()
            .map(|device| async move {
                // The device may have gone away since the fan-out started.
                let Some(kind) = filter(shard.mode_of(&device)) else {
                    return (device, Outcome::Skipped);
                };
                let delivery = self.transport.deliver(&device, uuid, value, kind);
                let outcome = match tokio::time::timeout(timeout, delivery).await {
                    Ok(Ok(())) => Outcome::Delivered,
                    Ok(Err(err)) => Outcome::Failed(err.into()),
                    Err(_) => Outcome::Failed(DeliveryError::Timeout(timeout)),
                };
                (device, outcome)
            })
            .collect();

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((device, Outcome::Delivered)) => {
                        trace!("delivered {} to {}", uuid, device);
                        report.delivered.push(device);
                    }
                    Some((device, Outcome::Skipped)) => report.skipped.push(device),
                    Some((device, Outcome::Failed(error))) => {
                        warn!("delivery of {} to {} failed: {}", uuid, device, error);
                        report.failed.push(DeliveryFailure { device, error });
                    }
                    None => break,
                },
                _ = &mut cancel => {
                    debug!("fan-out of {} cancelled with {} pending", uuid, pending.len());
                    report.cancelled = true;
                    break;
                }
            }
        }
        report
    }
}

#[async_trait]
impl<T: Transport + ?Sized> NotifyDelegate for NotificationDispatcher<T> {
    async fn send_notification_to_devices(
        &self,
        characteristic: &Uuid,
    ) -> GattResult<DeliveryReport> {
        self.notify(characteristic).await
    }
}
