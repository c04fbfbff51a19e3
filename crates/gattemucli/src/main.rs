//! Runs an emulated peripheral against a loopback transport that logs every
//! delivery, with one simulated central subscribed to the measurement.
//!
//! Usage: gattemucli [--mac <address>] [--peripheral <name>] [temperature...]

use async_trait::async_trait;
use gattemu::gatt::{AttributeTable, DeliveryKind, NotificationDispatcher, Transport, TransportError};
use gattemu::profiles::{self, PERIPHERAL_NAMES};
use gattemu::{AdvertiseSettings, DeviceId, MemoryConfigStore, TemperatureService, Uuid};
use log::info;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const SIMULATED_DEVICE: &str = "dev1";
const STEP_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_TEMPERATURES: [i64; 4] = [37, 38, 40, 36];

/// Prints deliveries instead of sending them over the air
struct LoopbackTransport;

#[async_trait]
impl Transport for LoopbackTransport {
    async fn deliver(
        &self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
        kind: DeliveryKind,
    ) -> Result<(), TransportError> {
        info!("{:?} {} -> {}: {:02x?}", kind, characteristic, device, value);
        Ok(())
    }
}

struct Args {
    peripheral: String,
    mac_address: Option<String>,
    temperatures: Vec<i64>,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut args = Args {
        peripheral: PERIPHERAL_NAMES[0].to_string(),
        mac_address: None,
        temperatures: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mac" => args.mac_address = Some(iter.next().ok_or("--mac needs an address")?),
            "--peripheral" => args.peripheral = iter.next().ok_or("--peripheral needs a name")?,
            value => args.temperatures.push(value.parse()?),
        }
    }
    if args.temperatures.is_empty() {
        args.temperatures = DEFAULT_TEMPERATURES.to_vec();
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Err(err) = pretty_env_logger::try_init() {
        eprintln!("WARNING: failed to initialize logging framework: {}", err);
    }

    let args = parse_args()?;

    let store = MemoryConfigStore::new();
    let mut settings = AdvertiseSettings::load(&store);
    if let Some(mac_address) = &args.mac_address {
        settings.set_mac_address(&store, mac_address)?;
    }

    let definition = profiles::peripheral(&args.peripheral)
        .ok_or_else(|| format!("unknown peripheral {:?}, known: {:?}", args.peripheral, PERIPHERAL_NAMES))?;
    let registry = Arc::new(definition.build_registry()?);

    let table = AttributeTable::build(&registry)?;
    println!(
        "{} peripheral advertising as {}",
        definition.name,
        settings.mac_address()
    );
    for attribute in table.attributes() {
        println!("  0x{:04X} {}", attribute.handle, attribute.type_);
    }

    let dispatcher = Arc::new(NotificationDispatcher::new(
        registry.clone(),
        Arc::new(LoopbackTransport),
    ));
    let temperature = TemperatureService::new(&registry, dispatcher.clone())?;

    // The central enables notifications by writing the CCCD handle.
    let device = DeviceId::from(SIMULATED_DEVICE);
    let cccd = table
        .attributes()
        .find_map(|a| table.cccd_owner(a.handle).map(|owner| (a.handle, owner)));
    if let Some((handle, characteristic)) = cccd {
        let mode = dispatcher.on_cccd_write(&device, &characteristic, &[0x01, 0x00])?;
        let readback = table.read(handle, &device, &*dispatcher)?;
        println!(
            "{} wrote CCCD at 0x{:04X}: {:?}, reads back {:02x?}",
            device, handle, mode, readback
        );
    }

    for value in &args.temperatures {
        temperature.set_temperature(*value)?;
        let report = temperature.notify().await?;
        println!(
            "temperature {} -> delivered to {} device(s), {} failed",
            value,
            report.delivered.len(),
            report.failed.len()
        );
        tokio::time::sleep(STEP_DELAY).await;
    }

    dispatcher.on_device_disconnected(&device);
    Ok(())
}
