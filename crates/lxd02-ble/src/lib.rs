//! Bluetooth-LE transport for the LX-D02 printer driver.
//!
//! Scans for the printer by advertised name or address, connects with
//! bounded retries, locates the ffe1/ffe2 characteristics and implements
//! the driver's [`Link`] contract on top of btleplug.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::BoxStream;
use futures::StreamExt;
use uuid::Uuid;

use lxd02_proto::error::{Error, Result};
use lxd02_proto::link::Link;

/// TX characteristic (host to printer, write without response).
pub const TX_CHAR: Uuid = Uuid::from_u128(0x0000_ffe1_0000_1000_8000_0080_5f9b_34fb);
/// RX characteristic (printer to host, notifications).
pub const RX_CHAR: Uuid = Uuid::from_u128(0x0000_ffe2_0000_1000_8000_0080_5f9b_34fb);

/// How long one scan window lasts before the device counts as absent.
const SCAN_TIMEOUT: Duration = Duration::from_secs(10);
/// Connect attempts before giving up.
const CONNECT_RETRIES: usize = 5;
/// Pause between connect attempts.
const RETRY_WAIT: Duration = Duration::from_secs(1);

/// How to identify the printer during a scan. At least one of the fields
/// must be set; either match wins.
#[derive(Debug, Clone, Default)]
pub struct SearchParameters {
    /// Advertised local name, e.g. "LX-D02".
    pub name: Option<String>,
    /// Platform device address (MAC on Linux).
    pub address: Option<String>,
}

impl SearchParameters {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none()
    }

    fn matches(&self, local_name: Option<&str>, address: &str) -> bool {
        if let Some(ref name) = self.name {
            if local_name == Some(name.as_str()) {
                return true;
            }
        }
        if let Some(ref wanted) = self.address {
            if address.eq_ignore_ascii_case(wanted) {
                return true;
            }
        }
        false
    }
}

/// A connected LX-D02 with its TX and RX characteristics resolved.
pub struct BleLink {
    peripheral: Peripheral,
    tx: Characteristic,
    rx: Characteristic,
}

/// Locate the printer and connect, retrying the whole scan-and-connect
/// cycle up to five times.
pub async fn connect(search: &SearchParameters) -> Result<BleLink> {
    if search.is_empty() {
        return Err(Error::InvalidParam(
            "a device name or address is required".into(),
        ));
    }

    let manager = Manager::new().await.map_err(ble_err)?;
    let adapter = manager
        .adapters()
        .await
        .map_err(ble_err)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Transport("no BLE adapter found".into()))?;

    let mut last_err = None;
    for attempt in 1..=CONNECT_RETRIES {
        let peripheral = locate_device(&adapter, search).await?;
        match peripheral.connect().await {
            Ok(()) => return finish_connect(peripheral).await,
            Err(err) => {
                log::warn!("connect attempt {attempt} failed: {err}");
                last_err = Some(err);
                tokio::time::sleep(RETRY_WAIT).await;
            }
        }
    }
    Err(Error::Transport(format!(
        "failed to connect after {CONNECT_RETRIES} attempts: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Scan until a device matching the search parameters shows up.
async fn locate_device(adapter: &Adapter, search: &SearchParameters) -> Result<Peripheral> {
    log::debug!("scanning for printer ({search:?})");
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(ble_err)?;
    let mut events = adapter.events().await.map_err(ble_err)?;

    let deadline = tokio::time::sleep(SCAN_TIMEOUT);
    tokio::pin!(deadline);

    let found = loop {
        tokio::select! {
            _ = &mut deadline => break None,
            event = events.next() => {
                let Some(CentralEvent::DeviceDiscovered(id)) = event else {
                    continue;
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                let address = props.address.to_string();
                if search.matches(props.local_name.as_deref(), &address) {
                    log::info!(
                        "found printer {} ({address})",
                        props.local_name.as_deref().unwrap_or("<unnamed>")
                    );
                    break Some(peripheral);
                }
            }
        }
    };

    if let Err(err) = adapter.stop_scan().await {
        log::warn!("failed to stop scan: {err}");
    }
    found.ok_or_else(|| Error::Transport("printer not found during scan".into()))
}

/// Discover services, resolve the TX/RX characteristics and subscribe to
/// RX notifications.
async fn finish_connect(peripheral: Peripheral) -> Result<BleLink> {
    peripheral.discover_services().await.map_err(ble_err)?;

    let chars = peripheral.characteristics();
    let tx = chars
        .iter()
        .find(|c| c.uuid == TX_CHAR)
        .cloned()
        .ok_or_else(|| Error::Transport(format!("TX characteristic {TX_CHAR} not found")))?;
    let rx = chars
        .iter()
        .find(|c| c.uuid == RX_CHAR)
        .cloned()
        .ok_or_else(|| Error::Transport(format!("RX characteristic {RX_CHAR} not found")))?;

    peripheral.subscribe(&rx).await.map_err(ble_err)?;
    log::info!("connected to printer, notifications enabled");

    Ok(BleLink { peripheral, tx, rx })
}

#[async_trait]
impl Link for BleLink {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.tx, data, WriteType::WithoutResponse)
            .await
            .map_err(ble_err)
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>> {
        let stream = self.peripheral.notifications().await.map_err(ble_err)?;
        let rx_uuid = self.rx.uuid;
        Ok(stream
            .filter_map(move |n| async move { (n.uuid == rx_uuid).then_some(n.value) })
            .boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        log::info!("disconnecting from printer");
        self.peripheral.disconnect().await.map_err(ble_err)
    }
}

fn ble_err(err: btleplug::Error) -> Error {
    Error::Transport(err.to_string())
}
