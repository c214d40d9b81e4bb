use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::parse::decode_sample;
use crate::protocol::{DATA_CHARACTERISTIC, SAMPLE_PAYLOAD_LEN, SERVICE_UUID};
use crate::types::{ConnectionState, ImuEvent};

// ── Status reporting ──────────────────────────────────────────────────────────

/// Callback invoked at every connection step with the new state and a
/// human-readable status line.
pub type StatusCallback = Arc<dyn Fn(ConnectionState, &str) + Send + Sync>;

// ── ImuDevice ─────────────────────────────────────────────────────────────────

/// A peripheral advertising the IMU service, found during a scan.
///
/// Returned by [`ImuClient::scan_all`]; pass to [`ImuClient::connect_to`].
#[derive(Clone, Debug)]
pub struct ImuDevice {
    /// Advertised local name, or `"Unknown"`.
    pub name: String,
    /// Platform BLE identifier (UUID on macOS / Windows, MAC address on Linux).
    pub id: String,
    pub(crate) peripheral: Peripheral,
    /// The adapter that discovered this device; its event stream is used to
    /// watch for link loss.
    pub(crate) adapter: Adapter,
}

// ── ImuClientConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ImuClientConfig {
    /// How long discovery listens for advertisements. Default: `10`.
    pub scan_timeout_secs: u64,
    /// Only accept devices whose advertised name starts with this prefix.
    /// `None` accepts any device advertising [`SERVICE_UUID`]. Default: `None`.
    pub name_prefix: Option<String>,
    /// Upper bound on the GATT connect step.  `None` waits indefinitely.
    /// Default: `None`.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ImuClientConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 10,
            name_prefix: None,
            connect_timeout_secs: None,
        }
    }
}

// ── ImuClient ─────────────────────────────────────────────────────────────────

/// BLE central for the IMU peripheral.
///
/// Drives the discovery → connect → subscribe sequence and hands back an
/// event channel plus an [`ImuHandle`] that owns the live connection.
pub struct ImuClient {
    config: ImuClientConfig,
    on_status: Option<StatusCallback>,
}

impl ImuClient {
    pub fn new(config: ImuClientConfig) -> Self {
        Self {
            config,
            on_status: None,
        }
    }

    /// Report every connection step through `callback`.
    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.on_status = Some(callback);
        self
    }

    fn status(&self, state: ConnectionState, message: &str) {
        info!("{message}");
        if let Some(cb) = &self.on_status {
            cb(state, message);
        }
    }

    fn matches_prefix(&self, name: &str) -> bool {
        self.config
            .name_prefix
            .as_deref()
            .map_or(true, |p| name.starts_with(p))
    }

    // ── Public: scan ─────────────────────────────────────────────────────────

    /// Scan for `scan_timeout_secs` and return every peripheral advertising
    /// the IMU service.
    pub async fn scan_all(&self) -> Result<Vec<ImuDevice>> {
        let adapter = first_adapter().await?;

        info!("scan_all: scanning for {} s …", self.config.scan_timeout_secs);
        adapter
            .start_scan(ScanFilter {
                services: vec![SERVICE_UUID],
            })
            .await?;
        tokio::time::sleep(Duration::from_secs(self.config.scan_timeout_secs)).await;
        adapter.stop_scan().await.ok();

        let mut found = vec![];
        for p in adapter.peripherals().await? {
            if let Some(device) = self.accept(&adapter, p).await {
                info!("scan_all: found {}  id={}", device.name, device.id);
                found.push(device);
            }
        }
        info!("scan_all: {} device(s) found", found.len());
        Ok(found)
    }

    // ── Public: connect ──────────────────────────────────────────────────────

    /// Discover the first IMU peripheral, connect, and start streaming.
    ///
    /// Any failing step aborts the whole sequence and reports
    /// [`ConnectionState::Disconnected`] with the error; nothing is retried.
    pub async fn connect(&self) -> Result<(mpsc::Receiver<ImuEvent>, ImuHandle)> {
        self.status(ConnectionState::Discovering, "Requesting Bluetooth Device...");
        let device = match self.discover().await {
            Ok(d) => d,
            Err(e) => return Err(self.fail(e)),
        };
        self.connect_to(device).await
    }

    /// Connect to a device returned by [`ImuClient::scan_all`] and subscribe
    /// to sample notifications.
    pub async fn connect_to(&self, device: ImuDevice) -> Result<(mpsc::Receiver<ImuEvent>, ImuHandle)> {
        let peripheral = device.peripheral.clone();
        match self.setup_peripheral(device).await {
            Ok(ok) => Ok(ok),
            Err(e) => {
                // Do not leave a half-open link behind.
                peripheral.disconnect().await.ok();
                Err(self.fail(e))
            }
        }
    }

    fn fail(&self, e: anyhow::Error) -> anyhow::Error {
        warn!("connect failed: {e}");
        self.status(ConnectionState::Disconnected, &format!("Error: {e}"));
        e
    }

    // ── Private: discovery ────────────────────────────────────────────────────

    async fn discover(&self) -> Result<ImuDevice> {
        let adapter = first_adapter().await?;
        adapter
            .start_scan(ScanFilter {
                services: vec![SERVICE_UUID],
            })
            .await?;
        let timeout_secs = self.config.scan_timeout_secs;

        let found = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
            loop {
                for p in adapter.peripherals().await.unwrap_or_default() {
                    if let Some(device) = self.accept(&adapter, p).await {
                        return device;
                    }
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        })
        .await;
        adapter.stop_scan().await.ok();

        let device = found
            .map_err(|_| anyhow!("No IMU device found after {timeout_secs} s of scanning"))?;
        info!("Found device: {}  id={}", device.name, device.id);
        Ok(device)
    }

    /// Keep `p` if it advertises the IMU service and passes the name filter.
    async fn accept(&self, adapter: &Adapter, p: Peripheral) -> Option<ImuDevice> {
        let props = p.properties().await.ok().flatten()?;
        if !props.services.contains(&SERVICE_UUID) {
            return None;
        }
        let name = props.local_name.unwrap_or_else(|| "Unknown".into());
        if !self.matches_prefix(&name) {
            debug!("Skipping {name}: name prefix mismatch");
            return None;
        }
        Some(ImuDevice {
            name,
            id: p.id().to_string(),
            peripheral: p,
            adapter: adapter.clone(),
        })
    }

    // ── Private: setup_peripheral ─────────────────────────────────────────────

    async fn setup_peripheral(
        &self,
        device: ImuDevice,
    ) -> Result<(mpsc::Receiver<ImuEvent>, ImuHandle)> {
        let ImuDevice {
            name,
            peripheral,
            adapter,
            ..
        } = device;

        self.status(ConnectionState::Connecting, "Connecting to GATT Server...");
        match self.config.connect_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), peripheral.connect())
                .await
                .map_err(|_| anyhow!("GATT connect timed out after {secs} s"))??,
            None => peripheral.connect().await?,
        }

        // BlueZ reports the link as up before its GATT cache is populated;
        // discovering too early yields an empty service list.
        #[cfg(target_os = "linux")]
        tokio::time::sleep(Duration::from_millis(600)).await;

        self.status(ConnectionState::Connecting, "Getting Service...");
        peripheral.discover_services().await?;
        let service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == SERVICE_UUID)
            .ok_or_else(|| anyhow!("Service {SERVICE_UUID} not found"))?;

        self.status(ConnectionState::Connecting, "Getting Characteristic...");
        let data_char = find_char(&service.characteristics, DATA_CHARACTERISTIC)?;

        self.status(
            ConnectionState::SubscribingNotifications,
            "Starting Notifications...",
        );
        peripheral.subscribe(&data_char).await?;
        let notifications = peripheral
            .notifications()
            .await?
            .map(|n| (n.uuid, n.value));

        let (tx, rx) = mpsc::channel::<ImuEvent>(256);
        let _ = tx.send(ImuEvent::Connected(name.clone())).await;

        // Shared by both tasks so exactly one Disconnected is emitted, and
        // cleared by teardown so nothing is forwarded afterwards.
        let live = Arc::new(AtomicBool::new(true));

        // ── Disconnect watcher ────────────────────────────────────────────
        // The adapter's DeviceDisconnected usually arrives before the
        // notification stream closes.
        let watcher = {
            let tx = tx.clone();
            let live = Arc::clone(&live);
            let peripheral_id = peripheral.id();
            tokio::spawn(async move {
                match adapter.events().await {
                    Ok(mut events) => {
                        while let Some(event) = events.next().await {
                            if let CentralEvent::DeviceDisconnected(id) = event {
                                if id == peripheral_id {
                                    info!("Disconnect watcher: device {id:?} disconnected.");
                                    signal_disconnected(&live, &tx).await;
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Disconnect watcher: could not subscribe to adapter events: {e}");
                    }
                }
            })
        };

        let forwarder = tokio::spawn(forward_notifications(notifications, Arc::clone(&live), tx));

        self.status(ConnectionState::Connected, "Connected!");

        Ok((
            rx,
            ImuHandle {
                name,
                peripheral,
                data_char,
                live,
                forwarder,
                watcher,
            },
        ))
    }
}

/// First Bluetooth adapter on the system.
///
/// On macOS, CoreBluetooth starts in an "unknown" state and silently ignores
/// scans until it reports PoweredOn, so wait briefly for that.
async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;

    #[cfg(target_os = "macos")]
    {
        use btleplug::api::CentralState;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            match adapter.adapter_state().await {
                Ok(CentralState::PoweredOn) => break,
                Ok(state) if tokio::time::Instant::now() >= deadline => {
                    warn!("macOS: adapter still in state {state:?} after 3 s, proceeding anyway");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("macOS: adapter_state() error: {e}");
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    Ok(adapter)
}

fn find_char(chars: &std::collections::BTreeSet<Characteristic>, uuid: Uuid) -> Result<Characteristic> {
    chars
        .iter()
        .find(|c| c.uuid == uuid)
        .cloned()
        .ok_or_else(|| anyhow!("Characteristic {uuid} not found"))
}

// ── Notification forwarder ────────────────────────────────────────────────────

/// Decode `(characteristic, payload)` notifications into [`ImuEvent::Sample`]
/// until the stream ends or `live` is cleared.
///
/// Payloads that are not [`SAMPLE_PAYLOAD_LEN`] bytes are dropped and
/// streaming continues.  When the stream ends on its own, `Disconnected` is
/// sent unless the watcher or teardown got there first.
pub(crate) async fn forward_notifications<S>(
    mut notifications: S,
    live: Arc<AtomicBool>,
    tx: mpsc::Sender<ImuEvent>,
) where
    S: Stream<Item = (Uuid, Vec<u8>)> + Unpin,
{
    let mut received: u64 = 0;
    let mut dropped: u64 = 0;
    while let Some((uuid, value)) = notifications.next().await {
        if !live.load(Ordering::Acquire) {
            break;
        }
        if uuid != DATA_CHARACTERISTIC {
            debug!("Unknown notification from {uuid}");
            continue;
        }
        received += 1;
        if received <= 3 || received % 500 == 0 {
            debug!("notif #{received} len={}", value.len());
        }
        let Some(sample) = decode_sample(&value) else {
            dropped += 1;
            debug!(
                "Dropping {}-byte payload (expected {SAMPLE_PAYLOAD_LEN}); {dropped} dropped so far",
                value.len()
            );
            continue;
        };
        if tx.send(ImuEvent::Sample(sample)).await.is_err() {
            break;
        }
    }
    info!("Notification stream ended after {received} notifications.");
    signal_disconnected(&live, &tx).await;
}

/// Emit `Disconnected` unless it has already been sent (or teardown ran).
async fn signal_disconnected(live: &AtomicBool, tx: &mpsc::Sender<ImuEvent>) {
    if live.swap(false, Ordering::AcqRel) {
        let _ = tx.send(ImuEvent::Disconnected).await;
    }
}

// ── ImuHandle ─────────────────────────────────────────────────────────────────

/// The single live connection to the peripheral.
///
/// Owns the notification subscription and the tasks forwarding it.  Call
/// [`ImuHandle::teardown`] once [`ImuEvent::Disconnected`] has been seen (or
/// when giving up on the connection) to release everything in order.
pub struct ImuHandle {
    name: String,
    peripheral: Peripheral,
    data_char: Characteristic,
    live: Arc<AtomicBool>,
    forwarder: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl ImuHandle {
    /// Advertised name of the connected device.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    /// Ask the peripheral to drop the link.
    ///
    /// The resulting [`ImuEvent::Disconnected`] goes through the same path as
    /// a peripheral-initiated disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        if self.is_connected().await {
            info!("Disconnecting from {}", self.name);
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }

    /// Detach the notification listener, unsubscribe, and release the link.
    ///
    /// Forwarding stops before the subscription is removed, so no sample
    /// reaches the event channel once this has started.
    pub async fn teardown(self) {
        self.live.store(false, Ordering::Release);
        self.forwarder.abort();
        self.watcher.abort();

        if self.is_connected().await {
            if let Err(e) = self.peripheral.unsubscribe(&self.data_char).await {
                debug!("unsubscribe failed: {e}");
            }
            if let Err(e) = self.peripheral.disconnect().await {
                debug!("disconnect during teardown failed: {e}");
            }
        }
        info!("Connection to {} released", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::encode_sample;
    use crate::types::ImuSample;
    use futures::stream;

    fn sample(v: f32) -> ImuSample {
        ImuSample::from_channels([v; 6])
    }

    async fn drain(mut rx: mpsc::Receiver<ImuEvent>) -> Vec<ImuEvent> {
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn wrong_length_payloads_are_skipped() {
        let good = encode_sample(&sample(1.5)).to_vec();
        let notifs = stream::iter(vec![
            (DATA_CHARACTERISTIC, vec![0u8; 23]),
            (DATA_CHARACTERISTIC, good.clone()),
            (DATA_CHARACTERISTIC, vec![0u8; 25]),
            (SERVICE_UUID, good.clone()),
            (DATA_CHARACTERISTIC, good),
        ]);
        let (tx, rx) = mpsc::channel(16);
        let live = Arc::new(AtomicBool::new(true));
        forward_notifications(notifs, Arc::clone(&live), tx).await;

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                ImuEvent::Sample(sample(1.5)),
                ImuEvent::Sample(sample(1.5)),
                ImuEvent::Disconnected,
            ]
        );
        assert!(!live.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn nothing_forwarded_once_torn_down() {
        let good = encode_sample(&sample(2.0)).to_vec();
        let notifs = stream::iter(vec![(DATA_CHARACTERISTIC, good.clone()); 4]);
        let (tx, rx) = mpsc::channel(16);
        let live = Arc::new(AtomicBool::new(false));
        forward_notifications(notifs, live, tx).await;

        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn disconnected_is_sent_once() {
        let (tx, rx) = mpsc::channel(16);
        let live = Arc::new(AtomicBool::new(true));
        let empty = stream::iter(Vec::<(Uuid, Vec<u8>)>::new());
        forward_notifications(empty, Arc::clone(&live), tx.clone()).await;
        // The watcher reporting the same link loss afterwards is a no-op.
        signal_disconnected(&live, &tx).await;
        drop(tx);

        assert_eq!(drain(rx).await, vec![ImuEvent::Disconnected]);
    }
}
