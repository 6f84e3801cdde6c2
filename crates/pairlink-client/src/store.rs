//! Collaborators the protocol engine calls into.
//!
//! The peripheral store and the device registry are shared by every
//! connection, so implementations must be safe to call from concurrent
//! connection tasks. The in-memory versions here lock internally and expose a
//! synchronous API.

use pairlink_core::{Device, PeripheralRecord};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// The set of peripherals this device manages.
pub trait PeripheralStore: Send + Sync {
    /// Snapshot of every known peripheral, in store order.
    fn peripherals(&self) -> Vec<PeripheralRecord>;
    fn connect(&self, peripheral: &PeripheralRecord);
    fn unregister(&self, peripheral: &PeripheralRecord);
    /// Replace the whole list with a synced one.
    fn replace_all(&self, peripherals: Vec<PeripheralRecord>);
}

/// Known remote devices and their reachability.
pub trait DeviceRegistry: Send + Sync {
    fn devices(&self) -> Vec<Device>;
    /// Record new metadata for a device, matched by endpoint.
    fn update(&self, device: Device);
}

/// Displays notifications. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn show(&self, title: &str, body: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct PeripheralState {
    peripherals: Vec<PeripheralRecord>,
    connected: HashSet<String>,
}

/// Mutex-guarded peripheral list.
#[derive(Debug, Default)]
pub struct MemoryPeripheralStore {
    state: Mutex<PeripheralState>,
}

impl MemoryPeripheralStore {
    pub fn new(peripherals: Vec<PeripheralRecord>) -> Self {
        Self {
            state: Mutex::new(PeripheralState {
                peripherals,
                connected: HashSet::new(),
            }),
        }
    }

    pub fn is_connected(&self, id: &str) -> bool {
        lock(&self.state).connected.contains(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).peripherals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PeripheralStore for MemoryPeripheralStore {
    fn peripherals(&self) -> Vec<PeripheralRecord> {
        lock(&self.state).peripherals.clone()
    }

    fn connect(&self, peripheral: &PeripheralRecord) {
        let mut state = lock(&self.state);
        if state.peripherals.iter().any(|p| p.id == peripheral.id) {
            state.connected.insert(peripheral.id.clone());
            tracing::info!("Connected peripheral {} ({})", peripheral.name, peripheral.id);
        } else {
            tracing::debug!("Connect for unknown peripheral {}", peripheral.id);
        }
    }

    fn unregister(&self, peripheral: &PeripheralRecord) {
        let mut state = lock(&self.state);
        state.peripherals.retain(|p| p.id != peripheral.id);
        state.connected.remove(&peripheral.id);
        tracing::info!("Unregistered peripheral {} ({})", peripheral.name, peripheral.id);
    }

    fn replace_all(&self, peripherals: Vec<PeripheralRecord>) {
        let mut state = lock(&self.state);
        let ids: HashSet<&str> = peripherals.iter().map(|p| p.id.as_str()).collect();
        state.connected.retain(|id| ids.contains(id.as_str()));
        tracing::info!(
            "Peripheral list replaced: {} -> {} entries",
            state.peripherals.len(),
            peripherals.len()
        );
        state.peripherals = peripherals;
    }
}

/// Mutex-guarded device list.
#[derive(Debug, Default)]
pub struct MemoryDeviceRegistry {
    devices: Mutex<Vec<Device>>,
}

impl MemoryDeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: Mutex::new(devices),
        }
    }

    /// Look a device up by name.
    pub fn find(&self, name: &str) -> Option<Device> {
        lock(&self.devices).iter().find(|d| d.name == name).cloned()
    }
}

impl DeviceRegistry for MemoryDeviceRegistry {
    fn devices(&self) -> Vec<Device> {
        lock(&self.devices).clone()
    }

    fn update(&self, device: Device) {
        let mut devices = lock(&self.devices);
        match devices.iter_mut().find(|d| d.same_endpoint(&device)) {
            Some(existing) => *existing = device,
            None => devices.push(device),
        }
    }
}

/// Shows notifications by logging them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn show(&self, title: &str, body: &str) {
        tracing::info!(target: "pairlink::notification", title, body, "Notification received");
    }
}
