//! The bounded device table
//!
//! One exclusion lock serializes every structural mutation; readers take a
//! snapshot and traverse it outside the lock. The registry is an explicitly
//! owned value passed by reference into whatever needs it; there is no
//! process-wide singleton.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::DevMgrConfig;
use crate::device::{DeviceHandle, DeviceId};
use crate::error::{DevMgrError, Result};

/// Table state guarded by the single exclusion lock.
///
/// `next_id` lives beside the device list on purpose: id assignment is part
/// of the same critical section as the insert, and the counter survives the
/// table emptying so ids stay strictly increasing for the registry's whole
/// lifetime.
struct Table {
    devices: Vec<Arc<DeviceHandle>>,
    next_id: u64,
}

/// Aggregate pool counters, computed from a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Devices in the table
    pub registered: usize,
    /// Devices eligible for selection
    pub started: usize,
    /// Devices with at least one outstanding lease
    pub busy: usize,
    /// Total outstanding leases across the pool
    pub leases: u64,
}

/// Bounded, insertion-ordered table of device handles.
///
/// Handle identity is `Arc` pointer identity: registering two clones of the
/// same `Arc` is a duplicate, two separately built handles never are.
pub struct DeviceRegistry {
    table: Mutex<Table>,
    config: DevMgrConfig,
}

impl DeviceRegistry {
    /// Create a registry with the given configuration
    pub fn new(config: DevMgrConfig) -> Self {
        Self {
            table: Mutex::new(Table {
                devices: Vec::with_capacity(config.max_devices),
                next_id: 0,
            }),
            config,
        }
    }

    /// Add a device to the table.
    ///
    /// Assigns the next sequential [`DeviceId`], resets the holder count for
    /// this registration period, and appends the handle in insertion order.
    ///
    /// # Errors
    ///
    /// - [`DevMgrError::CapacityExceeded`] when the table is full
    /// - [`DevMgrError::AlreadyRegistered`] when this exact handle is
    ///   already present
    pub fn register(&self, device: &Arc<DeviceHandle>) -> Result<DeviceId> {
        let mut table = self.table.lock();

        if table.devices.len() >= self.config.max_devices {
            return Err(DevMgrError::CapacityExceeded {
                max: self.config.max_devices,
            });
        }
        if table.devices.iter().any(|d| Arc::ptr_eq(d, device)) {
            return Err(DevMgrError::AlreadyRegistered {
                device: device.label().to_string(),
            });
        }

        let id = DeviceId(table.next_id);
        table.next_id += 1;
        device.bind(id);
        table.devices.push(Arc::clone(device));

        info!(device = %device.label(), %id, total = table.devices.len(), "device registered");
        Ok(id)
    }

    /// Remove a device from the table.
    ///
    /// Removal of a busy device is rejected: the lease protocol owns the
    /// device's lifetime while holders exist. The check reads the advisory
    /// holder count under the table lock; a selector that already took a
    /// snapshot may still be holding the `Arc`, which keeps the handle
    /// memory-safe regardless.
    ///
    /// # Errors
    ///
    /// - [`DevMgrError::NotRegistered`] when the handle is not in the table
    /// - [`DevMgrError::DeviceBusy`] when leases are outstanding
    pub fn unregister(&self, device: &Arc<DeviceHandle>) -> Result<()> {
        let mut table = self.table.lock();

        let position = table
            .devices
            .iter()
            .position(|d| Arc::ptr_eq(d, device))
            .ok_or_else(|| DevMgrError::NotRegistered {
                device: device.label().to_string(),
            })?;

        let holders = device.ref_count();
        if holders > 0 {
            return Err(DevMgrError::DeviceBusy {
                device: device.label().to_string(),
                holders,
            });
        }

        table.devices.remove(position);
        info!(device = %device.label(), total = table.devices.len(), "device removed");
        Ok(())
    }

    /// First device in insertion order, or `None` when the table is empty
    pub fn first(&self) -> Option<Arc<DeviceHandle>> {
        self.table.lock().devices.first().cloned()
    }

    /// Copy of the table in insertion order.
    ///
    /// Each call yields a fresh pass. The snapshot is consistent at the
    /// moment it is taken and may go stale while traversed; staleness only
    /// costs load-balancing quality, never safety.
    pub fn snapshot(&self) -> Vec<Arc<DeviceHandle>> {
        self.table.lock().devices.clone()
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.table.lock().devices.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.lock().devices.is_empty()
    }

    /// Configured hard cap on registrations
    pub fn capacity(&self) -> usize {
        self.config.max_devices
    }

    /// Aggregate counters over a fresh snapshot
    pub fn stats(&self) -> PoolStats {
        let snapshot = self.snapshot();
        let mut stats = PoolStats {
            registered: snapshot.len(),
            ..PoolStats::default()
        };
        for device in &snapshot {
            if device.is_started() {
                stats.started += 1;
            }
            let holders = device.ref_count();
            if holders > 0 {
                stats.busy += 1;
                stats.leases += u64::from(holders);
            }
        }
        debug!(?stats, "pool stats");
        stats
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DevMgrConfig::default())
    }
}
