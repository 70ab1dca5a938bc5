//! Device handles and the acquire/release lifecycle
//!
//! A [`DeviceHandle`] represents one virtual crypto accelerator instance.
//! Handles are created by the driver layer, registered with a
//! [`DeviceRegistry`](crate::DeviceRegistry), started once their queues are
//! ready, and handed to clients as scoped
//! [`DeviceLease`](crate::DeviceLease)s.
//!
//! The holder count is a lock-free atomic: it sits on the hot path of every
//! request dispatch. The owning module is pinned on the 0->1 transition and
//! unpinned on 1->0, so the code behind a busy device can never be unloaded.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::error::{DevMgrError, Result};
use crate::traits::{AlgServices, AlwaysPinned, NoopAlgServices, OwnerPin};

/// Identity assigned to a device at registration time.
///
/// Ids are unique and strictly increasing for the whole lifetime of a
/// registry; the counter is never reset, so a removed id cannot reappear on
/// a different device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// NUMA node identifier used for affinity matching.
///
/// A device with no node (`None` in [`DeviceHandle::node`]) is affine to
/// everything; a selection hint of `None` means "no preference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NumaNode(pub u32);

impl fmt::Display for NumaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Lifecycle status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    /// In the table but not offering service; invisible to selection
    Registered = 0,
    /// Algorithms registered; eligible for work dispatch
    Started = 1,
}

impl DeviceStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DeviceStatus::Started,
            _ => DeviceStatus::Registered,
        }
    }
}

/// Sentinel stored in the id slot before registration assigns one
const ID_UNASSIGNED: u64 = u64::MAX;

/// One virtual crypto accelerator instance.
///
/// Constructed through [`DeviceHandle::builder`]; always lives behind an
/// `Arc` so the registry, selectors, and leases can share it. Pointer
/// identity of the `Arc` is the handle's identity in the table.
pub struct DeviceHandle {
    label: String,
    node: Option<NumaNode>,
    id: AtomicU64,
    status: AtomicU8,
    ref_count: AtomicU32,
    owner: Arc<dyn OwnerPin>,
    services: Arc<dyn AlgServices>,
}

impl DeviceHandle {
    /// Start building a handle with the given label
    pub fn builder(label: impl Into<String>) -> DeviceHandleBuilder {
        DeviceHandleBuilder {
            label: label.into(),
            node: None,
            owner: Arc::new(AlwaysPinned),
            services: Arc::new(NoopAlgServices),
        }
    }

    /// Human-readable device name used in logs and errors
    pub fn label(&self) -> &str {
        &self.label
    }

    /// NUMA node the device is affine to; `None` matches every node
    pub fn node(&self) -> Option<NumaNode> {
        self.node
    }

    /// Registry-assigned identity, if this handle is (or was) registered
    pub fn id(&self) -> Option<DeviceId> {
        match self.id.load(Ordering::Acquire) {
            ID_UNASSIGNED => None,
            raw => Some(DeviceId(raw)),
        }
    }

    /// Current lifecycle status
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Whether the device is eligible for selection
    pub fn is_started(&self) -> bool {
        self.status() == DeviceStatus::Started
    }

    /// Whether any leases are outstanding. Advisory: a concurrent release
    /// may change the answer before the caller acts on it.
    pub fn in_use(&self) -> bool {
        self.ref_count() != 0
    }

    /// Current holder count. Advisory, same as [`in_use`](Self::in_use).
    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Take one holder on the device; pin the owner on the 0->1 transition.
    ///
    /// The pin happens before the count is published, so a refused pin
    /// leaves no trace. Pins are counted, which makes losing the publish
    /// race below safe to undo with a plain unpin.
    pub(crate) fn hold(&self) -> Result<()> {
        loop {
            let current = self.ref_count.load(Ordering::Acquire);
            if current == 0 {
                if !self.owner.try_pin() {
                    return Err(DevMgrError::PinFailed {
                        device: self.label.clone(),
                    });
                }
                match self
                    .ref_count
                    .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                {
                    Ok(_) => return Ok(()),
                    Err(_) => self.owner.unpin(),
                }
            } else {
                match self.ref_count.compare_exchange(
                    current,
                    current + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Ok(()),
                    Err(_) => {}
                }
            }
        }
    }

    /// Drop one holder; unpin the owner when the count hits zero.
    /// Called from `DeviceLease::drop`, exactly once per acquire.
    pub(crate) fn release(&self) {
        if self.ref_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.owner.unpin();
        }
    }

    /// Start the device: register its algorithms and make it selectable.
    ///
    /// On registration failure the device stays in `Registered` and the
    /// error is returned. Start/stop are driven by the single owning driver
    /// thread; concurrent calls on one handle are out of contract.
    pub fn start(&self) -> Result<()> {
        if let Err(err) = self.services.register_algs() {
            error!(device = %self.label, %err, "failed to register crypto algs");
            return Err(err.into());
        }
        self.status
            .store(DeviceStatus::Started as u8, Ordering::Release);
        info!(device = %self.label, "device started");
        Ok(())
    }

    /// Stop the device: unregister its algorithms and demote it to
    /// `Registered`. Never removes it from the table.
    pub fn stop(&self) {
        self.services.unregister_algs();
        self.status
            .store(DeviceStatus::Registered as u8, Ordering::Release);
        info!(device = %self.label, "device stopped");
    }

    /// Called by the registry while holding the table lock: assign the id
    /// and reset the holder count for this registration period.
    pub(crate) fn bind(&self, id: DeviceId) {
        self.id.store(id.0, Ordering::Release);
        self.ref_count.store(0, Ordering::Release);
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("label", &self.label)
            .field("node", &self.node)
            .field("id", &self.id())
            .field("status", &self.status())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Builder for [`DeviceHandle`]
pub struct DeviceHandleBuilder {
    label: String,
    node: Option<NumaNode>,
    owner: Arc<dyn OwnerPin>,
    services: Arc<dyn AlgServices>,
}

impl DeviceHandleBuilder {
    /// Set the NUMA node the device is affine to
    pub fn node(mut self, node: NumaNode) -> Self {
        self.node = Some(node);
        self
    }

    /// Set the owning module pinned while leases are outstanding.
    /// Defaults to [`AlwaysPinned`].
    pub fn owner(mut self, owner: Arc<dyn OwnerPin>) -> Self {
        self.owner = owner;
        self
    }

    /// Set the algorithm-services hook invoked on start/stop.
    /// Defaults to [`NoopAlgServices`].
    pub fn services(mut self, services: Arc<dyn AlgServices>) -> Self {
        self.services = services;
        self
    }

    /// Build the handle
    pub fn build(self) -> Arc<DeviceHandle> {
        Arc::new(DeviceHandle {
            label: self.label,
            node: self.node,
            id: AtomicU64::new(ID_UNASSIGNED),
            status: AtomicU8::new(DeviceStatus::Registered as u8),
            ref_count: AtomicU32::new(0),
            owner: self.owner,
            services: self.services,
        })
    }
}
