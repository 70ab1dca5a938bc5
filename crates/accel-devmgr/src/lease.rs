//! Scoped device leases
//!
//! A lease is the capability returned by a successful acquisition. Dropping
//! it releases the holder count and, for the last holder, unpins the owning
//! module, on every exit path including early returns and panics.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::device::DeviceHandle;
use crate::error::Result;

/// Proof that the holder may dispatch work to a device.
///
/// Obtained from [`DeviceLease::acquire`] or
/// [`DeviceRegistry::select`](crate::DeviceRegistry::select). Derefs to the
/// underlying [`DeviceHandle`]; the handle stays alive and its owner stays
/// pinned for at least as long as the lease lives.
#[must_use = "dropping the lease releases the device"]
pub struct DeviceLease {
    device: Arc<DeviceHandle>,
}

impl DeviceLease {
    /// Acquire a lease on the given device.
    ///
    /// The first acquisition of an idle device pins the owning module. When
    /// the pin is refused the acquisition fails as a whole: the holder
    /// count is left untouched and
    /// [`DevMgrError::PinFailed`](crate::DevMgrError::PinFailed) is
    /// returned.
    pub fn acquire(device: &Arc<DeviceHandle>) -> Result<Self> {
        device.hold()?;
        Ok(Self {
            device: Arc::clone(device),
        })
    }

    /// The leased device
    pub fn device(&self) -> &Arc<DeviceHandle> {
        &self.device
    }
}

impl Deref for DeviceLease {
    type Target = DeviceHandle;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.device.release();
    }
}

impl fmt::Debug for DeviceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceLease")
            .field("device", &self.device.label())
            .field("ref_count", &self.device.ref_count())
            .finish()
    }
}
