//! Collaborator seams for the excluded layers
//!
//! The registry core does not implement the device driver, the crypto
//! algorithm registration, or the module loader. Those layers plug in
//! through the traits here: an [`OwnerPin`] that keeps a device's owning
//! module loaded while leases are outstanding, and [`AlgServices`] invoked
//! when a device starts and stops.

use crate::error::AlgServiceError;

/// Keeps the unit of code that owns a device loaded while the device has
/// active holders.
///
/// Pins are counted: every successful [`try_pin`](OwnerPin::try_pin) must be
/// matched by exactly one [`unpin`](OwnerPin::unpin). The registry pins on
/// the first acquisition of an idle device and unpins when the last lease is
/// dropped.
pub trait OwnerPin: Send + Sync {
    /// Attempt to pin the owner. Returns `false` when the owner is already
    /// being torn down and must not gain new holders.
    fn try_pin(&self) -> bool;

    /// Release one pin previously taken with `try_pin`.
    fn unpin(&self);
}

/// Owner that can never be unloaded (statically linked code).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPinned;

impl OwnerPin for AlwaysPinned {
    fn try_pin(&self) -> bool {
        true
    }

    fn unpin(&self) {}
}

/// Crypto algorithm registration invoked on device start/stop.
///
/// Registration may fail, in which case the device stays stopped.
/// Unregistration is fire-and-forget: it has no failure path at this layer.
pub trait AlgServices: Send + Sync {
    /// Register the device's algorithms with the crypto framework.
    fn register_algs(&self) -> Result<(), AlgServiceError>;

    /// Unregister the device's algorithms. Best effort.
    fn unregister_algs(&self);
}

/// Services hook that registers nothing. Useful for devices whose
/// algorithms are managed elsewhere, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAlgServices;

impl AlgServices for NoopAlgServices {
    fn register_algs(&self) -> Result<(), AlgServiceError> {
        Ok(())
    }

    fn unregister_algs(&self) {}
}
