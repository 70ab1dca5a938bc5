//! Topology-aware device selection
//!
//! Policy: locality first, load second. The selector prefers started
//! devices affine to the requested node, picking the one with the fewest
//! holders; when the topology is imbalanced it degrades to "any started
//! device" rather than failing, so progress beats strict affinity.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::device::{DeviceHandle, NumaNode};
use crate::lease::DeviceLease;
use crate::registry::DeviceRegistry;

/// Whether a device may serve work requested for `hint`.
///
/// A device without a node is affine to everything; a caller without a
/// preference accepts every device.
fn affine(node: Option<NumaNode>, hint: Option<NumaNode>) -> bool {
    match (node, hint) {
        (None, _) | (_, None) => true,
        (Some(node), Some(hint)) => node == hint,
    }
}

impl DeviceRegistry {
    /// Pick the least-loaded started device affine to `hint` and acquire a
    /// lease on it for the caller.
    ///
    /// Works over one snapshot of the table, in insertion order:
    ///
    /// 1. Among started devices affine to the hint, take the one with the
    ///    smallest holder count; ties go to the first encountered.
    /// 2. No affine candidate: fall back to the first started device on any
    ///    node, ignoring load.
    /// 3. No started device at all: `None`. This is "try later", not a
    ///    failure.
    ///
    /// A refused owner pin aborts the acquisition (count untouched) and the
    /// selection returns `None`.
    pub fn select(&self, hint: Option<NumaNode>) -> Option<DeviceLease> {
        let snapshot = self.snapshot();

        let mut best: Option<(&Arc<DeviceHandle>, u32)> = None;
        for device in &snapshot {
            if !device.is_started() || !affine(device.node(), hint) {
                continue;
            }
            let holders = device.ref_count();
            match best {
                Some((_, fewest)) if fewest <= holders => {}
                _ => best = Some((device, holders)),
            }
        }

        let chosen = match best {
            Some((device, _)) => device,
            None => {
                // Best effort: any started device beats no device
                warn!(hint = ?hint, "no started device affine to node, taking any");
                snapshot.iter().find(|d| d.is_started())?
            }
        };

        match DeviceLease::acquire(chosen) {
            Ok(lease) => {
                debug!(
                    device = %chosen.label(),
                    holders = chosen.ref_count(),
                    hint = ?hint,
                    "device selected"
                );
                Some(lease)
            }
            Err(err) => {
                warn!(device = %chosen.label(), %err, "selected device could not be acquired");
                None
            }
        }
    }
}
