//! Device registry and load balancing for virtual crypto accelerators
//!
//! This crate is the dispatch core for a pool of acceleration devices that
//! are attached, started, stopped, and shared by many concurrent clients:
//! - Bounded, insertion-ordered device table behind one exclusion lock
//! - Lock-free per-device holder counts with owner pinning on first use
//! - NUMA-aware least-loaded selection with an any-node fallback
//! - Scoped leases that release on drop, on every exit path
//!
//! # Architecture
//!
//! The design follows these principles:
//! 1. **No ambient state**: the registry is an owned value you pass around
//! 2. **Snapshot reads**: traversal never blocks registration behind it
//! 3. **Leases, not counters**: clients cannot forget to release
//! 4. **Collaborators at the seams**: drivers, module loading, and crypto
//!    algorithm registration plug in through traits
//!
//! # Example
//!
//! ```
//! use accel_devmgr::{DevMgrConfig, DeviceHandle, DeviceRegistry, NumaNode};
//!
//! # fn main() -> accel_devmgr::Result<()> {
//! let registry = DeviceRegistry::new(DevMgrConfig::default());
//!
//! let device = DeviceHandle::builder("vcrypto0").node(NumaNode(0)).build();
//! registry.register(&device)?;
//! device.start()?;
//!
//! // Clients ask for the least-loaded device near their node
//! let lease = registry.select(Some(NumaNode(0))).expect("a started device");
//! assert_eq!(lease.ref_count(), 1);
//!
//! // Dropping the lease releases the device
//! drop(lease);
//! assert!(!device.in_use());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod lease;
pub mod registry;
pub mod select;
pub mod traits;

pub use config::{DevMgrConfig, DEFAULT_MAX_DEVICES, MAX_DEVICES_ENV};
pub use device::{DeviceHandle, DeviceHandleBuilder, DeviceId, DeviceStatus, NumaNode};
pub use error::{AlgServiceError, DevMgrError, Result};
pub use lease::DeviceLease;
pub use registry::{DeviceRegistry, PoolStats};
pub use traits::{AlgServices, AlwaysPinned, NoopAlgServices, OwnerPin};
