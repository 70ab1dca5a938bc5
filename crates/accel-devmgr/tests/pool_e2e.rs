//! End-to-end pool tests against the real registry
//!
//! Drives the full attach -> start -> select/use/release -> stop -> detach
//! flow the way a driver and its clients would, including a multi-threaded
//! stress pass over the real types.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use accel_devmgr::{
    AlgServiceError, AlgServices, DevMgrConfig, DevMgrError, DeviceHandle, DeviceRegistry,
    NumaNode, OwnerPin,
};

/// Install a subscriber so `RUST_LOG=debug cargo test` shows registry logs
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Owner that counts pins, like a module loader would
#[derive(Default)]
struct CountingOwner {
    pins: AtomicU32,
    unpins: AtomicU32,
}

impl OwnerPin for CountingOwner {
    fn try_pin(&self) -> bool {
        self.pins.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn unpin(&self) {
        self.unpins.fetch_add(1, Ordering::AcqRel);
    }
}

/// Services hook that counts registrations
#[derive(Default)]
struct CountingServices {
    registered: AtomicU32,
    unregistered: AtomicU32,
}

impl AlgServices for CountingServices {
    fn register_algs(&self) -> Result<(), AlgServiceError> {
        self.registered.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn unregister_algs(&self) {
        self.unregistered.fetch_add(1, Ordering::AcqRel);
    }
}

#[test]
fn test_driver_attach_serve_detach_flow() {
    init_tracing();
    let registry = DeviceRegistry::new(DevMgrConfig::default());
    let owner = Arc::new(CountingOwner::default());
    let services = Arc::new(CountingServices::default());

    // Attach: register then start
    let device = DeviceHandle::builder("vcrypto0")
        .node(NumaNode(0))
        .owner(owner.clone())
        .services(services.clone())
        .build();
    registry.register(&device).unwrap();
    device.start().unwrap();
    assert_eq!(services.registered.load(Ordering::Acquire), 1);

    // Serve: clients select, use, release
    {
        let lease = registry.select(Some(NumaNode(0))).unwrap();
        assert!(lease.is_started());
        assert!(device.in_use());
    }
    assert!(!device.in_use());
    assert_eq!(owner.pins.load(Ordering::Acquire), 1);
    assert_eq!(owner.unpins.load(Ordering::Acquire), 1);

    // Detach: stop then remove
    device.stop();
    assert_eq!(services.unregistered.load(Ordering::Acquire), 1);
    assert!(registry.select(Some(NumaNode(0))).is_none());
    registry.unregister(&device).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_capacity_bound_end_to_end() {
    let registry = DeviceRegistry::new(DevMgrConfig::new().with_max_devices(3));
    let devices: Vec<_> = (0..3)
        .map(|i| {
            let device = DeviceHandle::builder(format!("vcrypto{i}")).build();
            registry.register(&device).unwrap();
            device
        })
        .collect();

    let overflow = DeviceHandle::builder("vcrypto3").build();
    assert!(matches!(
        registry.register(&overflow),
        Err(DevMgrError::CapacityExceeded { max: 3 })
    ));

    // Freeing a slot lets the rejected device in, with a fresh id
    registry.unregister(&devices[1]).unwrap();
    let id = registry.register(&overflow).unwrap();
    assert!(id > devices[2].id().unwrap());
}

#[test]
fn test_balancing_scenario_with_any_node_device() {
    let registry = DeviceRegistry::new(DevMgrConfig::default());
    let a = DeviceHandle::builder("vcrypto0").node(NumaNode(0)).build();
    let b = DeviceHandle::builder("vcrypto1").node(NumaNode(1)).build();
    let c = DeviceHandle::builder("vcrypto2").build();
    for device in [&a, &b, &c] {
        registry.register(device).unwrap();
        device.start().unwrap();
    }

    // Only node-0-affine candidates are A and C; A is first among idle
    let first = registry.select(Some(NumaNode(0))).unwrap();
    assert!(Arc::ptr_eq(first.device(), &a));

    // With A loaded, the any-node device takes the next node-0 request
    let second = registry.select(Some(NumaNode(0))).unwrap();
    assert!(Arc::ptr_eq(second.device(), &c));

    // Node 1 still prefers its own idle device
    let third = registry.select(Some(NumaNode(1))).unwrap();
    assert!(Arc::ptr_eq(third.device(), &b));
}

#[test]
fn test_stopped_device_invisible_to_its_node() {
    let registry = DeviceRegistry::new(DevMgrConfig::default());
    let device = DeviceHandle::builder("vcrypto0").node(NumaNode(2)).build();
    registry.register(&device).unwrap();
    device.start().unwrap();
    device.stop();

    assert!(registry.select(Some(NumaNode(2))).is_none());
}

#[test]
fn test_concurrent_clients_stress() {
    init_tracing();
    const WORKERS: usize = 8;
    const ITERATIONS: usize = 200;

    let registry = Arc::new(DeviceRegistry::new(DevMgrConfig::default()));
    let owner = Arc::new(CountingOwner::default());

    let devices: Vec<_> = (0..4)
        .map(|i| {
            let device = DeviceHandle::builder(format!("vcrypto{i}"))
                .node(NumaNode((i % 2) as u32))
                .owner(owner.clone())
                .build();
            registry.register(&device).unwrap();
            device.start().unwrap();
            device
        })
        .collect();

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let registry = registry.clone();
            thread::spawn(move || {
                let mut served = 0usize;
                for iteration in 0..ITERATIONS {
                    let hint = match (worker + iteration) % 3 {
                        0 => Some(NumaNode(0)),
                        1 => Some(NumaNode(1)),
                        _ => None,
                    };
                    if let Some(lease) = registry.select(hint) {
                        assert!(lease.is_started());
                        assert!(lease.ref_count() >= 1);
                        served += 1;
                    }
                }
                served
            })
        })
        .collect();

    let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(total, WORKERS * ITERATIONS, "every request must be served");

    // All leases returned: counts drained, pins balanced
    for device in &devices {
        assert_eq!(device.ref_count(), 0);
    }
    assert_eq!(
        owner.pins.load(Ordering::Acquire),
        owner.unpins.load(Ordering::Acquire)
    );

    let stats = registry.stats();
    assert_eq!(stats.registered, 4);
    assert_eq!(stats.started, 4);
    assert_eq!(stats.busy, 0);
    assert_eq!(stats.leases, 0);
}

#[test]
fn test_detach_succeeds_once_clients_drain() {
    let registry = Arc::new(DeviceRegistry::new(DevMgrConfig::default()));
    let device = DeviceHandle::builder("vcrypto0").build();
    registry.register(&device).unwrap();
    device.start().unwrap();

    let client_registry = registry.clone();
    let client = thread::spawn(move || {
        for _ in 0..50 {
            if let Some(lease) = client_registry.select(None) {
                std::hint::black_box(&lease);
            }
        }
    });

    client.join().unwrap();

    // Clients are gone; stop, then removal must succeed on the first try
    device.stop();
    registry.unregister(&device).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_first_matches_insertion_order_under_churn() {
    let registry = DeviceRegistry::new(DevMgrConfig::default());
    let a = DeviceHandle::builder("vcrypto0").build();
    let b = DeviceHandle::builder("vcrypto1").build();
    registry.register(&a).unwrap();
    registry.register(&b).unwrap();

    registry.unregister(&a).unwrap();
    let first = registry.first().unwrap();
    assert!(Arc::ptr_eq(&first, &b));
}
