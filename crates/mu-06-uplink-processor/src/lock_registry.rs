//! # Device Lock Registry
//!
//! At most one in-flight message per transport identifier. Acquisition never
//! waits: a busy device means the message is dropped. Guards release on drop,
//! so every exit path of the pipeline unlocks.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use uplink_telemetry::ACTIVE_DEVICE_LOCKS;

/// Set of devices currently being processed.
#[derive(Default, Clone)]
pub struct DeviceLockRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl DeviceLockRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `dev_eui`, or `None` if it is already held.
    pub fn try_acquire(&self, dev_eui: &str) -> Option<DeviceLockGuard> {
        if !self.held.lock().insert(dev_eui.to_string()) {
            return None;
        }
        ACTIVE_DEVICE_LOCKS.inc();
        Some(DeviceLockGuard {
            held: Arc::clone(&self.held),
            dev_eui: dev_eui.to_string(),
        })
    }

    /// True while a guard for `dev_eui` is alive.
    pub fn is_locked(&self, dev_eui: &str) -> bool {
        self.held.lock().contains(dev_eui)
    }

    /// Number of held locks.
    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    /// True when no device is locked.
    pub fn is_empty(&self) -> bool {
        self.held.lock().is_empty()
    }
}

/// Releases the device on drop.
#[must_use = "the device unlocks as soon as the guard is dropped"]
pub struct DeviceLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    dev_eui: String,
}

impl DeviceLockGuard {
    /// The locked transport identifier.
    pub fn dev_eui(&self) -> &str {
        &self.dev_eui
    }
}

impl Drop for DeviceLockGuard {
    fn drop(&mut self) {
        if self.held.lock().remove(&self.dev_eui) {
            ACTIVE_DEVICE_LOCKS.dec();
        }
    }
}
