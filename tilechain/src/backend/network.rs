//! Connectivity status consulted during chain walks.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether a data connection is currently available.
///
/// Backends that require the network are skipped while this returns false.
/// Detection itself (OS hooks, probes) is up to the implementation.
pub trait NetworkStatus: Send + Sync {
    /// Whether network-backed fetches may be attempted.
    fn is_available(&self) -> bool;
}

/// Network status held in an atomic flag and toggled explicitly.
#[derive(Debug)]
pub struct StaticNetworkStatus {
    available: AtomicBool,
}

impl StaticNetworkStatus {
    /// Creates a status with the given initial availability.
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    /// Creates an online status.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Creates an offline status.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Updates the availability flag.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

impl Default for StaticNetworkStatus {
    fn default() -> Self {
        Self::online()
    }
}

impl NetworkStatus for StaticNetworkStatus {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        let status = StaticNetworkStatus::offline();
        assert!(!status.is_available());
        status.set_available(true);
        assert!(status.is_available());
    }

    #[test]
    fn test_default_online() {
        assert!(StaticNetworkStatus::default().is_available());
    }
}
