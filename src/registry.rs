//! Device registry
//!
//! Shares one transport session per device endpoint. Each entry is wrapped
//! in a `tokio::sync::Mutex` so the one-in-flight-operation-per-device rule
//! holds even when many tasks poll concurrently; distinct devices never
//! contend with each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::transport::Transport;

/// Network identity of one device endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub host: String,
    pub port: u16,
}

impl DeviceId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Map from device endpoints to shared transport sessions
///
/// The outer lock only guards the map itself and is never held across an
/// await; callers lock the returned per-device mutex for the duration of
/// their transport operations.
pub struct DeviceRegistry<T: Transport> {
    devices: Mutex<HashMap<DeviceId, Arc<tokio::sync::Mutex<T>>>>,
}

impl<T: Transport> DeviceRegistry<T> {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the session for `id`, creating it with `make` on first use.
    pub fn get_or_insert_with<F>(&self, id: &DeviceId, make: F) -> Arc<tokio::sync::Mutex<T>>
    where
        F: FnOnce() -> T,
    {
        let mut devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
        devices
            .entry(id.clone())
            .or_insert_with(|| {
                debug!("Registering device {}", id);
                Arc::new(tokio::sync::Mutex::new(make()))
            })
            .clone()
    }

    /// Fetch the session for `id` if one exists.
    pub fn get(&self, id: &DeviceId) -> Option<Arc<tokio::sync::Mutex<T>>> {
        let devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
        devices.get(id).cloned()
    }

    /// Drop the session for `id`; in-flight users keep their `Arc` alive.
    pub fn remove(&self, id: &DeviceId) -> Option<Arc<tokio::sync::Mutex<T>>> {
        let mut devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
        let removed = devices.remove(id);
        if removed.is_some() {
            debug!("Removed device {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        let devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
        devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Transport> Default for DeviceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn read_registers(
            &mut self,
            _address: u32,
            count: u16,
        ) -> Result<Vec<u16>, TransportError> {
            Ok(vec![0; count as usize])
        }

        async fn write_registers(
            &mut self,
            _address: u32,
            _values: Vec<u16>,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn read_coils(
            &mut self,
            _address: u32,
            count: u16,
        ) -> Result<Vec<bool>, TransportError> {
            Ok(vec![false; count as usize])
        }

        async fn write_coils(
            &mut self,
            _address: u32,
            _values: Vec<bool>,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_device_id_display() {
        let id = DeviceId::new("10.0.0.5", 502);
        assert_eq!(id.to_string(), "10.0.0.5:502");
    }

    #[tokio::test]
    async fn test_session_reuse() {
        let registry = DeviceRegistry::new();
        let id = DeviceId::new("10.0.0.5", 502);

        let first = registry.get_or_insert_with(&id, || NullTransport);
        let second = registry.get_or_insert_with(&id, || NullTransport);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_devices_get_distinct_sessions() {
        let registry = DeviceRegistry::new();
        let a = registry.get_or_insert_with(&DeviceId::new("10.0.0.5", 502), || NullTransport);
        let b = registry.get_or_insert_with(&DeviceId::new("10.0.0.6", 502), || NullTransport);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_keeps_inflight_session_alive() {
        let registry = DeviceRegistry::new();
        let id = DeviceId::new("10.0.0.5", 502);
        let session = registry.get_or_insert_with(&id, || NullTransport);

        let guard = session.lock().await;
        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        // The borrowed session is still usable after removal
        drop(guard);
        let mut t = session.lock().await;
        assert!(t.read_registers(0, 1).await.is_ok());
    }
}
