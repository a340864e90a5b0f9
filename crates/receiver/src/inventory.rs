//! Inventory registry seams.
//!
//! The registry maps names to numeric ids asynchronously: asking for an
//! unknown endpoint queues a registration and answers "no id yet". Callers
//! find out by asking again later.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use brx_metadata::InventoryConfig;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectPoint {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInventory {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstanceInventory {
    pub id: u32,
    pub service_id: u32,
    pub name: String,
}

/// Lookups of already-registered services and instances
pub trait InventoryCache: Send + Sync {
    fn service(&self, id: u32) -> Option<ServiceInventory>;
    fn instance(&self, id: u32) -> Option<ServiceInstanceInventory>;
}

/// Registration and liveness side of the registry
pub trait InventoryRegister: Send + Sync {
    /// Existing endpoint id, or `None` while registration is pending
    fn get_or_create_endpoint(
        &self,
        service_id: u32,
        name: &str,
        detect_point: DetectPoint,
    ) -> Option<u32>;

    fn service_heartbeat(&self, service_id: u32, time: i64);

    fn instance_heartbeat(&self, instance_id: u32, time: i64);
}

type EndpointKey = (u32, String, DetectPoint);

/// Process-local registry. Endpoint registration completes on
/// [`InMemoryInventory::apply_pending`], mimicking a remote registry that
/// assigns ids some time after the first request.
pub struct InMemoryInventory {
    services: DashMap<u32, ServiceInventory>,
    instances: DashMap<u32, ServiceInstanceInventory>,
    endpoints: DashMap<EndpointKey, u32>,
    pending: Mutex<Vec<EndpointKey>>,
    next_endpoint_id: AtomicU32,
    service_heartbeats: DashMap<u32, i64>,
    instance_heartbeats: DashMap<u32, i64>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            instances: DashMap::new(),
            endpoints: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            next_endpoint_id: AtomicU32::new(1),
            service_heartbeats: DashMap::new(),
            instance_heartbeats: DashMap::new(),
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        let inventory = Self::new();
        for s in &config.services {
            inventory.add_service(s.id, &s.name);
        }
        for i in &config.instances {
            inventory.add_instance(i.id, i.service_id, &i.name);
        }
        inventory
    }

    pub fn add_service(&self, id: u32, name: &str) {
        self.services.insert(
            id,
            ServiceInventory {
                id,
                name: name.to_string(),
            },
        );
    }

    pub fn add_instance(&self, id: u32, service_id: u32, name: &str) {
        self.instances.insert(
            id,
            ServiceInstanceInventory {
                id,
                service_id,
                name: name.to_string(),
            },
        );
    }

    pub fn remove_service(&self, id: u32) {
        self.services.remove(&id);
    }

    /// Register an endpoint with a chosen id right away
    pub fn register_endpoint(&self, service_id: u32, name: &str, id: u32) {
        self.endpoints
            .insert((service_id, name.to_string(), DetectPoint::Server), id);
        self.next_endpoint_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }

    /// Assign ids to every queued endpoint registration. Returns how many.
    pub fn apply_pending(&self) -> usize {
        let queued = std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()));
        let mut assigned = 0;
        for key in queued {
            if self.endpoints.contains_key(&key) {
                continue;
            }
            let id = self.next_endpoint_id.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(service_id = key.0, endpoint = %key.1, id, "Registered endpoint");
            self.endpoints.insert(key, id);
            assigned += 1;
        }
        assigned
    }

    pub fn pending_registrations(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn last_service_heartbeat(&self, service_id: u32) -> Option<i64> {
        self.service_heartbeats.get(&service_id).map(|t| *t)
    }

    pub fn last_instance_heartbeat(&self, instance_id: u32) -> Option<i64> {
        self.instance_heartbeats.get(&instance_id).map(|t| *t)
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryCache for InMemoryInventory {
    fn service(&self, id: u32) -> Option<ServiceInventory> {
        self.services.get(&id).map(|s| s.clone())
    }

    fn instance(&self, id: u32) -> Option<ServiceInstanceInventory> {
        self.instances.get(&id).map(|i| i.clone())
    }
}

impl InventoryRegister for InMemoryInventory {
    fn get_or_create_endpoint(
        &self,
        service_id: u32,
        name: &str,
        detect_point: DetectPoint,
    ) -> Option<u32> {
        let key = (service_id, name.to_string(), detect_point);
        if let Some(id) = self.endpoints.get(&key) {
            return Some(*id);
        }
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.contains(&key) {
            pending.push(key);
        }
        None
    }

    fn service_heartbeat(&self, service_id: u32, time: i64) {
        self.service_heartbeats
            .entry(service_id)
            .and_modify(|t| *t = (*t).max(time))
            .or_insert(time);
    }

    fn instance_heartbeat(&self, instance_id: u32, time: i64) {
        self.instance_heartbeats
            .entry(instance_id)
            .and_modify(|t| *t = (*t).max(time))
            .or_insert(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brx_metadata::{InstanceSeed, ServiceSeed};

    #[test]
    fn test_unknown_endpoint_queues_registration() {
        let inventory = InMemoryInventory::new();
        assert_eq!(
            inventory.get_or_create_endpoint(7, "/checkout", DetectPoint::Server),
            None
        );
        // Asking twice does not queue twice
        inventory.get_or_create_endpoint(7, "/checkout", DetectPoint::Server);
        assert_eq!(inventory.pending_registrations(), 1);

        assert_eq!(inventory.apply_pending(), 1);
        let id = inventory
            .get_or_create_endpoint(7, "/checkout", DetectPoint::Server)
            .unwrap();
        assert_eq!(
            inventory.get_or_create_endpoint(7, "/checkout", DetectPoint::Server),
            Some(id)
        );
    }

    #[test]
    fn test_endpoints_scoped_by_service() {
        let inventory = InMemoryInventory::new();
        inventory.register_endpoint(7, "/home", 42);
        assert_eq!(
            inventory.get_or_create_endpoint(7, "/home", DetectPoint::Server),
            Some(42)
        );
        assert_eq!(
            inventory.get_or_create_endpoint(8, "/home", DetectPoint::Server),
            None
        );
    }

    #[test]
    fn test_auto_ids_skip_explicit_ones() {
        let inventory = InMemoryInventory::new();
        inventory.register_endpoint(1, "/a", 10);
        inventory.get_or_create_endpoint(1, "/b", DetectPoint::Server);
        inventory.apply_pending();
        assert_eq!(
            inventory.get_or_create_endpoint(1, "/b", DetectPoint::Server),
            Some(11)
        );
    }

    #[test]
    fn test_register_highest_endpoint_id() {
        let inventory = InMemoryInventory::new();
        inventory.register_endpoint(1, "/max", u32::MAX);
        assert_eq!(
            inventory.get_or_create_endpoint(1, "/max", DetectPoint::Server),
            Some(u32::MAX)
        );
    }

    #[test]
    fn test_from_config() {
        let inventory = InMemoryInventory::from_config(&InventoryConfig {
            services: vec![ServiceSeed {
                id: 7,
                name: "shop".to_string(),
            }],
            instances: vec![InstanceSeed {
                id: 70,
                service_id: 7,
                name: "v1".to_string(),
            }],
        });
        assert_eq!(inventory.service(7).unwrap().name, "shop");
        assert_eq!(inventory.instance(70).unwrap().service_id, 7);
        assert!(inventory.service(8).is_none());
    }

    #[test]
    fn test_heartbeat_keeps_latest() {
        let inventory = InMemoryInventory::new();
        inventory.service_heartbeat(7, 200);
        inventory.service_heartbeat(7, 100);
        inventory.instance_heartbeat(70, 50);
        assert_eq!(inventory.last_service_heartbeat(7), Some(200));
        assert_eq!(inventory.last_instance_heartbeat(70), Some(50));
        assert_eq!(inventory.last_instance_heartbeat(71), None);
    }
}
