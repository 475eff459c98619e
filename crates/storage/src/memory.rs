//! In-process store used by tests and embedding callers.

use crate::error::{StorageError, StorageResult};
use crate::store::{LoadStore, TripStore};
use async_trait::async_trait;
use haulflow_core::{Load, LoadId, OwnerId, Trip, TripId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Map-backed store with the same tenant-scope and version semantics as
/// the production store. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    loads: Arc<RwLock<HashMap<LoadId, Load>>>,
    trips: Arc<RwLock<HashMap<TripId, Trip>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a load directly, bypassing version checks. Test setup only.
    pub fn insert_load(&self, load: Load) {
        self.loads.write().insert(load.id, load);
    }

    /// Seed a trip directly, bypassing version checks. Test setup only.
    pub fn insert_trip(&self, trip: Trip) {
        self.trips.write().insert(trip.id, trip);
    }

    /// Make every read fail with an i/o error, for exercising the
    /// fail-open and fail-closed guard paths.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with an i/o error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LoadStore for MemoryStore {
    async fn get_load(&self, owner: OwnerId, load_id: LoadId) -> StorageResult<Load> {
        self.check_read()?;
        let loads = self.loads.read();
        let load = loads
            .get(&load_id)
            .ok_or_else(|| StorageError::NotFound(load_id.to_string()))?;
        if load.owner_id != owner {
            return Err(StorageError::AccessDenied);
        }
        Ok(load.clone())
    }

    async fn put_load(
        &self,
        owner: OwnerId,
        mut load: Load,
        expected_version: u64,
    ) -> StorageResult<Load> {
        self.check_write()?;
        let mut loads = self.loads.write();
        let stored = loads
            .get(&load.id)
            .ok_or_else(|| StorageError::NotFound(load.id.to_string()))?;
        if stored.owner_id != owner {
            return Err(StorageError::AccessDenied);
        }
        if stored.version != expected_version {
            tracing::debug!(load_id = %load.id, expected_version, actual = stored.version, "stale load write rejected");
            return Err(StorageError::Conflict);
        }
        load.version = expected_version + 1;
        loads.insert(load.id, load.clone());
        Ok(load)
    }

    async fn loads_for_trip(&self, owner: OwnerId, trip_id: TripId) -> StorageResult<Vec<Load>> {
        self.check_read()?;
        let loads = self.loads.read();
        Ok(loads
            .values()
            .filter(|l| l.owner_id == owner && l.trip_id == Some(trip_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TripStore for MemoryStore {
    async fn get_trip(&self, owner: OwnerId, trip_id: TripId) -> StorageResult<Trip> {
        self.check_read()?;
        let trips = self.trips.read();
        let trip = trips
            .get(&trip_id)
            .ok_or_else(|| StorageError::NotFound(trip_id.to_string()))?;
        if trip.owner_id != owner {
            return Err(StorageError::AccessDenied);
        }
        Ok(trip.clone())
    }

    async fn put_trip(
        &self,
        owner: OwnerId,
        mut trip: Trip,
        expected_version: u64,
    ) -> StorageResult<Trip> {
        self.check_write()?;
        let mut trips = self.trips.write();
        let stored = trips
            .get(&trip.id)
            .ok_or_else(|| StorageError::NotFound(trip.id.to_string()))?;
        if stored.owner_id != owner {
            return Err(StorageError::AccessDenied);
        }
        if stored.version != expected_version {
            tracing::debug!(trip_id = %trip.id, expected_version, actual = stored.version, "stale trip write rejected");
            return Err(StorageError::Conflict);
        }
        trip.version = expected_version + 1;
        trips.insert(trip.id, trip.clone());
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulflow_core::{DriverId, LoadSource, PostingType};

    #[tokio::test]
    async fn get_scopes_by_tenant() {
        let store = MemoryStore::new();
        let owner = OwnerId::new();
        let load = Load::new(owner, LoadSource::OwnCustomer, PostingType::Load);
        let id = load.id;
        store.insert_load(load);

        assert!(store.get_load(owner, id).await.is_ok());
        let err = store.get_load(OwnerId::new(), id).await.unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied));
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .get_load(OwnerId::new(), LoadId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn put_bumps_version_and_rejects_stale_writers() {
        let store = MemoryStore::new();
        let owner = OwnerId::new();
        let load = Load::new(owner, LoadSource::OwnCustomer, PostingType::Load);
        store.insert_load(load.clone());

        let stored = store.put_load(owner, load.clone(), 0).await.unwrap();
        assert_eq!(stored.version, 1);

        // A writer still holding version 0 loses.
        let err = store.put_load(owner, load, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn trip_version_cas() {
        let store = MemoryStore::new();
        let owner = OwnerId::new();
        let mut trip = Trip::new(owner, DriverId::new());
        store.insert_trip(trip.clone());

        trip.current_delivery_index = 2;
        let stored = store.put_trip(owner, trip.clone(), 0).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.current_delivery_index, 2);

        let err = store.put_trip(owner, trip, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn injected_faults_surface_as_io() {
        let store = MemoryStore::new();
        let owner = OwnerId::new();
        let load = Load::new(owner, LoadSource::OwnCustomer, PostingType::Load);
        let id = load.id;
        store.insert_load(load);

        store.set_fail_reads(true);
        let err = store.get_load(owner, id).await.unwrap_err();
        assert!(err.is_retryable());
        store.set_fail_reads(false);
        assert!(store.get_load(owner, id).await.is_ok());
    }
}
