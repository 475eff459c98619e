//! Store contracts for load and trip records.
//!
//! The production store is an external system; the engine only depends on
//! these traits. Every access is scoped by the caller's tenant in addition
//! to the record id, and every write is conditional on the version the
//! caller last read.

use crate::error::StorageResult;
use async_trait::async_trait;
use haulflow_core::{Load, LoadId, OwnerId, Trip, TripId};

/// Tenant-scoped access to load records.
#[async_trait]
pub trait LoadStore: Send + Sync {
    /// Fetch one load. `NotFound` when absent, `AccessDenied` when the row
    /// exists under another tenant.
    async fn get_load(&self, owner: OwnerId, load_id: LoadId) -> StorageResult<Load>;

    /// Conditional write. Fails with `Conflict` unless the stored version
    /// equals `expected_version`; returns the row with its version bumped.
    async fn put_load(
        &self,
        owner: OwnerId,
        load: Load,
        expected_version: u64,
    ) -> StorageResult<Load>;

    /// All loads linked to the given trip, for the sequencer and the
    /// co-load heuristic.
    async fn loads_for_trip(&self, owner: OwnerId, trip_id: TripId) -> StorageResult<Vec<Load>>;
}

/// Tenant-scoped access to trip records.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn get_trip(&self, owner: OwnerId, trip_id: TripId) -> StorageResult<Trip>;

    /// Conditional write with the same version semantics as `put_load`.
    async fn put_trip(
        &self,
        owner: OwnerId,
        trip: Trip,
        expected_version: u64,
    ) -> StorageResult<Trip>;
}
