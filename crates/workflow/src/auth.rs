//! Caller identity resolution.
//!
//! Authentication itself is an external concern; operations receive an
//! [`AuthContext`] and resolve it to a driver profile before touching any
//! record.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use haulflow_core::{DriverId, OwnerId, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Identity attached to an incoming operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthContext {
    pub user_id: Option<UserId>,
}

impl AuthContext {
    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Driver record a user identity resolves to. Carries the tenant scope
/// every store access is filtered by.
#[derive(Debug, Clone, Copy)]
pub struct DriverProfile {
    pub driver_id: DriverId,
    pub owner_id: OwnerId,
}

/// Lookup from authenticated user to driver profile.
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn resolve(&self, user_id: UserId) -> Result<Option<DriverProfile>>;
}

/// Map-backed resolver for tests and embedding callers.
#[derive(Default)]
pub struct StaticProfiles {
    profiles: RwLock<HashMap<UserId, DriverProfile>>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: UserId, profile: DriverProfile) {
        self.profiles.write().insert(user_id, profile);
    }

    /// Register a fresh user/driver pair under the given tenant.
    pub fn register(&self, owner_id: OwnerId) -> (UserId, DriverProfile) {
        let user_id = UserId::new();
        let profile = DriverProfile {
            driver_id: DriverId::new(),
            owner_id,
        };
        self.insert(user_id, profile);
        (user_id, profile)
    }
}

#[async_trait]
impl ProfileResolver for StaticProfiles {
    async fn resolve(&self, user_id: UserId) -> Result<Option<DriverProfile>> {
        Ok(self.profiles.read().get(&user_id).copied())
    }
}

/// Resolve the caller or fail with the matching taxonomy error.
pub async fn require_profile(
    resolver: &dyn ProfileResolver,
    ctx: &AuthContext,
) -> Result<DriverProfile> {
    let user_id = ctx.user_id.ok_or(EngineError::NotAuthenticated)?;
    resolver
        .resolve(user_id)
        .await?
        .ok_or(EngineError::ProfileNotFound)
}
