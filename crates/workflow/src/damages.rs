//! Damage sub-ledger: the pre-existing-damage records embedded in a load.
//!
//! Every mutation is a whole-list read-modify-write guarded by the load's
//! version, so a concurrent editor surfaces as a retryable conflict
//! instead of silently losing their change. Removal is soft: the item is
//! hidden immediately and the persist is deferred for an undo window.

use crate::api::{DamagePatch, NewDamage};
use crate::error::{EngineError, Result};
use chrono::Utc;
use haulflow_core::{DamageId, DamageItem, LoadId, OwnerId};
use haulflow_storage::{LoadStore, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// How long a removed damage record can be restored before the deletion
/// is persisted.
pub const UNDO_WINDOW: Duration = Duration::from_secs(5);

/// Attempts to persist an elapsed removal past concurrent editors.
const PERSIST_ATTEMPTS: usize = 3;

struct PendingRemoval {
    load_id: LoadId,
    handle: tokio::task::JoinHandle<()>,
}

pub struct DamageLedger {
    loads: Arc<dyn LoadStore>,
    pending: Arc<Mutex<HashMap<DamageId, PendingRemoval>>>,
}

impl DamageLedger {
    pub fn new(loads: Arc<dyn LoadStore>) -> Self {
        Self {
            loads,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append a new damage record and persist the whole list.
    pub async fn add(&self, owner: OwnerId, load_id: LoadId, new: NewDamage) -> Result<DamageItem> {
        validate_required("sticker_number", &new.sticker_number)?;
        validate_required("item_description", &new.item_description)?;
        validate_required("damage_description", &new.damage_description)?;

        let mut load = self.loads.get_load(owner, load_id).await?;
        let item = DamageItem {
            id: DamageId::new(),
            sticker_number: new.sticker_number,
            item_description: new.item_description,
            damage_description: new.damage_description,
            photo_url: new.photo_url,
            documented_at: Utc::now(),
        };
        load.pre_existing_damages.push(item.clone());
        let expected = load.version;
        self.loads.put_load(owner, load, expected).await?;
        Ok(item)
    }

    /// Patch the mutable fields of one damage record and persist the list.
    pub async fn update(
        &self,
        owner: OwnerId,
        load_id: LoadId,
        damage_id: DamageId,
        patch: DamagePatch,
    ) -> Result<DamageItem> {
        if let Some(sticker) = &patch.sticker_number {
            validate_required("sticker_number", sticker)?;
        }
        if let Some(item) = &patch.item_description {
            validate_required("item_description", item)?;
        }
        if let Some(damage) = &patch.damage_description {
            validate_required("damage_description", damage)?;
        }

        let mut load = self.loads.get_load(owner, load_id).await?;
        let entry = load
            .pre_existing_damages
            .iter_mut()
            .find(|d| d.id == damage_id)
            .ok_or_else(|| {
                EngineError::Validation(format!("damage record {damage_id} not found"))
            })?;

        if let Some(sticker) = patch.sticker_number {
            entry.sticker_number = sticker;
        }
        if let Some(item) = patch.item_description {
            entry.item_description = item;
        }
        if let Some(damage) = patch.damage_description {
            entry.damage_description = damage;
        }
        if let Some(photo) = patch.photo_url {
            entry.photo_url = photo;
        }
        let updated = entry.clone();

        let expected = load.version;
        self.loads.put_load(owner, load, expected).await?;
        Ok(updated)
    }

    /// Soft-remove a damage record: hide it immediately and persist the
    /// deletion only after [`UNDO_WINDOW`] elapses without an undo.
    pub async fn remove(&self, owner: OwnerId, load_id: LoadId, damage_id: DamageId) -> Result<()> {
        let load = self.loads.get_load(owner, load_id).await?;
        if !load.pre_existing_damages.iter().any(|d| d.id == damage_id) {
            return Err(EngineError::Validation(format!(
                "damage record {damage_id} not found"
            )));
        }

        let mut pending = self.pending.lock();
        if pending.contains_key(&damage_id) {
            // Already hidden; the earlier window stands.
            return Ok(());
        }

        let loads = Arc::clone(&self.loads);
        let map = Arc::clone(&self.pending);
        // Anchor the window at the removal itself, not at the task's first
        // poll, so the deadline is fixed before this call returns.
        let window = tokio::time::sleep(UNDO_WINDOW);
        let handle = tokio::spawn(async move {
            window.await;
            // The pending entry is the commit token: if an undo raced us
            // and took it, nothing is persisted.
            if map.lock().remove(&damage_id).is_none() {
                return;
            }
            persist_removal(loads, owner, load_id, damage_id).await;
        });

        pending.insert(damage_id, PendingRemoval { load_id, handle });
        debug!(%load_id, %damage_id, "damage removal pending undo window");
        Ok(())
    }

    /// Cancel a pending removal inside the undo window. No write happens;
    /// the record simply becomes visible again.
    pub async fn undo_remove(
        &self,
        owner: OwnerId,
        load_id: LoadId,
        damage_id: DamageId,
    ) -> Result<()> {
        // Tenant scope check even though the undo itself writes nothing.
        self.loads.get_load(owner, load_id).await?;

        // Single guard: the entry must only leave the map once it is known
        // to belong to this load, or an elapsing window could fire into an
        // empty map while the entry sits outside it.
        let mut pending = self.pending.lock();
        match pending.get(&damage_id) {
            Some(entry) if entry.load_id == load_id => {
                if let Some(entry) = pending.remove(&damage_id) {
                    entry.handle.abort();
                }
                drop(pending);
                debug!(%load_id, %damage_id, "damage removal undone");
                Ok(())
            }
            Some(_) => Err(EngineError::Validation(format!(
                "damage record {damage_id} is not pending removal on this load"
            ))),
            None => Err(EngineError::Validation(format!(
                "damage record {damage_id} has no pending removal"
            ))),
        }
    }

    /// The damage list as a driver should see it: pending removals hidden.
    pub async fn visible(&self, owner: OwnerId, load_id: LoadId) -> Result<Vec<DamageItem>> {
        let load = self.loads.get_load(owner, load_id).await?;
        let pending = self.pending.lock();
        Ok(load
            .pre_existing_damages
            .into_iter()
            .filter(|d| !pending.contains_key(&d.id))
            .collect())
    }
}

fn validate_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Persist the filtered list once the undo window has elapsed. Retries
/// past concurrent editors; anything else is logged and dropped, since the
/// record stays in the stored list and can be removed again.
async fn persist_removal(
    loads: Arc<dyn LoadStore>,
    owner: OwnerId,
    load_id: LoadId,
    damage_id: DamageId,
) {
    for _ in 0..PERSIST_ATTEMPTS {
        let mut load = match loads.get_load(owner, load_id).await {
            Ok(load) => load,
            Err(err) => {
                error!(%load_id, %damage_id, %err, "could not read load to persist damage removal");
                return;
            }
        };
        load.pre_existing_damages.retain(|d| d.id != damage_id);
        let expected = load.version;
        match loads.put_load(owner, load, expected).await {
            Ok(_) => {
                debug!(%load_id, %damage_id, "damage removal persisted");
                return;
            }
            Err(StorageError::Conflict) => continue,
            Err(err) => {
                error!(%load_id, %damage_id, %err, "could not persist damage removal");
                return;
            }
        }
    }
    error!(%load_id, %damage_id, "gave up persisting damage removal after repeated conflicts");
}
