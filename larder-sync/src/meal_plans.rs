//! Offline meal-plan cache. Store-only, like the recipe cache.

use crate::error::SyncResult;
use larder_store::LocalStore;
use larder_types::{Collection, LocalId, OwnerId, Payload, Record, RecordId, SyncStatus};
use chrono::Utc;

/// Store-only cache of generated meal plans.
#[derive(Clone)]
pub struct MealPlanCache {
    store: LocalStore,
}

impl MealPlanCache {
    /// Creates a cache over the given store.
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Saves a generated plan and returns the stored record.
    pub fn save(&self, owner: &OwnerId, plan: Payload) -> SyncResult<Record> {
        let mut payload = plan;
        payload.insert(
            "savedAt".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );

        let record = Record {
            id: RecordId::Local(LocalId::new()),
            owner: owner.clone(),
            payload,
            status: SyncStatus::Synced,
            added_at: Utc::now(),
        };
        self.store.put(Collection::MealPlans, &record)?;
        Ok(record)
    }

    /// The most recently saved plan, if any.
    pub fn latest(&self, owner: &OwnerId) -> SyncResult<Option<Record>> {
        Ok(self.all(owner)?.into_iter().next())
    }

    /// All cached plans of one owner, newest first.
    pub fn all(&self, owner: &OwnerId) -> SyncResult<Vec<Record>> {
        let mut plans = self.store.get_by_owner(Collection::MealPlans, owner)?;
        plans.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(plans)
    }

    /// Removes one plan.
    pub fn delete(&self, id: &RecordId) -> SyncResult<()> {
        Ok(self.store.remove(Collection::MealPlans, id)?)
    }

    /// Removes every plan of one owner.
    pub fn clear_owner(&self, owner: &OwnerId) -> SyncResult<()> {
        for plan in self.store.get_by_owner(Collection::MealPlans, owner)? {
            self.store.remove(Collection::MealPlans, &plan.id)?;
        }
        Ok(())
    }
}
