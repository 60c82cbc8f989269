//! Offline recipe cache.
//!
//! Recipes are cached for offline viewing only — nothing here touches
//! the mutation queue or the remote backend. Generated recipes get a
//! local id; recipes that already carry an id keep it.

use crate::error::SyncResult;
use larder_store::LocalStore;
use larder_types::{Collection, LocalId, OwnerId, Payload, Record, RecordId, RemoteId, SyncStatus};
use chrono::Utc;

/// Store-only cache of saved and generated recipes.
#[derive(Clone)]
pub struct RecipeCache {
    store: LocalStore,
}

impl RecipeCache {
    /// Creates a cache over the given store.
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Saves a recipe for offline viewing and returns the stored record.
    pub fn save(&self, owner: &OwnerId, recipe: Payload) -> SyncResult<Record> {
        let id = match recipe.get("id").and_then(|v| v.as_str()) {
            Some(existing) => RecordId::Remote(RemoteId::new(existing)),
            None => RecordId::Local(LocalId::new()),
        };

        let mut payload = recipe;
        payload.insert(
            "savedAt".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );

        let record = Record {
            id,
            owner: owner.clone(),
            payload,
            status: SyncStatus::Synced,
            added_at: Utc::now(),
        };
        self.store.put(Collection::Recipes, &record)?;
        Ok(record)
    }

    /// Fetches a recipe by id.
    pub fn get(&self, id: &RecordId) -> SyncResult<Option<Record>> {
        Ok(self.store.get(Collection::Recipes, id)?)
    }

    /// All cached recipes of one owner, newest first.
    pub fn for_owner(&self, owner: &OwnerId) -> SyncResult<Vec<Record>> {
        let mut recipes = self.store.get_by_owner(Collection::Recipes, owner)?;
        recipes.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(recipes)
    }

    /// Case-insensitive search over title, tags and ingredients.
    pub fn search(&self, owner: &OwnerId, query: &str) -> SyncResult<Vec<Record>> {
        let query = query.to_lowercase();
        let recipes = self.for_owner(owner)?;
        Ok(recipes
            .into_iter()
            .filter(|recipe| {
                let title = recipe
                    .payload
                    .get("title")
                    .and_then(|v| v.as_str())
                    .is_some_and(|t| t.to_lowercase().contains(&query));
                let tags = array_contains(&recipe.payload, "tags", &query);
                let ingredients = array_contains(&recipe.payload, "ingredients", &query);
                title || tags || ingredients
            })
            .collect())
    }

    /// Removes one recipe.
    pub fn delete(&self, id: &RecordId) -> SyncResult<()> {
        Ok(self.store.remove(Collection::Recipes, id)?)
    }

    /// Removes every recipe of one owner.
    pub fn clear_owner(&self, owner: &OwnerId) -> SyncResult<()> {
        for recipe in self.store.get_by_owner(Collection::Recipes, owner)? {
            self.store.remove(Collection::Recipes, &recipe.id)?;
        }
        Ok(())
    }

    /// Number of cached recipes for one owner.
    pub fn count(&self, owner: &OwnerId) -> SyncResult<usize> {
        Ok(self.store.get_by_owner(Collection::Recipes, owner)?.len())
    }
}

fn array_contains(payload: &Payload, key: &str, query: &str) -> bool {
    payload
        .get(key)
        .and_then(|v| v.as_array())
        .is_some_and(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .any(|s| s.to_lowercase().contains(query))
        })
}
