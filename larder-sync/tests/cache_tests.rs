use larder_store::LocalStore;
use larder_sync::{MealPlanCache, RecipeCache};
use larder_types::{OwnerId, Payload, RecordId, RemoteId};

fn owner() -> OwnerId {
    OwnerId::new("u1")
}

fn recipe(title: &str, tags: &[&str], ingredients: &[&str]) -> Payload {
    let mut map = Payload::new();
    map.insert("title".to_string(), serde_json::json!(title));
    map.insert("tags".to_string(), serde_json::json!(tags));
    map.insert("ingredients".to_string(), serde_json::json!(ingredients));
    map
}

fn plan(week: &str) -> Payload {
    let mut map = Payload::new();
    map.insert("week".to_string(), serde_json::json!(week));
    map
}

// ── RecipeCache ──────────────────────────────────────────────────

#[test]
fn saved_recipe_is_retrievable() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    let saved = cache
        .save(&owner(), recipe("Omelette", &["breakfast"], &["eggs"]))
        .unwrap();

    let fetched = cache.get(&saved.id).unwrap().unwrap();
    assert_eq!(fetched.payload["title"], "Omelette");
    assert!(fetched.payload.contains_key("savedAt"));
}

#[test]
fn recipe_with_existing_id_keeps_it() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    let mut payload = recipe("Omelette", &[], &[]);
    payload.insert("id".to_string(), serde_json::json!("srv-42"));

    let saved = cache.save(&owner(), payload).unwrap();
    assert_eq!(saved.id, RecordId::Remote(RemoteId::new("srv-42")));
}

#[test]
fn generated_recipe_gets_a_local_id() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    let saved = cache.save(&owner(), recipe("Omelette", &[], &[])).unwrap();
    assert!(saved.id.is_local());
}

#[test]
fn for_owner_sorts_newest_first() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    cache.save(&owner(), recipe("First", &[], &[])).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    cache.save(&owner(), recipe("Second", &[], &[])).unwrap();

    let recipes = cache.for_owner(&owner()).unwrap();
    assert_eq!(recipes[0].payload["title"], "Second");
    assert_eq!(recipes[1].payload["title"], "First");
}

#[test]
fn search_matches_title_tags_and_ingredients() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    cache
        .save(&owner(), recipe("Omelette", &["breakfast"], &["eggs", "butter"]))
        .unwrap();
    cache
        .save(&owner(), recipe("Pasta", &["dinner"], &["flour", "eggs"]))
        .unwrap();
    cache
        .save(&owner(), recipe("Salad", &["light"], &["lettuce"]))
        .unwrap();

    assert_eq!(cache.search(&owner(), "omelette").unwrap().len(), 1);
    assert_eq!(cache.search(&owner(), "BREAKFAST").unwrap().len(), 1);
    assert_eq!(cache.search(&owner(), "eggs").unwrap().len(), 2);
    assert!(cache.search(&owner(), "sushi").unwrap().is_empty());
}

#[test]
fn recipes_are_scoped_by_owner() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    cache.save(&owner(), recipe("Mine", &[], &[])).unwrap();
    cache
        .save(&OwnerId::new("u2"), recipe("Theirs", &[], &[]))
        .unwrap();

    assert_eq!(cache.count(&owner()).unwrap(), 1);
    assert_eq!(cache.for_owner(&owner()).unwrap()[0].payload["title"], "Mine");
}

#[test]
fn clear_owner_removes_only_that_owner() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    cache.save(&owner(), recipe("Mine", &[], &[])).unwrap();
    cache
        .save(&OwnerId::new("u2"), recipe("Theirs", &[], &[]))
        .unwrap();

    cache.clear_owner(&owner()).unwrap();
    assert_eq!(cache.count(&owner()).unwrap(), 0);
    assert_eq!(cache.count(&OwnerId::new("u2")).unwrap(), 1);
}

#[test]
fn delete_removes_one_recipe() {
    let cache = RecipeCache::new(LocalStore::open_in_memory().unwrap());
    let saved = cache.save(&owner(), recipe("Omelette", &[], &[])).unwrap();
    cache.delete(&saved.id).unwrap();
    assert!(cache.get(&saved.id).unwrap().is_none());
}

// ── MealPlanCache ────────────────────────────────────────────────

#[test]
fn latest_returns_most_recent_plan() {
    let cache = MealPlanCache::new(LocalStore::open_in_memory().unwrap());
    assert!(cache.latest(&owner()).unwrap().is_none());

    cache.save(&owner(), plan("week-1")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    cache.save(&owner(), plan("week-2")).unwrap();

    let latest = cache.latest(&owner()).unwrap().unwrap();
    assert_eq!(latest.payload["week"], "week-2");
}

#[test]
fn all_returns_plans_newest_first() {
    let cache = MealPlanCache::new(LocalStore::open_in_memory().unwrap());
    cache.save(&owner(), plan("week-1")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    cache.save(&owner(), plan("week-2")).unwrap();

    let plans = cache.all(&owner()).unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].payload["week"], "week-2");
}

#[test]
fn plans_are_stamped_with_saved_at() {
    let cache = MealPlanCache::new(LocalStore::open_in_memory().unwrap());
    let saved = cache.save(&owner(), plan("week-1")).unwrap();
    assert!(saved.payload.contains_key("savedAt"));
}

#[test]
fn delete_and_clear_remove_plans() {
    let cache = MealPlanCache::new(LocalStore::open_in_memory().unwrap());
    let saved = cache.save(&owner(), plan("week-1")).unwrap();
    cache.save(&owner(), plan("week-2")).unwrap();

    cache.delete(&saved.id).unwrap();
    assert_eq!(cache.all(&owner()).unwrap().len(), 1);

    cache.clear_owner(&owner()).unwrap();
    assert!(cache.all(&owner()).unwrap().is_empty());
}
