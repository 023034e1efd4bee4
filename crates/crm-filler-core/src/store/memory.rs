//! In-memory [`RecordStore`] implementation for tests and embedding.
//!
//! Collections are held as raw JSON roots behind `std::sync::RwLock`, so a
//! store seeded with a legacy object-keyed collection goes through the same
//! normalization path as a file on disk.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::Collection;

use super::RecordStore;

/// In-memory store. Collections never written read as absent.
pub struct InMemoryStore {
    collections: RwLock<HashMap<Collection, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a collection with a raw JSON root.
    pub fn with_collection(self, collection: Collection, root: Value) -> Self {
        if let Ok(mut map) = self.collections.write() {
            map.insert(collection, root);
        }
        self
    }

    /// Raw JSON root currently held for `collection`.
    pub fn raw(&self, collection: Collection) -> Option<Value> {
        self.collections
            .read()
            .ok()
            .and_then(|map| map.get(&collection).cloned())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn read_collection(&self, collection: Collection) -> Result<Option<Value>> {
        let map = self
            .collections
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(map.get(&collection).cloned())
    }

    async fn write_collections(&self, batch: &[(Collection, Value)]) -> Result<()> {
        let mut map = self
            .collections
            .write()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        for (collection, root) in batch {
            map.insert(*collection, root.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, CrmSnapshot};
    use crate::reconcile::reconcile;
    use crate::store::{load_records, load_snapshot, save_snapshot};
    use serde_json::json;

    fn legacy_store() -> InMemoryStore {
        InMemoryStore::new()
            .with_collection(
                Collection::Companies,
                json!({"CO-2001": {"name": "Mercury Consultants", "industry": "Consulting"}}),
            )
            .with_collection(
                Collection::Meetings,
                json!([{"meeting_id": "M-2001", "company_name": "Mercury Consultants",
                        "content": "intro call"}]),
            )
    }

    #[tokio::test]
    async fn test_missing_collections_load_empty() {
        let store = InMemoryStore::new();
        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot, CrmSnapshot::default());
    }

    #[tokio::test]
    async fn test_legacy_mapping_loads_typed() {
        let store = legacy_store();
        let companies: Vec<Company> = load_records(&store).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].company_id, "CO-2001");
        assert_eq!(companies[0].industry, "Consulting");
    }

    #[tokio::test]
    async fn test_save_unchanged_then_reload_is_identical() {
        let store = legacy_store();
        let mut first = load_snapshot(&store).await.unwrap();
        save_snapshot(&store, &mut first).await.unwrap();
        let second = load_snapshot(&store).await.unwrap();
        assert_eq!(first, second);

        // Legacy form converged to an array on save, with no fields added.
        assert_eq!(
            store.raw(Collection::Companies).unwrap(),
            json!([{"name": "Mercury Consultants", "industry": "Consulting",
                    "company_id": "CO-2001"}])
        );
    }

    #[tokio::test]
    async fn test_untouched_records_saved_as_stored() {
        let contacts = json!([
            {"contact_id": "C-2001", "name": "Ravi", "decision_power": "High",
             "company_id": 2001, "email": null},
            {"contact_id": "C-2002", "name": "Liu Wei", "email": "liu@venus.example"}
        ]);
        let store = InMemoryStore::new().with_collection(Collection::Contacts, contacts.clone());

        let mut snapshot = load_snapshot(&store).await.unwrap();
        save_snapshot(&store, &mut snapshot).await.unwrap();
        assert_eq!(store.raw(Collection::Contacts).unwrap(), contacts);
        assert_eq!(serde_json::to_value(&snapshot).unwrap()["contacts"], contacts);

        // Updating one contact leaves the other byte-for-byte alone.
        let mut snapshot = load_snapshot(&store).await.unwrap();
        let extraction = serde_json::from_value(json!({
            "contacts": [{"temp_id": "c1", "existing_id": "C-2002", "name": "Liu Wei",
                          "email": "liu.wei@venus.example", "decision_power": "yes"}],
            "actions": []
        }))
        .unwrap();
        reconcile(&extraction, &mut snapshot);
        save_snapshot(&store, &mut snapshot).await.unwrap();

        let saved = store.raw(Collection::Contacts).unwrap();
        assert_eq!(saved[0], contacts[0]);
        assert_eq!(
            saved[1],
            json!({"contact_id": "C-2002", "name": "Liu Wei",
                   "email": "liu.wei@venus.example", "decision_power": "yes"})
        );
    }

    #[tokio::test]
    async fn test_meetings_are_never_written() {
        let store = legacy_store();
        let mut snapshot = load_snapshot(&store).await.unwrap();
        snapshot.meetings.clear();
        save_snapshot(&store, &mut snapshot).await.unwrap();
        assert_eq!(load_snapshot(&store).await.unwrap().meetings.len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_and_persist() {
        let store = legacy_store();
        let mut snapshot = load_snapshot(&store).await.unwrap();
        let extraction = serde_json::from_value(json!({
            "companies": [{"temp_id": "co1", "name": "Venus Logistics"}],
            "actions": [{"entity": "company", "operation": "create", "target_temp_id": "co1"}]
        }))
        .unwrap();
        let result = reconcile(&extraction, &mut snapshot);
        save_snapshot(&store, &mut snapshot).await.unwrap();

        assert_eq!(result.mapping.get("co1"), Some("CO-2002"));
        let reloaded: Vec<Company> = load_records(&store).await.unwrap();
        assert_eq!(reloaded[1].name, "Venus Logistics");
    }
}
