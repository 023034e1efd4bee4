//! Storage abstraction for CRM Filler.
//!
//! A [`RecordStore`] only moves raw JSON roots in and out of named
//! collections. Everything else happens here, once, at load time:
//! legacy object-keyed collections are normalized to arrays and the
//! records are read into their typed form, keeping the stored JSON of each
//! so a save rewrites only what changed.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Collection, Company, Contact, CrmSnapshot, Deal, Meeting, Record};
use crate::stored::{StoredForm, StoredForms};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`read_collection`](RecordStore::read_collection) | Raw JSON root of one collection, `None` if absent |
/// | [`write_collections`](RecordStore::write_collections) | Replace several collections together |
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the stored JSON root of a collection.
    async fn read_collection(&self, collection: Collection) -> Result<Option<Value>>;

    /// Replace the given collections. Either every collection in `batch`
    /// is written or none is.
    async fn write_collections(&self, batch: &[(Collection, Value)]) -> Result<()>;
}

/// Normalize a stored collection root into an ordered list of record objects.
///
/// An array is kept as-is. A legacy object keyed by identifier becomes an
/// array in key order, with `id_field` filled from the key when a record
/// lacks it; non-object entries are dropped. Any other root is empty.
pub fn normalize_records(root: Value, id_field: &str) -> Vec<Value> {
    match root {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Object(mut record) => {
                    record
                        .entry(id_field.to_string())
                        .or_insert(Value::String(key));
                    Some(Value::Object(record))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Load one collection as normalized JSON records.
pub async fn load_collection(store: &dyn RecordStore, collection: Collection) -> Result<Vec<Value>> {
    Ok(store
        .read_collection(collection)
        .await?
        .map(|root| normalize_records(root, collection.id_field()))
        .unwrap_or_default())
}

/// Load one collection as typed records.
pub async fn load_records<R: Record>(store: &dyn RecordStore) -> Result<Vec<R>> {
    Ok(load_with_forms(store).await?.0)
}

/// Typed records plus the stored form each was read from.
async fn load_with_forms<R: Record>(
    store: &dyn RecordStore,
) -> Result<(Vec<R>, Vec<StoredForm>)> {
    let collection = R::COLLECTION;
    let values = load_collection(store, collection).await?;
    let mut records = Vec::with_capacity(values.len());
    let mut forms = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        let record: R = serde_json::from_value(value.clone())
            .with_context(|| format!("invalid record #{} in {}", i, collection))?;
        forms.push(StoredForm::capture(value, &record)?);
        records.push(record);
    }
    Ok((records, forms))
}

/// Load all four collections.
pub async fn load_snapshot(store: &dyn RecordStore) -> Result<CrmSnapshot> {
    let mut stored = StoredForms::default();
    let (companies, forms) = load_with_forms::<Company>(store).await?;
    stored.insert(Collection::Companies, forms);
    let (contacts, forms) = load_with_forms::<Contact>(store).await?;
    stored.insert(Collection::Contacts, forms);
    let (deals, forms) = load_with_forms::<Deal>(store).await?;
    stored.insert(Collection::Deals, forms);
    let (meetings, forms) = load_with_forms::<Meeting>(store).await?;
    stored.insert(Collection::Meetings, forms);

    Ok(CrmSnapshot {
        companies,
        contacts,
        deals,
        meetings,
        stored,
    })
}

/// Persist the collections reconciliation can change. Meetings are never written.
///
/// Records keep their stored form except for fields changed since load.
/// Once written, the snapshot's stored forms are what is now in the store.
pub async fn save_snapshot(store: &dyn RecordStore, snapshot: &mut CrmSnapshot) -> Result<()> {
    let mut batch = Vec::with_capacity(3);
    for collection in [Collection::Companies, Collection::Contacts, Collection::Deals] {
        let root = snapshot
            .to_stored(collection)
            .with_context(|| format!("serializing {}", collection))?;
        batch.push((collection, root));
    }
    store.write_collections(&batch).await?;

    for (collection, root) in batch {
        snapshot
            .mark_stored(collection, root)
            .with_context(|| format!("recording stored {}", collection))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_array_untouched() {
        let root = json!([{"company_id": "CO-2002"}, {"company_id": "CO-2001"}]);
        assert_eq!(
            normalize_records(root, "company_id"),
            vec![json!({"company_id": "CO-2002"}), json!({"company_id": "CO-2001"})]
        );
    }

    #[test]
    fn test_normalize_legacy_mapping() {
        let root = json!({
            "C-2001": {"name": "Ravi"},
            "C-2002": {"contact_id": "C-2002", "name": "Liu Wei"},
            "C-2003": "not a record"
        });
        assert_eq!(
            normalize_records(root, "contact_id"),
            vec![
                json!({"contact_id": "C-2001", "name": "Ravi"}),
                json!({"contact_id": "C-2002", "name": "Liu Wei"}),
            ]
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_id_over_key() {
        let root = json!({"legacy-key": {"deal_id": "D-2009"}});
        assert_eq!(
            normalize_records(root, "deal_id"),
            vec![json!({"deal_id": "D-2009"})]
        );
    }

    #[test]
    fn test_normalize_scalar_root_is_empty() {
        assert!(normalize_records(json!("oops"), "deal_id").is_empty());
        assert!(normalize_records(Value::Null, "deal_id").is_empty());
    }
}
