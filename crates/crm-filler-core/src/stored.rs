//! As-loaded JSON for persistent records.
//!
//! Records are read leniently: `null` text becomes `""`, numeric ids become
//! strings, unrecognized decision powers become `Unknown`. Writing the typed
//! form back would rewrite every record on every save. Instead each loaded
//! record keeps the object it was read from, and on write a field takes its
//! typed value only when that value changed since load. Untouched records
//! come back exactly as they were stored.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{Collection, Record};

/// One record as stored, next to its typed form at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredForm {
    raw: Map<String, Value>,
    loaded: Map<String, Value>,
}

impl StoredForm {
    /// Capture `raw` as the stored form of `record`, which was read from it.
    pub fn capture<R: Record>(raw: Value, record: &R) -> serde_json::Result<Self> {
        let loaded = to_object(record)?;
        let raw = match raw {
            Value::Object(map) => map,
            _ => loaded.clone(),
        };
        Ok(Self { raw, loaded })
    }

    /// The stored object updated with whatever changed in `current`.
    ///
    /// Stored keys keep their position. Fields that gained a value are
    /// appended; extra fields that were removed are dropped.
    fn merge(&self, current: Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, raw) in &self.raw {
            match current.get(key) {
                Some(value) if self.loaded.get(key) == Some(value) => {
                    out.insert(key.clone(), raw.clone());
                }
                Some(value) => {
                    out.insert(key.clone(), value.clone());
                }
                None => {}
            }
        }
        for (key, value) in current {
            if !self.raw.contains_key(&key) && self.loaded.get(&key) != Some(&value) {
                out.insert(key, value);
            }
        }
        out
    }
}

/// Stored forms per collection, aligned by position with the loaded records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredForms {
    by_collection: HashMap<Collection, Vec<StoredForm>>,
}

impl StoredForms {
    pub fn insert(&mut self, collection: Collection, forms: Vec<StoredForm>) {
        if forms.is_empty() {
            self.by_collection.remove(&collection);
        } else {
            self.by_collection.insert(collection, forms);
        }
    }

    pub fn get(&self, collection: Collection) -> &[StoredForm] {
        self.by_collection
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Serialize `records` for storage. `forms[i]` is the stored form of
/// `records[i]`; records past the end of `forms` are new and written whole.
pub fn to_stored_array<R: Record>(
    records: &[R],
    forms: &[StoredForm],
) -> serde_json::Result<Value> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let current = to_object(record)?;
            Ok(Value::Object(match forms.get(i) {
                Some(form) => form.merge(current),
                None => current,
            }))
        })
        .collect::<serde_json::Result<Vec<_>>>()
        .map(Value::Array)
}

/// Stored forms for `records` from the array they were just written as.
pub fn capture_all<R: Record>(
    records: &[R],
    written: Vec<Value>,
) -> serde_json::Result<Vec<StoredForm>> {
    records
        .iter()
        .zip(written)
        .map(|(record, raw)| StoredForm::capture(raw, record))
        .collect()
}

fn to_object<T: Serialize>(record: &T) -> serde_json::Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(serde::ser::Error::custom("record did not serialize to an object")),
    }
}
