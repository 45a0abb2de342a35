//! Field-data store.
//!
//! Maps canonical field keys to unit-tagged arrays. Arrays are shared behind
//! `Arc` so a cached field is handed out as the same instance on every read
//! until it is explicitly replaced.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::types::FieldKey;
use crate::units::UnitArray;

/// Resolved field values of a container.
#[derive(Debug, Clone, Default)]
pub struct FieldData {
    fields: IndexMap<FieldKey, Arc<UnitArray>>,
}

impl FieldData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FieldKey) -> Option<&Arc<UnitArray>> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.fields.contains_key(key)
    }

    /// Store an array, replacing any previous value.
    pub fn insert(&mut self, key: FieldKey, array: UnitArray) -> Arc<UnitArray> {
        let shared = Arc::new(array);
        self.fields.insert(key, Arc::clone(&shared));
        shared
    }

    /// Store an already shared array.
    pub fn insert_shared(&mut self, key: FieldKey, array: Arc<UnitArray>) {
        self.fields.insert(key, array);
    }

    pub fn remove(&mut self, key: &FieldKey) -> Option<Arc<UnitArray>> {
        self.fields.shift_remove(key)
    }

    /// Keep only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&FieldKey) -> bool) {
        self.fields.retain(|key, _| keep(key));
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Arc<UnitArray>)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Length of any cached array in `category`.
    ///
    /// Fields of one particle category are co-indexed, so any of them gives
    /// the particle count of the selection.
    pub fn category_len(&self, category: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|(key, _)| key.category == category)
            .map(|(_, array)| array.len())
    }
}

impl FromIterator<(FieldKey, UnitArray)> for FieldData {
    fn from_iter<I: IntoIterator<Item = (FieldKey, UnitArray)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, array)| (key, Arc::new(array)))
                .collect(),
        }
    }
}
