//! Field parameters.
//!
//! Named, unit-tagged values that derived fields read while generating
//! (`center`, `bulk_velocity`, `normal`, ...). Each container starts from its
//! own default objects; a parameter counts as default only while it is the
//! *same* object as the default, not merely an equal value.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::units::UnitArray;

#[derive(Debug, Clone)]
pub struct FieldParameters {
    values: IndexMap<String, Arc<UnitArray>>,
    defaults: IndexMap<String, Arc<UnitArray>>,
}

impl FieldParameters {
    /// Parameters initialized with the standard defaults.
    pub fn new() -> Self {
        let defaults: IndexMap<String, Arc<UnitArray>> = [
            ("center", UnitArray::new(vec![0.0; 3], "cm")),
            ("bulk_velocity", UnitArray::new(vec![0.0; 3], "cm/s")),
            ("normal", UnitArray::dimensionless(vec![0.0, 0.0, 1.0])),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), Arc::new(value)))
        .collect();
        Self {
            values: defaults.clone(),
            defaults,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<UnitArray>> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: UnitArray) {
        self.values.insert(name.into(), Arc::new(value));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// True while `name` still holds the default object.
    pub fn is_default(&self, name: &str) -> bool {
        match (self.defaults.get(name), self.values.get(name)) {
            (Some(default), Some(current)) => Arc::ptr_eq(default, current),
            _ => false,
        }
    }

    /// Restore every default object and drop overrides.
    pub fn reset(&mut self) {
        self.values = self.defaults.clone();
    }

    /// `incoming` overlaid with our own values; ours win on conflict.
    pub fn overlaid_on(&self, incoming: &FieldParameters) -> FieldParameters {
        let mut values = incoming.values.clone();
        for (name, value) in &self.values {
            values.insert(name.clone(), Arc::clone(value));
        }
        FieldParameters {
            values,
            defaults: self.defaults.clone(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl Default for FieldParameters {
    fn default() -> Self {
        Self::new()
    }
}
