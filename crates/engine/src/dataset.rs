//! Dataset: the field registry and the collaborators containers share.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::field_info::FieldInfo;
use crate::filter::ParticleFilter;
use crate::index::Index;
use crate::types::{FieldKey, FieldSpec, UNKNOWN_CATEGORY};
use crate::units::{UnitSystem, UnitTable};

/// A loaded dataset as the engine sees it.
///
/// Holds the field registry (raw and derived catalogs), the known fluid and
/// particle categories, particle filters, the storage [`Index`] and the unit
/// system. Containers keep an `Arc` to it; the dataset keeps no reference
/// back to its containers.
pub struct Dataset {
    name: String,
    fluid_types: IndexSet<String>,
    particle_types: IndexSet<String>,
    default_fluid_type: String,
    default_particle_type: String,
    field_info: IndexMap<FieldKey, Arc<FieldInfo>>,
    field_list: IndexSet<FieldKey>,
    derived_field_list: IndexSet<FieldKey>,
    filters: IndexMap<String, Arc<ParticleFilter>>,
    index: Arc<dyn Index>,
    units: Arc<dyn UnitSystem>,
    config: EngineConfig,
    field_dependencies: Mutex<IndexMap<FieldKey, Arc<Vec<FieldSpec>>>>,
    last_category: Mutex<Option<String>>,
}

impl Dataset {
    pub fn builder(name: impl Into<String>, index: Arc<dyn Index>) -> DatasetBuilder {
        DatasetBuilder::new(name, index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower and upper corners of the domain.
    pub fn domain_edges(&self) -> ([f64; 3], [f64; 3]) {
        self.index.domain_edges()
    }

    /// Midpoint of the domain.
    pub fn domain_center(&self) -> [f64; 3] {
        let (left, right) = self.domain_edges();
        [0, 1, 2].map(|axis| 0.5 * (left[axis] + right[axis]))
    }

    pub fn index(&self) -> &Arc<dyn Index> {
        &self.index
    }

    pub fn units(&self) -> &dyn UnitSystem {
        self.units.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_fluid_type(&self) -> &str {
        &self.default_fluid_type
    }

    pub fn default_particle_type(&self) -> &str {
        &self.default_particle_type
    }

    pub fn is_fluid_type(&self, category: &str) -> bool {
        self.fluid_types.contains(category)
    }

    pub fn is_particle_type(&self, category: &str) -> bool {
        self.particle_types.contains(category)
    }

    pub fn is_filtered_type(&self, category: &str) -> bool {
        self.filters.contains_key(category)
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<ParticleFilter>> {
        self.filters.get(name)
    }

    /// Fields held by storage.
    pub fn field_list(&self) -> &IndexSet<FieldKey> {
        &self.field_list
    }

    /// Fields computed from other fields.
    pub fn derived_field_list(&self) -> &IndexSet<FieldKey> {
        &self.derived_field_list
    }

    pub fn is_on_disk(&self, key: &FieldKey) -> bool {
        self.field_list.contains(key)
    }

    /// Whether `key` is in the raw or derived catalog.
    pub fn knows(&self, key: &FieldKey) -> bool {
        self.field_list.contains(key) || self.derived_field_list.contains(key)
    }

    /// Category of the most recently resolved field.
    pub fn last_category(&self) -> Option<String> {
        self.last_category.lock().clone()
    }

    /// Look up field metadata.
    ///
    /// An exact `(category, name)` match wins. Otherwise the name is looked
    /// up under the most recently resolved category and then under any
    /// category; the caller is responsible for checking that the category it
    /// asked for agrees with the field's nature.
    pub fn field_info(&self, key: &FieldKey) -> Result<Arc<FieldInfo>> {
        if let Some(info) = self.field_info.get(key) {
            self.remember(&key.category);
            return Ok(Arc::clone(info));
        }

        if key.category == UNKNOWN_CATEGORY
            && let Some(last) = self.last_category()
            && let Some(info) = self.field_info.get(&key.with_category(last))
        {
            return Ok(Arc::clone(info));
        }

        let by_name = self
            .field_info
            .iter()
            .find(|(candidate, _)| candidate.name == key.name);
        match by_name {
            Some((found, info)) => {
                self.remember(&found.category);
                Ok(Arc::clone(info))
            }
            None => Err(Error::FieldNotFound(key.clone())),
        }
    }

    pub fn cached_dependencies(&self, key: &FieldKey) -> Option<Arc<Vec<FieldSpec>>> {
        self.field_dependencies.lock().get(key).cloned()
    }

    pub fn cache_dependencies(&self, key: FieldKey, dependencies: Vec<FieldSpec>) -> Arc<Vec<FieldSpec>> {
        let dependencies = Arc::new(dependencies);
        self.field_dependencies
            .lock()
            .insert(key, Arc::clone(&dependencies));
        dependencies
    }

    fn remember(&self, category: &str) {
        if category != UNKNOWN_CATEGORY {
            *self.last_category.lock() = Some(category.to_string());
        }
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("fluid_types", &self.fluid_types)
            .field("particle_types", &self.particle_types)
            .field("fields", &self.field_info.len())
            .finish_non_exhaustive()
    }
}

/// Explicit registration of categories, fields and filters.
pub struct DatasetBuilder {
    name: String,
    index: Arc<dyn Index>,
    fluid_types: IndexSet<String>,
    particle_types: IndexSet<String>,
    default_fluid_type: Option<String>,
    default_particle_type: Option<String>,
    fields: Vec<FieldInfo>,
    filters: Vec<ParticleFilter>,
    units: Option<Arc<dyn UnitSystem>>,
    config: EngineConfig,
}

impl DatasetBuilder {
    pub fn new(name: impl Into<String>, index: Arc<dyn Index>) -> Self {
        Self {
            name: name.into(),
            index,
            fluid_types: IndexSet::new(),
            particle_types: IndexSet::new(),
            default_fluid_type: None,
            default_particle_type: None,
            fields: Vec::new(),
            filters: Vec::new(),
            units: None,
            config: EngineConfig::default(),
        }
    }

    pub fn fluid_type(mut self, category: impl Into<String>) -> Self {
        self.fluid_types.insert(category.into());
        self
    }

    pub fn particle_type(mut self, category: impl Into<String>) -> Self {
        self.particle_types.insert(category.into());
        self
    }

    pub fn default_fluid_type(mut self, category: impl Into<String>) -> Self {
        self.default_fluid_type = Some(category.into());
        self
    }

    pub fn default_particle_type(mut self, category: impl Into<String>) -> Self {
        self.default_particle_type = Some(category.into());
        self
    }

    pub fn field(mut self, info: FieldInfo) -> Self {
        self.fields.push(info);
        self
    }

    pub fn particle_filter(mut self, filter: ParticleFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn units(mut self, units: Arc<dyn UnitSystem>) -> Self {
        self.units = Some(units);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Arc<Dataset>> {
        self.config.validate()?;

        let mut particle_types = self.particle_types;
        let mut field_info = IndexMap::new();
        let mut field_list = IndexSet::new();
        let mut derived_field_list = IndexSet::new();

        for info in self.fields {
            let category_known = if info.particle_type {
                particle_types.contains(&info.key.category)
            } else {
                self.fluid_types.contains(&info.key.category)
            };
            if !category_known {
                return Err(Error::InvalidArgument(format!(
                    "field {} registered under unknown category",
                    info.key
                )));
            }
            if info.is_derived() {
                derived_field_list.insert(info.key.clone());
            } else {
                field_list.insert(info.key.clone());
            }
            field_info.insert(info.key.clone(), Arc::new(info));
        }

        let mut filters = IndexMap::new();
        for filter in self.filters {
            if !particle_types.contains(&filter.filtered_type) {
                return Err(Error::InvalidArgument(format!(
                    "filter '{}' applies to unknown particle type '{}'",
                    filter.name, filter.filtered_type
                )));
            }
            let aliases: Vec<FieldInfo> = field_info
                .values()
                .filter(|info| info.key.category == filter.filtered_type)
                .map(|info| info.aliased(&filter.name))
                .collect();
            for alias in aliases {
                derived_field_list.insert(alias.key.clone());
                field_info.insert(alias.key.clone(), Arc::new(alias));
            }
            debug!(filter = %filter.name, base = %filter.filtered_type, "particle filter registered");
            particle_types.insert(filter.name.clone());
            filters.insert(filter.name.clone(), Arc::new(filter));
        }

        let default_fluid_type = self
            .default_fluid_type
            .or_else(|| self.fluid_types.first().cloned())
            .unwrap_or_else(|| "gas".to_string());
        let default_particle_type = self
            .default_particle_type
            .or_else(|| particle_types.first().cloned())
            .unwrap_or_else(|| "all".to_string());

        debug!(
            dataset = %self.name,
            on_disk = field_list.len(),
            derived = derived_field_list.len(),
            "dataset built"
        );

        Ok(Arc::new(Dataset {
            name: self.name,
            fluid_types: self.fluid_types,
            particle_types,
            default_fluid_type,
            default_particle_type,
            field_info,
            field_list,
            derived_field_list,
            filters,
            index: self.index,
            units: self.units.unwrap_or_else(|| Arc::new(UnitTable::cgs())),
            config: self.config,
            field_dependencies: Mutex::new(IndexMap::new()),
            last_category: Mutex::new(None),
        }))
    }
}
