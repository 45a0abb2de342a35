//! Field store, field parameters and specifier resolution.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::parameters::FieldParameters;
use crate::store::FieldData;
use crate::types::{CONTAINER_CATEGORY, FieldKey, FieldSpec, UNKNOWN_CATEGORY};
use crate::units::UnitArray;

use super::SelectionContainer;

/// Generator of a container field.
pub type ContainerFieldFn = Arc<dyn Fn(&mut SelectionContainer) -> Result<Vec<f64>> + Send + Sync>;

/// A field computed from the container's own geometry or identity.
#[derive(Clone)]
pub struct ContainerField {
    pub units: String,
    pub function: ContainerFieldFn,
}

impl fmt::Debug for ContainerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerField")
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

/// A named selection of a dataset: field values plus field parameters.
#[derive(Debug, Clone)]
pub struct DataContainer {
    dataset: Arc<Dataset>,
    field_data: FieldData,
    field_parameters: FieldParameters,
    current_fluid_type: String,
    current_particle_type: String,
    container_fields: IndexMap<String, ContainerField>,
}

impl DataContainer {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            current_fluid_type: dataset.default_fluid_type().to_string(),
            current_particle_type: dataset.default_particle_type().to_string(),
            dataset,
            field_data: FieldData::new(),
            field_parameters: FieldParameters::new(),
            container_fields: IndexMap::new(),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn field_data(&self) -> &FieldData {
        &self.field_data
    }

    pub(crate) fn field_data_mut(&mut self) -> &mut FieldData {
        &mut self.field_data
    }

    pub(crate) fn replace_field_data(&mut self, field_data: FieldData) -> FieldData {
        std::mem::replace(&mut self.field_data, field_data)
    }

    pub fn field_parameters(&self) -> &FieldParameters {
        &self.field_parameters
    }

    pub(crate) fn replace_field_parameters(&mut self, parameters: FieldParameters) -> FieldParameters {
        std::mem::replace(&mut self.field_parameters, parameters)
    }

    pub fn get_field_parameter(&self, name: &str) -> Option<&Arc<UnitArray>> {
        self.field_parameters.get(name)
    }

    pub fn set_field_parameter(&mut self, name: impl Into<String>, value: UnitArray) {
        self.field_parameters.set(name, value);
    }

    pub fn has_field_parameter(&self, name: &str) -> bool {
        self.field_parameters.contains(name)
    }

    pub fn is_default_field_parameter(&self, name: &str) -> bool {
        self.field_parameters.is_default(name)
    }

    pub fn current_fluid_type(&self) -> &str {
        &self.current_fluid_type
    }

    pub fn current_particle_type(&self) -> &str {
        &self.current_particle_type
    }

    /// Swap the active categories, returning the previous `(fluid, particle)`.
    pub(crate) fn replace_current_types(&mut self, fluid: String, particle: String) -> (String, String) {
        (
            std::mem::replace(&mut self.current_fluid_type, fluid),
            std::mem::replace(&mut self.current_particle_type, particle),
        )
    }

    pub(crate) fn add_container_field(&mut self, name: String, field: ContainerField) {
        self.container_fields.insert(name, field);
    }

    pub fn container_field(&self, name: &str) -> Option<&ContainerField> {
        self.container_fields.get(name)
    }

    pub fn is_container_field(&self, key: &FieldKey) -> bool {
        key.category == CONTAINER_CATEGORY && self.container_fields.contains_key(&key.name)
    }

    /// Canonicalize specifiers, in input order.
    pub fn determine_fields(&self, specs: &[FieldSpec]) -> Result<Vec<FieldKey>> {
        specs.iter().map(|spec| self.determine_field(spec)).collect()
    }

    /// Canonicalize one specifier.
    ///
    /// Bare names take the active particle or fluid category depending on
    /// the field's nature; fluid names unknown under the active category fall
    /// back to the most recently resolved category. Container fields are
    /// never checked against the dataset catalogs.
    pub fn determine_field(&self, spec: &FieldSpec) -> Result<FieldKey> {
        if let Some(key) = self.container_field_key(spec)? {
            return Ok(key);
        }

        let dataset = &self.dataset;
        let (key, info) = match spec.explicit()? {
            Some((category, name)) => {
                let key = FieldKey::new(category, name);
                let info = dataset.field_info(&key)?;
                (key, info)
            }
            None => {
                let name = spec
                    .name()
                    .ok_or_else(|| Error::FieldNotParseable(spec.to_string()))?;
                let info = dataset.field_info(&FieldKey::new(UNKNOWN_CATEGORY, name))?;
                let category = if info.particle_type {
                    self.current_particle_type.clone()
                } else if dataset.knows(&FieldKey::new(&self.current_fluid_type, name)) {
                    self.current_fluid_type.clone()
                } else {
                    dataset
                        .last_category()
                        .unwrap_or_else(|| self.current_fluid_type.clone())
                };
                (FieldKey::new(category, name), info)
            }
        };

        if info.particle_type && !dataset.is_particle_type(&key.category) {
            return Err(Error::FieldTypeMismatch {
                field: key.clone(),
                category: key.category,
                expected: "particle",
            });
        }
        if !info.particle_type && !dataset.is_fluid_type(&key.category) {
            return Err(Error::FieldTypeMismatch {
                field: key.clone(),
                category: key.category,
                expected: "fluid",
            });
        }
        if !dataset.knows(&key) {
            return Err(Error::FieldNotFound(key));
        }
        Ok(key)
    }

    fn container_field_key(&self, spec: &FieldSpec) -> Result<Option<FieldKey>> {
        let key = match spec.explicit()? {
            Some((category, name)) => FieldKey::new(category, name),
            None => match spec.name() {
                Some(name) => FieldKey::new(CONTAINER_CATEGORY, name),
                None => return Ok(None),
            },
        };
        Ok(self.is_container_field(&key).then_some(key))
    }
}
