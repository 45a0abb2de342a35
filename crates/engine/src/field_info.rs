//! Field metadata.
//!
//! A [`FieldInfo`] describes one field of a dataset's registry: its units,
//! whether it is a particle field, whether it needs spatial context (ghost
//! zones) to be computed, how its dependencies are discovered, and, for
//! derived fields, the generator that computes it.

use std::fmt;
use std::sync::Arc;

use crate::container::SelectionContainer;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::types::{FieldKey, FieldSpec};
use crate::units::UnitArray;

/// What a generator hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutput {
    /// Values in the field's declared units.
    Raw(Vec<f64>),
    /// Values carrying their own units; converted on store.
    Tagged(UnitArray),
}

impl FieldOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(values) => values.len(),
            Self::Tagged(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tag with `units` unless already tagged.
    pub fn into_array(self, units: &str) -> UnitArray {
        match self {
            Self::Raw(values) => UnitArray::new(values, units),
            Self::Tagged(array) => array,
        }
    }
}

impl From<Vec<f64>> for FieldOutput {
    fn from(values: Vec<f64>) -> Self {
        Self::Raw(values)
    }
}

impl From<UnitArray> for FieldOutput {
    fn from(array: UnitArray) -> Self {
        Self::Tagged(array)
    }
}

/// Generator of a derived field, evaluated against the generating container.
///
/// `Ok(None)` means the generator had nothing to offer.
pub type FieldFn =
    Arc<dyn Fn(&mut SelectionContainer) -> Result<Option<FieldOutput>> + Send + Sync>;

/// Dependency discovery run against the dataset.
pub type DiscoverFn = Arc<dyn Fn(&Dataset) -> Result<Vec<FieldSpec>> + Send + Sync>;

/// Where a field's dependencies come from.
#[derive(Clone, Default)]
pub enum Dependencies {
    #[default]
    None,
    /// Listed up front.
    Declared(Vec<FieldSpec>),
    /// Computed on first use and cached by the dataset.
    Discover(DiscoverFn),
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Declared(specs) => f.debug_tuple("Declared").field(specs).finish(),
            Self::Discover(_) => write!(f, "Discover(..)"),
        }
    }
}

/// Outcome of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The field can be computed on the object as it is.
    Ready,
    /// The field needs a spatial object padded with this many ghost zones.
    NeedsGhostZones(usize),
}

/// Registry entry for one field.
#[derive(Clone)]
pub struct FieldInfo {
    pub key: FieldKey,
    /// Units raw and generated values are expressed in.
    pub units: String,
    /// Units values are stored in.
    pub output_units: String,
    pub particle_type: bool,
    /// Ghost-zone width required when the field needs spatial context.
    pub ghost_zones: Option<usize>,
    dependencies: Dependencies,
    function: Option<FieldFn>,
}

impl FieldInfo {
    /// A field read directly from storage.
    pub fn on_disk(key: FieldKey, units: impl Into<String>) -> Self {
        let units = units.into();
        Self {
            key,
            output_units: units.clone(),
            units,
            particle_type: false,
            ghost_zones: None,
            dependencies: Dependencies::None,
            function: None,
        }
    }

    /// A field computed by `function`.
    pub fn derived<F>(key: FieldKey, units: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut SelectionContainer) -> Result<Option<FieldOutput>> + Send + Sync + 'static,
    {
        let mut info = Self::on_disk(key, units);
        info.function = Some(Arc::new(function));
        info
    }

    pub fn particle(mut self) -> Self {
        self.particle_type = true;
        self
    }

    /// Require spatial context with `ghost_zones` cells of padding.
    pub fn spatial(mut self, ghost_zones: usize) -> Self {
        self.ghost_zones = Some(ghost_zones);
        self
    }

    pub fn output_units(mut self, units: impl Into<String>) -> Self {
        self.output_units = units.into();
        self
    }

    pub fn depends_on<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldSpec>,
    {
        self.dependencies = Dependencies::Declared(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn discover_dependencies<F>(mut self, discover: F) -> Self
    where
        F: Fn(&Dataset) -> Result<Vec<FieldSpec>> + Send + Sync + 'static,
    {
        self.dependencies = Dependencies::Discover(Arc::new(discover));
        self
    }

    /// The same field registered under another category.
    pub fn aliased(&self, category: &str) -> Self {
        let mut alias = self.clone();
        alias.key = self.key.with_category(category);
        alias
    }

    pub fn function(&self) -> Option<&FieldFn> {
        self.function.as_ref()
    }

    pub fn is_derived(&self) -> bool {
        self.function.is_some()
    }

    /// Whether the field can be computed on `obj` without more spatial
    /// context.
    pub fn check_available(&self, obj: &SelectionContainer) -> Availability {
        match self.ghost_zones {
            Some(required) if !obj.is_spatial() || obj.ghost_zones() < required => {
                Availability::NeedsGhostZones(required)
            }
            _ => Availability::Ready,
        }
    }

    /// Run the dependency discovery operation.
    pub fn get_dependencies(&self, dataset: &Dataset) -> Result<Vec<FieldSpec>> {
        match &self.dependencies {
            Dependencies::None => Ok(Vec::new()),
            Dependencies::Declared(specs) => Ok(specs.clone()),
            Dependencies::Discover(discover) => discover(dataset),
        }
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("key", &self.key)
            .field("units", &self.units)
            .field("output_units", &self.output_units)
            .field("particle_type", &self.particle_type)
            .field("ghost_zones", &self.ghost_zones)
            .field("dependencies", &self.dependencies)
            .field("derived", &self.is_derived())
            .finish()
    }
}
