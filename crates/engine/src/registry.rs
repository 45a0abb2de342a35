//! Container-type registry.
//!
//! Container kinds are registered explicitly by name with a factory that
//! builds their selector from JSON arguments. The scripting layer creates
//! containers through [`ContainerRegistry::create`].
//!
//! Built in:
//!
//! - `all`: the whole dataset, no arguments
//! - `region`: an axis-aligned box, `{"left": [x, y, z], "right": [x, y, z]}`
//!
//! Any container type also accepts an optional `"center"` argument, parsed
//! with [`Center::from_json`] and stored as the `center` field parameter.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::container::{Center, SelectionContainer};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::selector::{AllSelector, RegionSelector, Selector};

/// Builds a selector from container arguments.
pub type SelectorFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn Selector>> + Send + Sync>;

/// A registered container type.
#[derive(Clone)]
pub struct ContainerDescriptor {
    pub name: String,
    /// One-line description shown by listings.
    pub doc: String,
    factory: SelectorFactory,
}

impl std::fmt::Debug for ContainerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerDescriptor")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContainerRegistry {
    types: IndexMap<String, ContainerDescriptor>,
}

#[derive(Deserialize)]
struct RegionArgs {
    left: [f64; 3],
    right: [f64; 3],
}

impl ContainerRegistry {
    /// A registry without any container types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the built-in container types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("all", "the whole dataset", |_| Ok(Arc::new(AllSelector)));
        registry.register("region", "axis-aligned box [left, right)", |args| {
            let args = RegionArgs::deserialize(args)
                .map_err(|err| Error::InvalidArgument(format!("region: {err}")))?;
            if (0..3).any(|axis| args.left[axis] > args.right[axis]) {
                return Err(Error::InvalidArgument(
                    "region: left edge exceeds right edge".to_string(),
                ));
            }
            Ok(Arc::new(RegionSelector::new(args.left, args.right)))
        });
        registry
    }

    /// Register (or replace) a container type.
    pub fn register<F>(&mut self, name: &str, doc: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Selector>> + Send + Sync + 'static,
    {
        debug!(container_type = name, "container type registered");
        self.types.insert(
            name.to_string(),
            ContainerDescriptor {
                name: name.to_string(),
                doc: doc.to_string(),
                factory: Arc::new(factory),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ContainerDescriptor> {
        self.types.get(name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Create a container of type `name` over `dataset`.
    pub fn create(&self, name: &str, dataset: Arc<Dataset>, args: &Value) -> Result<SelectionContainer> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| Error::UnknownContainerType(name.to_string()))?;
        let selector = (descriptor.factory)(args)?;
        let mut container = SelectionContainer::new(dataset, selector);
        if let Some(center) = args.get("center") {
            container.set_center(Center::from_json(center)?)?;
        }
        Ok(container)
    }
}
