//! Particle filters: named subsets of a particle category.

use std::fmt;
use std::sync::Arc;

use crate::container::SelectionContainer;
use crate::error::Result;

/// Predicate computing the membership mask of a filter.
///
/// Runs with the filtered category active on the container, so bare particle
/// field names resolve to that category.
pub type FilterFn = Arc<dyn Fn(&mut SelectionContainer) -> Result<Vec<bool>> + Send + Sync>;

#[derive(Clone)]
pub struct ParticleFilter {
    /// Category the filtered fields are exposed under.
    pub name: String,
    /// Underlying particle category.
    pub filtered_type: String,
    predicate: FilterFn,
}

impl ParticleFilter {
    pub fn new<F>(name: impl Into<String>, filtered_type: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&mut SelectionContainer) -> Result<Vec<bool>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            filtered_type: filtered_type.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn mask(&self, container: &mut SelectionContainer) -> Result<Vec<bool>> {
        (self.predicate)(container)
    }
}

impl fmt::Debug for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleFilter")
            .field("name", &self.name)
            .field("filtered_type", &self.filtered_type)
            .finish_non_exhaustive()
    }
}
