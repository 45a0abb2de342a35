//! Scoped state changes on a container.
//!
//! Each guard saves the piece of state it overrides and puts it back when it
//! is dropped, whether the scope ends normally or through `?`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::trace;

use crate::chunk::Chunk;
use crate::parameters::FieldParameters;
use crate::store::FieldData;

use super::SelectionContainer;

#[derive(Debug)]
enum Saved {
    ChunkedRead {
        field_data: FieldData,
        chunk: Option<Chunk>,
        locked: bool,
    },
    Lock(bool),
    FieldTypes {
        fluid: String,
        particle: String,
    },
    Parameters(FieldParameters),
    Cache(FieldData),
}

/// A container with one piece of state overridden until drop.
#[derive(Debug)]
pub struct Scope<'a> {
    container: &'a mut SelectionContainer,
    saved: Option<Saved>,
}

impl Deref for Scope<'_> {
    type Target = SelectionContainer;

    fn deref(&self) -> &SelectionContainer {
        self.container
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut SelectionContainer {
        self.container
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        let container = &mut *self.container;
        match saved {
            Saved::ChunkedRead {
                field_data,
                chunk,
                locked,
            } => {
                container.data.replace_field_data(field_data);
                container.current_chunk = chunk;
                container.locked = locked;
            }
            Saved::Lock(locked) => container.locked = locked,
            Saved::FieldTypes { fluid, particle } => {
                container.data.replace_current_types(fluid, particle);
            }
            Saved::Parameters(parameters) => {
                container.data.replace_field_parameters(parameters);
            }
            Saved::Cache(field_data) => {
                container.data.replace_field_data(field_data);
                container.field_cache = None;
            }
        }
    }
}

impl SelectionContainer {
    /// Make `chunk` the active chunk with a fresh, unlocked field store.
    pub fn chunked_read(&mut self, chunk: Chunk) -> Scope<'_> {
        trace!(kind = %chunk.kind, blocks = chunk.objs.len(), "entering chunk");
        let field_data = self.data.replace_field_data(FieldData::new());
        let previous = self.current_chunk.replace(chunk);
        let locked = std::mem::replace(&mut self.locked, false);
        Scope {
            container: self,
            saved: Some(Saved::ChunkedRead {
                field_data,
                chunk: previous,
                locked,
            }),
        }
    }

    /// Lock the container against nested reads and generation.
    pub fn field_lock(&mut self) -> Scope<'_> {
        let locked = std::mem::replace(&mut self.locked, true);
        Scope {
            container: self,
            saved: Some(Saved::Lock(locked)),
        }
    }

    /// Make `category` the active particle or fluid category.
    pub fn field_type_state(&mut self, category: &str, particle: bool) -> Scope<'_> {
        let (fluid, particle_type) = if particle {
            (self.data.current_fluid_type().to_string(), category.to_string())
        } else {
            (category.to_string(), self.data.current_particle_type().to_string())
        };
        let (fluid, particle) = self.data.replace_current_types(fluid, particle_type);
        Scope {
            container: self,
            saved: Some(Saved::FieldTypes { fluid, particle }),
        }
    }

    /// Overlay `incoming` parameters; values this container set itself win.
    pub fn with_field_parameters(&mut self, incoming: &FieldParameters) -> Scope<'_> {
        let merged = self.data.field_parameters().overlaid_on(incoming);
        let parameters = self.data.replace_field_parameters(merged);
        Scope {
            container: self,
            saved: Some(Saved::Parameters(parameters)),
        }
    }

    /// Stage read-ahead values to be used by [`Self::activate_cache`].
    pub fn initialize_cache(&mut self, cache: FieldData) {
        self.field_cache = Some(cache);
    }

    /// Expose staged values in the field store for the scope's duration.
    ///
    /// The store is put back exactly as it was on exit, dropping anything
    /// materialized inside the scope, and the cache is discarded.
    pub fn activate_cache(&mut self) -> Scope<'_> {
        let field_data = self.data.field_data().clone();
        if let Some(cache) = self.field_cache.take() {
            let store = self.data.field_data_mut();
            for (key, array) in cache.iter() {
                store.insert_shared(key.clone(), Arc::clone(array));
            }
        }
        Scope {
            container: self,
            saved: Some(Saved::Cache(field_data)),
        }
    }
}
