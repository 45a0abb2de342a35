//! Storage backend boundary.
//!
//! An [`Index`] knows how a dataset is laid out on storage. It hands out
//! chunks of blocks for a selection and performs the bulk reads; everything
//! else (dependency resolution, generation, stitching) stays in the engine.

use indexmap::IndexMap;

use crate::chunk::{Chunk, ChunkOptions};
use crate::error::Result;
use crate::selector::Selector;
use crate::types::{ChunkKind, FieldKey};

/// Lazy sequence of chunks for one request.
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<Chunk>> + 'a>;

/// Parameters of a chunk request.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    pub selector: &'a dyn Selector,
    pub kind: ChunkKind,
    pub options: &'a ChunkOptions,
    /// Restrict the request to the blocks of this (currently active) chunk.
    pub within: Option<&'a Chunk>,
}

/// Result of a bulk read.
#[derive(Debug, Clone, Default)]
pub struct ReadOutcome {
    /// Raw arrays, in the field's declared input units.
    pub filled: IndexMap<FieldKey, Vec<f64>>,
    /// Fields storage does not hold; they must be generated.
    pub residual: Vec<FieldKey>,
}

/// Chunking and bulk I/O for one dataset.
///
/// Reads for an `All` or `Io` chunk return the elements `selector` picks,
/// block by block in chunk order. Reads for a `Spatial` chunk return every
/// element of its block (ghost cells included), since the engine applies the
/// selection itself when it assembles spatial results.
pub trait Index: Send + Sync {
    /// Lower and upper corners of the domain.
    fn domain_edges(&self) -> ([f64; 3], [f64; 3]);

    /// The default all-inclusive chunk for a selection.
    fn identify_base_chunk(&self, selector: &dyn Selector) -> Result<Chunk>;

    /// Chunks of the given kind; restartable by calling again.
    fn chunks<'a>(&'a self, request: ChunkRequest<'a>) -> Result<ChunkIter<'a>>;

    fn read_fluid_fields(
        &self,
        fields: &[FieldKey],
        selector: &dyn Selector,
        chunk: &Chunk,
    ) -> Result<ReadOutcome>;

    fn read_particle_fields(
        &self,
        fields: &[FieldKey],
        selector: &dyn Selector,
        chunk: &Chunk,
    ) -> Result<ReadOutcome>;
}
