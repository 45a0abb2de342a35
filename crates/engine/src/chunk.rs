//! Blocks and chunks.
//!
//! A [`Block`] is a storage-level sub-object (a grid patch): a box of cells,
//! possibly padded with ghost cells. A [`Chunk`] groups blocks either for I/O
//! batching, for one-block-at-a-time geometric iteration, or as the full
//! selection. Chunks are created by the backend per request and never kept
//! by the engine beyond the scope that activated them.

use std::sync::Arc;

use indexmap::IndexMap;
use ndarray::{ArrayView3, s};

use crate::error::{Error, Result};
use crate::selector::Selector;
use crate::types::{BlockId, ChunkKind, FieldKey};

/// A box of cells on a uniform mesh.
///
/// `left_index`, `left_edge` and `dims` describe the padded extent when
/// `padding` is non-zero; [`Block::base`] recovers the unpadded block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    /// Refinement level.
    pub level: usize,
    /// Global index of the first cell.
    pub left_index: [i64; 3],
    /// Cells per axis.
    pub dims: [usize; 3],
    /// Ghost cells on each side, per axis.
    pub padding: [usize; 3],
    /// Position of the low corner of the first cell.
    pub left_edge: [f64; 3],
    /// Cell width per axis.
    pub dds: [f64; 3],
}

impl Block {
    pub fn num_cells(&self) -> usize {
        self.dims.iter().product()
    }

    /// Widest padding over all axes.
    pub fn ghost_zones(&self) -> usize {
        self.padding.iter().copied().max().unwrap_or(0)
    }

    pub fn is_padded(&self) -> bool {
        self.padding.iter().any(|&p| p > 0)
    }

    /// This block grown by `ghost_zones` cells on each side of the first
    /// `dimensionality` axes.
    pub fn padded(&self, ghost_zones: usize, dimensionality: usize) -> Block {
        let mut padded = self.base();
        for axis in 0..dimensionality.min(3) {
            let n = ghost_zones;
            padded.padding[axis] = n;
            padded.dims[axis] += 2 * n;
            padded.left_index[axis] -= n as i64;
            padded.left_edge[axis] -= n as f64 * padded.dds[axis];
        }
        padded
    }

    /// The block without its ghost cells.
    pub fn base(&self) -> Block {
        let mut base = self.clone();
        for axis in 0..3 {
            let n = self.padding[axis];
            base.padding[axis] = 0;
            base.dims[axis] -= 2 * n;
            base.left_index[axis] += n as i64;
            base.left_edge[axis] += n as f64 * self.dds[axis];
        }
        base
    }

    pub fn right_edge(&self) -> [f64; 3] {
        std::array::from_fn(|axis| self.left_edge[axis] + self.dims[axis] as f64 * self.dds[axis])
    }

    /// Per-axis position of a flat (C-ordered) cell index.
    pub fn cell_position(&self, flat: usize) -> [usize; 3] {
        let [_, ny, nz] = self.dims;
        [flat / (ny * nz), (flat / nz) % ny, flat % nz]
    }

    pub fn cell_center(&self, flat: usize) -> [f64; 3] {
        let ijk = self.cell_position(flat);
        std::array::from_fn(|axis| self.left_edge[axis] + (ijk[axis] as f64 + 0.5) * self.dds[axis])
    }

    pub fn global_index(&self, flat: usize) -> [i64; 3] {
        let ijk = self.cell_position(flat);
        std::array::from_fn(|axis| self.left_index[axis] + ijk[axis] as i64)
    }

    /// Flat index of the cell with global index `global`, if this block
    /// holds it.
    pub fn flat_index(&self, global: [i64; 3]) -> Option<usize> {
        let mut ijk = [0usize; 3];
        for axis in 0..3 {
            let offset = global[axis] - self.left_index[axis];
            if offset < 0 || offset >= self.dims[axis] as i64 {
                return None;
            }
            ijk[axis] = offset as usize;
        }
        let [_, ny, nz] = self.dims;
        Some((ijk[0] * ny + ijk[1]) * nz + ijk[2])
    }

    /// Flat index, in the unpadded block, of the cell containing `point`.
    pub fn cell_of(&self, point: [f64; 3]) -> Option<usize> {
        if !self.contains_point(point) {
            return None;
        }
        let base = self.base();
        let global: [i64; 3] = std::array::from_fn(|axis| {
            let offset = ((point[axis] - base.left_edge[axis]) / base.dds[axis]).floor() as i64;
            base.left_index[axis] + offset.clamp(0, base.dims[axis] as i64 - 1)
        });
        base.flat_index(global)
    }

    /// Whether a point lies in the unpadded extent (half-open).
    pub fn contains_point(&self, point: [f64; 3]) -> bool {
        let base = self.base();
        let right = base.right_edge();
        (0..3).all(|axis| point[axis] >= base.left_edge[axis] && point[axis] < right[axis])
    }

    /// Copy the elements of `source` selected by `selector` into `dest`
    /// starting at `offset`. Returns the number of elements written.
    pub fn select(
        &self,
        selector: &dyn Selector,
        source: &[f64],
        dest: &mut [f64],
        offset: usize,
    ) -> Result<usize> {
        if source.len() != self.num_cells() {
            return Err(Error::Backend(format!(
                "{} holds {} cells but {} values were supplied",
                self.id,
                self.num_cells(),
                source.len()
            )));
        }
        let mask = selector.fill_mask(self);
        let mut written = 0;
        for (value, _) in source.iter().zip(&mask).filter(|(_, keep)| **keep) {
            let slot = dest.get_mut(offset + written).ok_or_else(|| {
                Error::Backend(format!("selection of {} overflows its output buffer", self.id))
            })?;
            *slot = *value;
            written += 1;
        }
        Ok(written)
    }
}

/// Drop the ghost cells of a padded block's values, keeping C order.
pub fn strip_ghost_zones(field: &FieldKey, block: &Block, values: &[f64]) -> Result<Vec<f64>> {
    let view = ArrayView3::from_shape(block.dims, values).map_err(|_| Error::LengthMismatch {
        field: field.clone(),
        expected: block.num_cells(),
        actual: values.len(),
    })?;
    let [px, py, pz] = block.padding;
    let [nx, ny, nz] = block.dims;
    let interior = view.slice(s![px..nx - px, py..ny - py, pz..nz - pz]);
    Ok(interior.iter().copied().collect())
}

/// A group of blocks handed out by the backend.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub objs: Vec<Arc<Block>>,
    /// Raw values the backend read ahead for the (single) block of a
    /// spatial chunk, in each field's input units.
    pub preloaded: Option<IndexMap<FieldKey, Vec<f64>>>,
}

impl Chunk {
    pub fn new(kind: ChunkKind, objs: Vec<Arc<Block>>) -> Self {
        Self {
            kind,
            objs,
            preloaded: None,
        }
    }

    pub fn with_preloaded(mut self, preloaded: IndexMap<FieldKey, Vec<f64>>) -> Self {
        self.preloaded = Some(preloaded);
        self
    }

    /// The active sub-object.
    pub fn active(&self) -> Option<&Arc<Block>> {
        self.objs.first()
    }

    pub fn is_spatial(&self) -> bool {
        self.kind == ChunkKind::Spatial
    }
}

/// Options passed along with a chunk request.
#[derive(Debug, Clone, Default)]
pub struct ChunkOptions {
    /// Ghost cells to pad spatial chunks with.
    pub ghost_zones: usize,
    /// Fields worth reading ahead for each spatial chunk.
    pub preload_fields: Vec<FieldKey>,
}

impl ChunkOptions {
    pub fn ghost_zones(mut self, ghost_zones: usize) -> Self {
        self.ghost_zones = ghost_zones;
        self
    }

    pub fn preload(mut self, fields: Vec<FieldKey>) -> Self {
        self.preload_fields = fields;
        self
    }
}
