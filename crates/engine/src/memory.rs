//! In-memory storage backend.
//!
//! A uniform mesh split into equal-ish blocks, with fluid arrays held over
//! the whole domain and particle arrays held per category. Used by the test
//! harness and the probe tool; every bulk read is recorded so callers can
//! check what was fetched.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::chunk::{Block, Chunk};
use crate::error::{Error, Result};
use crate::index::{ChunkIter, ChunkRequest, Index, ReadOutcome};
use crate::selector::Selector;
use crate::types::{BlockId, ChunkKind, FieldKey, PARTICLE_POSITION_FIELDS};

/// How ghost cells outside the domain are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostBoundary {
    /// Repeat the nearest edge cell.
    #[default]
    Clamp,
    /// Wrap around the domain.
    Periodic,
}

impl GhostBoundary {
    fn wrap(self, index: i64, extent: usize) -> usize {
        let extent = extent as i64;
        let wrapped = match self {
            Self::Clamp => index.clamp(0, extent - 1),
            Self::Periodic => index.rem_euclid(extent),
        };
        wrapped as usize
    }
}

pub struct MemoryIndex {
    dims: [usize; 3],
    dimensionality: usize,
    left_edge: [f64; 3],
    right_edge: [f64; 3],
    blocks: Vec<Arc<Block>>,
    io_group: usize,
    boundary: GhostBoundary,
    fluids: IndexMap<FieldKey, Vec<f64>>,
    particles: IndexMap<String, IndexMap<String, Vec<f64>>>,
    reads: Mutex<Vec<Vec<FieldKey>>>,
}

impl MemoryIndex {
    pub fn builder(dims: [usize; 3]) -> MemoryIndexBuilder {
        MemoryIndexBuilder::new(dims)
    }

    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    /// Field lists of every bulk read so far, in order.
    pub fn reads(&self) -> Vec<Vec<FieldKey>> {
        self.reads.lock().clone()
    }

    pub fn clear_reads(&self) {
        self.reads.lock().clear();
    }

    fn record(&self, fields: &[FieldKey]) {
        self.reads.lock().push(fields.to_vec());
    }

    /// Values of a domain array over the (possibly padded) extent of `block`.
    fn block_values(&self, data: &[f64], block: &Block) -> Vec<f64> {
        let [_, ny, nz] = self.dims;
        (0..block.num_cells())
            .map(|flat| {
                let [i, j, k] = block.global_index(flat);
                let i = self.boundary.wrap(i, self.dims[0]);
                let j = self.boundary.wrap(j, self.dims[1]);
                let k = self.boundary.wrap(k, self.dims[2]);
                data[(i * ny + j) * nz + k]
            })
            .collect()
    }

    fn positions(&self, category: &str) -> Result<[&[f64]; 3]> {
        let fields = self
            .particles
            .get(category)
            .ok_or_else(|| Error::Backend(format!("no particles of type '{category}'")))?;
        let mut positions: [&[f64]; 3] = [&[], &[], &[]];
        for (axis, name) in PARTICLE_POSITION_FIELDS.iter().enumerate() {
            positions[axis] = fields
                .get(*name)
                .map(Vec::as_slice)
                .ok_or_else(|| Error::Backend(format!("particle type '{category}' has no {name}")))?;
        }
        Ok(positions)
    }

    /// Indices of the particles of `category` the chunk covers, block by block.
    fn particle_indices(&self, category: &str, selector: &dyn Selector, chunk: &Chunk) -> Result<Vec<usize>> {
        let [x, y, z] = self.positions(category)?;
        let mut selected = Vec::new();
        for block in &chunk.objs {
            let inside: Vec<usize> = (0..x.len())
                .filter(|&p| block.contains_point([x[p], y[p], z[p]]))
                .collect();
            if chunk.is_spatial() {
                selected.extend(inside);
                continue;
            }
            let bx: Vec<f64> = inside.iter().map(|&p| x[p]).collect();
            let by: Vec<f64> = inside.iter().map(|&p| y[p]).collect();
            let bz: Vec<f64> = inside.iter().map(|&p| z[p]).collect();
            if let Some(mask) = selector.select_particles(block, &bx, &by, &bz) {
                selected.extend(inside.iter().zip(mask).filter(|(_, keep)| *keep).map(|(&p, _)| p));
            }
        }
        Ok(selected)
    }

    fn base_blocks(&self, request: &ChunkRequest<'_>) -> Vec<Arc<Block>> {
        match request.within {
            Some(chunk) => chunk
                .objs
                .iter()
                .map(|block| {
                    if block.is_padded() {
                        Arc::new(block.base())
                    } else {
                        Arc::clone(block)
                    }
                })
                .collect(),
            None => self
                .blocks
                .iter()
                .filter(|block| request.selector.intersects(block))
                .cloned()
                .collect(),
        }
    }

    fn preload(&self, fields: &[FieldKey], block: &Block) -> IndexMap<FieldKey, Vec<f64>> {
        fields
            .iter()
            .filter_map(|key| {
                self.fluids
                    .get(key)
                    .map(|data| (key.clone(), self.block_values(data, block)))
            })
            .collect()
    }
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("dims", &self.dims)
            .field("blocks", &self.blocks.len())
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}

impl Index for MemoryIndex {
    fn domain_edges(&self) -> ([f64; 3], [f64; 3]) {
        (self.left_edge, self.right_edge)
    }

    fn identify_base_chunk(&self, selector: &dyn Selector) -> Result<Chunk> {
        let objs: Vec<Arc<Block>> = self
            .blocks
            .iter()
            .filter(|block| selector.intersects(block))
            .cloned()
            .collect();
        Ok(Chunk::new(ChunkKind::All, objs))
    }

    fn chunks<'a>(&'a self, request: ChunkRequest<'a>) -> Result<ChunkIter<'a>> {
        let blocks = self.base_blocks(&request);
        trace!(kind = %request.kind, blocks = blocks.len(), "chunking");
        match request.kind {
            ChunkKind::All => Ok(Box::new(std::iter::once(Ok(Chunk::new(ChunkKind::All, blocks))))),
            ChunkKind::Io => {
                let groups: Vec<Chunk> = blocks
                    .chunks(self.io_group)
                    .map(|group| Chunk::new(ChunkKind::Io, group.to_vec()))
                    .collect();
                Ok(Box::new(groups.into_iter().map(Ok)))
            }
            ChunkKind::Spatial => {
                let options = request.options;
                Ok(Box::new(blocks.into_iter().map(move |block| {
                    let block = if options.ghost_zones > 0 {
                        Arc::new(block.padded(options.ghost_zones, self.dimensionality))
                    } else {
                        block
                    };
                    let mut chunk = Chunk::new(ChunkKind::Spatial, vec![Arc::clone(&block)]);
                    if !options.preload_fields.is_empty() {
                        chunk = chunk.with_preloaded(self.preload(&options.preload_fields, &block));
                    }
                    Ok(chunk)
                })))
            }
        }
    }

    fn read_fluid_fields(&self, fields: &[FieldKey], selector: &dyn Selector, chunk: &Chunk) -> Result<ReadOutcome> {
        self.record(fields);
        let mut outcome = ReadOutcome::default();
        for key in fields {
            let Some(data) = self.fluids.get(key) else {
                outcome.residual.push(key.clone());
                continue;
            };
            let mut values = Vec::new();
            for block in &chunk.objs {
                let block_values = self.block_values(data, block);
                if chunk.is_spatial() {
                    values.extend(block_values);
                } else {
                    let mask = selector.fill_mask(block);
                    values.extend(block_values.into_iter().zip(mask).filter(|(_, keep)| *keep).map(|(v, _)| v));
                }
            }
            outcome.filled.insert(key.clone(), values);
        }
        debug!(filled = outcome.filled.len(), residual = outcome.residual.len(), "fluid read");
        Ok(outcome)
    }

    fn read_particle_fields(&self, fields: &[FieldKey], selector: &dyn Selector, chunk: &Chunk) -> Result<ReadOutcome> {
        self.record(fields);
        let mut outcome = ReadOutcome::default();
        let mut indices: IndexMap<String, Vec<usize>> = IndexMap::new();
        for key in fields {
            let Some(data) = self
                .particles
                .get(&key.category)
                .and_then(|fields| fields.get(&key.name))
            else {
                outcome.residual.push(key.clone());
                continue;
            };
            if !indices.contains_key(&key.category) {
                let selected = self.particle_indices(&key.category, selector, chunk)?;
                indices.insert(key.category.clone(), selected);
            }
            let selected = &indices[&key.category];
            outcome
                .filled
                .insert(key.clone(), selected.iter().map(|&p| data[p]).collect());
        }
        debug!(filled = outcome.filled.len(), residual = outcome.residual.len(), "particle read");
        Ok(outcome)
    }
}

/// Builds a [`MemoryIndex`].
#[derive(Debug, Clone)]
pub struct MemoryIndexBuilder {
    dims: [usize; 3],
    dimensionality: Option<usize>,
    left_edge: [f64; 3],
    dds: Option<[f64; 3]>,
    split: [usize; 3],
    io_group: usize,
    boundary: GhostBoundary,
    fluids: IndexMap<FieldKey, Vec<f64>>,
    particles: IndexMap<String, IndexMap<String, Vec<f64>>>,
}

impl MemoryIndexBuilder {
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            dimensionality: None,
            left_edge: [0.0; 3],
            dds: None,
            split: [1, 1, 1],
            io_group: 2,
            boundary: GhostBoundary::default(),
            fluids: IndexMap::new(),
            particles: IndexMap::new(),
        }
    }

    /// Axes padded with ghost zones, counted from the first. Defaults to
    /// the number of axes longer than one cell.
    pub fn dimensionality(mut self, dimensionality: usize) -> Self {
        self.dimensionality = Some(dimensionality);
        self
    }

    /// Domain origin and cell width. The default is the unit cube.
    pub fn domain(mut self, left_edge: [f64; 3], dds: [f64; 3]) -> Self {
        self.left_edge = left_edge;
        self.dds = Some(dds);
        self
    }

    /// Blocks per axis.
    pub fn split(mut self, split: [usize; 3]) -> Self {
        self.split = split;
        self
    }

    /// Blocks per io chunk.
    pub fn io_group(mut self, io_group: usize) -> Self {
        self.io_group = io_group;
        self
    }

    pub fn boundary(mut self, boundary: GhostBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// A fluid array over the whole domain, in C order.
    pub fn fluid(mut self, key: impl Into<FieldKey>, values: Vec<f64>) -> Self {
        self.fluids.insert(key.into(), values);
        self
    }

    /// A particle array of one category.
    pub fn particles(mut self, category: &str, name: &str, values: Vec<f64>) -> Self {
        self.particles
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string(), values);
        self
    }

    pub fn build(self) -> Result<MemoryIndex> {
        let cells: usize = self.dims.iter().product();
        if cells == 0 {
            return Err(Error::InvalidArgument("domain has no cells".to_string()));
        }
        if self.io_group == 0 {
            return Err(Error::InvalidArgument("io_group must be > 0".to_string()));
        }
        for axis in 0..3 {
            if self.split[axis] == 0 || self.split[axis] > self.dims[axis] {
                return Err(Error::InvalidArgument(format!(
                    "cannot split {} cells into {} blocks along axis {axis}",
                    self.dims[axis], self.split[axis]
                )));
            }
        }
        for (key, values) in &self.fluids {
            if values.len() != cells {
                return Err(Error::LengthMismatch {
                    field: key.clone(),
                    expected: cells,
                    actual: values.len(),
                });
            }
        }
        for (category, fields) in &self.particles {
            let lengths: Vec<usize> = fields.values().map(Vec::len).collect();
            if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
                return Err(Error::Backend(format!(
                    "particle arrays of '{category}' differ in length"
                )));
            }
        }

        let dds = self
            .dds
            .unwrap_or_else(|| std::array::from_fn(|axis| 1.0 / self.dims[axis] as f64));
        let dimensionality = self
            .dimensionality
            .unwrap_or_else(|| self.dims.iter().filter(|&&n| n > 1).count().max(1));

        let bounds = |axis: usize| -> Vec<(usize, usize)> {
            let (n, k) = (self.dims[axis], self.split[axis]);
            (0..k).map(|b| (b * n / k, (b + 1) * n / k)).collect()
        };
        let mut blocks = Vec::new();
        for &(i0, i1) in &bounds(0) {
            for &(j0, j1) in &bounds(1) {
                for &(k0, k1) in &bounds(2) {
                    let start = [i0, j0, k0];
                    blocks.push(Arc::new(Block {
                        id: BlockId(blocks.len()),
                        level: 0,
                        left_index: start.map(|s| s as i64),
                        dims: [i1 - i0, j1 - j0, k1 - k0],
                        padding: [0; 3],
                        left_edge: std::array::from_fn(|axis| self.left_edge[axis] + start[axis] as f64 * dds[axis]),
                        dds,
                    }));
                }
            }
        }
        debug!(cells, blocks = blocks.len(), dimensionality, "memory index built");

        Ok(MemoryIndex {
            dims: self.dims,
            dimensionality,
            left_edge: self.left_edge,
            right_edge: std::array::from_fn(|axis| self.left_edge[axis] + self.dims[axis] as f64 * dds[axis]),
            blocks,
            io_group: self.io_group,
            boundary: self.boundary,
            fluids: self.fluids,
            particles: self.particles,
            reads: Mutex::new(Vec::new()),
        })
    }
}
