//! Selection capability.
//!
//! The engine never computes intersections itself; it asks a [`Selector`]
//! which cells of a block and which particles fall inside the selection.

use std::fmt;
use std::sync::Arc;

use crate::chunk::Block;

/// Decides which elements of a block belong to a selection.
pub trait Selector: Send + Sync + fmt::Debug {
    /// Type name, used for logging and registry lookup.
    fn name(&self) -> &str;

    /// Whether a point is inside the selection.
    fn select_point(&self, point: [f64; 3]) -> bool;

    /// Per-cell inclusion mask over the block, in C order.
    fn fill_mask(&self, block: &Block) -> Vec<bool> {
        (0..block.num_cells())
            .map(|flat| self.select_point(block.cell_center(flat)))
            .collect()
    }

    fn count_cells(&self, block: &Block) -> usize {
        self.fill_mask(block).into_iter().filter(|&keep| keep).count()
    }

    /// Whether any cell of the block is selected.
    fn intersects(&self, block: &Block) -> bool {
        self.count_cells(block) > 0
    }

    /// Particle membership mask, or `None` when nothing is selected.
    fn select_particles(&self, _block: &Block, x: &[f64], y: &[f64], z: &[f64]) -> Option<Vec<bool>> {
        let mask: Vec<bool> = x
            .iter()
            .zip(y)
            .zip(z)
            .map(|((&x, &y), &z)| self.select_point([x, y, z]))
            .collect();
        mask.iter().any(|&keep| keep).then_some(mask)
    }

    fn count_particles(&self, block: &Block, x: &[f64], y: &[f64], z: &[f64]) -> usize {
        self.select_particles(block, x, y, z)
            .map(|mask| mask.into_iter().filter(|&keep| keep).count())
            .unwrap_or(0)
    }
}

/// Selects everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllSelector;

impl Selector for AllSelector {
    fn name(&self) -> &str {
        "all"
    }

    fn select_point(&self, _point: [f64; 3]) -> bool {
        true
    }

    fn fill_mask(&self, block: &Block) -> Vec<bool> {
        vec![true; block.num_cells()]
    }

    fn count_cells(&self, block: &Block) -> usize {
        block.num_cells()
    }
}

/// Selects every cell of the block it is applied to, ghost cells included.
///
/// Used by the containers the engine builds around individual blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockSelector;

impl Selector for BlockSelector {
    fn name(&self) -> &str {
        "block"
    }

    fn select_point(&self, _point: [f64; 3]) -> bool {
        true
    }

    fn fill_mask(&self, block: &Block) -> Vec<bool> {
        vec![true; block.num_cells()]
    }

    fn count_cells(&self, block: &Block) -> usize {
        block.num_cells()
    }

    fn select_particles(&self, block: &Block, x: &[f64], y: &[f64], z: &[f64]) -> Option<Vec<bool>> {
        let mask: Vec<bool> = x
            .iter()
            .zip(y)
            .zip(z)
            .map(|((&x, &y), &z)| block.contains_point([x, y, z]))
            .collect();
        mask.iter().any(|&keep| keep).then_some(mask)
    }
}

/// Axis-aligned box `[left, right)`; cells are selected by their centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSelector {
    pub left: [f64; 3],
    pub right: [f64; 3],
}

impl RegionSelector {
    pub fn new(left: [f64; 3], right: [f64; 3]) -> Self {
        Self { left, right }
    }
}

impl Selector for RegionSelector {
    fn name(&self) -> &str {
        "region"
    }

    fn select_point(&self, point: [f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.left[axis] && point[axis] < self.right[axis])
    }

    fn intersects(&self, block: &Block) -> bool {
        let right = block.right_edge();
        (0..3).all(|axis| block.left_edge[axis] < self.right[axis] && right[axis] > self.left[axis])
            && self.count_cells(block) > 0
    }
}

/// The cells of a parent selection that passed a predicate.
///
/// Holds one mask per unpadded block. Cells are matched by refinement level
/// and global index, so padded views of the same blocks resolve too.
#[derive(Debug, Clone, Default)]
pub struct CutSelector {
    cells: Vec<(Arc<Block>, Vec<bool>)>,
}

impl CutSelector {
    /// `cells` pairs each unpadded block with its per-cell mask.
    pub fn new(cells: Vec<(Arc<Block>, Vec<bool>)>) -> Self {
        Self { cells }
    }

    fn lookup(&self, level: usize, global: [i64; 3]) -> bool {
        self.cells
            .iter()
            .filter(|(block, _)| block.level == level)
            .find_map(|(block, mask)| block.flat_index(global).and_then(|flat| mask.get(flat).copied()))
            .unwrap_or(false)
    }
}

impl Selector for CutSelector {
    fn name(&self) -> &str {
        "cut_region"
    }

    fn select_point(&self, point: [f64; 3]) -> bool {
        self.cells
            .iter()
            .find_map(|(block, mask)| block.cell_of(point).and_then(|flat| mask.get(flat).copied()))
            .unwrap_or(false)
    }

    fn fill_mask(&self, block: &Block) -> Vec<bool> {
        (0..block.num_cells())
            .map(|flat| self.lookup(block.level, block.global_index(flat)))
            .collect()
    }
}
