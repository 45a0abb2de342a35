//! Cut regions: sub-selections defined by a predicate over resolved fields.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::chunk::Block;
use crate::error::{Error, Result};
use crate::selector::CutSelector;
use crate::types::BlockId;

use super::SelectionContainer;

impl SelectionContainer {
    /// A child container holding the cells of this selection for which
    /// `cut` returns true.
    ///
    /// `cut` runs against this container and returns one flag per selected
    /// cell, in selection order. The child inherits field parameters and
    /// active categories; particles are kept when the cell holding them
    /// passed the cut.
    pub fn cut_region<F>(&mut self, cut: F) -> Result<SelectionContainer>
    where
        F: FnOnce(&mut SelectionContainer) -> Result<Vec<bool>>,
    {
        let cells = self.selected_cells()?;
        let flags = cut(self)?;
        if flags.len() != cells.len() {
            return Err(Error::IllDefinedCut {
                expected: cells.len(),
                actual: flags.len(),
            });
        }

        let mut kept = 0;
        let mut masks: IndexMap<BlockId, (Block, Vec<bool>)> = IndexMap::new();
        for ((block, flat), keep) in cells.into_iter().zip(flags) {
            if !keep {
                continue;
            }
            let global = block.global_index(flat);
            let (base, mask) = masks.entry(block.id).or_insert_with(|| {
                let base = block.base();
                let cells = base.num_cells();
                (base, vec![false; cells])
            });
            if let Some(flat) = base.flat_index(global)
                && let Some(slot) = mask.get_mut(flat)
            {
                *slot = true;
                kept += 1;
            }
        }
        debug!(blocks = masks.len(), cells = kept, "cut region built");

        let selector = CutSelector::new(
            masks
                .into_values()
                .map(|(block, mask)| (Arc::new(block), mask))
                .collect(),
        );
        Ok(self.child(Arc::new(selector)))
    }
}
