//! Selection containers: the lazy field access protocol.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, trace};

use crate::chunk::{Block, Chunk, ChunkOptions};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::field_info::Availability;
use crate::filter::ParticleFilter;
use crate::index::{ChunkIter, ChunkRequest};
use crate::selector::{BlockSelector, Selector};
use crate::store::FieldData;
use crate::types::{ChunkKind, FieldKey, FieldSpec};
use crate::units::UnitArray;

use super::data::{ContainerField, DataContainer};

/// A container whose contents are defined by a [`Selector`].
///
/// Field values are materialized on first access and cached in the
/// container's field store. Requests go through [`SelectionContainer::get_data`],
/// which reads what storage holds in one bulk pass and schedules the rest
/// for generation.
#[derive(Debug, Clone)]
pub struct SelectionContainer {
    pub(crate) data: DataContainer,
    pub(crate) selector: Arc<dyn Selector>,
    /// Whether the container is a single block with full geometric context.
    pub(crate) spatial: bool,
    /// Set for containers wrapping one block.
    pub(crate) block: Option<Arc<Block>>,
    pub(crate) current_chunk: Option<Chunk>,
    pub(crate) locked: bool,
    pub(crate) field_cache: Option<FieldData>,
}

impl SelectionContainer {
    pub fn new(dataset: Arc<Dataset>, selector: Arc<dyn Selector>) -> Self {
        Self {
            data: DataContainer::new(dataset),
            selector,
            spatial: false,
            block: None,
            current_chunk: None,
            locked: false,
            field_cache: None,
        }
    }

    /// Register a field computed from the container itself.
    ///
    /// It is addressed as `("index", name)` or by its bare name.
    pub fn with_container_field<F>(mut self, name: impl Into<String>, units: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut SelectionContainer) -> Result<Vec<f64>> + Send + Sync + 'static,
    {
        self.data.add_container_field(
            name.into(),
            ContainerField {
                units: units.into(),
                function: Arc::new(function),
            },
        );
        self
    }

    /// A container over `selector` that inherits this container's field
    /// parameters and active categories.
    pub(crate) fn child(&self, selector: Arc<dyn Selector>) -> SelectionContainer {
        let mut child = SelectionContainer::new(Arc::clone(self.data.dataset()), selector);
        child
            .data
            .replace_field_parameters(self.data.field_parameters().clone());
        child.data.replace_current_types(
            self.data.current_fluid_type().to_string(),
            self.data.current_particle_type().to_string(),
        );
        child
    }

    /// A spatial container around a single block.
    pub(crate) fn for_block(&self, block: Arc<Block>) -> SelectionContainer {
        let mut obj = self.child(Arc::new(BlockSelector));
        obj.spatial = true;
        obj.current_chunk = Some(Chunk::new(ChunkKind::All, vec![Arc::clone(&block)]));
        obj.block = Some(block);
        obj
    }

    pub fn data(&self) -> &DataContainer {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataContainer {
        &mut self.data
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        self.data.dataset()
    }

    pub fn selector(&self) -> &Arc<dyn Selector> {
        &self.selector
    }

    pub fn is_spatial(&self) -> bool {
        self.spatial
    }

    /// Ghost-zone padding available on this container.
    pub fn ghost_zones(&self) -> usize {
        self.block.as_ref().map_or(0, |block| block.ghost_zones())
    }

    pub fn block(&self) -> Option<&Arc<Block>> {
        self.block.as_ref()
    }

    pub fn current_chunk(&self) -> Option<&Chunk> {
        self.current_chunk.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn field_data(&self) -> &FieldData {
        self.data.field_data()
    }

    pub fn keys(&self) -> Vec<FieldKey> {
        self.data.field_data().keys().cloned().collect()
    }

    pub fn has_field(&self, key: &FieldKey) -> bool {
        self.data.field_data().contains(key)
    }

    pub fn clear_data(&mut self) {
        self.data.field_data_mut().clear();
    }

    pub fn get_field_parameter(&self, name: &str) -> Option<&Arc<UnitArray>> {
        self.data.get_field_parameter(name)
    }

    pub fn set_field_parameter(&mut self, name: impl Into<String>, value: UnitArray) {
        self.data.set_field_parameter(name, value);
    }

    pub fn has_field_parameter(&self, name: &str) -> bool {
        self.data.has_field_parameter(name)
    }

    /// Activate the base chunk if nothing is active yet.
    pub fn establish(&mut self) -> Result<()> {
        if self.current_chunk.is_some() {
            return Ok(());
        }
        let chunk = match &self.block {
            Some(block) => Chunk::new(ChunkKind::All, vec![Arc::clone(block)]),
            None => self
                .data
                .dataset()
                .index()
                .identify_base_chunk(self.selector.as_ref())?,
        };
        debug!(selector = self.selector.name(), blocks = chunk.objs.len(), "base chunk established");
        self.current_chunk = Some(chunk);
        Ok(())
    }

    /// Number of elements the active chunk selects.
    pub fn size(&mut self) -> Result<usize> {
        self.establish()?;
        Ok(self.selected_count())
    }

    pub(crate) fn selected_count(&self) -> usize {
        match &self.current_chunk {
            Some(chunk) if chunk.is_spatial() => chunk.objs.iter().map(|block| block.num_cells()).sum(),
            Some(chunk) => chunk
                .objs
                .iter()
                .map(|block| self.selector.count_cells(block))
                .sum(),
            None => 0,
        }
    }

    pub(crate) fn active_block(&self) -> Result<Arc<Block>> {
        self.current_chunk
            .as_ref()
            .and_then(Chunk::active)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument("no active block".to_string()))
    }

    /// Value of a field, materializing it on first access.
    ///
    /// Repeated reads return the same shared array until the field is
    /// removed or replaced.
    pub fn field(&mut self, spec: impl Into<FieldSpec>) -> Result<Arc<UnitArray>> {
        self.establish()?;
        let key = self.data.determine_field(&spec.into())?;
        self.resolved(&key)
    }

    /// Value of an already canonical field.
    pub(crate) fn resolved(&mut self, key: &FieldKey) -> Result<Arc<UnitArray>> {
        if let Some(array) = self.data.field_data().get(key) {
            return Ok(Arc::clone(array));
        }
        if self.data.is_container_field(key) {
            let array = self.generate_container_field(key)?;
            return Ok(self.data.field_data_mut().insert(key.clone(), array));
        }
        self.get_data_keys(vec![key.clone()])?;
        self.data
            .field_data()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::CouldNotGenerateField(key.clone()))
    }

    /// Store an array under `key` as given.
    pub fn set_field(&mut self, key: impl Into<FieldKey>, array: UnitArray) {
        self.data.field_data_mut().insert(key.into(), array);
    }

    /// Remove a field, canonicalizing the specifier unless it is stored as given.
    pub fn remove_field(&mut self, spec: impl Into<FieldSpec>) -> Result<Option<Arc<UnitArray>>> {
        let spec = spec.into();
        if let Some((category, name)) = spec.explicit()? {
            let key = FieldKey::new(category, name);
            if self.data.field_data().contains(&key) {
                return Ok(self.data.field_data_mut().remove(&key));
            }
        }
        let key = self.data.determine_field(&spec)?;
        Ok(self.data.field_data_mut().remove(&key))
    }

    /// Ensure every requested field is present in the field store.
    pub fn get_data<I>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<FieldSpec>,
    {
        self.establish()?;
        let specs: Vec<FieldSpec> = fields.into_iter().map(Into::into).collect();
        if specs.is_empty() {
            return Ok(());
        }
        let keys = self.data.determine_fields(&specs)?;
        self.get_data_keys(keys)
    }

    #[instrument(skip_all, fields(selector = self.selector.name(), requested = fields.len()))]
    pub(crate) fn get_data_keys(&mut self, fields: Vec<FieldKey>) -> Result<()> {
        self.establish()?;
        let dataset = Arc::clone(self.data.dataset());

        // Fields present before the call plus those requested survive the prune.
        let mut wanted: IndexSet<FieldKey> = self.data.field_data().keys().cloned().collect();
        let mut direct: IndexSet<FieldKey> = IndexSet::new();
        let mut filtered: IndexMap<String, Vec<FieldKey>> = IndexMap::new();
        for key in fields {
            if self.data.field_data().contains(&key) {
                continue;
            }
            wanted.insert(key.clone());
            match dataset.filter(&key.category) {
                Some(filter) => filtered
                    .entry(filter.name.clone())
                    .or_default()
                    .push(key.with_category(&filter.filtered_type)),
                None => {
                    direct.insert(key);
                }
            }
        }
        for (name, keys) in filtered {
            if let Some(filter) = dataset.filter(&name) {
                let filter = Arc::clone(filter);
                self.apply_filter(&filter, keys)?;
            }
        }

        let mut to_get = Vec::new();
        let mut to_generate = Vec::new();
        for key in direct {
            if self.data.field_data().contains(&key) {
                continue;
            }
            if self.data.is_container_field(&key) {
                let array = self.generate_container_field(&key)?;
                self.data.field_data_mut().insert(key, array);
                continue;
            }
            let info = dataset.field_info(&key)?;
            match info.check_available(self) {
                Availability::Ready => to_get.push(key),
                Availability::NeedsGhostZones(_) => to_generate.push(key),
            }
        }
        if !to_get.is_empty() || !to_generate.is_empty() {
            if self.locked {
                trace!(pending = to_get.len() + to_generate.len(), "field store locked");
                return Err(Error::GenerationInProgress {
                    fields: to_get.into_iter().chain(to_generate).collect(),
                });
            }
            self.read_and_generate(to_get, to_generate)?;
        }

        if !dataset.config().retain_dependencies {
            self.data.field_data_mut().retain(|key| wanted.contains(key));
        }
        Ok(())
    }

    /// Read the dependency closure of `to_get` in one bulk pass and generate
    /// whatever storage could not fill.
    fn read_and_generate(&mut self, to_get: Vec<FieldKey>, mut to_generate: Vec<FieldKey>) -> Result<()> {
        let dataset = Arc::clone(self.data.dataset());
        let closure = self.identify_dependencies(&to_get, self.spatial)?;
        let mut fluids = Vec::new();
        let mut particles = Vec::new();
        for key in closure {
            if self.data.field_data().contains(&key) || self.data.is_container_field(&key) {
                continue;
            }
            if dataset.field_info(&key)?.particle_type {
                particles.push(key);
            } else {
                fluids.push(key);
            }
        }

        let chunk = self
            .current_chunk
            .clone()
            .ok_or_else(|| Error::InvalidArgument("no active chunk".to_string()))?;
        let index = Arc::clone(dataset.index());
        let mut residual = Vec::new();
        if !fluids.is_empty() {
            let outcome = index.read_fluid_fields(&fluids, self.selector.as_ref(), &chunk)?;
            self.store_read(outcome.filled, true)?;
            residual.extend(outcome.residual);
        }
        if !particles.is_empty() {
            let outcome = index.read_particle_fields(&particles, self.selector.as_ref(), &chunk)?;
            self.store_read(outcome.filled, false)?;
            residual.extend(outcome.residual);
        }
        debug!(
            fluids = fluids.len(),
            particles = particles.len(),
            residual = residual.len(),
            "bulk read"
        );

        for key in residual {
            if !to_generate.contains(&key) {
                to_generate.push(key);
            }
        }
        if !to_generate.is_empty() {
            self.generate_fields(to_generate)?;
        }
        Ok(())
    }

    fn store_read(&mut self, filled: IndexMap<FieldKey, Vec<f64>>, fluid: bool) -> Result<()> {
        let dataset = Arc::clone(self.data.dataset());
        for (key, values) in filled {
            if fluid {
                self.check_length(&key, values.len())?;
            }
            let info = dataset.field_info(&key)?;
            let mut array = UnitArray::new(values, &info.units);
            array.convert_to(&info.output_units, dataset.units())?;
            self.data.field_data_mut().insert(key, array);
        }
        Ok(())
    }

    pub(crate) fn check_length(&self, key: &FieldKey, actual: usize) -> Result<()> {
        if !self.data.dataset().config().check_lengths {
            return Ok(());
        }
        let expected = self.selected_count();
        if expected != actual {
            return Err(Error::LengthMismatch {
                field: key.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn generate_container_field(&mut self, key: &FieldKey) -> Result<UnitArray> {
        let field = self
            .data
            .container_field(&key.name)
            .cloned()
            .ok_or_else(|| Error::FieldNotFound(key.clone()))?;
        let values = (field.function)(self)?;
        Ok(UnitArray::new(values, field.units))
    }

    /// Fetch `fields` of the filtered category and store their masked subsets
    /// under the filter's name. Arrays fetched only to evaluate the predicate
    /// are not kept.
    fn apply_filter(&mut self, filter: &ParticleFilter, fields: Vec<FieldKey>) -> Result<()> {
        let chunk = self
            .current_chunk
            .clone()
            .ok_or_else(|| Error::InvalidArgument("no active chunk".to_string()))?;
        let (mask, fetched) = {
            let mut scope = self.chunked_read(chunk);
            let mut typed = scope.field_type_state(&filter.filtered_type, true);
            let mask = filter.mask(&mut typed)?;
            typed.get_data_keys(fields.clone())?;
            (mask, typed.field_data().clone())
        };

        for key in fields {
            let array = fetched
                .get(&key)
                .ok_or_else(|| Error::CouldNotGenerateField(key.clone()))?;
            if array.len() != mask.len() {
                return Err(Error::IllDefinedFilter {
                    filter: filter.name.clone(),
                    field: key.clone(),
                    field_len: array.len(),
                    mask_len: mask.len(),
                });
            }
            self.data
                .field_data_mut()
                .insert(key.with_category(&filter.name), array.masked(&mask));
        }
        debug!(filter = %filter.name, kept = mask.iter().filter(|&&keep| keep).count(), "particle filter applied");
        Ok(())
    }

    /// Visit the chunks of this container's selection.
    ///
    /// Each chunk is activated with a fresh field store, `fields` are
    /// fetched into it and `visit` runs against the container. The previous
    /// chunk and store are restored afterwards.
    pub fn chunks<F>(&mut self, fields: &[FieldSpec], kind: ChunkKind, options: ChunkOptions, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut SelectionContainer) -> Result<()>,
    {
        self.establish()?;
        let keys = self.data.determine_fields(fields)?;
        let dataset = Arc::clone(self.data.dataset());
        let selector = Arc::clone(&self.selector);
        let within = self.current_chunk.clone();

        let chunks: ChunkIter<'_> = match &self.block {
            Some(block) => {
                if options.ghost_zones > block.ghost_zones() {
                    return Err(Error::InvalidArgument(format!(
                        "{} carries {} ghost zones, {} requested",
                        block.id,
                        block.ghost_zones(),
                        options.ghost_zones
                    )));
                }
                let chunk = Chunk::new(kind, vec![Arc::clone(block)]);
                Box::new(std::iter::once(Ok(chunk)))
            }
            None => dataset.index().chunks(ChunkRequest {
                selector: selector.as_ref(),
                kind,
                options: &options,
                within: within.as_ref(),
            })?,
        };

        for chunk in chunks {
            let mut scope = self.chunked_read(chunk?);
            if !keys.is_empty() {
                scope.get_data_keys(keys.clone())?;
            }
            visit(&mut *scope)?;
        }
        Ok(())
    }

    /// Visit every block intersecting the selection with its cell mask.
    pub fn for_each_block<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&Block, &[bool]) -> Result<()>,
    {
        let selector = Arc::clone(&self.selector);
        self.chunks(&[], ChunkKind::Io, ChunkOptions::default(), |io| {
            io.chunks(&[], ChunkKind::Spatial, ChunkOptions::default(), |sp| {
                let block = sp.active_block()?;
                let mask = selector.fill_mask(&block);
                if mask.iter().any(|&keep| keep) {
                    visit(&block, &mask)?;
                }
                Ok(())
            })
        })
    }

    pub(crate) fn selected_cells(&mut self) -> Result<Vec<(Arc<Block>, usize)>> {
        self.establish()?;
        let Some(chunk) = &self.current_chunk else {
            return Ok(Vec::new());
        };
        let mut cells = Vec::new();
        for block in &chunk.objs {
            let mask = if chunk.is_spatial() {
                vec![true; block.num_cells()]
            } else {
                self.selector.fill_mask(block)
            };
            cells.extend(
                mask.iter()
                    .enumerate()
                    .filter(|(_, keep)| **keep)
                    .map(|(flat, _)| (Arc::clone(block), flat)),
            );
        }
        Ok(cells)
    }

    /// Centers of the selected cells.
    pub fn fcoords(&mut self) -> Result<Vec<[f64; 3]>> {
        Ok(self
            .selected_cells()?
            .into_iter()
            .map(|(block, flat)| block.cell_center(flat))
            .collect())
    }

    /// Global integer indices of the selected cells.
    pub fn icoords(&mut self) -> Result<Vec<[i64; 3]>> {
        Ok(self
            .selected_cells()?
            .into_iter()
            .map(|(block, flat)| block.global_index(flat))
            .collect())
    }

    /// Widths of the selected cells.
    pub fn fwidth(&mut self) -> Result<Vec<[f64; 3]>> {
        Ok(self
            .selected_cells()?
            .into_iter()
            .map(|(block, _)| block.dds)
            .collect())
    }

    /// Refinement levels of the selected cells.
    pub fn ires(&mut self) -> Result<Vec<usize>> {
        Ok(self
            .selected_cells()?
            .into_iter()
            .map(|(block, _)| block.level)
            .collect())
    }
}
