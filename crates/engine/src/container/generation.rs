//! Dependency closure and the generation scheduler.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, instrument, trace, warn};

use crate::chunk::{Chunk, ChunkOptions, strip_ghost_zones};
use crate::error::{Error, Result};
use crate::field_info::{Availability, FieldInfo, FieldOutput};
use crate::index::ChunkRequest;
use crate::store::FieldData;
use crate::types::{ChunkKind, FieldKey, PARTICLE_POSITION_FIELDS};
use crate::units::UnitArray;

use super::SelectionContainer;

/// Result of one generation attempt.
#[derive(Debug)]
enum Generated {
    Produced(UnitArray),
    /// The generator asked for fields that are not materialized yet.
    NeedsFields(Vec<FieldKey>),
}

impl SelectionContainer {
    /// Transitive closure of the dependencies of `fields`.
    ///
    /// Fields that need spatial context are not expanded unless `spatial`
    /// is set; they are generated later with their own context. Discovery
    /// failures are logged and the field is treated as having no
    /// dependencies.
    pub fn identify_dependencies(&self, fields: &[FieldKey], spatial: bool) -> Result<Vec<FieldKey>> {
        let dataset = Arc::clone(self.data.dataset());
        let mut closure: IndexSet<FieldKey> = fields.iter().cloned().collect();
        let mut inspected = 0;
        while let Some(field) = closure.get_index(inspected).cloned() {
            inspected += 1;
            if self.data.is_container_field(&field) {
                continue;
            }
            let info = dataset.field_info(&field)?;
            if !spatial && info.ghost_zones.is_some() {
                continue;
            }
            let dependencies = match dataset.cached_dependencies(&field) {
                Some(dependencies) => dependencies,
                None => match info.get_dependencies(&dataset) {
                    Ok(dependencies) => dataset.cache_dependencies(field.clone(), dependencies),
                    Err(err) => {
                        warn!(field = %field, error = %err, "dependency discovery failed");
                        continue;
                    }
                },
            };
            for dependency in self.data.determine_fields(&dependencies)? {
                closure.insert(dependency);
            }
        }
        trace!(requested = fields.len(), closure = closure.len(), "dependencies identified");
        Ok(closure.into_iter().collect())
    }

    /// Generate every queued field, round-robin, under the field lock.
    ///
    /// A generator that needs fields which are not materialized yet has
    /// them appended to the queue and is retried later. A full lap over
    /// the missing fields without progress, or exhausting the attempt
    /// ceiling, fails with [`Error::CircularDependency`].
    #[instrument(skip_all, fields(queued = fields.len()))]
    pub(crate) fn generate_fields(&mut self, fields: Vec<FieldKey>) -> Result<()> {
        let max_passes = self.data.dataset().config().max_generation_passes;
        let mut queue: IndexSet<FieldKey> = fields.into_iter().collect();
        let mut locked = self.field_lock();

        let mut cursor = 0;
        let mut attempts = 0;
        let mut stalled = 0;
        loop {
            let missing: Vec<FieldKey> = queue
                .iter()
                .filter(|key| !locked.data.field_data().contains(key))
                .cloned()
                .collect();
            if missing.is_empty() {
                break;
            }
            if stalled >= missing.len() || attempts >= max_passes * queue.len() {
                warn!(fields = ?missing, attempts, "generation made no progress");
                return Err(Error::CircularDependency { fields: missing });
            }

            let Some(field) = queue.get_index(cursor % queue.len()).cloned() else {
                break;
            };
            cursor += 1;
            if locked.data.field_data().contains(&field) {
                continue;
            }
            attempts += 1;

            match locked.generate_field(&field)? {
                Generated::Produced(array) => {
                    locked.check_generated(&field, &array)?;
                    locked.data.field_data_mut().insert(field, array);
                    stalled = 0;
                }
                Generated::NeedsFields(needed) => {
                    let before = queue.len();
                    queue.extend(needed);
                    if queue.len() > before {
                        stalled = 0;
                    } else {
                        stalled += 1;
                    }
                    trace!(field = %field, queued = queue.len(), "generation deferred");
                }
            }
        }
        debug!(generated = queue.len(), attempts, "generation finished");
        Ok(())
    }

    fn check_generated(&self, field: &FieldKey, array: &UnitArray) -> Result<()> {
        let particle = self.data.dataset().field_info(field)?.particle_type;
        if particle {
            Ok(())
        } else {
            self.check_length(field, array.len())
        }
    }

    fn generate_field(&mut self, field: &FieldKey) -> Result<Generated> {
        let dataset = Arc::clone(self.data.dataset());
        let info = dataset.field_info(field)?;
        let outcome = {
            let mut typed = self.field_type_state(&field.category, info.particle_type);
            if info.particle_type {
                typed.generate_particle_field(field, &info)
            } else {
                typed.generate_fluid_field(field, &info)
            }
        };
        match outcome {
            Ok(Some(output)) => {
                let mut array = output.into_array(&info.units);
                array.convert_to(&info.output_units, dataset.units())?;
                Ok(Generated::Produced(array))
            }
            Ok(None) => Err(Error::CouldNotGenerateField(field.clone())),
            Err(Error::GenerationInProgress { fields }) => Ok(Generated::NeedsFields(fields)),
            Err(err) => Err(err),
        }
    }

    /// Run the field's generator, or read it when storage holds it.
    fn evaluate(&mut self, field: &FieldKey, info: &FieldInfo) -> Result<Option<FieldOutput>> {
        if let Some(function) = info.function() {
            let function = Arc::clone(function);
            return function(self);
        }
        let dataset = Arc::clone(self.data.dataset());
        if !dataset.is_on_disk(field) {
            return Ok(None);
        }
        let chunk = self
            .current_chunk
            .clone()
            .ok_or_else(|| Error::InvalidArgument("no active chunk".to_string()))?;
        let index = dataset.index();
        let fields = std::slice::from_ref(field);
        let mut outcome = if info.particle_type {
            index.read_particle_fields(fields, self.selector.as_ref(), &chunk)?
        } else {
            index.read_fluid_fields(fields, self.selector.as_ref(), &chunk)?
        };
        Ok(outcome
            .filled
            .shift_remove(field)
            .map(|values| FieldOutput::Tagged(UnitArray::new(values, &info.units))))
    }

    /// A container for the active block of a spatial chunk, with the
    /// chunk's read-ahead values staged.
    fn block_generator(&self, chunk: &Chunk) -> Result<SelectionContainer> {
        let block = chunk
            .active()
            .cloned()
            .ok_or_else(|| Error::InvalidArgument("spatial chunk without a block".to_string()))?;
        let mut obj = self.for_block(block);
        if let Some(preloaded) = &chunk.preloaded {
            let dataset = Arc::clone(self.data.dataset());
            let mut cache = FieldData::new();
            for (key, values) in preloaded {
                let info = dataset.field_info(key)?;
                let mut array = UnitArray::new(values.clone(), &info.units);
                array.convert_to(&info.output_units, dataset.units())?;
                cache.insert(key.clone(), array);
            }
            obj.initialize_cache(cache);
        }
        Ok(obj)
    }

    fn generate_fluid_field(&mut self, field: &FieldKey, info: &FieldInfo) -> Result<Option<FieldOutput>> {
        if let Some(chunk) = self.current_chunk.as_ref().filter(|chunk| chunk.is_spatial()) {
            let mut obj = self.block_generator(chunk)?;
            return match info.check_available(&obj) {
                Availability::Ready => {
                    let mut active = obj.activate_cache();
                    active.evaluate(field, info)
                }
                Availability::NeedsGhostZones(required) => Err(Error::GhostZonesUnavailable {
                    field: field.clone(),
                    required,
                    available: obj.ghost_zones(),
                }),
            };
        }
        match info.check_available(self) {
            Availability::Ready => self.evaluate(field, info),
            Availability::NeedsGhostZones(required) if self.block.is_some() => {
                Err(Error::GhostZonesUnavailable {
                    field: field.clone(),
                    required,
                    available: self.ghost_zones(),
                })
            }
            Availability::NeedsGhostZones(required) => {
                self.generate_spatial_fluid(field, info, required).map(Some)
            }
        }
    }

    /// Assemble a fluid field block by block.
    ///
    /// Without ghost zones each block is evaluated with its read-ahead
    /// dependencies and the selected cells are copied out. With ghost zones
    /// each padded block is evaluated, stripped back to its interior and
    /// then selected.
    #[instrument(skip_all, fields(field = %field, ghost_zones))]
    fn generate_spatial_fluid(&mut self, field: &FieldKey, info: &FieldInfo, ghost_zones: usize) -> Result<FieldOutput> {
        let size = self.selected_count();
        let mut values = vec![0.0; size];
        let mut written = 0;
        let selector = Arc::clone(&self.selector);

        if ghost_zones == 0 {
            let preload = self.identify_dependencies(std::slice::from_ref(field), true)?;
            self.chunks(&[], ChunkKind::Io, ChunkOptions::default(), |io| {
                let options = ChunkOptions::default().preload(preload.clone());
                io.chunks(&[], ChunkKind::Spatial, options, |sp| {
                    let block = sp.active_block()?;
                    let array = sp.resolved(field)?;
                    let copied = block.select(selector.as_ref(), array.values(), &mut values, written)?;
                    written += copied;
                    Ok(())
                })
            })?;
        } else {
            let dataset = Arc::clone(self.data.dataset());
            let within = self.current_chunk.clone();
            let options = ChunkOptions::default().ghost_zones(ghost_zones);
            let chunks = dataset.index().chunks(ChunkRequest {
                selector: selector.as_ref(),
                kind: ChunkKind::Spatial,
                options: &options,
                within: within.as_ref(),
            })?;
            for chunk in chunks {
                let scope = self.chunked_read(chunk?);
                let padded = scope.active_block()?;
                let mut obj = scope.for_block(Arc::clone(&padded));
                let array = obj.resolved(field)?;
                let interior = strip_ghost_zones(field, &padded, array.values())?;
                let copied = padded
                    .base()
                    .select(selector.as_ref(), &interior, &mut values, written)?;
                written += copied;
            }
        }

        if written != size {
            return Err(Error::LengthMismatch {
                field: field.clone(),
                expected: size,
                actual: written,
            });
        }
        Ok(FieldOutput::Tagged(UnitArray::new(values, &info.output_units)))
    }

    fn generate_particle_field(&mut self, field: &FieldKey, info: &FieldInfo) -> Result<Option<FieldOutput>> {
        if let Some(chunk) = self.current_chunk.as_ref().filter(|chunk| chunk.is_spatial()) {
            let mut obj = self.block_generator(chunk)?;
            return match info.check_available(&obj) {
                Availability::Ready => {
                    let mut active = obj.activate_cache();
                    active.evaluate(field, info)
                }
                Availability::NeedsGhostZones(ghost_zones) => {
                    Err(Error::ParticleGhostZonesUnsupported {
                        field: field.clone(),
                        ghost_zones,
                    })
                }
            };
        }
        match info.check_available(self) {
            Availability::Ready => self.evaluate(field, info),
            Availability::NeedsGhostZones(0) => {
                self.generate_spatial_particles(field, info).map(Some)
            }
            Availability::NeedsGhostZones(ghost_zones) => Err(Error::ParticleGhostZonesUnsupported {
                field: field.clone(),
                ghost_zones,
            }),
        }
    }

    /// Assemble a particle field block by block into an array sized by a
    /// prior count.
    #[instrument(skip_all, fields(field = %field))]
    fn generate_spatial_particles(&mut self, field: &FieldKey, info: &FieldInfo) -> Result<FieldOutput> {
        let size = self.count_particles(&field.category)?;
        let mut values = vec![0.0; size];
        let mut filled = 0;
        let selector = Arc::clone(&self.selector);
        let category = field.category.clone();

        self.chunks(&[], ChunkKind::Io, ChunkOptions::default(), |io| {
            io.chunks(&[], ChunkKind::Spatial, ChunkOptions::default(), |sp| {
                let block = sp.active_block()?;
                let [x, y, z] = sp.particle_positions(&category)?;
                if x.is_empty() {
                    return Ok(());
                }
                let Some(mask) = selector.select_particles(&block, x.values(), y.values(), z.values()) else {
                    return Ok(());
                };
                let array = sp.resolved(field)?;
                if array.len() != mask.len() {
                    return Err(Error::LengthMismatch {
                        field: field.clone(),
                        expected: mask.len(),
                        actual: array.len(),
                    });
                }
                for value in array.values().iter().zip(&mask).filter(|(_, keep)| **keep).map(|(value, _)| *value) {
                    let slot = values.get_mut(filled).ok_or_else(|| Error::ParticleCountMismatch {
                        field: field.clone(),
                        counted: size,
                        filled: filled + 1,
                    })?;
                    *slot = value;
                    filled += 1;
                }
                Ok(())
            })
        })?;

        if filled != size {
            return Err(Error::ParticleCountMismatch {
                field: field.clone(),
                counted: size,
                filled,
            });
        }
        Ok(FieldOutput::Tagged(UnitArray::new(values, &info.output_units)))
    }

    pub(crate) fn particle_positions(&mut self, category: &str) -> Result<[Arc<UnitArray>; 3]> {
        let [x, y, z] = PARTICLE_POSITION_FIELDS.map(|name| FieldKey::new(category, name));
        Ok([self.resolved(&x)?, self.resolved(&y)?, self.resolved(&z)?])
    }

    /// Number of particles of `category` in the selection.
    ///
    /// Any cached field of the category already has the right length;
    /// otherwise positions are read block by block and counted.
    pub fn count_particles(&mut self, category: &str) -> Result<usize> {
        if let Some(count) = self.data.field_data().category_len(category) {
            return Ok(count);
        }
        let selector = Arc::clone(&self.selector);
        let mut count = 0;
        self.chunks(&[], ChunkKind::Io, ChunkOptions::default(), |io| {
            io.chunks(&[], ChunkKind::Spatial, ChunkOptions::default(), |sp| {
                let block = sp.active_block()?;
                let [x, y, z] = sp.particle_positions(category)?;
                if !x.is_empty() {
                    count += selector.count_particles(&block, x.values(), y.values(), z.values());
                }
                Ok(())
            })
        })?;
        debug!(category, count, "particles counted");
        Ok(count)
    }
}
