//! Integration test harness for the field resolution engine.
//!
//! Builds small synthetic datasets on top of [`MemoryIndex`] so tests can
//! drive containers end to end and inspect what storage was asked for.
//!
//! The standard dataset is a line of `n` cells over `[0, 1)`:
//!
//! - `("gas", "density")` on disk, `i * i + 1` in g/cm**3
//! - `("gas", "b")` on disk, `i`
//! - `("gas", "velocity_x")` on disk in km/s, stored in cm/s
//! - `("gas", "a")` = `2 * b`, `("gas", "c")` = `a + b`
//! - `("gas", "smoothed")`: three-point mean of density, one ghost zone
//! - `("gas", "density_per_block")`: density scaled by block id + 1, needs
//!   spatial context without ghost zones
//! - `("gas", "offset_b")`: `b` minus the `center` field parameter
//! - `("gas", "broken")`: a generator that always fails
//! - `("io", ...)`: six particles with positions, masses, a doubled mass and
//!   the id of the block holding each particle
//! - particle filter `heavy`: io particles heavier than 2.5 g

use std::sync::Arc;

use fieldscope_engine::{
    AllSelector, Dataset, DatasetBuilder, EngineConfig, Error, FieldInfo, FieldKey, FieldOutput, GhostBoundary, Index,
    MemoryIndex, ParticleFilter, RegionSelector, Result, SelectionContainer,
};

/// Particle x positions; all particles sit at y = z = 0.5.
pub const PARTICLE_X: [f64; 6] = [0.05, 0.15, 0.45, 0.55, 0.75, 0.95];

/// Particle masses in g.
pub const PARTICLE_MASS: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

/// Install a test-friendly tracing subscriber once.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Raw density of the standard dataset.
pub fn density(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i * i + 1) as f64).collect()
}

/// Three-point mean with clamped edges.
pub fn smooth(values: &[f64]) -> Vec<f64> {
    let last = values.len().saturating_sub(1);
    (0..values.len())
        .map(|i| (values[i.saturating_sub(1)] + values[i] + values[(i + 1).min(last)]) / 3.0)
        .collect()
}

fn values(output: &[f64]) -> Option<FieldOutput> {
    Some(FieldOutput::Raw(output.to_vec()))
}

/// Test harness over one synthetic dataset.
pub struct TestHarness {
    index: Arc<MemoryIndex>,
    dataset: Arc<Dataset>,
}

impl TestHarness {
    /// Standard dataset: 10 cells in two blocks.
    pub fn standard() -> Self {
        Self::line(10, 2, EngineConfig::default())
    }

    /// Standard dataset with `n` cells split into `split` blocks.
    pub fn line(n: usize, split: usize, config: EngineConfig) -> Self {
        init_test_logging();
        let index = MemoryIndex::builder([n, 1, 1])
            .split([split, 1, 1])
            .boundary(GhostBoundary::Clamp)
            .fluid(("gas", "density"), density(n))
            .fluid(("gas", "b"), (0..n).map(|i| i as f64).collect())
            .fluid(("gas", "velocity_x"), (0..n).map(|i| i as f64).collect())
            .particles("io", "particle_position_x", PARTICLE_X.to_vec())
            .particles("io", "particle_position_y", vec![0.5; PARTICLE_X.len()])
            .particles("io", "particle_position_z", vec![0.5; PARTICLE_X.len()])
            .particles("io", "particle_mass", PARTICLE_MASS.to_vec())
            .build()
            .expect("standard index");
        Self::with_fields(index, |builder| standard_fields(builder).config(config))
    }

    /// A dataset over `index` with fluid type `gas` and particle type `io`
    /// registered; `fields` adds the rest.
    pub fn with_fields(index: MemoryIndex, fields: impl FnOnce(DatasetBuilder) -> DatasetBuilder) -> Self {
        init_test_logging();
        let index = Arc::new(index);
        let backend: Arc<dyn Index> = index.clone();
        let builder = Dataset::builder("synthetic", backend)
            .fluid_type("gas")
            .particle_type("io");
        let dataset = fields(builder).build().expect("dataset");
        Self { index, dataset }
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.dataset)
    }

    pub fn index(&self) -> &MemoryIndex {
        &self.index
    }

    /// Field lists of every bulk read so far.
    pub fn reads(&self) -> Vec<Vec<FieldKey>> {
        self.index.reads()
    }

    /// A container over the whole domain.
    pub fn all(&self) -> SelectionContainer {
        SelectionContainer::new(self.dataset(), Arc::new(AllSelector))
    }

    /// A container over `[left, right)` along x.
    pub fn slab(&self, left: f64, right: f64) -> SelectionContainer {
        SelectionContainer::new(
            self.dataset(),
            Arc::new(RegionSelector::new([left, 0.0, 0.0], [right, 1.0, 1.0])),
        )
    }
}

/// Fields, particles and the `heavy` filter of the standard dataset.
pub fn standard_fields(builder: DatasetBuilder) -> DatasetBuilder {
    builder
        .field(FieldInfo::on_disk(FieldKey::new("gas", "density"), "g/cm**3"))
        .field(FieldInfo::on_disk(FieldKey::new("gas", "b"), ""))
        .field(FieldInfo::on_disk(FieldKey::new("gas", "velocity_x"), "km/s").output_units("cm/s"))
        .field(
            FieldInfo::derived(FieldKey::new("gas", "a"), "", |c| {
                let b = c.field("b")?;
                Ok(values(&b.values().iter().map(|v| 2.0 * v).collect::<Vec<_>>()))
            })
            .depends_on(["b"]),
        )
        .field(
            FieldInfo::derived(FieldKey::new("gas", "c"), "", |c| {
                let a = c.field("a")?;
                let b = c.field("b")?;
                let sum: Vec<f64> = a.values().iter().zip(b.values()).map(|(a, b)| a + b).collect();
                Ok(values(&sum))
            })
            .depends_on(["a", "b"]),
        )
        .field(
            FieldInfo::derived(FieldKey::new("gas", "smoothed"), "g/cm**3", |c| {
                let density = c.field("density")?;
                Ok(values(&smooth(density.values())))
            })
            .spatial(1)
            .depends_on(["density"]),
        )
        .field(
            FieldInfo::derived(FieldKey::new("gas", "density_per_block"), "g/cm**3", |c| {
                let density = c.field("density")?;
                let scale = c
                    .block()
                    .map(|block| (block.base().id.0 + 1) as f64)
                    .ok_or_else(|| Error::InvalidArgument("needs a block".to_string()))?;
                Ok(values(&density.values().iter().map(|v| v * scale).collect::<Vec<_>>()))
            })
            .spatial(0)
            .depends_on(["density"]),
        )
        .field(
            FieldInfo::derived(FieldKey::new("gas", "offset_b"), "", |c| {
                let center = c
                    .get_field_parameter("center")
                    .map(|center| center.values()[0])
                    .unwrap_or(0.0);
                let b = c.field("b")?;
                Ok(values(&b.values().iter().map(|v| v - center).collect::<Vec<_>>()))
            })
            .depends_on(["b"]),
        )
        .field(FieldInfo::derived(FieldKey::new("gas", "broken"), "", |_| {
            Err(Error::InvalidArgument("broken generator".to_string()))
        }))
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_position_x"), "cm").particle())
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_position_y"), "cm").particle())
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_position_z"), "cm").particle())
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_mass"), "g").particle())
        .field(
            FieldInfo::derived(FieldKey::new("io", "particle_double_mass"), "g", |c| {
                let mass = c.field("particle_mass")?;
                Ok(values(&mass.values().iter().map(|m| 2.0 * m).collect::<Vec<_>>()))
            })
            .particle()
            .depends_on(["particle_mass"]),
        )
        .field(
            FieldInfo::derived(FieldKey::new("io", "particle_block"), "", |c| {
                let mass = c.field("particle_mass")?;
                let id = c
                    .block()
                    .map(|block| block.id.0 as f64)
                    .ok_or_else(|| Error::InvalidArgument("needs a block".to_string()))?;
                Ok(values(&vec![id; mass.len()]))
            })
            .particle()
            .spatial(0)
            .depends_on(["particle_mass"]),
        )
        .particle_filter(ParticleFilter::new("heavy", "io", heavy))
}

fn heavy(container: &mut SelectionContainer) -> Result<Vec<bool>> {
    let mass = container.field("particle_mass")?;
    Ok(mass.values().iter().map(|&m| m > 2.5).collect())
}
