//! A synthetic gas-and-particles dataset for exercising the engine.
//!
//! The domain is a line of `cells` cells over `[0, 1)` with a Gaussian
//! density bump at the centre and a linear temperature ramp. Derived
//! fields cover plain arithmetic, a ghost-zone gradient and a particle
//! field, so one probe run walks every generation path.

use std::f64::consts::PI;
use std::sync::Arc;

use fieldscope_engine::{
    Dataset, EngineConfig, FieldInfo, FieldKey, FieldOutput, GhostBoundary, Index, MemoryIndex, ParticleFilter,
    Result, SelectionContainer,
};
use tracing::debug;

/// Shape of the synthetic dataset.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticShape {
    pub cells: usize,
    pub blocks: usize,
    pub particles: usize,
}

impl Default for SyntheticShape {
    fn default() -> Self {
        Self {
            cells: 64,
            blocks: 4,
            particles: 32,
        }
    }
}

/// Build the synthetic dataset.
pub fn build(shape: SyntheticShape, config: EngineConfig) -> Result<Arc<Dataset>> {
    let n = shape.cells;
    let width = 1.0 / n as f64;
    let centers: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) * width).collect();

    let density = centers
        .iter()
        .map(|x| 1e-24 * (1.0 + 10.0 * (-((x - 0.5) / 0.1).powi(2)).exp()))
        .collect();
    let temperature = centers.iter().map(|x| 1e4 * (1.0 + x)).collect();
    let velocity = centers.iter().map(|x| 10.0 * (2.0 * PI * x).sin()).collect();

    let count = shape.particles;
    let positions: Vec<f64> = (0..count).map(|i| (i as f64 + 0.5) / count as f64).collect();
    let masses: Vec<f64> = (0..count).map(|i| 1e30 * (1 + i % 4) as f64).collect();

    let index = MemoryIndex::builder([n, 1, 1])
        .split([shape.blocks, 1, 1])
        .boundary(GhostBoundary::Periodic)
        .fluid(("gas", "density"), density)
        .fluid(("gas", "temperature"), temperature)
        .fluid(("gas", "velocity_x"), velocity)
        .particles("io", "particle_position_x", positions)
        .particles("io", "particle_position_y", vec![0.5; count])
        .particles("io", "particle_position_z", vec![0.5; count])
        .particles("io", "particle_mass", masses)
        .build()?;
    debug!(cells = n, blocks = shape.blocks, particles = count, "synthetic index built");

    let index: Arc<dyn Index> = Arc::new(index);
    Dataset::builder("synthetic", index)
        .fluid_type("gas")
        .particle_type("io")
        .config(config)
        .field(FieldInfo::on_disk(FieldKey::new("gas", "density"), "g/cm**3"))
        .field(FieldInfo::on_disk(FieldKey::new("gas", "temperature"), "K"))
        .field(FieldInfo::on_disk(FieldKey::new("gas", "velocity_x"), "km/s").output_units("cm/s"))
        .field(
            FieldInfo::derived(FieldKey::new("gas", "pressure_proxy"), "", |c| {
                let density = c.field("density")?;
                let temperature = c.field("temperature")?;
                let product = density
                    .values()
                    .iter()
                    .zip(temperature.values())
                    .map(|(rho, t)| rho * t)
                    .collect();
                Ok(Some(FieldOutput::Raw(product)))
            })
            .depends_on(["density", "temperature"]),
        )
        .field(
            FieldInfo::derived(FieldKey::new("gas", "density_gradient_x"), "", move |c| {
                let density = c.field("density")?;
                Ok(Some(FieldOutput::Raw(central_difference(density.values(), width))))
            })
            .spatial(1)
            .depends_on(["density"]),
        )
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_position_x"), "cm").particle())
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_position_y"), "cm").particle())
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_position_z"), "cm").particle())
        .field(FieldInfo::on_disk(FieldKey::new("io", "particle_mass"), "g").particle())
        .field(
            FieldInfo::derived(FieldKey::new("io", "particle_mass_fraction"), "", |c| {
                let mass = c.field("particle_mass")?;
                let total: f64 = mass.values().iter().sum();
                let fraction = mass
                    .values()
                    .iter()
                    .map(|m| if total > 0.0 { m / total } else { 0.0 })
                    .collect();
                Ok(Some(FieldOutput::Raw(fraction)))
            })
            .particle()
            .depends_on(["particle_mass"]),
        )
        .particle_filter(ParticleFilter::new("massive", "io", massive))
        .build()
}

/// Central difference over a padded array; the ghost layers are dropped by
/// the engine after generation.
fn central_difference(values: &[f64], width: f64) -> Vec<f64> {
    let last = values.len().saturating_sub(1);
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(last);
            if hi == lo {
                0.0
            } else {
                (values[hi] - values[lo]) / ((hi - lo) as f64 * width)
            }
        })
        .collect()
}

fn massive(container: &mut SelectionContainer) -> Result<Vec<bool>> {
    let mass = container.field("particle_mass")?;
    Ok(mass.values().iter().map(|&m| m > 2e30).collect())
}
