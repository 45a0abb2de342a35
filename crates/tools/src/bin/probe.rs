//! Probe the synthetic dataset through a container.
//!
//! Resolves the requested fields on an `all` or `region` container and
//! reports per-field statistics.
//!
//! Usage:
//!   fieldscope-probe density pressure_proxy --region 0.25 0.75
//!   fieldscope-probe io:particle_mass --config engine.json --json
//!   fieldscope-probe density --center max_temperature

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

use fieldscope_engine::{ContainerRegistry, EngineConfig, FieldKey, FieldSpec};
use fieldscope_tools::stats::FieldStats;
use fieldscope_tools::synthetic::{self, SyntheticShape};

#[derive(Parser, Debug)]
#[command(name = "fieldscope-probe")]
#[command(about = "Resolve fields on the synthetic dataset and report statistics")]
struct Args {
    /// Fields to resolve, as `name` or `category:name`
    #[arg(required = true)]
    fields: Vec<String>,

    /// Number of cells along x
    #[arg(long, default_value = "64")]
    cells: usize,

    /// Number of blocks along x
    #[arg(long, default_value = "4")]
    blocks: usize,

    /// Number of particles
    #[arg(long, default_value = "32")]
    particles: usize,

    /// Restrict to the slab [LEFT, RIGHT) along x
    #[arg(long, num_args = 2, value_names = ["LEFT", "RIGHT"])]
    region: Option<Vec<f64>>,

    /// Container center: `c`, `max`, `max_<field>` or `X,Y,Z` in cm
    #[arg(long)]
    center: Option<String>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print statistics as JSON instead of logging them
    #[arg(long)]
    json: bool,
}

fn parse_field(field: &str) -> FieldSpec {
    match field.split_once(':') {
        Some((category, name)) => FieldSpec::from(FieldKey::new(category, name)),
        None => FieldSpec::from(field),
    }
}

fn parse_center(center: &str) -> Result<serde_json::Value> {
    if !center.contains(',') {
        return Ok(json!(center));
    }
    let point = center
        .split(',')
        .map(|value| value.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("parsing center {center}"))?;
    Ok(json!(point))
}

fn main() -> Result<()> {
    fieldscope_tools::init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.blocks == 0 || args.blocks > args.cells {
        bail!("--blocks must be between 1 and --cells ({})", args.cells);
    }

    let shape = SyntheticShape {
        cells: args.cells,
        blocks: args.blocks,
        particles: args.particles,
    };
    let dataset = synthetic::build(shape, config).context("building synthetic dataset")?;

    let mut container_args = match &args.region {
        Some(edges) => json!({"left": [edges[0], 0.0, 0.0], "right": [edges[1], 1.0, 1.0]}),
        None => json!({}),
    };
    if let Some(center) = &args.center {
        container_args["center"] = parse_center(center)?;
    }
    let kind = if args.region.is_some() { "region" } else { "all" };
    let registry = ContainerRegistry::new();
    let mut container = registry.create(kind, dataset, &container_args)?;
    info!(cells = container.size()?, "container established");

    let mut report = Vec::with_capacity(args.fields.len());
    for field in &args.fields {
        match container.field(parse_field(field)) {
            Ok(array) => report.push(FieldStats::of(field.as_str(), &array)),
            Err(err) => {
                error!("{}: {}", field, err);
                bail!("could not resolve {field}");
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for stats in &report {
            info!(
                field = %stats.field,
                units = %stats.units,
                count = stats.count,
                min = ?stats.min,
                max = ?stats.max,
                mean = ?stats.mean,
                "field resolved"
            );
        }
    }
    Ok(())
}
