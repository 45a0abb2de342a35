//! Fieldscope Engine
//!
//! Lazy field resolution over chunked datasets: containers materialize
//! fields on first access, read what storage holds in bulk and generate
//! derived fields, with ghost-zone stitching and particle assembly.

pub mod chunk;
pub mod config;
pub mod container;
pub mod dataset;
pub mod error;
pub mod field_info;
pub mod filter;
pub mod index;
pub mod memory;
pub mod parameters;
pub mod registry;
pub mod selector;
pub mod store;
pub mod types;
pub mod units;

pub use chunk::{Block, Chunk, ChunkOptions};
pub use config::EngineConfig;
pub use container::{Center, DataContainer, Scope, SelectionContainer};
pub use dataset::{Dataset, DatasetBuilder};
pub use error::{Error, Result};
pub use field_info::{FieldInfo, FieldOutput};
pub use filter::ParticleFilter;
pub use index::{Index, ReadOutcome};
pub use memory::{GhostBoundary, MemoryIndex};
pub use parameters::FieldParameters;
pub use registry::ContainerRegistry;
pub use selector::{AllSelector, CutSelector, RegionSelector, Selector};
pub use store::FieldData;
pub use types::*;
pub use units::{UnitArray, UnitSystem, UnitTable};
