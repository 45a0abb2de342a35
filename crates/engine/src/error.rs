//! Errors raised while resolving fields.
//!
//! Resolution errors fall into three groups:
//!
//! - **Validation**: [`Error::FieldNotFound`], [`Error::FieldTypeMismatch`],
//!   [`Error::FieldNotParseable`]. Raised while canonicalizing specifiers,
//!   before the field store is touched.
//! - **Generation**: [`Error::CouldNotGenerateField`],
//!   [`Error::CircularDependency`], [`Error::ParticleGhostZonesUnsupported`],
//!   [`Error::GhostZonesUnavailable`], [`Error::IllDefinedFilter`],
//!   [`Error::ParticleCountMismatch`]. These abort the whole `get_data` call;
//!   fields completed before the failure stay cached. [`Error::IllDefinedCut`]
//!   is raised the same way while building a cut region.
//! - **Collaborators**: backend, unit and configuration failures.
//!
//! [`Error::GenerationInProgress`] is not a user-facing error. It is the
//! signal a nested acquisition raises while the container is locked, and the
//! generation scheduler always absorbs it.

use thiserror::Error;

use crate::types::FieldKey;

/// Engine result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, reading or generating fields.
#[derive(Debug, Error)]
pub enum Error {
    /// The specifier resolves to no raw, derived or container field.
    #[error("field not found: {0}")]
    FieldNotFound(FieldKey),

    /// The category does not match the particle/fluid nature of the field.
    #[error("field type mismatch for {field}: '{category}' is not a known {expected} type")]
    FieldTypeMismatch {
        /// The resolved field.
        field: FieldKey,
        /// The offending category.
        category: String,
        /// `"particle"` or `"fluid"`.
        expected: &'static str,
    },

    /// An explicit specifier was malformed (wrong arity or non-string parts).
    #[error("could not parse field specifier: {0}")]
    FieldNotParseable(String),

    /// A nested acquisition needed generation while the container was locked.
    ///
    /// Carries the fields that are still unmet so the scheduler can requeue
    /// them.
    #[error("generation already in progress; deferred fields: {fields:?}")]
    GenerationInProgress {
        /// Fields the nested request could not satisfy.
        fields: Vec<FieldKey>,
    },

    /// A generator ran but produced no usable result.
    #[error("could not generate field {0}")]
    CouldNotGenerateField(FieldKey),

    /// The generation queue stopped making progress.
    #[error("circular dependency among fields {fields:?}")]
    CircularDependency {
        /// Fields still missing when the scheduler gave up.
        fields: Vec<FieldKey>,
    },

    /// Particle fields cannot be generated with ghost-zone padding.
    #[error("particle field {field} requested {ghost_zones} ghost zones; only zero is supported")]
    ParticleGhostZonesUnsupported {
        /// The particle field.
        field: FieldKey,
        /// Requested ghost-zone width.
        ghost_zones: usize,
    },

    /// A sub-object container was asked for wider padding than it carries.
    #[error("field {field} needs {required} ghost zones but the block carries {available}")]
    GhostZonesUnavailable {
        /// The field being generated.
        field: FieldKey,
        /// Width required by the field.
        required: usize,
        /// Width available on the block.
        available: usize,
    },

    /// A particle filter mask does not line up with a fetched array.
    #[error("filter '{filter}' has {mask_len} entries but {field} has {field_len}")]
    IllDefinedFilter {
        /// Filter name.
        filter: String,
        /// Field the mask was applied to.
        field: FieldKey,
        /// Length of the field array.
        field_len: usize,
        /// Length of the filter mask.
        mask_len: usize,
    },

    /// A cut-region predicate returned the wrong number of flags.
    #[error("cut region predicate returned {actual} flags for {expected} selected cells")]
    IllDefinedCut {
        /// Cells selected by the parent.
        expected: usize,
        /// Flags returned by the predicate.
        actual: usize,
    },

    /// The fill pass did not match the counting pass.
    #[error("particle field {field}: counted {counted} particles but filled {filled}")]
    ParticleCountMismatch {
        /// The particle field.
        field: FieldKey,
        /// Result of the counting pass.
        counted: usize,
        /// Elements written by the fill pass.
        filled: usize,
    },

    /// An array does not match the element count of the active chunk.
    #[error("field {field} has {actual} elements, expected {expected}")]
    LengthMismatch {
        /// The offending field.
        field: FieldKey,
        /// Selected element count.
        expected: usize,
        /// Array length.
        actual: usize,
    },

    /// Units cannot be converted into each other.
    #[error("cannot convert from '{from}' to '{to}'")]
    UnitConversion {
        /// Source units.
        from: String,
        /// Target units.
        to: String,
    },

    /// No container type is registered under this name.
    #[error("unknown container type: {0}")]
    UnknownContainerType(String),

    /// Arguments passed to a constructor were rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage backend failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration validation failure.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed.
    #[error("could not parse engine config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Filesystem failure while loading configuration or writing output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the internal requeue signal.
    pub fn is_generation_in_progress(&self) -> bool {
        matches!(self, Self::GenerationInProgress { .. })
    }
}
