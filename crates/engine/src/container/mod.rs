//! Data containers and the lazy field-resolution protocol.
//!
//! - [`DataContainer`]: field store, field parameters, specifier resolution
//! - [`SelectionContainer`]: selection-backed access, chunk iteration and
//!   generation
//! - [`Scope`]: scoped overrides of container state
//! - [`Center`]: center resolution into the `center` field parameter
//!
//! Cut regions and plain-text export are further methods on
//! [`SelectionContainer`].

mod center;
mod cut;
mod data;
mod export;
mod generation;
mod scope;
mod selection;

pub use center::{CODE_LENGTH, Center};
pub use data::{ContainerField, ContainerFieldFn, DataContainer};
pub use scope::Scope;
pub use selection::SelectionContainer;
