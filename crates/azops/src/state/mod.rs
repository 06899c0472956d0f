//! State-file persistence.

pub mod document;
pub mod store;

pub use document::{StateDocument, PARAMETERS_SCHEMA, TEMPLATE_SCHEMA};
pub use store::{FileStateStore, StateStore};
