//! Shared test infrastructure for azops integration tests.
//!
//! Provides a temporary state tree, an in-memory tenant and helpers to wire
//! discovery and dispatch against them.

pub mod builders;
pub mod harness;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use harness::{TestHarness, TENANT_ROOT};
