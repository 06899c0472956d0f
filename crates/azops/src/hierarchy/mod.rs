//! Management-group hierarchy cache.

pub mod cache;
pub mod init;

pub use cache::{HierarchyCache, ManagementGroupNode};
