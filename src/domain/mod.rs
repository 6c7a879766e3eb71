//! Domain logic - pure business rules independent of git operations

pub mod branch;
pub mod context;
pub mod manifest;
pub mod version;

pub use branch::{dev_branch, BranchDecision};
pub use context::RepositoryContext;
pub use manifest::{ComponentFile, Manifest};
pub use version::IncrementClass;
