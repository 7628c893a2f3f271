//! TreeFS Core: in-memory hierarchical filesystem
//!
//! This crate provides the node tree, path resolution with symlink and
//! permission handling, the mutation operations built on top of it, and the
//! snapshot codec. Shells, user accounts and snapshot storage live with the
//! callers.

pub mod config;
pub mod error;
pub mod permissions;
pub mod snapshot;
pub mod tree;
pub mod types;
pub mod vfs;

mod node;
mod resolver;

// Re-export key types for convenience
pub use config::{FsConfig, FsLimits, RootPolicy, SecurityPolicy};
pub use error::{FsError, FsResult};
pub use permissions::PermissionOracle;
pub use tree::Tree;
pub use types::*;
pub use vfs::FsCore;
