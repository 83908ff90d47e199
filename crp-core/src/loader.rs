// crp_core/src/loader.rs
use crate::domain::ProjectDescriptor;
use crate::error::Result;
use std::path::Path;

/// Reads and parses a project descriptor. Implementations must not touch the cache.
pub trait ProjectLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ProjectDescriptor>;
}
