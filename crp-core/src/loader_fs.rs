use std::path::Path;

use crate::domain::ProjectDescriptor;
use crate::error::{CrpError, Result};
use crate::loader::ProjectLoader;

/// Reads descriptors stored as JSON on the local filesystem.
#[derive(Clone, Debug, Default)]
pub struct FsProjectLoader;

impl FsProjectLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectLoader for FsProjectLoader {
    fn load(&self, path: &Path) -> Result<ProjectDescriptor> {
        let text = std::fs::read_to_string(path)?;
        let desc: ProjectDescriptor = serde_json::from_str(&text)?;
        if desc.name.trim().is_empty() {
            return Err(CrpError::Format(format!(
                "descriptor {} has an empty name",
                path.display()
            )));
        }
        Ok(desc)
    }
}
