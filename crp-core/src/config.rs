use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::UploadPolicy;

pub const DEFAULT_DESCRIPTOR_EXT: &str = "crp.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the per-user areas: `<project_base>/<user>/{out,xq,dbase}`.
    pub project_base: PathBuf,
    pub descriptor_ext: String,
    pub upload: UploadPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_base: PathBuf::from("crp-data"),
            descriptor_ext: DEFAULT_DESCRIPTOR_EXT.to_string(),
            upload: UploadPolicy::default(),
        }
    }
}

impl Settings {
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            project_base: base.into(),
            ..Default::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn user_dir(&self, user: &str) -> PathBuf {
        self.project_base.join(user)
    }

    pub fn descriptor_path(&self, project: &str, user: &str) -> PathBuf {
        self.user_dir(user)
            .join(format!("{project}.{}", self.descriptor_ext))
    }
}
