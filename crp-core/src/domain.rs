// crp_core/src/domain.rs
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Cache key: one handle per (project, user).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey {
    pub project: String,
    pub user: String,
}

impl ProjectKey {
    pub fn new(project: &str, user: &str) -> Self {
        Self {
            project: project.to_string(),
            user: user.to_string(),
        }
    }
}

/// Parsed project descriptor as supplied by a `ProjectLoader`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    #[serde(default)]
    pub query_root: Option<PathBuf>,
    #[serde(default)]
    pub hits_root: Option<PathBuf>,
}

/// A loaded project. Immutable once created.
#[derive(Clone, Debug)]
pub struct ProjectHandle {
    pub key: ProjectKey,
    pub display_name: String,
    pub descriptor_path: PathBuf,
    pub out_dir: PathBuf,
    pub query_dir: PathBuf,
    pub dbase_dir: PathBuf,
    pub hits_dir: PathBuf,
}

impl ProjectHandle {
    pub fn project(&self) -> &str {
        &self.key.project
    }

    pub fn user(&self) -> &str {
        &self.key.user
    }

    pub fn count_table_path(&self) -> PathBuf {
        self.hits_dir.join("counts.json")
    }

    pub fn hit_file_path(&self, file: &str) -> PathBuf {
        hit_file_path(&self.hits_dir, file)
    }
}

pub fn hit_file_path(hits_dir: &Path, file: &str) -> PathBuf {
    hits_dir.join(format!("{file}.hits"))
}

/// One resolved hit: where it lives in the corpus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocation {
    pub file: String,
    pub locs: String,
    pub locw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}
