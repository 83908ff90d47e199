use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::{ProjectDescriptor, ProjectHandle, ProjectKey};
use crate::error::{CrpError, Result};
use crate::loader::ProjectLoader;
use crate::util::sanitize::{check_segment, is_within};

/// Process-wide cache of loaded projects, one handle per (project, user).
///
/// A load runs while the vacant entry's shard is locked, so concurrent
/// callers for the same key wait for it and then observe the same handle.
/// Entries live until `remove`/`remove_user`; there is no eviction policy.
pub struct ProjectCache {
    settings: Settings,
    loader: Arc<dyn ProjectLoader>,
    entries: DashMap<ProjectKey, Arc<ProjectHandle>>,
}

impl ProjectCache {
    pub fn new(settings: Settings, loader: Arc<dyn ProjectLoader>) -> Self {
        Self {
            settings,
            loader,
            entries: DashMap::new(),
        }
    }

    pub fn get_or_load(&self, project: &str, user: &str) -> Result<Arc<ProjectHandle>> {
        check_segment(project)?;
        check_segment(user)?;
        match self.entries.entry(ProjectKey::new(project, user)) {
            Entry::Occupied(o) => {
                debug!(project, user, "project cache hit");
                Ok(o.get().clone())
            }
            Entry::Vacant(v) => {
                let handle = Arc::new(self.load(project, user)?);
                info!(project, user, name = %handle.display_name, "project loaded");
                v.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    /// Register a handle built outside the cache. Fails if the key is taken.
    pub fn adopt(&self, handle: ProjectHandle) -> Result<Arc<ProjectHandle>> {
        match self.entries.entry(handle.key.clone()) {
            Entry::Occupied(o) => {
                let key = o.key();
                warn!(project = %key.project, user = %key.user, "duplicate project handle");
                Err(CrpError::CacheConsistency {
                    project: key.project.clone(),
                    user: key.user.clone(),
                })
            }
            Entry::Vacant(v) => {
                let handle = Arc::new(handle);
                v.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    pub fn exists(&self, project: &str, user: &str) -> bool {
        self.entries.contains_key(&ProjectKey::new(project, user))
    }

    pub fn remove(&self, project: &str, user: &str) -> bool {
        let removed = self
            .entries
            .remove(&ProjectKey::new(project, user))
            .is_some();
        if removed {
            debug!(project, user, "project evicted");
        }
        removed
    }

    /// Evict every project cached for `user`; returns how many were dropped.
    pub fn remove_user(&self, user: &str) -> usize {
        let mut dropped = 0;
        self.entries.retain(|k, _| {
            let keep = k.user != user;
            if !keep {
                dropped += 1;
            }
            keep
        });
        if dropped > 0 {
            warn!(user, dropped, "evicted all cached projects for user");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the projects currently cached for `user`, sorted.
    pub fn projects_for(&self, user: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().user == user)
            .map(|e| e.key().project.clone())
            .collect();
        out.sort();
        out
    }

    /// Project names with a descriptor on disk in the user's area. Nothing is loaded.
    pub fn discover(&self, user: &str) -> Result<Vec<String>> {
        check_segment(user)?;
        let dir = self.settings.user_dir(user);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let suffix = format!(".{}", self.settings.descriptor_ext);
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if let Some(stem) = name.strip_suffix(&suffix) {
                if check_segment(stem).is_ok() {
                    out.push(stem.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn load(&self, project: &str, user: &str) -> Result<ProjectHandle> {
        let user_dir = self.settings.user_dir(user);
        let descriptor_path = self.settings.descriptor_path(project, user);
        if !is_within(&user_dir, &descriptor_path) {
            return Err(CrpError::load(project, user, "descriptor outside user area"));
        }
        if !descriptor_path.is_file() {
            return Err(CrpError::load(
                project,
                user,
                format!("no descriptor at {}", descriptor_path.display()),
            ));
        }
        let desc = self
            .loader
            .load(&descriptor_path)
            .map_err(|e| CrpError::load(project, user, e))?;
        Ok(build_handle(project, user, &user_dir, descriptor_path, desc))
    }
}

fn build_handle(
    project: &str,
    user: &str,
    user_dir: &Path,
    descriptor_path: PathBuf,
    desc: ProjectDescriptor,
) -> ProjectHandle {
    let root = |over: Option<PathBuf>, default: PathBuf| match over {
        Some(p) if p.is_absolute() => p,
        Some(p) => user_dir.join(p),
        None => default,
    };
    let out_dir = root(desc.output_root, user_dir.join("out"));
    let query_dir = root(desc.query_root, user_dir.join("xq"));
    let hits_dir = root(desc.hits_root, out_dir.join(project));
    ProjectHandle {
        key: ProjectKey::new(project, user),
        display_name: desc.name,
        descriptor_path,
        out_dir,
        query_dir,
        dbase_dir: user_dir.join("dbase"),
        hits_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader_fs::FsProjectLoader;

    fn cache_with(dir: &Path) -> ProjectCache {
        ProjectCache::new(Settings::with_base(dir), Arc::new(FsProjectLoader::new()))
    }

    fn write_descriptor(base: &Path, user: &str, project: &str, body: &str) {
        let d = base.join(user);
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(d.join(format!("{project}.crp.json")), body).unwrap();
    }

    #[test]
    fn default_layout() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), "alice", "lemmas", r#"{"name":"Lemmas"}"#);
        let cache = cache_with(tmp.path());
        let h = cache.get_or_load("lemmas", "alice").unwrap();
        let ud = tmp.path().join("alice");
        assert_eq!(h.display_name, "Lemmas");
        assert_eq!(h.out_dir, ud.join("out"));
        assert_eq!(h.query_dir, ud.join("xq"));
        assert_eq!(h.dbase_dir, ud.join("dbase"));
        assert_eq!(h.hits_dir, ud.join("out").join("lemmas"));
        assert_eq!(h.hit_file_path("t1"), ud.join("out/lemmas/t1.hits"));
    }

    #[test]
    fn relative_roots_resolve_against_user_area() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(
            tmp.path(),
            "bob",
            "p",
            r#"{"name":"P","output_root":"results","hits_root":"/abs/hits"}"#,
        );
        let cache = cache_with(tmp.path());
        let h = cache.get_or_load("p", "bob").unwrap();
        assert_eq!(h.out_dir, tmp.path().join("bob").join("results"));
        assert_eq!(h.hits_dir, PathBuf::from("/abs/hits"));
    }

    #[test]
    fn failed_load_leaves_cache_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_with(tmp.path());
        assert!(matches!(
            cache.get_or_load("missing", "alice"),
            Err(CrpError::Load { .. })
        ));
        write_descriptor(tmp.path(), "alice", "broken", "{");
        assert!(matches!(
            cache.get_or_load("broken", "alice"),
            Err(CrpError::Load { .. })
        ));
        assert!(cache.is_empty());
        assert!(!cache.exists("broken", "alice"));
    }

    #[test]
    fn names_escaping_the_user_area_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_with(tmp.path());
        assert!(matches!(
            cache.get_or_load("../bob/p", "alice"),
            Err(CrpError::InvalidName { .. })
        ));
        assert!(cache.get_or_load("p", "..").is_err());
    }

    #[test]
    fn remove_and_per_user_listing() {
        let tmp = tempfile::tempdir().unwrap();
        for (u, p) in [("alice", "a1"), ("alice", "a2"), ("bob", "b1")] {
            write_descriptor(tmp.path(), u, p, r#"{"name":"x"}"#);
        }
        let cache = cache_with(tmp.path());
        for (u, p) in [("alice", "a2"), ("alice", "a1"), ("bob", "b1")] {
            cache.get_or_load(p, u).unwrap();
        }
        assert_eq!(cache.projects_for("alice"), vec!["a1", "a2"]);
        assert!(cache.remove("a1", "alice"));
        assert!(!cache.remove("a1", "alice"));
        assert_eq!(cache.remove_user("alice"), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.exists("b1", "bob"));
    }

    #[test]
    fn discover_lists_descriptors_without_loading() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), "alice", "zeta", r#"{"name":"z"}"#);
        write_descriptor(tmp.path(), "alice", "alpha", r#"{"name":"a"}"#);
        std::fs::write(tmp.path().join("alice").join("notes.txt"), "x").unwrap();
        let cache = cache_with(tmp.path());
        assert_eq!(cache.discover("alice").unwrap(), vec!["alpha", "zeta"]);
        assert!(cache.discover("nobody").unwrap().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn adopt_refuses_duplicates() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path(), "alice", "p", r#"{"name":"P"}"#);
        let cache = cache_with(tmp.path());
        let h = cache.get_or_load("p", "alice").unwrap();
        assert!(matches!(
            cache.adopt((*h).clone()),
            Err(CrpError::CacheConsistency { .. })
        ));
        let mut other = (*h).clone();
        other.key = ProjectKey::new("q", "alice");
        cache.adopt(other).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
