use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crp_core::domain::ProjectDescriptor;
use crp_core::error::Result;
use crp_core::loader::ProjectLoader;
use crp_core::loader_fs::FsProjectLoader;
use crp_core::{ProjectCache, Settings};
use tempfile::TempDir;

/// Counts loads and sleeps so racing callers overlap.
struct SlowLoader {
    inner: FsProjectLoader,
    loads: AtomicUsize,
}

impl ProjectLoader for SlowLoader {
    fn load(&self, path: &Path) -> Result<ProjectDescriptor> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.inner.load(path)
    }
}

fn fixture(projects: &[&str]) -> (TempDir, Arc<SlowLoader>, Arc<ProjectCache>) {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("alice");
    std::fs::create_dir_all(&dir).unwrap();
    for p in projects {
        std::fs::write(dir.join(format!("{p}.crp.json")), format!(r#"{{"name":"{p}"}}"#))
            .unwrap();
    }
    let loader = Arc::new(SlowLoader {
        inner: FsProjectLoader::new(),
        loads: AtomicUsize::new(0),
    });
    let cache = Arc::new(ProjectCache::new(
        Settings::with_base(tmp.path()),
        loader.clone(),
    ));
    (tmp, loader, cache)
}

#[test]
fn second_lookup_reuses_the_first_load() {
    let (_tmp, loader, cache) = fixture(&["lemmas"]);
    let a = cache.get_or_load("lemmas", "alice").unwrap();
    let b = cache.get_or_load("lemmas", "alice").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn racing_callers_share_one_load() {
    let (_tmp, loader, cache) = fixture(&["lemmas"]);
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let cache = cache.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            cache.get_or_load("lemmas", "alice").unwrap()
        }));
    }
    let got: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
    for h in &got[1..] {
        assert!(Arc::ptr_eq(&got[0], h));
    }
}

#[test]
fn distinct_projects_load_once_each() {
    let names = ["p0", "p1", "p2", "p3"];
    let (_tmp, loader, cache) = fixture(&names);
    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        let name = names[i % names.len()];
        handles.push(thread::spawn(move || {
            cache.get_or_load(name, "alice").unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), names.len());
    assert_eq!(cache.projects_for("alice"), names);
}

#[test]
fn reload_after_remove() {
    let (_tmp, loader, cache) = fixture(&["lemmas"]);
    let first = cache.get_or_load("lemmas", "alice").unwrap();
    assert!(cache.remove("lemmas", "alice"));
    assert!(!cache.exists("lemmas", "alice"));
    let second = cache.get_or_load("lemmas", "alice").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}
