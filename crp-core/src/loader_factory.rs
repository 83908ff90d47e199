use std::sync::Arc;

use crate::loader::ProjectLoader;
use crate::loader_fs::FsProjectLoader;

pub enum Backend {
    Fs,
}

pub fn open_loader(backend: Backend) -> Arc<dyn ProjectLoader> {
    match backend {
        Backend::Fs => Arc::new(FsProjectLoader::new()),
    }
}
