#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod policy;
pub mod stats;

pub mod util {
    pub mod sanitize;
}

pub mod loader;
pub mod loader_factory;
pub mod loader_fs;

pub mod cache;

pub mod counts {
    pub mod table;
}

pub mod hits {
    pub mod store;
}

pub mod resolve;
pub mod upload;

// Re-exports: stable API surface
pub use cache::ProjectCache;
pub use config::Settings;
pub use counts::table::CountTable;
pub use domain::{ProjectHandle, ResultLocation};
pub use hits::store::{FsHitSource, HitSource};
pub use resolve::{HitLocationResolver, PageRequest, Resolution, ScanCursor, resolve_page};
pub use upload::ChunkedUpload;
pub use upload::registry::{Accepted, Fragment, UploadRegistry};
