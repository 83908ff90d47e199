use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use super::{ChunkedUpload, WriteSummary};
use crate::error::Result;
use crate::policy::UploadPolicy;
use crate::util::sanitize::check_segment;

/// One fragment as delivered by the request layer.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub user: String,
    pub file: String,
    pub number: u32,
    pub total: u32,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Accepted {
    Pending { received: u32, total: u32 },
    Complete(WriteSummary),
    /// Another connection delivered the final chunk and is writing the file.
    AlreadyComplete,
}

#[derive(Clone, Debug)]
pub struct UploadStatus {
    pub user: String,
    pub file: String,
    pub received: u32,
    pub total: u32,
    pub started_at: OffsetDateTime,
    pub last_touched: OffsetDateTime,
}

/// Live uploads keyed by (user, file name). Nothing expires on its own.
pub struct UploadRegistry {
    policy: UploadPolicy,
    uploads: DashMap<(String, String), Arc<ChunkedUpload>>,
}

impl UploadRegistry {
    pub fn new(policy: UploadPolicy) -> Self {
        Self {
            policy,
            uploads: DashMap::new(),
        }
    }

    /// Add a fragment; once every chunk is present write `<target_dir>/<file>`.
    pub fn accept(&self, frag: Fragment, target_dir: &Path) -> Result<Accepted> {
        check_segment(&frag.user)?;
        check_segment(&frag.file)?;
        let key = (frag.user.clone(), frag.file.clone());
        // The chunk goes in while the entry is held, so it can never land in an
        // upload that a completing connection has already taken out and cleared.
        let (upload, ready) = {
            let entry = self.uploads.entry(key.clone()).or_try_insert_with(|| {
                debug!(user = %frag.user, file = %frag.file, total = frag.total, "upload started");
                ChunkedUpload::new(&frag.user, &frag.file, frag.total, self.policy).map(Arc::new)
            })?;
            let ready = entry.add_chunk(frag.payload, frag.number, frag.total)?;
            (entry.clone(), ready)
        };

        if !ready {
            return Ok(Accepted::Pending {
                received: upload.received(),
                total: upload.total(),
            });
        }

        // Only the caller that takes the entry out writes the file.
        if self
            .uploads
            .remove_if(&key, |_, v| Arc::ptr_eq(v, &upload))
            .is_none()
        {
            return Ok(Accepted::AlreadyComplete);
        }
        match upload.write(&target_dir.join(&frag.file)) {
            Ok(summary) => {
                upload.clear();
                Ok(Accepted::Complete(summary))
            }
            Err(e) => {
                // Keep the chunks so the client can retry the last fragment,
                // unless a new upload under the same name has started since.
                match self.uploads.entry(key) {
                    Entry::Vacant(v) => {
                        v.insert(upload);
                    }
                    Entry::Occupied(_) => {
                        warn!(user = %frag.user, file = %frag.file, "failed upload superseded; chunks dropped");
                    }
                }
                Err(e)
            }
        }
    }

    pub fn get(&self, user: &str, file: &str) -> Option<Arc<ChunkedUpload>> {
        self.uploads
            .get(&(user.to_string(), file.to_string()))
            .map(|r| r.value().clone())
    }

    pub fn abandon(&self, user: &str, file: &str) -> bool {
        let removed = self
            .uploads
            .remove(&(user.to_string(), file.to_string()))
            .is_some();
        if removed {
            info!(user, file, "upload abandoned");
        }
        removed
    }

    pub fn pending(&self) -> Vec<UploadStatus> {
        let mut out: Vec<UploadStatus> = self
            .uploads
            .iter()
            .map(|e| {
                let u = e.value();
                UploadStatus {
                    user: u.user().to_string(),
                    file: u.file().to_string(),
                    received: u.received(),
                    total: u.total(),
                    started_at: u.started_at(),
                    last_touched: u.last_touched(),
                }
            })
            .collect();
        out.sort_by(|a, b| (&a.user, &a.file).cmp(&(&b.user, &b.file)));
        out
    }

    /// Drop uploads with no fragment for longer than `older_than`. Never called implicitly.
    pub fn evict_idle(&self, older_than: Duration) -> usize {
        let cutoff = OffsetDateTime::now_utc() - older_than;
        let mut evicted = 0;
        self.uploads.retain(|(user, file), u| {
            let keep = u.last_touched() >= cutoff;
            if !keep {
                warn!(user = %user, file = %file, "idle upload evicted");
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}
