pub mod registry;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{CrpError, Result};
use crate::policy::{GapPolicy, ResendPolicy, UploadPolicy};

struct Slots {
    chunks: Vec<Option<Vec<u8>>>,
    stored: u32,
    last_touched: OffsetDateTime,
}

/// In-memory reassembly of one client upload, keyed by (user, file).
///
/// Chunks are numbered `1..=total` and may arrive in any order from
/// parallel connections. Nothing touches disk until `write`.
pub struct ChunkedUpload {
    user: String,
    file: String,
    total: u32,
    policy: UploadPolicy,
    started_at: OffsetDateTime,
    slots: Mutex<Slots>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSummary {
    pub bytes: u64,
    /// Chunk numbers that had no payload (only non-empty under `GapPolicy::Skip`).
    pub gaps: Vec<u32>,
    /// Hex BLAKE3 digest of the bytes written.
    pub digest: String,
}

impl ChunkedUpload {
    pub fn new(user: &str, file: &str, total: u32, policy: UploadPolicy) -> Result<Self> {
        if total == 0 {
            return Err(CrpError::Format(format!(
                "upload {file}@{user}: total chunk count must be at least 1"
            )));
        }
        // Slots are allocated up front; never size them from an unchecked client value.
        if total > policy.max_chunks {
            return Err(CrpError::UploadTooLarge {
                user: user.to_string(),
                file: file.to_string(),
                total,
                max: policy.max_chunks,
            });
        }
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            user: user.to_string(),
            file: file.to_string(),
            total,
            policy,
            started_at: now,
            slots: Mutex::new(Slots {
                chunks: vec![None; total as usize],
                stored: 0,
                last_touched: now,
            }),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn last_touched(&self) -> OffsetDateTime {
        self.slots().last_touched
    }

    // Slot contents stay valid even if a holder panicked mid-insert.
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `payload` as chunk `number`. Returns whether the upload is complete afterwards.
    pub fn add_chunk(&self, payload: Vec<u8>, number: u32, total: u32) -> Result<bool> {
        if total != self.total {
            return Err(CrpError::UploadTotalMismatch {
                user: self.user.clone(),
                file: self.file.clone(),
                expected: self.total,
                got: total,
            });
        }
        if number == 0 || number > self.total {
            return Err(CrpError::ChunkOutOfRange {
                user: self.user.clone(),
                file: self.file.clone(),
                number,
                total: self.total,
            });
        }

        let mut guard = self.slots();
        let slots = &mut *guard;
        let slot = &mut slots.chunks[(number - 1) as usize];
        if let Some(prev) = slot.as_mut() {
            if self.policy.on_resend == ResendPolicy::RejectMismatch && *prev != payload {
                return Err(CrpError::ChunkMismatch {
                    user: self.user.clone(),
                    file: self.file.clone(),
                    number,
                });
            }
            debug!(user = %self.user, file = %self.file, number, "chunk resent");
            *prev = payload;
        } else {
            *slot = Some(payload);
            slots.stored += 1;
        }
        slots.last_touched = OffsetDateTime::now_utc();
        Ok(slots.stored == self.total)
    }

    pub fn is_ready(&self) -> bool {
        self.slots().stored == self.total
    }

    pub fn received(&self) -> u32 {
        self.slots().stored
    }

    pub fn missing(&self) -> Vec<u32> {
        missing_in(&self.slots())
    }

    /// Concatenate chunks `1..=total` into `path`.
    ///
    /// Missing chunks are skipped with a warning under `GapPolicy::Skip`; under
    /// `GapPolicy::Fail` nothing is written. The file is replaced atomically.
    pub fn write(&self, path: &Path) -> Result<WriteSummary> {
        let slots = self.slots();
        let gaps = missing_in(&slots);
        if !gaps.is_empty() {
            if self.policy.on_gap == GapPolicy::Fail {
                return Err(CrpError::UploadGap {
                    user: self.user.clone(),
                    file: self.file.clone(),
                    missing: gaps,
                });
            }
            for n in &gaps {
                warn!(user = %self.user, file = %self.file, chunk = n, "missing chunk skipped on write");
            }
        }

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut hasher = blake3::Hasher::new();
        let mut bytes = 0u64;
        for payload in slots.chunks.iter().flatten() {
            tmp.write_all(payload)?;
            hasher.update(payload);
            bytes += payload.len() as u64;
        }
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;

        let digest = hex::encode(hasher.finalize().as_bytes());
        info!(user = %self.user, file = %self.file, bytes, path = %path.display(), "upload written");
        Ok(WriteSummary {
            bytes,
            gaps,
            digest,
        })
    }

    pub fn clear(&self) {
        let mut slots = self.slots();
        slots.chunks.iter_mut().for_each(|c| *c = None);
        slots.stored = 0;
    }
}

fn missing_in(slots: &Slots) -> Vec<u32> {
    slots
        .chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_none())
        .map(|(i, _)| i as u32 + 1)
        .collect()
}
