use serde::{Deserialize, Serialize};

/// What to do when a chunk number arrives a second time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResendPolicy {
    /// Overwrite the stored payload.
    #[default]
    LastWriteWins,
    /// Accept an identical resend, reject a different payload.
    RejectMismatch,
}

/// What to do when `write` finds chunk numbers with no payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Log each missing chunk and write the rest.
    #[default]
    Skip,
    /// Refuse to write anything.
    Fail,
}

pub const DEFAULT_MAX_CHUNKS: u32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub on_resend: ResendPolicy,
    pub on_gap: GapPolicy,
    /// Largest chunk count a client may declare for one upload.
    pub max_chunks: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            on_resend: ResendPolicy::default(),
            on_gap: GapPolicy::default(),
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}
