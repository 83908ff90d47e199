use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("project load failed for {project}@{user}: {reason}")]
    Load {
        project: String,
        user: String,
        reason: String,
    },

    #[error("cache already holds a handle for {project}@{user}")]
    CacheConsistency { project: String, user: String },

    #[error("upload {file}@{user}: fragment declares {got} chunks, upload expects {expected}")]
    UploadTotalMismatch {
        user: String,
        file: String,
        expected: u32,
        got: u32,
    },

    #[error("upload {file}@{user}: {total} chunks declared, limit is {max}")]
    UploadTooLarge {
        user: String,
        file: String,
        total: u32,
        max: u32,
    },

    #[error("upload {file}@{user}: chunk {number} outside 1..={total}")]
    ChunkOutOfRange {
        user: String,
        file: String,
        number: u32,
        total: u32,
    },

    #[error("upload {file}@{user}: chunk {number} resent with a different payload")]
    ChunkMismatch {
        user: String,
        file: String,
        number: u32,
    },

    #[error("upload {file}@{user}: missing chunks {missing:?}")]
    UploadGap {
        user: String,
        file: String,
        missing: Vec<u32>,
    },

    #[error("resolution range error: {0}")]
    ResolutionRange(String),

    #[error("cannot open hit storage {file}: {source}")]
    ResolutionIo {
        file: String,
        #[source]
        source: Box<CrpError>,
    },
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, CrpError>;

impl CrpError {
    pub fn range(msg: impl Into<String>) -> Self {
        CrpError::ResolutionRange(msg.into())
    }

    pub fn load(project: &str, user: &str, reason: impl std::fmt::Display) -> Self {
        CrpError::Load {
            project: project.to_string(),
            user: user.to_string(),
            reason: reason.to_string(),
        }
    }
}
