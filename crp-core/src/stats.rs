use serde::{Deserialize, Serialize};

/// Work done by one resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Hit records inspected.
    pub scan_steps: u64,
    pub resources_opened: u32,
}
