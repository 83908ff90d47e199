use std::path::Path;

use serde::Deserialize;

use crate::error::{CrpError, Result};

/// Per-source-file hit counts for one QC.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FileCount {
    pub file: String,
    pub count: u64,
    /// Per sub-category counts, parallel to `QcEntry::subcats`.
    #[serde(default)]
    pub subs: Option<Vec<u64>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QcEntry {
    pub hits: Vec<FileCount>,
    #[serde(default)]
    pub subcats: Vec<String>,
}

/// Hit counts per QC, per file and per sub-category. Read-only once loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountTable {
    qcs: Vec<QcEntry>,
}

impl QcEntry {
    // Tables are validated on load, so these sums cannot overflow there.
    pub fn total(&self) -> u64 {
        self.hits
            .iter()
            .fold(0u64, |acc, h| acc.saturating_add(h.count))
    }

    pub fn subcat_index(&self, name: &str) -> Option<usize> {
        self.subcats.iter().position(|s| s == name)
    }

    pub fn sub_total(&self, name: &str) -> Option<u64> {
        let idx = self.subcat_index(name)?;
        Some(
            self.hits
                .iter()
                .fold(0u64, |acc, h| acc.saturating_add(h.sub_count(idx))),
        )
    }
}

impl FileCount {
    pub fn sub_count(&self, idx: usize) -> u64 {
        self.subs
            .as_ref()
            .and_then(|s| s.get(idx).copied())
            .unwrap_or(0)
    }
}

impl CountTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let qcs: Vec<QcEntry> = serde_json::from_str(text)?;
        for (i, qc) in qcs.iter().enumerate() {
            validate(i + 1, qc)?;
        }
        Ok(Self { qcs })
    }

    pub fn len(&self) -> usize {
        self.qcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qcs.is_empty()
    }

    /// 1-based QC lookup.
    pub fn qc(&self, qc: usize) -> Option<&QcEntry> {
        qc.checked_sub(1).and_then(|i| self.qcs.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &QcEntry> {
        self.qcs.iter()
    }
}

fn validate(qc: usize, entry: &QcEntry) -> Result<()> {
    let mut total = 0u64;
    for fc in &entry.hits {
        total = total.checked_add(fc.count).ok_or_else(|| {
            CrpError::Format(format!("qc {qc}: total hit count overflows at file {}", fc.file))
        })?;
        let Some(subs) = &fc.subs else {
            continue;
        };
        if subs.len() != entry.subcats.len() {
            return Err(CrpError::Format(format!(
                "qc {qc} file {}: {} sub counts for {} sub-categories",
                fc.file,
                subs.len(),
                entry.subcats.len()
            )));
        }
        let sum = subs.iter().try_fold(0u64, |acc, n| acc.checked_add(*n));
        if sum != Some(fc.count) {
            return Err(CrpError::Format(format!(
                "qc {qc} file {}: sub counts do not sum to total {}",
                fc.file, fc.count
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        { "hits": [ { "file": "A", "count": 3 }, { "file": "B", "count": 5 } ] },
        { "hits": [ { "file": "A", "count": 4, "subs": [1, 3] },
                    { "file": "C", "count": 2, "subs": [2, 0] } ],
          "subcats": ["NP", "VP"] }
    ]"#;

    #[test]
    fn totals() {
        let t = CountTable::from_json(TABLE).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.qc(1).unwrap().total(), 8);
        let qc2 = t.qc(2).unwrap();
        assert_eq!(qc2.total(), 6);
        assert_eq!(qc2.sub_total("NP"), Some(3));
        assert_eq!(qc2.sub_total("VP"), Some(3));
        assert_eq!(qc2.sub_total("PP"), None);
        assert!(t.qc(0).is_none());
        assert!(t.qc(3).is_none());
    }

    #[test]
    fn sub_counts_must_add_up() {
        let bad = r#"[{ "hits": [ { "file": "A", "count": 4, "subs": [1, 1] } ],
                        "subcats": ["NP", "VP"] }]"#;
        assert!(matches!(CountTable::from_json(bad), Err(CrpError::Format(_))));
        let short = r#"[{ "hits": [ { "file": "A", "count": 1, "subs": [1] } ],
                          "subcats": ["NP", "VP"] }]"#;
        assert!(matches!(CountTable::from_json(short), Err(CrpError::Format(_))));
    }

    #[test]
    fn counts_that_overflow_are_rejected() {
        let wrapping_subs = format!(
            r#"[{{ "hits": [ {{ "file": "A", "count": 1, "subs": [{}, 2] }} ],
                  "subcats": ["NP", "VP"] }}]"#,
            u64::MAX
        );
        assert!(matches!(
            CountTable::from_json(&wrapping_subs),
            Err(CrpError::Format(_))
        ));
        let wrapping_total = format!(
            r#"[{{ "hits": [ {{ "file": "A", "count": {} }}, {{ "file": "B", "count": 1 }} ] }}]"#,
            u64::MAX
        );
        assert!(matches!(
            CountTable::from_json(&wrapping_total),
            Err(CrpError::Format(_))
        ));
    }
}
