use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::hit_file_path;
use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HitRecord {
    #[serde(default)]
    pub cat: String,
    pub locs: String,
    pub locw: String,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct QcHits {
    #[serde(default)]
    pub results: Vec<HitRecord>,
}

#[derive(Deserialize)]
struct HitDoc {
    hits: Vec<QcHits>,
}

/// One opened hit-storage resource: the results of a single source file, per QC.
#[derive(Clone, Debug)]
pub struct HitFile {
    pub name: String,
    qcs: Vec<QcHits>,
}

impl HitFile {
    pub fn from_json(name: &str, text: &str) -> Result<Self> {
        let doc: HitDoc = serde_json::from_str(text)?;
        Ok(Self::new(name, doc.hits))
    }

    pub fn new(name: &str, qcs: Vec<QcHits>) -> Self {
        Self {
            name: name.to_string(),
            qcs,
        }
    }

    /// Results for a 1-based QC; a QC the file never recorded has none.
    pub fn results(&self, qc: usize) -> &[HitRecord] {
        qc.checked_sub(1)
            .and_then(|i| self.qcs.get(i))
            .map(|q| q.results.as_slice())
            .unwrap_or(&[])
    }
}

/// Opens hit-storage resources by source file name.
pub trait HitSource {
    fn open(&self, file: &str) -> Result<HitFile>;
}

/// `<dir>/<file>.hits` on the local filesystem.
#[derive(Clone, Debug)]
pub struct FsHitSource {
    dir: PathBuf,
}

impl FsHitSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl HitSource for FsHitSource {
    fn open(&self, file: &str) -> Result<HitFile> {
        let text = std::fs::read_to_string(hit_file_path(&self.dir, file))?;
        HitFile::from_json(file, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_results_per_qc() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("t1.hits"),
            r#"{ "hits": [
                { "results": [ { "cat": "NP", "locs": "s1", "locw": "w3" } ] },
                { "results": [ { "locs": "s9", "locw": "w1", "msg": "odd" } ] }
            ] }"#,
        )
        .unwrap();
        let f = FsHitSource::new(dir.path()).open("t1").unwrap();
        assert_eq!(f.name, "t1");
        assert_eq!(f.results(1)[0].cat, "NP");
        assert_eq!(f.results(2)[0].msg.as_deref(), Some("odd"));
        assert!(f.results(3).is_empty());
        assert!(f.results(0).is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsHitSource::new(dir.path()).open("nope").is_err());
    }
}
