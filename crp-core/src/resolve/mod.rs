use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::counts::table::{CountTable, FileCount};
use crate::domain::{ProjectHandle, ResultLocation};
use crate::error::{CrpError, Result};
use crate::hits::store::{FsHitSource, HitFile, HitRecord, HitSource};
use crate::stats::ScanStats;

/// A page of hits: `count` hits starting at global index `start` (0-based).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based QC number.
    pub qc: usize,
    pub sub_category: Option<String>,
    pub start: u64,
    pub count: u64,
}

/// Where a filtered scan stopped. Hand it back to the next call to continue
/// from there instead of rescanning the resource from index 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    pub qc: usize,
    pub sub_category: String,
    pub resource: String,
    /// Next record index to inspect.
    pub next_index: usize,
    /// Sub-category matches seen before `next_index`.
    pub matched: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Resolution {
    pub locations: Vec<ResultLocation>,
    pub cursor: Option<ScanCursor>,
    pub stats: ScanStats,
}

/// Maps global hit indices to storage locations using a count table.
///
/// Trusts the table's counts; a resource that turns out shorter than
/// declared fails the whole request.
pub struct HitLocationResolver<'a, S: HitSource + ?Sized> {
    table: &'a CountTable,
    source: &'a S,
}

impl<'a, S: HitSource + ?Sized> HitLocationResolver<'a, S> {
    pub fn new(table: &'a CountTable, source: &'a S) -> Self {
        Self { table, source }
    }

    pub fn resolve(&self, req: &PageRequest, cursor: Option<ScanCursor>) -> Result<Resolution> {
        let entry = self.table.qc(req.qc).ok_or_else(|| {
            CrpError::range(format!(
                "qc {} out of range 1..={}",
                req.qc,
                self.table.len()
            ))
        })?;
        let sub = match &req.sub_category {
            Some(name) => {
                let idx = entry.subcat_index(name).ok_or_else(|| {
                    CrpError::range(format!("qc {} has no sub-category {name:?}", req.qc))
                })?;
                Some((idx, name.as_str()))
            }
            None => None,
        };

        let width = |fc: &FileCount| match sub {
            Some((idx, _)) => fc.sub_count(idx),
            None => fc.count,
        };
        let available = entry
            .hits
            .iter()
            .fold(0u64, |acc, fc| acc.saturating_add(width(fc)));
        let mut out = Resolution {
            cursor: cursor.clone(),
            ..Default::default()
        };
        if req.start >= available || req.count == 0 {
            return Ok(out);
        }
        let end = req.start.saturating_add(req.count).min(available);

        // Consecutive entries naming the same file form one run over that
        // resource; offsets and the scan position are relative to the run.
        let mut incoming = cursor;
        let mut open: Option<HitFile> = None;
        let mut scan: Option<ScanCursor> = None;
        let mut run_file: Option<&str> = None;
        let mut run_first = 0u64;
        let mut at = req.start;
        let mut first = 0u64;
        for fc in &entry.hits {
            if at >= end {
                break;
            }
            if run_file != Some(fc.file.as_str()) {
                run_file = Some(fc.file.as_str());
                run_first = first;
                scan = None;
            }
            let last = first.saturating_add(width(fc));
            if at < last {
                if open.as_ref().is_none_or(|f| f.name != fc.file) {
                    let f = self
                        .source
                        .open(&fc.file)
                        .map_err(|e| CrpError::ResolutionIo {
                            file: fc.file.clone(),
                            source: Box::new(e),
                        })?;
                    debug!(qc = req.qc, file = %fc.file, "hit storage opened");
                    out.stats.resources_opened += 1;
                    open = Some(f);
                }
                if let Some(hf) = &open {
                    let results = hf.results(req.qc);
                    if let (true, Some((_, name))) = (scan.is_none(), sub) {
                        scan = Some(take_cursor(
                            &mut incoming,
                            req.qc,
                            name,
                            &fc.file,
                            at - run_first,
                        ));
                    }
                    while at < last && at < end {
                        let local = at - run_first;
                        let rec = match (&mut scan, sub) {
                            (Some(pos), Some((_, name))) => {
                                scan_to(results, pos, name, local, &mut out.stats)
                            }
                            _ => {
                                out.stats.scan_steps += 1;
                                usize::try_from(local).ok().and_then(|i| results.get(i))
                            }
                        }
                        .ok_or_else(|| short_storage(req.qc, &fc.file, results.len()))?;
                        out.locations.push(ResultLocation {
                            file: fc.file.clone(),
                            locs: rec.locs.clone(),
                            locw: rec.locw.clone(),
                            msg: rec.msg.clone(),
                        });
                        at += 1;
                    }
                    if scan.is_some() {
                        out.cursor = scan.clone();
                    }
                }
            }
            first = last;
        }
        Ok(out)
    }
}

/// Load the project's count table fresh and resolve against its hit directory.
pub fn resolve_page(
    handle: &ProjectHandle,
    req: &PageRequest,
    cursor: Option<ScanCursor>,
) -> Result<Resolution> {
    let table = CountTable::load(&handle.count_table_path())?;
    let source = FsHitSource::new(&handle.hits_dir);
    HitLocationResolver::new(&table, &source).resolve(req, cursor)
}

// Reuse the caller's cursor when it belongs to this resource and has not run past `ordinal`.
fn take_cursor(
    incoming: &mut Option<ScanCursor>,
    qc: usize,
    name: &str,
    file: &str,
    ordinal: u64,
) -> ScanCursor {
    let fresh = ScanCursor {
        qc,
        sub_category: name.to_string(),
        resource: file.to_string(),
        next_index: 0,
        matched: 0,
    };
    match incoming.take() {
        Some(c) if c.qc == qc && c.sub_category == name && c.resource == file => {
            if c.matched <= ordinal {
                debug!(file, next_index = c.next_index, "continuing scan cursor");
                c
            } else {
                warn!(file, matched = c.matched, ordinal, "scan cursor ahead of request; rescanning");
                fresh
            }
        }
        Some(c) => {
            // Might belong to a later resource of this request.
            *incoming = Some(c);
            fresh
        }
        None => fresh,
    }
}

fn scan_to<'r>(
    results: &'r [HitRecord],
    pos: &mut ScanCursor,
    name: &str,
    ordinal: u64,
    stats: &mut ScanStats,
) -> Option<&'r HitRecord> {
    while let Some(rec) = results.get(pos.next_index) {
        pos.next_index += 1;
        stats.scan_steps += 1;
        if rec.cat == name {
            pos.matched += 1;
            if pos.matched > ordinal {
                return Some(rec);
            }
        }
    }
    None
}

fn short_storage(qc: usize, file: &str, len: usize) -> CrpError {
    CrpError::range(format!(
        "hit storage {file} holds {len} results for qc {qc}, fewer than the count table declares"
    ))
}
