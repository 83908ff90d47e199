use std::path::{Path, PathBuf};

use crp_core::ProjectCache;
use crp_core::config::Settings;
use crp_core::counts::table::CountTable;
use crp_core::error::{CrpError, Result};
use crp_core::loader_factory::{Backend, open_loader};
use crp_core::resolve::{PageRequest, ScanCursor, resolve_page};
use crp_core::upload::WriteSummary;
use crp_core::upload::registry::{Accepted, Fragment, UploadRegistry};
use tracing::debug;

fn cache_from(settings: Settings) -> ProjectCache {
    ProjectCache::new(settings, open_loader(Backend::Fs))
}

pub fn handle_project_show(settings: Settings, project: String, user: String) -> Result<()> {
    let cache = cache_from(settings);
    let h = cache.get_or_load(&project, &user)?;
    println!("{}  ({}@{})", h.display_name, h.project(), h.user());
    println!("  descriptor {}", h.descriptor_path.display());
    println!("  out        {}", h.out_dir.display());
    println!("  xq         {}", h.query_dir.display());
    println!("  dbase      {}", h.dbase_dir.display());
    println!("  hits       {}", h.hits_dir.display());
    Ok(())
}

pub fn handle_project_discover(settings: Settings, user: String) -> Result<()> {
    let cache = cache_from(settings);
    for name in cache.discover(&user)? {
        println!("{name}");
    }
    Ok(())
}

pub fn handle_counts(
    settings: Settings,
    project: String,
    user: String,
    only_qc: Option<usize>,
) -> Result<()> {
    let cache = cache_from(settings);
    let h = cache.get_or_load(&project, &user)?;
    let table = CountTable::load(&h.count_table_path())?;
    if let Some(qc) = only_qc {
        if table.qc(qc).is_none() {
            return Err(CrpError::range(format!(
                "qc {qc} out of range 1..={}",
                table.len()
            )));
        }
    }
    for (i, qc) in table.iter().enumerate() {
        let n = i + 1;
        if only_qc.is_some_and(|q| q != n) {
            continue;
        }
        println!("qc {n}: {} hits in {} files", qc.total(), qc.hits.len());
        for name in &qc.subcats {
            println!("  {name}: {}", qc.sub_total(name).unwrap_or(0));
        }
    }
    Ok(())
}

pub fn handle_resolve(
    settings: Settings,
    project: String,
    user: String,
    qc: usize,
    sub_category: Option<String>,
    start: u64,
    count: u64,
    cursor_file: Option<PathBuf>,
) -> Result<()> {
    let cache = cache_from(settings);
    let h = cache.get_or_load(&project, &user)?;

    let cursor: Option<ScanCursor> = match &cursor_file {
        Some(p) if p.is_file() => Some(serde_json::from_str(&std::fs::read_to_string(p)?)?),
        _ => None,
    };
    let req = PageRequest {
        qc,
        sub_category,
        start,
        count,
    };
    debug!(project = %project, user = %user, qc, reuse_cursor = cursor.is_some(), "resolving page");
    let res = resolve_page(&h, &req, cursor)?;
    if let (Some(p), Some(c)) = (&cursor_file, &res.cursor) {
        std::fs::write(p, serde_json::to_string(c)?)?;
    }
    println!("{}", serde_json::to_string_pretty(&res)?);
    Ok(())
}

pub fn handle_assemble(
    settings: Settings,
    user: String,
    file: String,
    total: u32,
    out_dir: PathBuf,
    fragments: Vec<PathBuf>,
) -> Result<()> {
    let registry = UploadRegistry::new(settings.upload);
    for path in &fragments {
        let frag = Fragment {
            user: user.clone(),
            file: file.clone(),
            number: chunk_number(path)?,
            total,
            payload: std::fs::read(path)?,
        };
        match registry.accept(frag, &out_dir)? {
            Accepted::Pending { received, total } => {
                eprintln!("assemble: {received}/{total} chunks");
            }
            Accepted::Complete(summary) => {
                report(&out_dir.join(&file), &summary);
                return Ok(());
            }
            Accepted::AlreadyComplete => return Ok(()),
        }
    }

    // Fragments ran out before the upload was complete: write what arrived.
    let upload = registry
        .get(&user, &file)
        .ok_or_else(|| CrpError::Format("no fragments given".into()))?;
    eprintln!("assemble: missing chunks {:?}", upload.missing());
    let target = out_dir.join(&file);
    let summary = upload.write(&target)?;
    report(&target, &summary);
    Ok(())
}

fn report(path: &Path, s: &WriteSummary) {
    println!("{}  {} bytes  blake3={}", path.display(), s.bytes, s.digest);
    if !s.gaps.is_empty() {
        println!("  gaps: {:?}", s.gaps);
    }
}

fn chunk_number(path: &Path) -> Result<u32> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<u32>().ok())
        .ok_or_else(|| {
            CrpError::Format(format!(
                "fragment {} has no numeric chunk extension",
                path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_number_from_extension() {
        assert_eq!(chunk_number(Path::new("upload/part.3")).unwrap(), 3);
        assert!(chunk_number(Path::new("upload/part.txt")).is_err());
        assert!(chunk_number(Path::new("upload/part")).is_err());
    }

    #[test]
    fn assemble_writes_out_of_order_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let frags = dir.path().join("frags");
        std::fs::create_dir_all(&frags).unwrap();
        let mut paths = Vec::new();
        for (n, body) in [(3, "C"), (1, "A"), (2, "B")] {
            let p = frags.join(format!("doc.{n}"));
            std::fs::write(&p, body).unwrap();
            paths.push(p);
        }
        let out = dir.path().join("out");
        handle_assemble(
            Settings::default(),
            "alice".into(),
            "doc.txt".into(),
            3,
            out.clone(),
            paths,
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(out.join("doc.txt")).unwrap(), "ABC");
    }
}
