//! Parent-record loading from `.json` / `.jsonl` files or directory trees.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::ParentRecord;

/// Load records from a file or, recursively, from every `.json`/`.jsonl`
/// file under a directory (in path order). `source_file` defaults to the
/// originating file name.
pub fn load_records(path: &Path) -> Result<Vec<ParentRecord>> {
    if !path.exists() { return Err(Error::NotFound(path.display().to_string())); }
    let files = if path.is_dir() { record_files(path) } else { vec![path.to_path_buf()] };
    let mut records = Vec::new();
    for file in &files {
        let loaded = load_file(file)?;
        debug!(file = %file.display(), records = loaded.len(), "loaded records");
        records.extend(loaded);
    }
    info!(files = files.len(), records = records.len(), "records loaded");
    Ok(records)
}

fn record_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matches!(extension(p).as_deref(), Some("json" | "jsonl")))
        .collect();
    files.sort();
    files
}

fn extension(p: &Path) -> Option<String> { p.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) }

fn load_file(file: &Path) -> Result<Vec<ParentRecord>> {
    let raw = fs::read_to_string(file)?;
    let mut records: Vec<ParentRecord> = if extension(file).as_deref() == Some("jsonl") {
        raw.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| serde_json::from_str(l).map_err(|e| Error::Operation(format!("{}:{}: {e}", file.display(), i + 1))))
            .collect::<Result<_>>()?
    } else {
        serde_json::from_str(&raw).map_err(|e| Error::Operation(format!("{}: {e}", file.display())))?
    };
    let source = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    for record in &mut records {
        if record.source_file.is_none() { record.source_file = Some(source.clone()); }
    }
    Ok(records)
}
