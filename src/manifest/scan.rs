//! Directory scanning for snapshot directories.
//!
//! Dot-prefixed subdirectories are secondary index roots; their content is flattened
//! into the listing of the parent. Other subdirectories are not descended into.

use anyhow::{Context, Result};
use log::error;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::consts::{DATA_COMPONENT_SUFFIX, INDEX_DIR_PREFIX};

/// True when the last path component names a secondary index directory (".{index}").
pub fn is_secondary_index_folder(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(INDEX_DIR_PREFIX) && n.len() > 1)
        .unwrap_or(false)
}

/// All regular files under `dir`, with index subdirectories flattened in (at any depth).
///
/// A directory that does not exist yields nothing. Any other listing failure is logged
/// and that directory contributes nothing, the rest of the walk continues.
pub fn list_snapshot_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(cur) = stack.pop() {
        let rd = match fs::read_dir(&cur) {
            Ok(rd) => rd,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    error!("could not list directory content {}: {}", cur.display(), e);
                }
                continue;
            }
        };
        for entry in rd {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    error!("could not list directory content {}: {}", cur.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if is_secondary_index_folder(&path) {
                    stack.push(path);
                }
            } else {
                out.push(path);
            }
        }
    }

    out.sort();
    out
}

/// Data component files of a snapshot directory: top level plus one level of index dirs.
pub fn data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut index_dirs = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            if is_secondary_index_folder(&path) {
                index_dirs.push(path);
            }
        } else if is_data_component(&path) {
            out.push(path);
        }
    }

    for idx in index_dirs {
        for entry in fs::read_dir(&idx).with_context(|| format!("list {}", idx.display()))? {
            let path = entry.with_context(|| format!("list {}", idx.display()))?.path();
            if path.is_file() && is_data_component(&path) {
                out.push(path);
            }
        }
    }

    out.sort();
    Ok(out)
}

fn is_data_component(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(DATA_COMPONENT_SUFFIX))
        .unwrap_or(false)
}

/// Recursive size of all files under `dir` (0 if missing; unreadable entries are skipped).
pub fn folder_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Size of one file, 0 when it cannot be read.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
