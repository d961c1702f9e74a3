//! Deterministic traversal of the working tree.
//!
//! Depth-first; inside a directory files come before subdirectories and
//! siblings are ordered by name.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{ConvertError, Result};

/// File name suffixes whose content is converted
pub const CONVERTIBLE_EXTENSIONS: [&str; 4] = [".html", ".xhtml", ".ncx", ".opf"];

pub fn is_convertible(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| CONVERTIBLE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

fn files_then_dirs(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn walker(root: &Path) -> impl Iterator<Item = Result<DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by(files_then_dirs)
        .into_iter()
        .map(|entry| {
            entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop in working tree"));
                ConvertError::io(path, source)
            })
        })
}

/// Lazily yield convertible files under `root`.
///
/// Other files are never opened.
pub fn convertible_files(root: &Path) -> impl Iterator<Item = Result<PathBuf>> {
    walker(root).filter_map(|entry| match entry {
        Ok(e) if e.file_type().is_file() && is_convertible(e.path()) => Some(Ok(e.into_path())),
        Ok(_) => None,
        Err(e) => Some(Err(e)),
    })
}

/// One entry to be written back into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    /// `/`-separated path relative to the tree root
    pub relative: String,
    pub is_dir: bool,
}

/// Every file plus every empty directory under `root`, in traversal order.
pub fn walk_tree(root: &Path) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    for entry in walker(root) {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            let mut children = fs::read_dir(entry.path()).map_err(|e| ConvertError::io(entry.path(), e))?;
            if children.next().is_some() {
                continue;
            }
        }
        let relative = relative_name(root, entry.path());
        entries.push(TreeEntry {
            path: entry.into_path(),
            relative,
            is_dir,
        });
    }
    Ok(entries)
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
