pub mod select;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::error::{ConvertError, Result};

/// EPUB readers expect this entry first and uncompressed
const MIMETYPE_ENTRY: &str = "mimetype";

/// Where the working tree lives for one run
#[derive(Debug, Clone, Default)]
pub enum WorkdirLocation {
    /// Fresh, uniquely named temporary directory
    #[default]
    Temporary,
    /// Caller-chosen directory; any existing content is destroyed first
    At(PathBuf),
}

enum TreeRoot {
    Temp(TempDir),
    Fixed(PathBuf),
}

/// Extracted archive contents, owned by exactly one run.
///
/// The directory is removed when this value is dropped, on success and failure
/// alike, unless [`WorkingTree::set_keep`] or [`WorkingTree::keep`] asked for it
/// to stay.
pub struct WorkingTree {
    root: Option<TreeRoot>,
    path: PathBuf,
    keep_on_drop: bool,
}

impl WorkingTree {
    pub fn create(location: &WorkdirLocation) -> Result<Self> {
        match location {
            WorkdirLocation::Temporary => {
                let dir = tempfile::Builder::new()
                    .prefix("epub-zhconv-")
                    .tempdir()
                    .map_err(|e| ConvertError::io(std::env::temp_dir(), e))?;
                let path = dir.path().to_path_buf();
                Ok(Self {
                    root: Some(TreeRoot::Temp(dir)),
                    path,
                    keep_on_drop: false,
                })
            }
            WorkdirLocation::At(path) => {
                if path.exists() {
                    tracing::info!("Removing stale working tree at {:?}", path);
                    fs::remove_dir_all(path).map_err(|e| ConvertError::io(path, e))?;
                }
                fs::create_dir_all(path).map_err(|e| ConvertError::io(path, e))?;
                Ok(Self {
                    root: Some(TreeRoot::Fixed(path.clone())),
                    path: path.clone(),
                    keep_on_drop: false,
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decide now whether the directory survives the drop, so a failing run
    /// still leaves it for diagnosis.
    pub fn set_keep(&mut self, keep: bool) {
        self.keep_on_drop = keep;
    }

    /// Leave the directory on disk and return its path.
    pub fn keep(mut self) -> PathBuf {
        self.keep_on_drop = true;
        self.path.clone()
    }
}

impl Drop for WorkingTree {
    fn drop(&mut self) {
        if self.keep_on_drop {
            let kept = match self.root.take() {
                Some(TreeRoot::Temp(dir)) => dir.keep(),
                _ => self.path.clone(),
            };
            tracing::info!("Working tree kept at {:?}", kept);
            return;
        }
        match self.root.take() {
            Some(TreeRoot::Temp(dir)) => {
                if let Err(e) = dir.close() {
                    tracing::warn!("Failed to remove working tree {:?}: {}", self.path, e);
                }
            }
            Some(TreeRoot::Fixed(path)) => {
                if let Err(e) = fs::remove_dir_all(&path) {
                    tracing::warn!("Failed to remove working tree {:?}: {}", path, e);
                }
            }
            None => {}
        }
    }
}

/// Extract every entry of `archive_path` into a fresh working tree.
///
/// The archive is validated before the tree is created, so an unreadable input
/// leaves nothing behind.
pub fn unpack(archive_path: &Path, location: &WorkdirLocation) -> Result<WorkingTree> {
    let file = fs::File::open(archive_path).map_err(|e| ConvertError::read(archive_path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ConvertError::read(archive_path, e))?;

    let tree = WorkingTree::create(location)?;
    let target_dir = tree.path().to_path_buf();
    tracing::info!(
        "Extracting {} entries from {:?} into {:?}",
        archive.len(),
        archive_path.file_name().unwrap_or_default(),
        target_dir
    );

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ConvertError::read(archive_path, e))?;
        // Sanitize path (avoid ../)
        let outpath = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                tracing::warn!("Skipping unsafe entry name: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| ConvertError::io(&outpath, e))?;
        } else {
            if let Some(p) = outpath.parent() {
                fs::create_dir_all(p).map_err(|e| ConvertError::io(p, e))?;
            }
            let mut outfile = fs::File::create(&outpath).map_err(|e| ConvertError::io(&outpath, e))?;
            io::copy(&mut entry, &mut outfile).map_err(|e| ConvertError::read(archive_path, e))?;
        }
    }

    Ok(tree)
}

/// Zip the working tree into `output`. Returns the number of entries written.
///
/// Written to a temporary file next to `output` and renamed into place, so a
/// failed write leaves no partial archive. The staging file is created 0600;
/// `permissions` (usually the input archive's) is applied before the rename.
pub fn repack(tree: &Path, output: &Path, permissions: Option<fs::Permissions>) -> Result<usize> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let staging = NamedTempFile::new_in(&parent).map_err(|e| ConvertError::write(output, e))?;

    let mut zip = zip::ZipWriter::new(staging.as_file());
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = select::walk_tree(tree)?;
    // mimetype goes first
    if let Some(pos) = entries
        .iter()
        .position(|e| !e.is_dir && e.relative == MIMETYPE_ENTRY)
    {
        let mimetype = entries.remove(pos);
        entries.insert(0, mimetype);
    }

    let mut written = 0;
    for entry in &entries {
        if entry.is_dir {
            zip.add_directory(entry.relative.as_str(), deflated)
                .map_err(|e| ConvertError::write(output, e))?;
        } else {
            let options = if entry.relative == MIMETYPE_ENTRY { stored } else { deflated };
            let data = fs::read(&entry.path).map_err(|e| ConvertError::io(&entry.path, e))?;
            zip.start_file(entry.relative.as_str(), options)
                .map_err(|e| ConvertError::write(output, e))?;
            zip.write_all(&data).map_err(|e| ConvertError::write(output, e))?;
        }
        written += 1;
    }
    zip.finish().map_err(|e| ConvertError::write(output, e))?;
    drop(zip);

    if let Some(perms) = permissions {
        fs::set_permissions(staging.path(), perms).map_err(|e| ConvertError::write(output, e))?;
    }
    staging
        .persist(output)
        .map_err(|e| ConvertError::write(output, e.error))?;
    tracing::info!("Wrote {} entries to {:?}", written, output);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn create_test_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let zip_path = dir.join(name);
        let file = fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (entry_name, content) in files {
            writer.start_file(entry_name.to_string(), options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        zip_path
    }

    #[test]
    fn unpack_restores_relative_paths() {
        let dir = TempDir::new().unwrap();
        let zip_path = create_test_zip(
            dir.path(),
            "book.epub",
            &[
                ("mimetype", b"application/epub+zip"),
                ("OEBPS/Text/ch1.xhtml", b"<p>x</p>"),
                ("OEBPS/Images/cover.jpg", &[0xff, 0xd8, 0x00, 0x01]),
            ],
        );

        let tree = unpack(&zip_path, &WorkdirLocation::Temporary).unwrap();
        assert_eq!(fs::read(tree.path().join("OEBPS/Images/cover.jpg")).unwrap(), [0xff, 0xd8, 0x00, 0x01]);
        assert_eq!(fs::read_to_string(tree.path().join("OEBPS/Text/ch1.xhtml")).unwrap(), "<p>x</p>");
    }

    #[test]
    fn working_tree_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let zip_path = create_test_zip(dir.path(), "a.epub", &[("a.html", b"a")]);
        let tree = unpack(&zip_path, &WorkdirLocation::Temporary).unwrap();
        let path = tree.path().to_path_buf();
        assert!(path.exists());
        drop(tree);
        assert!(!path.exists());
    }

    #[test]
    fn fixed_location_replaces_stale_tree() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(work.join("old")).unwrap();
        fs::write(work.join("old/stale.html"), "stale").unwrap();

        let zip_path = create_test_zip(dir.path(), "a.epub", &[("a.html", b"a")]);
        let tree = unpack(&zip_path, &WorkdirLocation::At(work.clone())).unwrap();
        assert!(!work.join("old").exists());
        assert!(work.join("a.html").exists());

        let kept = tree.keep();
        assert_eq!(kept, work);
        assert!(work.join("a.html").exists());
    }

    #[test]
    fn invalid_archive_is_read_error_without_tree() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.epub");
        fs::write(&bogus, b"not a zip").unwrap();
        let work = dir.path().join("work");

        let err = unpack(&bogus, &WorkdirLocation::At(work.clone())).err().unwrap();
        assert!(matches!(err, ConvertError::ArchiveRead { .. }));
        assert!(!work.exists());

        let err = unpack(&dir.path().join("missing.epub"), &WorkdirLocation::Temporary).err().unwrap();
        assert!(matches!(err, ConvertError::ArchiveRead { .. }));
    }

    #[test]
    fn repack_puts_uncompressed_mimetype_first() {
        let dir = TempDir::new().unwrap();
        let zip_path = create_test_zip(
            dir.path(),
            "in.epub",
            &[
                ("META-INF/container.xml", b"<container/>"),
                ("OEBPS/a.xhtml", b"<p>a</p>"),
                ("mimetype", b"application/epub+zip"),
            ],
        );
        let tree = unpack(&zip_path, &WorkdirLocation::Temporary).unwrap();
        let out = dir.path().join("out.epub");
        let written = repack(tree.path(), &out, None).unwrap();
        assert_eq!(written, 3);

        let mut archive = zip::ZipArchive::new(fs::File::open(&out).unwrap()).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);

        let mut content = String::new();
        archive
            .by_name("OEBPS/a.xhtml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<p>a</p>");
    }

    #[test]
    fn repack_keeps_empty_directories() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("OEBPS/Fonts")).unwrap();
        fs::write(tree.join("OEBPS/a.html"), "a").unwrap();
        let out = dir.path().join("out.epub");
        repack(&tree, &out, None).unwrap();

        let archive = zip::ZipArchive::new(fs::File::open(&out).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, ["OEBPS/Fonts/", "OEBPS/a.html"]);
    }

    #[test]
    fn set_keep_survives_drop() {
        let dir = TempDir::new().unwrap();
        let zip_path = create_test_zip(dir.path(), "a.epub", &[("a.html", b"a")]);
        let mut tree = unpack(&zip_path, &WorkdirLocation::Temporary).unwrap();
        tree.set_keep(true);
        let path = tree.path().to_path_buf();
        drop(tree);
        assert!(path.join("a.html").exists());
        fs::remove_dir_all(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn repack_applies_requested_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(&tree).unwrap();
        fs::write(tree.join("a.html"), "a").unwrap();

        let out = dir.path().join("shared.epub");
        repack(&tree, &out, Some(fs::Permissions::from_mode(0o644))).unwrap();
        assert_eq!(fs::metadata(&out).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn unwritable_output_is_write_error() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(&tree).unwrap();
        fs::write(tree.join("a.html"), "a").unwrap();
        let out = dir.path().join("no/such/dir/out.epub");
        let err = repack(&tree, &out, None).unwrap_err();
        assert!(matches!(err, ConvertError::ArchiveWrite { .. }));
        assert!(!out.exists());
    }
}
