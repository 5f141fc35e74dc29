use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Abstract interface for file system operations.
///
/// The physical impl backs production; tests swap in tempdir-backed vaults
/// so everything here stays behind one seam.
pub trait FileSystem: Send + Sync {
    /// Read the entire contents of a file into a string.
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Write contents atomically: temp file in the same directory, then
    /// rename. A crash mid-write never leaves a half-written file visible
    /// at the canonical path.
    fn write_atomic(&self, path: &Path, contents: &str) -> std::io::Result<()>;

    /// Append one line to a file, creating it if absent.
    fn append_line(&self, path: &Path, line: &str) -> std::io::Result<()>;

    /// Rename a file. Callers fall back to copy+verify+delete when the
    /// underlying file system cannot rename across devices.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    fn remove_file(&self, path: &Path) -> std::io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Last modification time, used to pick the authoritative copy when a
    /// crash left the same note at two paths.
    fn mtime(&self, path: &Path) -> std::io::Result<std::time::SystemTime>;

    /// Recursively list all files with the given extension under the root.
    fn list_files(&self, root: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>>;
}

/// Standard implementation using std::fs and walkdir.
pub struct PhysicalFileSystem;

impl FileSystem for PhysicalFileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        let tmp = match path.file_name() {
            Some(stem) => {
                let mut tmp_name = stem.to_os_string();
                tmp_name.push(".tmp");
                path.with_file_name(tmp_name)
            }
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no file name",
                ))
            }
        };

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)
    }

    fn append_line(&self, path: &Path, line: &str) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mtime(&self, path: &Path) -> std::io::Result<std::time::SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn list_files(&self, root: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
        // Surface an unreadable root instead of silently yielding nothing.
        fs::read_dir(root)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext == extension {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
