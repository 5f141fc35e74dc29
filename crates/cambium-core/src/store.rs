//! Vault store: translates between hierarchical names and physical files
//! and owns all persistence. The in-memory graph never touches the disk
//! directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content;
use crate::error::{EngineError, Result};
use crate::model::{FrontMatter, Note, NoteId};
use crate::vfs::FileSystem;

pub struct VaultStore {
    pub name: String,
    pub root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl VaultStore {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        VaultStore {
            name: name.into(),
            root: root.into(),
            fs,
        }
    }

    /// Canonical path for a note name: `<root>/<name>.md`.
    pub fn path_from_name(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.md", name))
    }

    /// Note name from an on-disk path: the file stem.
    pub fn name_from_path(&self, path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// One pass over every note file under the root. Lazy and
    /// non-restartable: files are listed up front, parsed as the caller
    /// drains the iterator. Notes without an id get one minted here and
    /// persisted back, so ids never differ between scans.
    pub fn scan(&self) -> Result<Scan<'_>> {
        let files = self
            .fs
            .list_files(&self.root, "md")
            .map_err(|e| EngineError::io(&self.root, e))?;
        Ok(Scan {
            store: self,
            files: files.into_iter(),
        })
    }

    /// Load and parse one note file, minting a persistent id if absent.
    pub fn load(&self, path: &Path) -> Result<Note> {
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|e| EngineError::io(path, e))?;
        let parsed = content::parse(&text);

        let name = self.name_from_path(path);
        let mut custom = serde_json::Map::new();
        let mut id = None;

        if let Some(serde_json::Value::Object(front)) = parsed.front {
            for (key, value) in front {
                match key.as_str() {
                    "id" => {
                        id = value.as_str().map(|s| NoteId(s.to_string()));
                    }
                    "title" => {}
                    _ => {
                        custom.insert(key, value);
                    }
                }
            }
        }

        let body = text[parsed.body_offset..]
            .strip_prefix('\n')
            .unwrap_or(&text[parsed.body_offset..])
            .to_string();

        let minted = id.is_none();
        let note = Note {
            id: id.unwrap_or_else(NoteId::generate),
            name,
            vault: self.name.clone(),
            path: Some(path.to_path_buf()),
            title: parsed.title,
            custom,
            body,
            links: parsed.links,
            stub: false,
        };

        if minted {
            log::debug!("minted id {} for '{}', persisting back", note.id, note.name);
            self.persist(&note)?;
        }

        Ok(note)
    }

    /// Write metadata + body atomically at the note's canonical path.
    pub fn persist(&self, note: &Note) -> Result<PathBuf> {
        let path = self.path_from_name(&note.name);
        let front = FrontMatter {
            id: note.id.0.clone(),
            title: note.title.clone(),
            custom: note.custom.clone(),
        };
        let yaml = serde_yaml::to_string(&front).map_err(|e| {
            EngineError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        let contents = format!("---\n{}---\n{}", yaml, note.body);

        self.fs
            .write_atomic(&path, &contents)
            .map_err(|e| EngineError::io(&path, e))?;
        Ok(path)
    }

    /// Delete the note file. A missing file is already-satisfied under the
    /// default policy; `strict` turns it into a failure.
    pub fn remove(&self, note: &Note, strict: bool) -> Result<()> {
        let path = self.path_from_name(&note.name);
        match self.fs.remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !strict => Ok(()),
            Err(e) => Err(EngineError::io(&path, e)),
        }
    }

    /// Move a note file to the path derived from `new_name`. Atomic rename
    /// where the file system supports it, else copy + verify + delete.
    pub fn relocate(&self, note: &Note, new_name: &str) -> Result<PathBuf> {
        let old_path = self.path_from_name(&note.name);
        let new_path = self.path_from_name(new_name);

        if self.fs.rename(&old_path, &new_path).is_err() {
            let contents = self
                .fs
                .read_to_string(&old_path)
                .map_err(|e| EngineError::io(&old_path, e))?;
            self.fs
                .write_atomic(&new_path, &contents)
                .map_err(|e| EngineError::io(&new_path, e))?;
            if !self.fs.exists(&new_path) {
                return Err(EngineError::io(
                    &new_path,
                    std::io::Error::new(std::io::ErrorKind::Other, "copy not visible after write"),
                ));
            }
            self.fs
                .remove_file(&old_path)
                .map_err(|e| EngineError::io(&old_path, e))?;
        }

        Ok(new_path)
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }
}

/// Lazy scan sequence; one pass per call to [`VaultStore::scan`].
pub struct Scan<'a> {
    store: &'a VaultStore,
    files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for Scan<'_> {
    type Item = Result<Note>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files.next()?;
        Some(self.store.load(&path))
    }
}
