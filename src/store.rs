//! File-store abstraction over a notes vault.
//!
//! The pipeline never touches `std::fs` directly. Every lookup goes through
//! [`FileStore`], keyed by vault-relative paths with `/` separators
//! (`"notes/trip.md"`, `"assets/photo.png"`). Two implementations ship:
//!
//! * [`VaultStore`]: a directory on disk.
//! * [`MemoryStore`]: an in-memory map, handy for tests and for hosts that
//!   keep their own file index.

use crate::error::Md2CmsError;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;
use walkdir::WalkDir;

/// The file operations the pipeline consumes from its host.
pub trait FileStore: Send + Sync {
    /// Read a note as UTF-8 text.
    fn read_text(&self, path: &str) -> io::Result<String>;

    /// Read a file's raw bytes.
    fn read_binary(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Replace a note's text in one write.
    fn write_text(&self, path: &str, text: &str) -> io::Result<()>;

    /// `true` when `path` names a regular file in the store.
    fn exists(&self, path: &str) -> bool;

    /// Every file in the store, as vault paths in lexicographic order.
    fn list_files(&self) -> io::Result<Vec<String>>;
}

/// Normalise a vault path lexically: drop empty and `.` segments, apply `..`,
/// strip leading `/`. Returns `None` when the path climbs above the vault root
/// or is empty.
pub fn normalize_vault_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Parent folder of a vault path (`""` for files at the root).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Last segment of a vault path.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("'{path}' is not in the vault"))
}

// ── VaultStore ───────────────────────────────────────────────────────────

/// A vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct VaultStore {
    root: PathBuf,
}

impl VaultStore {
    /// Open the vault rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, Md2CmsError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Md2CmsError::VaultNotFound {
                path: root.to_path_buf(),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a path on disk (absolute or relative to the working directory)
    /// into a vault path, when it lies inside the vault.
    pub fn vault_path_of(&self, disk_path: &Path) -> Option<String> {
        let root = self.root.canonicalize().ok()?;
        let full = disk_path.canonicalize().ok()?;
        let relative = full.strip_prefix(&root).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        normalize_vault_path(&joined)
    }

    fn disk_path(&self, path: &str) -> io::Result<PathBuf> {
        let normalized = normalize_vault_path(path).ok_or_else(|| not_found(path))?;
        Ok(normalized
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }
}

impl FileStore for VaultStore {
    fn read_text(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.disk_path(path)?)
    }

    fn read_binary(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.disk_path(path)?)
    }

    /// Atomic write: temp file in the same folder, then rename over the note.
    fn write_text(&self, path: &str, text: &str) -> io::Result<()> {
        let target = self.disk_path(path)?;
        let dir = target.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        debug!("Wrote {} bytes to {}", text.len(), target.display());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.disk_path(path).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Walks the vault, skipping hidden entries such as `.obsidian/` and `.git/`.
    fn list_files(&self) -> io::Result<Vec<String>> {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let joined = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(joined);
        }
        files.sort();
        Ok(files)
    }
}

// ── MemoryStore ──────────────────────────────────────────────────────────

/// An in-memory vault.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Insert or replace a file. The path is normalised first; invalid paths
    /// are ignored.
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        if let Some(p) = normalize_vault_path(path) {
            self.files
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(p, contents.into());
        }
    }

    fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        let key = normalize_vault_path(path).ok_or_else(|| not_found(path))?;
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

impl FileStore for MemoryStore {
    fn read_text(&self, path: &str) -> io::Result<String> {
        String::from_utf8(self.get(path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read_binary(&self, path: &str) -> io::Result<Vec<u8>> {
        self.get(path)
    }

    fn write_text(&self, path: &str, text: &str) -> io::Result<()> {
        let key = normalize_vault_path(path).ok_or_else(|| not_found(path))?;
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, text.as_bytes().to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_dots_and_slashes() {
        assert_eq!(normalize_vault_path("a/./b//c.png").as_deref(), Some("a/b/c.png"));
        assert_eq!(normalize_vault_path("/a/b.png").as_deref(), Some("a/b.png"));
        assert_eq!(normalize_vault_path("notes/../img/x.png").as_deref(), Some("img/x.png"));
        assert_eq!(normalize_vault_path("../x.png"), None);
        assert_eq!(normalize_vault_path(""), None);
        assert_eq!(normalize_vault_path("./"), None);
    }

    #[test]
    fn parent_and_file_name() {
        assert_eq!(parent_dir("notes/day/one.md"), "notes/day");
        assert_eq!(parent_dir("one.md"), "");
        assert_eq!(file_name("notes/day/one.md"), "one.md");
        assert_eq!(file_name("one.md"), "one.md");
    }

    #[test]
    fn memory_store_basic_ops() {
        let store = MemoryStore::new()
            .with_file("notes/a.md", "hello")
            .with_file("img/b.png", vec![1u8, 2, 3]);

        assert!(store.exists("notes/a.md"));
        assert!(store.exists("./img/b.png"));
        assert!(!store.exists("img/c.png"));
        assert_eq!(store.read_text("notes/a.md").unwrap(), "hello");
        assert_eq!(store.read_binary("img/b.png").unwrap(), vec![1, 2, 3]);
        assert_eq!(store.list_files().unwrap(), vec!["img/b.png", "notes/a.md"]);

        store.write_text("notes/a.md", "bye").unwrap();
        assert_eq!(store.read_text("notes/a.md").unwrap(), "bye");
    }

    #[test]
    fn vault_store_reads_lists_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(dir.path().join("notes/a.md"), "![x](b.png)").unwrap();
        std::fs::write(dir.path().join("notes/b.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(dir.path().join(".obsidian/app.json"), "{}").unwrap();

        let store = VaultStore::open(dir.path()).unwrap();
        assert_eq!(store.list_files().unwrap(), vec!["notes/a.md", "notes/b.png"]);
        assert!(store.exists("notes/b.png"));
        assert!(!store.exists("notes"));
        assert!(!store.exists("../outside.png"));
        assert_eq!(store.read_binary("notes/b.png").unwrap()[1], b'P');

        store.write_text("notes/a.md", "rewritten").unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/a.md")).unwrap(),
            "rewritten"
        );
        assert_eq!(
            store.vault_path_of(&dir.path().join("notes/a.md")).as_deref(),
            Some("notes/a.md")
        );
    }

    #[test]
    fn vault_store_open_missing_dir() {
        let err = VaultStore::open("/definitely/not/a/vault").unwrap_err();
        assert!(matches!(err, Md2CmsError::VaultNotFound { .. }));
    }
}
