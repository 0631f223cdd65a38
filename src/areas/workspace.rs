use crate::artifacts::index::index_entry::EntryMetadata;
use crate::errors::Error;
use anyhow::Context;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Name of the control directory, never part of the tracked content
pub const CONTROL_DIR: &str = ".git";

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ignored(name: &std::ffi::OsStr) -> bool {
        name == CONTROL_DIR
    }

    /// Every file below `root` (relative to the worktree), as sorted
    /// `/`-separated paths
    pub fn list_files(&self, root: &str) -> anyhow::Result<Vec<String>> {
        let start = self.path.join(root);

        if start.is_file() {
            return Ok(vec![root.to_string()]);
        }

        let mut files = WalkDir::new(&start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !Self::is_ignored(entry.file_name()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.relative(entry.path()))
            .collect::<Vec<_>>();
        files.sort();

        Ok(files)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(self.path.as_ref()).ok()?;
        let parts = relative
            .components()
            .map(|component| match component {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        Some(parts.join("/"))
    }

    /// Turn a user-supplied pathspec into a worktree-relative path
    ///
    /// `.` and the worktree itself map to `""`. Paths outside the worktree or
    /// that do not exist are rejected.
    pub fn normalize_pathspec(&self, pathspec: &str) -> anyhow::Result<String> {
        let candidate = self.path.join(pathspec);
        let absolute = candidate
            .canonicalize()
            .map_err(|_| Error::invalid_pathspec(pathspec))?;

        if absolute.as_path() == self.path.as_ref() {
            return Ok(String::new());
        }

        let relative = self
            .relative(&absolute)
            .ok_or_else(|| Error::invalid_pathspec(pathspec))?;
        if relative.split('/').any(|part| part == CONTROL_DIR) {
            return Err(Error::invalid_pathspec(pathspec).into());
        }

        Ok(relative)
    }

    pub fn exists(&self, file_path: &str) -> bool {
        self.path.join(file_path).is_file()
    }

    pub fn read_file(&self, file_path: &str) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);

        let content = std::fs::read(&full_path)
            .with_context(|| format!("Unable to read file {}", full_path.display()))?;

        Ok(Bytes::from(content))
    }

    pub fn stat_file(&self, file_path: &str) -> anyhow::Result<EntryMetadata> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::metadata(&full_path)
            .with_context(|| format!("Unable to stat file {}", full_path.display()))?;

        Ok(EntryMetadata::from(&metadata))
    }

    pub fn absolute(&self, file_path: &str) -> PathBuf {
        self.path.join(file_path)
    }
}
