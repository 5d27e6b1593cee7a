//! File selection for a share session.
//!
//! This module handles:
//! - File and directory enumeration
//! - Metadata collection (size, MIME type)
//! - The curated file set handed to the onion service on start
//!
//! The session core never reads file contents; it only curates the set of
//! files the background service will publish.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Metadata for a file in the share set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Relative path from the share root
    pub relative_path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// MIME type
    pub mime_type: Option<String>,
}

impl FileMetadata {
    /// Create metadata from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path to the file
    /// * `base` - Base directory for computing relative path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path, base: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let relative_path = path.strip_prefix(base).unwrap_or(path).to_path_buf();

        let mime_type = mime_guess::from_path(path).first().map(|m| m.to_string());

        Ok(Self {
            relative_path,
            size: metadata.len(),
            mime_type,
        })
    }

    /// Get the file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
    }
}

/// An immutable snapshot of the curated file selection.
///
/// This is what the session hands to the onion service when sharing starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    files: Vec<FileMetadata>,
}

impl FileSet {
    /// Create a file set from a list of file metadata.
    #[must_use]
    pub fn new(files: Vec<FileMetadata>) -> Self {
        Self { files }
    }

    /// Number of files in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set contains no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Iterate over the files in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &FileMetadata> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a FileMetadata;
    type IntoIter = std::slice::Iter<'a, FileMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Options for file enumeration.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Follow symlinks
    pub follow_symlinks: bool,
    /// Include hidden files
    pub include_hidden: bool,
    /// Maximum depth for directories
    pub max_depth: Option<usize>,
}

/// The file-selection collaborator of a share session.
///
/// The session state machine owns one of these and drives it from
/// `add_files` commands; it never touches the filesystem itself.
pub trait FileRegistry: Send {
    /// Add a selection of paths to the registry.
    ///
    /// On success the registry contains the union of the previous set and
    /// the new selection, and the updated set is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is empty or a path is unreadable.
    /// The registry is unchanged on error.
    fn add_files(&mut self, selection: &[PathBuf]) -> Result<FileSet>;

    /// The current file set.
    fn file_set(&self) -> FileSet;

    /// Whether no files have been added.
    fn is_empty(&self) -> bool;

    /// Remove all files.
    fn clear(&mut self);
}

/// A [`FileRegistry`] backed by the local filesystem.
///
/// Directories are walked recursively; duplicate relative paths from
/// repeated adds are kept once.
#[derive(Debug, Default)]
pub struct DiskFileRegistry {
    options: ScanOptions,
    files: Vec<FileMetadata>,
}

impl DiskFileRegistry {
    /// Create an empty registry with default scan options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given scan options.
    #[must_use]
    pub fn with_options(options: ScanOptions) -> Self {
        Self {
            options,
            files: Vec::new(),
        }
    }

    fn enumerate(&self, paths: &[PathBuf]) -> Result<Vec<FileMetadata>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_file() {
                let base = path.parent().unwrap_or(path);
                files.push(FileMetadata::from_path(path, base)?);
            } else if path.is_dir() {
                self.enumerate_directory(path, &mut files)?;
            } else {
                return Err(Error::FileNotFound(path.display().to_string()));
            }
        }

        Ok(files)
    }

    fn enumerate_directory(&self, dir: &Path, files: &mut Vec<FileMetadata>) -> Result<()> {
        let walker = walkdir::WalkDir::new(dir)
            .follow_links(self.options.follow_symlinks)
            .max_depth(self.options.max_depth.unwrap_or(usize::MAX));

        for entry in walker.into_iter().filter_map(std::result::Result::ok) {
            let path = entry.path();

            if !self.options.include_hidden {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with('.') {
                        continue;
                    }
                }
            }

            if path.is_file() {
                files.push(FileMetadata::from_path(path, dir)?);
            }
        }

        Ok(())
    }
}

impl FileRegistry for DiskFileRegistry {
    fn add_files(&mut self, selection: &[PathBuf]) -> Result<FileSet> {
        if selection.is_empty() {
            return Err(Error::EmptySelection);
        }

        let new_files = self.enumerate(selection)?;

        let mut seen: HashSet<PathBuf> = self
            .files
            .iter()
            .map(|f| f.relative_path.clone())
            .collect();
        for file in new_files {
            if seen.insert(file.relative_path.clone()) {
                self.files.push(file);
            }
        }

        Ok(self.file_set())
    }

    fn file_set(&self) -> FileSet {
        FileSet::new(self.files.clone())
    }

    fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn clear(&mut self) {
        self.files.clear();
    }
}
