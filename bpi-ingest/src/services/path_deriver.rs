//! Heuristic path deriver for easy import
//!
//! Every regular file below a bucket is a candidate; its catalog project name
//! is a fixed character window `[offset, offset + length)` of the file stem.
//! Discovery only lists directories; nothing is read or written.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One file to import and the project it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub bucket: PathBuf,
    pub file: PathBuf,
    /// Derived project name
    pub name: String,
}

/// Character window of `stem`, or `None` when the stem is too short
pub fn derive_name(stem: &str, offset: usize, length: usize) -> Option<String> {
    let end = offset.checked_add(length)?;
    if stem.chars().count() < end {
        return None;
    }
    Some(stem.chars().skip(offset).take(length).collect())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Immediate, non-hidden subdirectories of `root`, sorted by name
pub fn list_buckets(root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list dataset root {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut buckets: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    buckets.sort();
    buckets
}

/// Restartable source of [`ImportCandidate`]s below a dataset root
#[derive(Debug, Clone)]
pub struct PathDeriver {
    root: PathBuf,
    offset: usize,
    length: usize,
}

impl PathDeriver {
    pub fn new(root: impl Into<PathBuf>, offset: usize, length: usize) -> Self {
        Self {
            root: root.into(),
            offset,
            length,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh lazy pass over the dataset root
    pub fn iter(&self) -> ImportableFiles {
        ImportableFiles {
            root: self.root.clone(),
            offset: self.offset,
            length: self.length,
            buckets: None,
            current: None,
        }
    }
}

impl IntoIterator for &PathDeriver {
    type Item = ImportCandidate;
    type IntoIter = ImportableFiles;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy walk: buckets are listed on first use, files one at a time
pub struct ImportableFiles {
    root: PathBuf,
    offset: usize,
    length: usize,
    buckets: Option<std::vec::IntoIter<PathBuf>>,
    current: Option<(PathBuf, walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>)>,
}

fn not_hidden(entry: &DirEntry) -> bool {
    !is_hidden(entry)
}

impl ImportableFiles {
    fn next_bucket(&mut self) -> Option<PathBuf> {
        let root = &self.root;
        self.buckets
            .get_or_insert_with(|| list_buckets(root).into_iter())
            .next()
    }

    fn candidate(&self, bucket: &Path, entry: &DirEntry) -> Option<ImportCandidate> {
        let stem = entry.path().file_stem()?.to_string_lossy();
        match derive_name(&stem, self.offset, self.length) {
            Some(name) => Some(ImportCandidate {
                bucket: bucket.to_path_buf(),
                file: entry.path().to_path_buf(),
                name,
            }),
            None => {
                debug!(
                    file = %entry.path().display(),
                    "File name too short for project name window [{}, {})",
                    self.offset,
                    self.offset.saturating_add(self.length)
                );
                None
            }
        }
    }
}

impl Iterator for ImportableFiles {
    type Item = ImportCandidate;

    fn next(&mut self) -> Option<ImportCandidate> {
        loop {
            if self.current.is_none() {
                let bucket = self.next_bucket()?;
                let walker = WalkDir::new(&bucket)
                    .min_depth(1)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(not_hidden as fn(&DirEntry) -> bool);
                self.current = Some((bucket, walker));
            }

            let (bucket, walker) = self.current.as_mut()?;
            match walker.next() {
                Some(Ok(entry)) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let bucket = bucket.clone();
                    if let Some(candidate) = self.candidate(&bucket, &entry) {
                        return Some(candidate);
                    }
                }
                Some(Err(e)) => {
                    warn!("Error accessing entry: {}", e);
                }
                None => {
                    self.current = None;
                }
            }
        }
    }
}
