//! Bucket dependency resolution
//!
//! Each dataset folder of a bucket names itself in `METADATA/dataset.xml` and
//! may declare the dataset it complements. The resolver turns those
//! declarations into a [`DependencyGraph`] (complemented alias → complementing
//! aliases) plus an alias → folder map. Unusable entries are skipped with a
//! warning; they never stop resolution of the rest of the bucket.

use super::descriptor::{metadata_file, DatasetDescriptor};
use crate::models::dataset::{DatasetNode, DependencyGraph, DATASET_XML, METADATA_DIR};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The bucket itself cannot be listed
    #[error("Cannot read bucket {path}: {source}")]
    BucketUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolution output for one bucket
#[derive(Debug, Clone, Default)]
pub struct BucketDependencies {
    pub graph: DependencyGraph,
    /// Every dataset discovered, in discovery order
    pub datasets: Vec<DatasetNode>,
}

impl BucketDependencies {
    /// Folder of the dataset with the given alias
    pub fn path_of(&self, alias: &str) -> Option<&Path> {
        self.datasets
            .iter()
            .find(|d| d.alias == alias)
            .map(|d| d.path.as_path())
    }
}

/// Discover the datasets of `bucket` and their complement relations
///
/// Entries are visited in name order so the graph is deterministic.
pub fn resolve_dependencies(bucket: &Path) -> Result<BucketDependencies, ResolveError> {
    let entries = fs::read_dir(bucket).map_err(|source| ResolveError::BucketUnreadable {
        path: bucket.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(bucket = %bucket.display(), "Error accessing entry: {}", e);
                None
            }
        })
        .collect();
    paths.sort();

    let mut resolved = BucketDependencies::default();

    for path in paths {
        let Some(node) = read_dataset_node(&path) else {
            continue;
        };

        if resolved.path_of(&node.alias).is_some() {
            warn!(
                bucket = %bucket.display(),
                "Duplicate dataset alias '{}' at {}, ignored",
                node.alias,
                path.display()
            );
            continue;
        }

        if let Some(parent) = &node.complements {
            debug!("Dataset '{}' complements '{}'", node.alias, parent);
            resolved.graph.add_edge(parent.clone(), node.alias.clone());
        }
        resolved.datasets.push(node);
    }

    Ok(resolved)
}

/// Read one bucket entry as a dataset, or log why it is not one
fn read_dataset_node(path: &Path) -> Option<DatasetNode> {
    if !path.is_dir() {
        warn!("Skipping {}: not a directory", path.display());
        return None;
    }
    if !path.join(METADATA_DIR).is_dir() {
        warn!("Skipping {}: no {} folder", path.display(), METADATA_DIR);
        return None;
    }
    let descriptor_path = metadata_file(path, DATASET_XML);
    if !descriptor_path.is_file() {
        warn!("Skipping {}: no {}", path.display(), DATASET_XML);
        return None;
    }

    match DatasetDescriptor::from_file(&descriptor_path) {
        Ok(descriptor) => Some(DatasetNode {
            alias: descriptor.alias,
            path: path.to_path_buf(),
            complements: descriptor.complements,
        }),
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}
