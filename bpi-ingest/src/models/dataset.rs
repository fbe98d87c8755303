//! Dataset layout model
//!
//! A bucket holds dataset folders; each dataset folder carries a `METADATA`
//! folder whose `dataset.xml` names the dataset (its alias) and may declare
//! that it complements another dataset of the same bucket.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Metadata folder inside a dataset
pub const METADATA_DIR: &str = "METADATA";
/// Image folder inside a dataset
pub const IMAGES_DIR: &str = "IMAGES";
/// Dataset descriptor file name inside `METADATA`
pub const DATASET_XML: &str = "dataset.xml";
/// Ontology descriptor file name inside `METADATA`
pub const ONTOLOGY_XML: &str = "ontology.xml";
/// Annotation descriptor file name inside `METADATA`
pub const ANNOTATION_XML: &str = "annotation.xml";

/// One dataset folder discovered in a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetNode {
    pub alias: String,
    pub path: PathBuf,
    /// Alias of the dataset this one complements, if any
    pub complements: Option<String>,
}

/// Dependency graph errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// More than one referenced dataset in one bucket
    #[error("Ambiguous dependency graph: {count} parent datasets ({parents})")]
    AmbiguousParent { count: usize, parents: String },
}

/// Referenced (parent) alias → complementing (child) aliases
///
/// Keys and values keep discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: Vec<(String, Vec<String>)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `child` as complementing `parent`
    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        let parent = parent.into();
        let child = child.into();
        match self.edges.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, children)) => children.push(child),
            None => self.edges.push((parent, vec![child])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of distinct parent keys
    pub fn parent_count(&self) -> usize {
        self.edges.len()
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(|(p, _)| p.as_str())
    }

    pub fn children_of(&self, parent: &str) -> Option<&[String]> {
        self.edges
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, c)| c.as_slice())
    }

    /// The bucket's single parent and its children
    ///
    /// `Ok(None)` when no dataset complements another. More than one parent
    /// is rejected rather than resolved by discovery order.
    pub fn single_parent(&self) -> Result<Option<(&str, &[String])>, GraphError> {
        match self.edges.as_slice() {
            [] => Ok(None),
            [(parent, children)] => Ok(Some((parent.as_str(), children.as_slice()))),
            many => Err(GraphError::AmbiguousParent {
                count: many.len(),
                parents: many
                    .iter()
                    .map(|(p, _)| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Metadata documents every dataset must provide, each with its own schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataStructure {
    Dataset,
    Image,
    Observation,
    Policy,
    Sample,
    Staining,
}

impl MetadataStructure {
    pub const ALL: [MetadataStructure; 6] = [
        MetadataStructure::Dataset,
        MetadataStructure::Image,
        MetadataStructure::Observation,
        MetadataStructure::Policy,
        MetadataStructure::Sample,
        MetadataStructure::Staining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataStructure::Dataset => "dataset",
            MetadataStructure::Image => "image",
            MetadataStructure::Observation => "observation",
            MetadataStructure::Policy => "policy",
            MetadataStructure::Sample => "sample",
            MetadataStructure::Staining => "staining",
        }
    }

    /// Schema file name, e.g. `BP.dataset.xsd`
    pub fn schema_file_name(&self) -> String {
        format!("BP.{}.xsd", self.as_str())
    }

    /// Document file name inside `METADATA`, e.g. `dataset.xml`
    pub fn document_file_name(&self) -> String {
        format!("{}.xml", self.as_str())
    }
}

impl fmt::Display for MetadataStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
