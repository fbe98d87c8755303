//! Dataset metadata descriptors
//!
//! Typed views over the `METADATA/*.xml` files a dataset carries:
//! - `dataset.xml`: `DATASET@alias`, optional `COMPLEMENTS_DATASET_REF@alias`,
//!   `IMAGE_REF@alias` and `ANNOTATION_REF@alias` lists
//! - `ontology.xml`: `ONTOLOGY@alias` and the `FILE@filename` of its term list
//! - `annotation.xml`: one `ANNOTATION@alias` per annotation set, each with
//!   `FILE@filename`, `IMAGE_REF@alias` and `ONTOLOGY_REF@alias`

use super::xml::{self, XmlElement, XmlError};
use crate::models::dataset::{ANNOTATION_XML, DATASET_XML, METADATA_DIR, ONTOLOGY_XML};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("{file}: missing <{element}> element")]
    MissingElement { file: PathBuf, element: &'static str },

    #[error("{file}: <{element}> has no '{attribute}' attribute")]
    MissingAttribute {
        file: PathBuf,
        element: &'static str,
        attribute: &'static str,
    },
}

/// Path of a descriptor inside a dataset folder
pub fn metadata_file(dataset_dir: &Path, file_name: &str) -> PathBuf {
    dataset_dir.join(METADATA_DIR).join(file_name)
}

fn required_attr(
    element: &XmlElement,
    element_name: &'static str,
    attribute: &'static str,
    file: &Path,
) -> Result<String, DescriptorError> {
    element
        .attr(attribute)
        .map(str::to_string)
        .ok_or_else(|| DescriptorError::MissingAttribute {
            file: file.to_path_buf(),
            element: element_name,
            attribute,
        })
}

fn self_or_descendant<'a>(root: &'a XmlElement, name: &str) -> Option<&'a XmlElement> {
    if root.local_name() == name {
        Some(root)
    } else {
        root.find(name)
    }
}

fn ref_aliases(root: &XmlElement, name: &str) -> Vec<String> {
    root.find_all(name)
        .into_iter()
        .filter_map(|e| e.attr("alias"))
        .map(str::to_string)
        .collect()
}

/// `METADATA/dataset.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub alias: String,
    /// Alias of the dataset this one complements
    pub complements: Option<String>,
    pub image_refs: Vec<String>,
    pub annotation_refs: Vec<String>,
}

impl DatasetDescriptor {
    /// Read the descriptor of the dataset folder `dataset_dir`
    pub fn load(dataset_dir: &Path) -> Result<Self, DescriptorError> {
        Self::from_file(&metadata_file(dataset_dir, DATASET_XML))
    }

    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let root = xml::parse_file(path)?;
        Self::from_element(&root, path)
    }

    pub fn from_element(root: &XmlElement, path: &Path) -> Result<Self, DescriptorError> {
        let dataset =
            self_or_descendant(root, "DATASET").ok_or_else(|| DescriptorError::MissingElement {
                file: path.to_path_buf(),
                element: "DATASET",
            })?;

        Ok(Self {
            alias: required_attr(dataset, "DATASET", "alias", path)?,
            complements: root
                .find("COMPLEMENTS_DATASET_REF")
                .and_then(|e| e.attr("alias"))
                .map(str::to_string),
            image_refs: ref_aliases(root, "IMAGE_REF"),
            annotation_refs: ref_aliases(root, "ANNOTATION_REF"),
        })
    }
}

/// `METADATA/ontology.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyDescriptor {
    /// Ontology name in the catalog
    pub alias: String,
    /// JSON term list, relative to the dataset folder
    pub file: String,
}

impl OntologyDescriptor {
    pub fn load(dataset_dir: &Path) -> Result<Self, DescriptorError> {
        let path = metadata_file(dataset_dir, ONTOLOGY_XML);
        let root = xml::parse_file(&path)?;

        let ontology =
            self_or_descendant(&root, "ONTOLOGY").ok_or_else(|| DescriptorError::MissingElement {
                file: path.clone(),
                element: "ONTOLOGY",
            })?;
        let file = root.find("FILE").ok_or_else(|| DescriptorError::MissingElement {
            file: path.clone(),
            element: "FILE",
        })?;

        Ok(Self {
            alias: required_attr(ontology, "ONTOLOGY", "alias", &path)?,
            file: required_attr(file, "FILE", "filename", &path)?,
        })
    }
}

/// One `ANNOTATION` entry of `annotation.xml`
///
/// Missing references are kept as `None` so the importer can report them
/// against this alias alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub alias: String,
    /// GeoJSON file, relative to the dataset folder
    pub file: Option<String>,
    /// Image file name the geometries belong to
    pub image_alias: Option<String>,
    pub ontology_alias: Option<String>,
}

/// `METADATA/annotation.xml`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationDescriptor {
    pub entries: Vec<AnnotationEntry>,
}

impl AnnotationDescriptor {
    pub fn load(dataset_dir: &Path) -> Result<Self, DescriptorError> {
        let path = metadata_file(dataset_dir, ANNOTATION_XML);
        let root = xml::parse_file(&path)?;

        let entries = root
            .children_named("ANNOTATION")
            .filter_map(|annotation| {
                let Some(alias) = annotation.attr("alias") else {
                    tracing::warn!(
                        file = %path.display(),
                        line = annotation.line,
                        "ANNOTATION without alias ignored"
                    );
                    return None;
                };
                Some(AnnotationEntry {
                    alias: alias.to_string(),
                    file: annotation
                        .find("FILE")
                        .and_then(|e| e.attr("filename"))
                        .map(str::to_string),
                    image_alias: annotation
                        .find("IMAGE_REF")
                        .and_then(|e| e.attr("alias"))
                        .map(str::to_string),
                    ontology_alias: annotation
                        .find("ONTOLOGY_REF")
                        .and_then(|e| e.attr("alias"))
                        .map(str::to_string),
                })
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn entry(&self, alias: &str) -> Option<&AnnotationEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }
}
