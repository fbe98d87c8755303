//! Ontology import for a complementing dataset
//!
//! `ontology.xml` names the ontology and points at a JSON list of
//! `{"type": <term name>, "color": <hex>}` entries. The ontology is looked up
//! by name and created when missing; terms missing from it are created.

use super::catalog_client::{CatalogError, CatalogGateway};
use super::descriptor::{DescriptorError, OntologyDescriptor};
use crate::models::Ontology;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Color given to terms declared without one
pub const DEFAULT_TERM_COLOR: &str = "#000000";

#[derive(Debug, Error)]
pub enum OntologyImportError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Read {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid term list {path}: {source}")]
    Terms {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl OntologyImportError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, OntologyImportError::Catalog(e) if e.is_fatal())
    }
}

/// One entry of the JSON term list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermDefinition {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Parse a JSON term list
pub fn load_term_definitions(path: &Path) -> Result<Vec<TermDefinition>, OntologyImportError> {
    let content = std::fs::read_to_string(path).map_err(|source| OntologyImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| OntologyImportError::Terms {
        path: path.to_path_buf(),
        source,
    })
}

/// Get or create the ontology of `dataset_dir` and its terms
pub async fn import_ontology(
    gateway: &dyn CatalogGateway,
    dataset_dir: &Path,
) -> Result<Ontology, OntologyImportError> {
    let descriptor = OntologyDescriptor::load(dataset_dir)?;
    let definitions = load_term_definitions(&dataset_dir.join(&descriptor.file))?;

    let existing = gateway
        .fetch_ontology_collection()
        .await?
        .into_iter()
        .find(|o| o.name == descriptor.alias);

    let ontology = match existing {
        Some(ontology) => {
            info!("{} already exists!", ontology.name);
            ontology
        }
        None => {
            let ontology = gateway.create_ontology(&descriptor.alias).await?;
            info!(ontology = %ontology.name, id = ontology.id, "Ontology created");
            ontology
        }
    };

    let mut known: HashSet<String> = gateway
        .fetch_terms(ontology.id)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();

    for definition in definitions {
        if known.contains(&definition.name) {
            continue;
        }
        let color = definition.color.as_deref().unwrap_or(DEFAULT_TERM_COLOR);
        gateway
            .create_term(&definition.name, ontology.id, color)
            .await?;
        known.insert(definition.name);
    }

    Ok(ontology)
}
