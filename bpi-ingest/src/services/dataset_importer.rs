//! Structured dataset import
//!
//! Per bucket: the single complemented dataset is the parent. Its images are
//! imported into a project named after its alias; each complementing child
//! then contributes an ontology (attached to the project if it has none) and
//! annotations on the parent's images.

use super::annotation_importer::AnnotationImporter;
use super::catalog_client::CatalogSession;
use super::dependency_resolver::resolve_dependencies;
use super::image_importer::{ImageImporter, ImageTarget};
use super::metadata_validator::MetadataValidator;
use super::ontology_importer::import_ontology;
use super::path_deriver::list_buckets;
use super::project_cache::ProjectCache;
use crate::error::IngestError;
use crate::models::dataset::{GraphError, METADATA_DIR};
use crate::models::{ImportResponse, ImportResult, ImportSummary, Project};
use std::path::Path;
use tracing::{error, info, warn};

pub struct StructuredImporter<'a> {
    session: &'a CatalogSession,
    storage_id: i64,
    importer: &'a ImageImporter,
    validator: &'a MetadataValidator,
}

impl<'a> StructuredImporter<'a> {
    pub fn new(
        session: &'a CatalogSession,
        storage_id: i64,
        importer: &'a ImageImporter,
        validator: &'a MetadataValidator,
    ) -> Self {
        Self {
            session,
            storage_id,
            importer,
            validator,
        }
    }

    fn target(&self) -> ImageTarget<'a> {
        ImageTarget {
            session: self.session,
            storage_id: self.storage_id,
        }
    }

    /// Import every bucket directly under `dataset_root`
    pub async fn import_root(
        &self,
        dataset_root: &Path,
        projects: &mut ProjectCache,
    ) -> Result<ImportResponse, IngestError> {
        let mut response = ImportResponse::default();
        for bucket in list_buckets(dataset_root) {
            self.import_bucket(&bucket, projects, &mut response).await?;
        }
        Ok(response)
    }

    /// Import one bucket, folding its results into `response`
    pub async fn import_bucket(
        &self,
        bucket: &Path,
        projects: &mut ProjectCache,
        response: &mut ImportResponse,
    ) -> Result<(), IngestError> {
        let bucket_name = bucket
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let dependencies = match resolve_dependencies(bucket) {
            Ok(dependencies) => dependencies,
            Err(e) => {
                warn!(bucket = %bucket_name, "Skipping bucket: {}", e);
                return Ok(());
            }
        };

        let (parent, children) = match dependencies.graph.single_parent() {
            Ok(Some(edge)) => edge,
            Ok(None) => {
                warn!(bucket = %bucket_name, "No dataset complements another, skipping bucket");
                return Ok(());
            }
            Err(e @ GraphError::AmbiguousParent { .. }) => {
                error!(bucket = %bucket_name, "{}", e);
                response
                    .image_summary
                    .push(ImportResult::failed(bucket_name, e.to_string()));
                return Ok(());
            }
        };

        let Some(parent_path) = dependencies.path_of(parent) else {
            warn!(bucket = %bucket_name, "Complemented dataset '{}' is not in the bucket", parent);
            response.image_summary.push(ImportResult::failed(
                parent,
                format!("Dataset {} not found in bucket {}", parent, bucket_name),
            ));
            return Ok(());
        };

        info!(bucket = %bucket_name, parent, children = ?children, "Importing bucket");

        for alias in std::iter::once(parent).chain(children.iter().map(String::as_str)) {
            if let Some(path) = dependencies.path_of(alias) {
                // Outcome is informational; a missing schema still aborts.
                self.validator.validate(&path.join(METADATA_DIR))?;
            }
        }

        let gateway = self.session.gateway.as_ref();
        let mut project = match projects.get_or_create(gateway, parent).await {
            Ok(project) => project,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(bucket = %bucket_name, "Project {} unavailable: {}", parent, e);
                response.image_summary.push(ImportResult::failed(
                    parent,
                    format!("Project {} unavailable: {}", parent, e),
                ));
                return Ok(());
            }
        };

        let images = self
            .importer
            .import_dataset_images(self.target(), parent_path, &[project.id])
            .await;
        response.image_summary.merge(images);

        for child in children {
            let Some(child_path) = dependencies.path_of(child) else {
                continue;
            };
            let summary = self
                .import_child(child_path, &mut project, projects)
                .await?;
            response
                .annotation_summary
                .entry(child.clone())
                .or_default()
                .merge(summary);
        }

        Ok(())
    }

    /// Ontology then annotations of one complementing dataset
    async fn import_child(
        &self,
        child_path: &Path,
        project: &mut Project,
        projects: &mut ProjectCache,
    ) -> Result<ImportSummary, IngestError> {
        let gateway = self.session.gateway.as_ref();

        match import_ontology(gateway, child_path).await {
            Ok(ontology) => {
                if project.ontology.is_none() {
                    let mut updated = project.clone();
                    updated.ontology = Some(ontology.id);
                    match gateway.update_project(&updated).await {
                        Ok(saved) => {
                            info!(project = %saved.name, ontology = %ontology.name, "Ontology attached");
                            *project = saved;
                            projects.insert(project.clone());
                        }
                        Err(e) if e.is_fatal() => return Err(e.into()),
                        Err(e) => warn!("Cannot attach ontology {}: {}", ontology.name, e),
                    }
                }
            }
            Err(e) if e.is_fatal() => {
                return Err(IngestError::Authentication(e.to_string()));
            }
            Err(e) => warn!(dataset = %child_path.display(), "Ontology import failed: {}", e),
        }

        let images = match gateway.fetch_image_instances(project.id).await {
            Ok(images) => images,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Cannot list images of project {}: {}", project.name, e);
                Vec::new()
            }
        };
        let ontologies = match gateway.fetch_ontology_collection().await {
            Ok(ontologies) => ontologies,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Cannot list ontologies: {}", e);
                Vec::new()
            }
        };

        let summary = AnnotationImporter::new(gateway, child_path, &images, &ontologies)
            .run()
            .await?;
        Ok(summary)
    }
}
