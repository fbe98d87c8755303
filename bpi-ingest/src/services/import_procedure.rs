//! External image-import procedure
//!
//! Decoding and registering the pixels of a staged file belongs to the
//! platform's import pipeline. The importers only hand it the staged path,
//! the placeholder upload record and the target projects.

use super::catalog_client::{CatalogError, CatalogGateway};
use crate::models::catalog::UploadedFile;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportProcedureError {
    #[error("Catalog rejected upload: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Failed(String),
}

/// Runs the import of one staged file
#[async_trait]
pub trait ImportProcedure: Send + Sync {
    async fn run_import(
        &self,
        gateway: &dyn CatalogGateway,
        staged: &Path,
        upload: &UploadedFile,
        projects: &[i64],
    ) -> Result<(), ImportProcedureError>;
}

/// Registers the upload record with the catalog, bound to the target projects
///
/// The platform picks registered uploads up from the staging area.
#[derive(Debug, Clone, Default)]
pub struct CatalogUploadProcedure;

#[async_trait]
impl ImportProcedure for CatalogUploadProcedure {
    async fn run_import(
        &self,
        gateway: &dyn CatalogGateway,
        staged: &Path,
        upload: &UploadedFile,
        projects: &[i64],
    ) -> Result<(), ImportProcedureError> {
        let mut record = upload.clone();
        record.projects = projects.to_vec();

        let saved = gateway.save_uploaded_file(&record).await?;
        tracing::info!(
            file = %staged.display(),
            upload_id = ?saved.id,
            projects = ?projects,
            "Upload registered"
        );
        Ok(())
    }
}
