//! Shared ingest context
//!
//! Built once at startup and handed to the HTTP handlers and the scanner.
//! Everything an import run needs is derived from here.

use crate::db::{open_store, SharedStores};
use crate::error::IngestError;
use crate::models::ApiKeys;
use crate::services::catalog_client::{CatalogConnector, HttpCatalogConnector};
use crate::services::fingerprint_cache::FileImportCache;
use crate::services::image_importer::ImageImporter;
use crate::services::import_lock::ImportLock;
use crate::services::import_procedure::{CatalogUploadProcedure, ImportProcedure};
use crate::services::metadata_validator::MetadataValidator;
use crate::services::path_deriver::PathDeriver;
use bpi_common::config::IngestConfig;
use std::sync::Arc;

pub struct IngestContext {
    pub config: Arc<IngestConfig>,
    pub stores: SharedStores,
    pub connector: Arc<dyn CatalogConnector>,
    pub procedure: Arc<dyn ImportProcedure>,
    pub validator: MetadataValidator,
}

impl IngestContext {
    pub fn new(
        config: Arc<IngestConfig>,
        stores: SharedStores,
        connector: Arc<dyn CatalogConnector>,
        procedure: Arc<dyn ImportProcedure>,
    ) -> Self {
        let validator = MetadataValidator::new(config.schema_dir.clone());
        Self {
            config,
            stores,
            connector,
            procedure,
            validator,
        }
    }

    /// Production wiring: configured store, HTTP catalog client
    pub async fn from_config(config: Arc<IngestConfig>) -> Result<Self, IngestError> {
        let stores = open_store(&config.store_url).await?;
        let connector = Arc::new(HttpCatalogConnector::from_config(&config.catalog));
        Ok(Self::new(
            config,
            stores,
            connector,
            Arc::new(CatalogUploadProcedure),
        ))
    }

    /// Service account keys, when both halves are configured
    pub fn service_keys(&self) -> Option<ApiKeys> {
        let catalog = &self.config.catalog;
        match (&catalog.public_key, &catalog.private_key) {
            (Some(public), Some(private)) => Some(ApiKeys::new(public.clone(), private.clone())),
            _ => None,
        }
    }

    pub fn file_cache(&self) -> FileImportCache {
        FileImportCache::new(
            self.stores.fingerprints.clone(),
            self.config.processed_files_cache_key.clone(),
        )
    }

    pub fn import_lock(&self) -> ImportLock {
        ImportLock::new(
            self.stores.locks.clone(),
            self.config.import_lock_key.clone(),
            self.config.lock_ttl(),
        )
    }

    pub fn path_deriver(&self) -> PathDeriver {
        PathDeriver::new(
            self.config.dataset_path.clone(),
            self.config.easy_import_project_name_offset,
            self.config.easy_import_project_name_length,
        )
    }

    pub fn image_importer(&self) -> ImageImporter {
        ImageImporter::new(
            self.config.root.clone(),
            self.config.writing_path.clone(),
            self.procedure.clone(),
        )
    }
}
