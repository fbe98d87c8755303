//! Test Helper Utilities
//!
//! Shared utilities for testing bpi-ingest

#![allow(dead_code)]

pub mod fake_catalog;
pub mod fixtures;

pub use fake_catalog::*;
pub use fixtures::*;

use bpi_common::config::{CatalogConfig, IngestConfig};
use bpi_ingest::db::{MemoryStore, SharedStores};
use bpi_ingest::services::CatalogUploadProcedure;
use bpi_ingest::IngestContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Isolated ingest environment: temp directories, in-memory store, fake catalog
pub struct TestEnv {
    _temp_dir: TempDir,
    pub dataset_root: PathBuf,
    pub upload_root: PathBuf,
    pub schema_dir: PathBuf,
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<FakeCatalog>,
    pub ctx: Arc<IngestContext>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build with config tweaks applied on top of the test defaults
    pub fn with_config(tweak: impl FnOnce(&mut IngestConfig)) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let dataset_root = temp_dir.path().join("dataset");
        let upload_root = temp_dir.path().join("bpi");
        let schema_dir = temp_dir.path().join("schemas");
        std::fs::create_dir_all(&dataset_root).unwrap();
        std::fs::create_dir_all(&upload_root).unwrap();
        write_schemas(&schema_dir);

        let mut config = IngestConfig {
            dataset_path: dataset_root.clone(),
            root: upload_root.clone(),
            writing_path: upload_root.join("tmp"),
            schema_dir: schema_dir.clone(),
            store_url: "memory://".to_string(),
            easy_import_project_name_offset: 0,
            easy_import_project_name_length: 12,
            catalog: CatalogConfig {
                host: "http://catalog.test".to_string(),
                public_key: Some(SERVICE_PUBLIC_KEY.to_string()),
                private_key: Some(SERVICE_PRIVATE_KEY.to_string()),
                timeout_secs: 5,
            },
            ..IngestConfig::default()
        };
        tweak(&mut config);

        let store = Arc::new(MemoryStore::new());
        let catalog = FakeCatalog::new();
        let ctx = IngestContext::new(
            Arc::new(config),
            SharedStores::from_backend(store.clone()),
            Arc::new(FakeConnector::new(catalog.clone())),
            Arc::new(CatalogUploadProcedure),
        );

        Self {
            _temp_dir: temp_dir,
            dataset_root,
            upload_root,
            schema_dir,
            store,
            catalog,
            ctx: Arc::new(ctx),
        }
    }

    pub fn bucket(&self, name: &str) -> PathBuf {
        let bucket = self.dataset_root.join(name);
        std::fs::create_dir_all(&bucket).unwrap();
        bucket
    }

    /// Plain file for easy import, e.g. `PROJECT12345_slide.svs`
    pub fn add_file(&self, bucket: &str, name: &str, content: &str) -> PathBuf {
        write_file(&self.bucket(bucket).join(name), content)
    }

    pub fn lock_key(&self) -> &str {
        &self.ctx.config.import_lock_key
    }

    pub fn lock_holder(&self) -> Option<String> {
        self.store.lock_holder(self.lock_key())
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}
