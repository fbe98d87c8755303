//! Import services
//!
//! Bottom-up: metadata parsing and validation, dataset discovery, the catalog
//! gateway, single-file import, then the orchestrators (batch engine,
//! structured importer, manual triggers, background scanner).

pub mod annotation_importer;
pub mod batch_engine;
pub mod catalog_client;
pub mod dataset_importer;
pub mod dependency_resolver;
pub mod descriptor;
pub mod fingerprint_cache;
pub mod image_importer;
pub mod import_lock;
pub mod import_procedure;
pub mod import_runner;
pub mod metadata_validator;
pub mod ontology_importer;
pub mod path_deriver;
pub mod project_cache;
pub mod scanner;
pub mod xml;

pub use batch_engine::process_import_batch;
pub use catalog_client::{
    CatalogConnector, CatalogError, CatalogGateway, CatalogSession, HttpCatalogClient,
    HttpCatalogConnector,
};
pub use dataset_importer::StructuredImporter;
pub use import_lock::ImportLock;
pub use import_procedure::{CatalogUploadProcedure, ImportProcedure, ImportProcedureError};
pub use import_runner::{open_user_session, run_import_datasets, run_import_datasets_easy};
pub use scanner::{AutoImportScanner, ScanOutcome, ScannerHandle};
