//! Data models for bpi-ingest
//!
//! Import outcomes, the dataset layout and the slices of catalog entities
//! the importers work with.

pub mod catalog;
pub mod dataset;
pub mod import_result;

pub use catalog::{
    Annotation, ApiKeys, ImageInstance, Ontology, Project, Storage, Term, UploadedFile, User,
    UPLOAD_STATUS_UPLOADED,
};
pub use dataset::{DatasetNode, DependencyGraph, GraphError, MetadataStructure};
pub use import_result::{ImportRequest, ImportResponse, ImportResult, ImportSummary};
