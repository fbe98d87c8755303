//! Manual import triggers
//!
//! Both triggers authenticate with the service account, optionally switch to
//! the user owning `public_key`, and require the requested storage to exist.
//! The structured trigger walks bucket dependency graphs; the easy trigger
//! runs the batch engine over every file under the dataset root while holding
//! the shared import lock.

use super::batch_engine::process_import_batch;
use super::catalog_client::{CatalogError, CatalogSession};
use super::dataset_importer::StructuredImporter;
use super::image_importer::ImageTarget;
use super::project_cache::ProjectCache;
use crate::context::IngestContext;
use crate::error::IngestError;
use crate::models::{ImportRequest, ImportResponse, Storage};
use std::time::Instant;
use tracing::info;

/// Service-account session, switched to the user owning `public_key` if given
pub async fn open_user_session(
    ctx: &IngestContext,
    public_key: Option<&str>,
) -> Result<CatalogSession, IngestError> {
    let keys = ctx
        .service_keys()
        .ok_or_else(|| IngestError::Authentication("no service keys configured".to_string()))?;
    let service = ctx.connector.connect(&keys).await?;

    let Some(public_key) = public_key else {
        return Ok(service);
    };

    let user_keys = service
        .gateway
        .fetch_user_keys(public_key)
        .await
        .map_err(|e| match e {
            CatalogError::NotFound(_) => {
                IngestError::Authentication(format!("unknown public key {}", public_key))
            }
            other => other.into(),
        })?;
    let session = ctx.connector.connect(&user_keys).await?;
    info!(user = %session.user.username, "Importing on behalf of user");
    Ok(session)
}

async fn require_storage(session: &CatalogSession, id: i64) -> Result<Storage, IngestError> {
    session
        .gateway
        .fetch_storage(id)
        .await?
        .ok_or(IngestError::StorageNotFound(id))
}

/// Structured import of every bucket under the dataset root
pub async fn run_import_datasets(
    ctx: &IngestContext,
    request: &ImportRequest,
) -> Result<ImportResponse, IngestError> {
    let started = Instant::now();
    info!(storage = request.storage_id, "Starting dataset import");

    let session = open_user_session(ctx, request.public_key.as_deref()).await?;
    let storage = require_storage(&session, request.storage_id).await?;
    let mut projects = ProjectCache::load(session.gateway.as_ref()).await?;
    let importer = ctx.image_importer();

    let response = StructuredImporter::new(&session, storage.id, &importer, &ctx.validator)
        .import_root(&ctx.config.dataset_path, &mut projects)
        .await?;

    info!(
        images = response.image_summary.total,
        failed = response.image_summary.failed,
        annotated_datasets = response.annotation_summary.len(),
        "Dataset import finished in {:?}",
        started.elapsed()
    );
    Ok(response)
}

/// Easy import under the shared lock
///
/// Fails with [`IngestError::LockHeld`] when the scanner or another trigger
/// is already importing.
pub async fn run_import_datasets_easy(
    ctx: &IngestContext,
    request: &ImportRequest,
) -> Result<ImportResponse, IngestError> {
    let lock = ctx.import_lock();
    match lock.with_lock(easy_import(ctx, request)).await? {
        Some(result) => result,
        None => Err(IngestError::LockHeld(lock.key().to_string())),
    }
}

async fn easy_import(
    ctx: &IngestContext,
    request: &ImportRequest,
) -> Result<ImportResponse, IngestError> {
    let started = Instant::now();
    info!(storage = request.storage_id, "Starting easy import");

    let session = open_user_session(ctx, request.public_key.as_deref()).await?;
    let storage = require_storage(&session, request.storage_id).await?;
    let mut projects = ProjectCache::load(session.gateway.as_ref()).await?;

    let target = ImageTarget {
        session: &session,
        storage_id: storage.id,
    };
    let summary = process_import_batch(
        &ctx.path_deriver(),
        &ctx.file_cache(),
        &mut projects,
        &ctx.image_importer(),
        target,
    )
    .await?;

    info!(
        total = summary.total,
        successful = summary.successful,
        failed = summary.failed,
        skipped = summary.skipped,
        "Easy import finished in {:?}",
        started.elapsed()
    );
    Ok(ImportResponse::from_images(summary))
}
