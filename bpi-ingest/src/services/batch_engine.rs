//! Batch engine shared by the easy-import trigger and the scanner
//!
//! Per candidate: skip when the fingerprint is unchanged, resolve the project,
//! import the file, and record the fingerprint only on success. A failing
//! item never affects the next one; only a rejected session aborts the batch.

use super::fingerprint_cache::FileImportCache;
use super::image_importer::{ImageImporter, ImageTarget};
use super::path_deriver::ImportCandidate;
use super::project_cache::ProjectCache;
use crate::error::IngestError;
use crate::models::{ImportResult, ImportSummary};
use tracing::{debug, warn};

pub async fn process_import_batch<I>(
    candidates: I,
    file_cache: &FileImportCache,
    projects: &mut ProjectCache,
    importer: &ImageImporter,
    target: ImageTarget<'_>,
) -> Result<ImportSummary, IngestError>
where
    I: IntoIterator<Item = ImportCandidate>,
{
    let mut summary = ImportSummary::new();
    let gateway = target.session.gateway.as_ref();

    for candidate in candidates {
        if !file_cache.should_process(&candidate.file).await {
            debug!(file = %candidate.file.display(), "Unchanged since last import, skipping");
            summary.record_skip();
            continue;
        }

        let project = match projects.get_or_create(gateway, &candidate.name).await {
            Ok(project) => project,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(
                    file = %candidate.file.display(),
                    project = %candidate.name,
                    "Project unavailable: {}",
                    e
                );
                let name = candidate
                    .file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                summary.push(ImportResult::failed(
                    name,
                    format!("Project {} unavailable: {}", candidate.name, e),
                ));
                continue;
            }
        };

        let result = importer
            .import_file(target, &candidate.file, &[project.id])
            .await;

        if result.success {
            if let Err(e) = file_cache.mark_processed(&candidate.file).await {
                warn!(
                    file = %candidate.file.display(),
                    "Imported but fingerprint not recorded: {}",
                    e
                );
            }
        }

        summary.push(result);
    }

    Ok(summary)
}
