//! Single-file image import
//!
//! A file is never copied: a symlink to it is staged in the writing area and
//! handed to the import procedure. A file is "already imported" when any
//! upload directory under the upload root holds a symlink resolving to it.
//! Removing a staged entry removes only the link, never the original.

use super::catalog_client::CatalogSession;
use super::descriptor::DatasetDescriptor;
use super::import_procedure::ImportProcedure;
use crate::models::catalog::{UploadedFile, UPLOAD_STATUS_UPLOADED};
use crate::models::dataset::IMAGES_DIR;
use crate::models::{ImportResult, ImportSummary};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Message of a result for a file that is not on disk
pub const MSG_DOES_NOT_EXIST: &str = "Image does not exist";
/// Message of a result for a file some upload directory already links to
pub const MSG_ALREADY_IMPORTED: &str = "Already imported";

/// Whether an upload directory under `upload_root` links to `file`
pub fn is_already_imported(file: &Path, upload_root: &Path) -> bool {
    let Ok(target) = file.canonicalize() else {
        return false;
    };
    let Ok(upload_dirs) = fs::read_dir(upload_root) else {
        return false;
    };

    for upload_dir in upload_dirs.filter_map(|e| e.ok()).map(|e| e.path()) {
        if !upload_dir.is_dir() {
            continue;
        }
        let Ok(candidates) = fs::read_dir(&upload_dir) else {
            continue;
        };
        for candidate in candidates.filter_map(|e| e.ok()).map(|e| e.path()) {
            let is_link = fs::symlink_metadata(&candidate)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_link && candidate.canonicalize().ok().as_deref() == Some(target.as_path()) {
                return true;
            }
        }
    }
    false
}

#[cfg(unix)]
fn create_symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn create_symlink(original: &Path, link: &Path) -> io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

/// Link `file` into `staging_dir`, replacing an entry of the same name
pub fn stage_file(file: &Path, staging_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(staging_dir)?;

    let name = file
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let staged = staging_dir.join(name);

    if fs::symlink_metadata(&staged).is_ok() {
        fs::remove_file(&staged)?;
    }

    let original = file.canonicalize()?;
    create_symlink(&original, &staged)?;
    Ok(staged)
}

/// Who the imported files are uploaded as, and where they are stored
#[derive(Clone, Copy)]
pub struct ImageTarget<'a> {
    pub session: &'a CatalogSession,
    pub storage_id: i64,
}

#[derive(Clone)]
pub struct ImageImporter {
    upload_root: PathBuf,
    staging_dir: PathBuf,
    procedure: Arc<dyn ImportProcedure>,
}

impl ImageImporter {
    pub fn new(
        upload_root: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        procedure: Arc<dyn ImportProcedure>,
    ) -> Self {
        Self {
            upload_root: upload_root.into(),
            staging_dir: staging_dir.into(),
            procedure,
        }
    }

    /// Import one file into `projects`; failures become a failed result
    pub async fn import_file(
        &self,
        target: ImageTarget<'_>,
        file: &Path,
        projects: &[i64],
    ) -> ImportResult {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned());

        if !file.exists() {
            warn!("'{}' does not exist!", file.display());
            return ImportResult::failed(name, MSG_DOES_NOT_EXIST);
        }

        if is_already_imported(file, &self.upload_root) {
            warn!("'{}' already imported!", file.display());
            return ImportResult::ok_with_message(name, MSG_ALREADY_IMPORTED);
        }

        info!("[START] Importing single image: {}", name);

        let staged = match stage_file(file, &self.staging_dir) {
            Ok(staged) => staged,
            Err(e) => {
                error!("Failed to stage '{}': {}", file.display(), e);
                return ImportResult::failed(name, format!("Staging failed: {}", e));
            }
        };

        let size = fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        let upload = UploadedFile {
            id: None,
            original_filename: name.clone(),
            filename: staged.to_string_lossy().into_owned(),
            size,
            ext: String::new(),
            content_type: String::new(),
            projects: Vec::new(),
            storage: target.storage_id,
            user: target.session.user.id,
            status: UPLOAD_STATUS_UPLOADED,
        };

        match self
            .procedure
            .run_import(target.session.gateway.as_ref(), &staged, &upload, projects)
            .await
        {
            Ok(()) => {
                info!("[END] Importing single image: {}", name);
                ImportResult::ok(name)
            }
            Err(e) => {
                error!("Failed to import '{}': {}", name, e);
                // A leftover link would count as "already imported" next run.
                if let Err(cleanup) = fs::remove_file(&staged) {
                    warn!("Cannot remove staged link {}: {}", staged.display(), cleanup);
                }
                ImportResult::failed(name, e.to_string())
            }
        }
    }

    /// Import every `IMAGE_REF` of a dataset from its `IMAGES` folder
    pub async fn import_dataset_images(
        &self,
        target: ImageTarget<'_>,
        dataset_dir: &Path,
        projects: &[i64],
    ) -> ImportSummary {
        info!("[START] Import images...");
        let mut summary = ImportSummary::new();

        match DatasetDescriptor::load(dataset_dir) {
            Ok(descriptor) => {
                for alias in &descriptor.image_refs {
                    let file = dataset_dir.join(IMAGES_DIR).join(alias);
                    summary.push(self.import_file(target, &file, projects).await);
                }
            }
            Err(e) => {
                error!("Cannot read images of {}: {}", dataset_dir.display(), e);
                let name = dataset_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                summary.push(ImportResult::failed(name, e.to_string()));
            }
        }

        info!("[END] Import images...");
        summary
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_and_detect() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("dataset").join("a.svs");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"pixels").unwrap();
        let upload_root = temp_dir.path().join("root");
        let staging = upload_root.join("tmp");

        assert!(!is_already_imported(&source, &upload_root));

        let staged = stage_file(&source, &staging).unwrap();
        assert!(fs::symlink_metadata(&staged).unwrap().file_type().is_symlink());
        assert!(is_already_imported(&source, &upload_root));
    }

    #[test]
    fn test_restage_replaces_link() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("one").join("a.svs");
        let second = temp_dir.path().join("two").join("a.svs");
        for path in [&first, &second] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"pixels").unwrap();
        }
        let staging = temp_dir.path().join("root").join("tmp");

        stage_file(&first, &staging).unwrap();
        let staged = stage_file(&second, &staging).unwrap();

        assert_eq!(staged.canonicalize().unwrap(), second.canonicalize().unwrap());
    }

    #[test]
    fn test_removing_staged_link_keeps_original() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.svs");
        fs::write(&source, b"pixels").unwrap();

        let staged = stage_file(&source, &temp_dir.path().join("root").join("tmp")).unwrap();
        fs::remove_file(&staged).unwrap();

        assert!(source.exists());
    }

    #[test]
    fn test_missing_upload_root_is_not_imported() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.svs");
        fs::write(&source, b"pixels").unwrap();

        assert!(!is_already_imported(&source, Path::new("/nonexistent/root")));
    }
}
