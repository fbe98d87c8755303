//! Background auto-import scanner
//!
//! Every interval, take the shared lock and run the batch engine over the
//! dataset root with the service account and its first storage. A failing
//! cycle is logged and the loop keeps going; cancellation interrupts the
//! sleep between cycles, never a running cycle.

use super::batch_engine::process_import_batch;
use super::image_importer::ImageTarget;
use super::project_cache::ProjectCache;
use crate::context::IngestContext;
use crate::error::IngestError;
use crate::models::ImportSummary;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one scan cycle
#[derive(Debug)]
pub enum ScanOutcome {
    /// Another import held the lock; nothing ran
    LockedOut,
    /// Cycle ran; `None` when the dataset root does not exist
    Completed(Option<ImportSummary>),
}

pub struct AutoImportScanner {
    ctx: Arc<IngestContext>,
}

/// Handle on a spawned scanner
pub struct ScannerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ScannerHandle {
    /// Cancel and wait up to `timeout`; `false` if the scanner did not stop in time
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, self.join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Auto-import scanner task failed: {}", e);
                true
            }
            Err(_) => {
                warn!("Auto-import scanner did not stop within {:?}", timeout);
                false
            }
        }
    }
}

impl AutoImportScanner {
    pub fn new(ctx: Arc<IngestContext>) -> Self {
        Self { ctx }
    }

    /// Start the loop on the runtime; it stops when `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> ScannerHandle {
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(token).await });
        ScannerHandle { cancel, join }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.ctx.config.scan_interval();
        info!(
            dataset_path = %self.ctx.config.dataset_path.display(),
            "Auto-import scanner started, interval {:?}",
            interval
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.scan_cycle().await {
                error!("Auto-import scan failed: {:?}", e);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Auto-import scanner stopped");
    }

    /// One locked pass over the dataset root
    pub async fn scan_cycle(&self) -> anyhow::Result<ScanOutcome> {
        let started = Instant::now();
        let lock = self.ctx.import_lock();

        let outcome = match lock.with_lock(self.do_scan()).await? {
            None => {
                debug!(key = lock.key(), "Import lock held elsewhere, skipping scan");
                ScanOutcome::LockedOut
            }
            Some(result) => ScanOutcome::Completed(result?),
        };

        debug!("Auto-import scan cycle took {:?}", started.elapsed());
        Ok(outcome)
    }

    async fn do_scan(&self) -> Result<Option<ImportSummary>, IngestError> {
        let config = &self.ctx.config;
        if !config.dataset_path.is_dir() {
            warn!(
                "Dataset path {} does not exist, nothing to scan",
                config.dataset_path.display()
            );
            return Ok(None);
        }

        let keys = self.ctx.service_keys().ok_or_else(|| {
            IngestError::Authentication("no service keys configured".to_string())
        })?;
        let session = self.ctx.connector.connect(&keys).await?;

        let storage = session
            .gateway
            .fetch_storage_collection()
            .await?
            .into_iter()
            .next()
            .ok_or(IngestError::NoStorage)?;

        let mut projects = ProjectCache::load(session.gateway.as_ref()).await?;
        let target = ImageTarget {
            session: &session,
            storage_id: storage.id,
        };
        let summary = process_import_batch(
            &self.ctx.path_deriver(),
            &self.ctx.file_cache(),
            &mut projects,
            &self.ctx.image_importer(),
            target,
        )
        .await?;

        if summary.total > 0 {
            info!(
                total = summary.total,
                successful = summary.successful,
                failed = summary.failed,
                skipped = summary.skipped,
                "Auto-import imported new files"
            );
        } else {
            debug!(skipped = summary.skipped, "Auto-import found nothing new");
        }
        Ok(Some(summary))
    }
}
