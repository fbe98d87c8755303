//! Import outcomes and summaries
//!
//! One [`ImportResult`] per logical unit (a file, or an annotation alias),
//! folded into an [`ImportSummary`] whose counters always satisfy
//! `total == successful + failed == results.len()`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of importing one logical unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ImportResult {
    /// Successful import with no remark
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            message: None,
        }
    }

    /// Successful import carrying an informational message (e.g. "Already imported")
    pub fn ok_with_message(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            message: Some(message.into()),
        }
    }

    /// Failed import with the reason
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Aggregated outcome of a batch
///
/// `skipped` counts fingerprint-cache hits; those are not attempts and are
/// excluded from `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub results: Vec<ImportResult>,
}

impl ImportSummary {
    /// Create new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a summary from a sequence of results
    pub fn from_results(results: impl IntoIterator<Item = ImportResult>) -> Self {
        let mut summary = Self::new();
        for result in results {
            summary.push(result);
        }
        summary
    }

    /// Record one attempted unit
    pub fn push(&mut self, result: ImportResult) {
        self.total += 1;
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Record one unit skipped because it was unchanged since its last success
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: ImportSummary) {
        self.skipped += other.skipped;
        for result in other.results {
            self.push(result);
        }
    }

    /// Check the counter invariant
    pub fn is_consistent(&self) -> bool {
        self.total == self.successful + self.failed && self.total == self.results.len()
    }
}

/// Response of a manual import trigger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResponse {
    pub image_summary: ImportSummary,
    /// Per child dataset alias (structured mode only)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotation_summary: BTreeMap<String, ImportSummary>,
}

impl ImportResponse {
    pub fn from_images(image_summary: ImportSummary) -> Self {
        Self {
            image_summary,
            annotation_summary: BTreeMap::new(),
        }
    }
}

/// Request body of a manual import trigger
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportRequest {
    /// Storage the imported files are attached to
    pub storage_id: i64,
    /// Import on behalf of this user; the service account is used when absent
    #[serde(default)]
    pub public_key: Option<String>,
}
