//! Metadata validation against the `BP.<structure>.xsd` schema set
//!
//! A missing or uncompilable schema is a deployment error and stops validation.
//! Document problems are data errors: each one is logged with its line and the
//! overall answer is `false`. Callers treat that answer as informational.
//!
//! Schemas are compiled and evaluated by libxml2. Well-formedness is checked
//! first with the same reader the descriptor parsers use, so syntax errors
//! carry the line they are reported at elsewhere.

use super::xml::{self, XmlError};
use crate::models::dataset::MetadataStructure;
use libxml::error::StructuredError;
use libxml::schemas::{SchemaParserContext, SchemaValidationContext};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Schema file not found for {structure}: {path}")]
    MissingSchema {
        structure: MetadataStructure,
        path: PathBuf,
    },

    #[error("Schema {path} is unusable: {message}")]
    InvalidSchema { path: PathBuf, message: String },
}

/// One problem found in a metadata document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// 1-based line, 0 when the document could not be read at all
    pub line: usize,
    pub message: String,
}

impl From<StructuredError> for Violation {
    fn from(err: StructuredError) -> Self {
        Self {
            line: err.line.and_then(|l| usize::try_from(l).ok()).unwrap_or(0),
            message: err
                .message
                .map(|m| m.trim_end().to_string())
                .unwrap_or_else(|| "unknown schema validation error".to_string()),
        }
    }
}

fn join_messages(errors: Vec<StructuredError>) -> String {
    let messages: Vec<String> = errors
        .into_iter()
        .filter_map(|e| e.message)
        .map(|m| m.trim_end().to_string())
        .collect();
    if messages.is_empty() {
        "schema could not be compiled".to_string()
    } else {
        messages.join("; ")
    }
}

/// Compiled schema of one structure
struct CompiledSchema {
    context: SchemaValidationContext,
}

impl CompiledSchema {
    fn load(structure: MetadataStructure, path: &Path) -> Result<Self, ValidationError> {
        if !path.is_file() {
            return Err(ValidationError::MissingSchema {
                structure,
                path: path.to_path_buf(),
            });
        }

        let invalid = |message: String| ValidationError::InvalidSchema {
            path: path.to_path_buf(),
            message,
        };

        let location = path
            .to_str()
            .ok_or_else(|| invalid("path is not valid UTF-8".to_string()))?;

        let mut parser = SchemaParserContext::from_file(location);
        let context = SchemaValidationContext::from_parser(&mut parser)
            .map_err(|errors| invalid(join_messages(errors)))?;

        Ok(Self { context })
    }

    fn check(&mut self, document: &Path) -> Vec<Violation> {
        match xml::parse_file(document) {
            Ok(_) => {}
            Err(XmlError::Syntax { line, message }) => return vec![Violation { line, message }],
            Err(e @ XmlError::Io { .. }) => {
                return vec![Violation {
                    line: 0,
                    message: e.to_string(),
                }]
            }
        }

        let Some(location) = document.to_str() else {
            return vec![Violation {
                line: 0,
                message: format!("{}: path is not valid UTF-8", document.display()),
            }];
        };

        match self.context.validate_file(location) {
            Ok(()) => Vec::new(),
            Err(errors) if errors.is_empty() => vec![Violation {
                line: 0,
                message: "document fails to validate".to_string(),
            }],
            Err(errors) => errors.into_iter().map(Violation::from).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataValidator {
    schema_dir: PathBuf,
}

impl MetadataValidator {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
        }
    }

    pub fn schema_path(&self, structure: MetadataStructure) -> PathBuf {
        self.schema_dir.join(structure.schema_file_name())
    }

    /// Validate every required document of `metadata_dir`
    ///
    /// `Ok(false)` when at least one document has violations (all are logged);
    /// `Err` when a schema is missing or unusable.
    pub fn validate(&self, metadata_dir: &Path) -> Result<bool, ValidationError> {
        let mut valid = true;

        for structure in MetadataStructure::ALL {
            let violations = self.validate_structure(structure, metadata_dir)?;
            if violations.is_empty() {
                continue;
            }

            let document = metadata_dir.join(structure.document_file_name());
            for violation in &violations {
                error!(
                    document = %document.display(),
                    "Validation error at line {}: {}",
                    violation.line,
                    violation.message
                );
            }
            error!("Document file not valid: {}", document.display());
            valid = false;
        }

        debug!(metadata = %metadata_dir.display(), valid, "Metadata validated");
        Ok(valid)
    }

    /// Violations of one document against its schema
    pub fn validate_structure(
        &self,
        structure: MetadataStructure,
        metadata_dir: &Path,
    ) -> Result<Vec<Violation>, ValidationError> {
        let mut schema = CompiledSchema::load(structure, &self.schema_path(structure))?;
        Ok(schema.check(&metadata_dir.join(structure.document_file_name())))
    }
}
