//! Catalog platform entities
//!
//! Owned by the external platform; these are the slices of its JSON objects
//! the importers read or write.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upload record status understood by the platform as "file received"
pub const UPLOAD_STATUS_UPLOADED: i32 = 0;

/// Key pair identifying a platform user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    pub public_key: String,
    pub private_key: String,
}

impl ApiKeys {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    /// Ontology attached to the project
    #[serde(default)]
    pub ontology: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ontology {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub name: String,
    pub ontology: i64,
    #[serde(default)]
    pub color: String,
}

/// Image as placed in a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInstance {
    pub id: i64,
    /// Original file name, used to match annotation image references
    pub instance_filename: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    /// Geometry as WKT in platform coordinates (origin bottom-left)
    pub location: String,
    pub image: i64,
}

/// Placeholder upload record handed to the import procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub original_filename: String,
    /// Staged (symlink) path
    pub filename: String,
    pub size: u64,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub projects: Vec<i64>,
    pub storage: i64,
    pub user: i64,
    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_debug_redacts_private_key() {
        let keys = ApiKeys::new("pub", "very-secret");
        let printed = format!("{:?}", keys);
        assert!(printed.contains("pub"));
        assert!(!printed.contains("very-secret"));
    }

    #[test]
    fn test_image_instance_uses_platform_field_names() {
        let image: ImageInstance = serde_json::from_value(serde_json::json!({
            "id": 7,
            "instanceFilename": "slide01.svs",
            "width": 2048,
            "height": 1024
        }))
        .unwrap();

        assert_eq!(image.instance_filename, "slide01.svs");
        assert_eq!(image.height, 1024.0);
    }

    #[test]
    fn test_uploaded_file_serializes_camel_case() {
        let upload = UploadedFile {
            id: None,
            original_filename: "a.svs".to_string(),
            filename: "/staging/a.svs".to_string(),
            size: 10,
            ext: String::new(),
            content_type: String::new(),
            projects: vec![3],
            storage: 1,
            user: 2,
            status: UPLOAD_STATUS_UPLOADED,
        };
        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["originalFilename"], "a.svs");
        assert!(json.get("id").is_none());
    }
}
