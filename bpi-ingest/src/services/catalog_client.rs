//! Catalog platform gateway
//!
//! The importers talk to the image-management platform only through
//! [`CatalogGateway`]: a narrow fetch / create / update contract over the
//! entities they touch. [`HttpCatalogClient`] implements it over the
//! platform's JSON API; tests substitute in-memory fakes.

use crate::models::catalog::{
    Annotation, ApiKeys, ImageInstance, Ontology, Project, Storage, Term, UploadedFile, User,
};
use async_trait::async_trait;
use bpi_common::config::CatalogConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("bpi-ingest/", env!("CARGO_PKG_VERSION"));
const PUBLIC_KEY_HEADER: &str = "X-Auth-Public-Key";
const PRIVATE_KEY_HEADER: &str = "X-Auth-Private-Key";

/// Catalog gateway errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Keys rejected by the platform
    #[error("Catalog authentication failed: {0}")]
    Unauthorized(String),

    #[error("Catalog resource not found: {0}")]
    NotFound(String),

    #[error("Catalog API error {0}: {1}")]
    Api(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Catalog client configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Whether the error invalidates the whole run rather than one item
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Unauthorized(_))
    }
}

/// Operations the importers consume from the catalog platform
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn current_user(&self) -> Result<User, CatalogError>;

    /// Exchange a public key for the user's full key pair
    async fn fetch_user_keys(&self, public_key: &str) -> Result<ApiKeys, CatalogError>;

    /// `None` when the storage does not exist
    async fn fetch_storage(&self, id: i64) -> Result<Option<Storage>, CatalogError>;
    async fn fetch_storage_collection(&self) -> Result<Vec<Storage>, CatalogError>;

    async fn fetch_project_collection(&self) -> Result<Vec<Project>, CatalogError>;
    async fn create_project(&self, name: &str) -> Result<Project, CatalogError>;
    async fn update_project(&self, project: &Project) -> Result<Project, CatalogError>;

    async fn fetch_ontology_collection(&self) -> Result<Vec<Ontology>, CatalogError>;
    async fn create_ontology(&self, name: &str) -> Result<Ontology, CatalogError>;

    async fn fetch_terms(&self, ontology_id: i64) -> Result<Vec<Term>, CatalogError>;
    async fn create_term(
        &self,
        name: &str,
        ontology_id: i64,
        color: &str,
    ) -> Result<Term, CatalogError>;

    async fn fetch_image_instances(
        &self,
        project_id: i64,
    ) -> Result<Vec<ImageInstance>, CatalogError>;

    /// Store a geometry (WKT, platform coordinates) on an image
    async fn save_annotation(
        &self,
        location_wkt: &str,
        image_id: i64,
    ) -> Result<Annotation, CatalogError>;
    async fn link_annotation_term(
        &self,
        annotation_id: i64,
        term_id: i64,
    ) -> Result<(), CatalogError>;

    async fn save_uploaded_file(&self, upload: &UploadedFile)
        -> Result<UploadedFile, CatalogError>;
}

/// An authenticated gateway and the identity it acts as
#[derive(Clone)]
pub struct CatalogSession {
    pub gateway: Arc<dyn CatalogGateway>,
    pub user: User,
}

/// Opens authenticated sessions for a key pair
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    async fn connect(&self, keys: &ApiKeys) -> Result<CatalogSession, CatalogError>;
}

/// List responses are wrapped as `{"collection": [...]}`
#[derive(Debug, Deserialize)]
struct Collection<T> {
    collection: Vec<T>,
}

/// Platform JSON API client bound to one key pair
pub struct HttpCatalogClient {
    http_client: reqwest::Client,
    api_url: String,
    keys: ApiKeys,
}

impl HttpCatalogClient {
    pub fn new(host: &str, keys: ApiKeys, timeout: Duration) -> Result<Self, CatalogError> {
        let host = host.trim_end_matches('/');
        if host.is_empty() {
            return Err(CatalogError::Config("catalog host is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: format!("{}/api", host),
            keys,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = self.url(path);
        tracing::debug!(method = %method, url = %url, "Catalog request");
        self.http_client
            .request(method, url)
            .header(PUBLIC_KEY_HEADER, &self.keys.public_key)
            .header(PRIVATE_KEY_HEADER, &self.keys.private_key)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<Value, CatalogError> {
        let response = builder
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Unauthorized(format!(
                "{} ({}): {}",
                what,
                status.as_u16(),
                error_text
            )));
        }

        if status == 404 {
            return Err(CatalogError::NotFound(what.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(status.as_u16(), error_text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let value = self.send(self.request(reqwest::Method::GET, path), path).await?;
        decode(value)
    }

    async fn get_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, CatalogError> {
        let collection: Collection<T> = self.get(path).await?;
        Ok(collection.collection)
    }

    /// POST/PUT returning the saved entity, possibly wrapped under `entity_key`
    async fn save<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        entity_key: &str,
    ) -> Result<T, CatalogError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let value = self
            .send(self.request(method, path).json(body), path)
            .await?;
        decode(unwrap_entity(value, entity_key))
    }
}

/// Saved entities come back either bare or as `{"<entity>": {...}, "message": ...}`
fn unwrap_entity(value: Value, entity_key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.get(entity_key).map_or(false, Value::is_object) => {
            map.remove(entity_key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, CatalogError> {
    serde_json::from_value(value).map_err(|e| CatalogError::Parse(e.to_string()))
}

#[async_trait]
impl CatalogGateway for HttpCatalogClient {
    async fn current_user(&self) -> Result<User, CatalogError> {
        self.get("user/current.json").await
    }

    async fn fetch_user_keys(&self, public_key: &str) -> Result<ApiKeys, CatalogError> {
        self.get(&format!("userkey/{}/keys.json", public_key)).await
    }

    async fn fetch_storage(&self, id: i64) -> Result<Option<Storage>, CatalogError> {
        match self.get(&format!("storage/{}.json", id)).await {
            Ok(storage) => Ok(Some(storage)),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_storage_collection(&self) -> Result<Vec<Storage>, CatalogError> {
        self.get_collection("storage.json").await
    }

    async fn fetch_project_collection(&self) -> Result<Vec<Project>, CatalogError> {
        self.get_collection("project.json").await
    }

    async fn create_project(&self, name: &str) -> Result<Project, CatalogError> {
        self.save(
            reqwest::Method::POST,
            "project.json",
            &json!({ "name": name }),
            "project",
        )
        .await
    }

    async fn update_project(&self, project: &Project) -> Result<Project, CatalogError> {
        self.save(
            reqwest::Method::PUT,
            &format!("project/{}.json", project.id),
            project,
            "project",
        )
        .await
    }

    async fn fetch_ontology_collection(&self) -> Result<Vec<Ontology>, CatalogError> {
        self.get_collection("ontology.json").await
    }

    async fn create_ontology(&self, name: &str) -> Result<Ontology, CatalogError> {
        self.save(
            reqwest::Method::POST,
            "ontology.json",
            &json!({ "name": name }),
            "ontology",
        )
        .await
    }

    async fn fetch_terms(&self, ontology_id: i64) -> Result<Vec<Term>, CatalogError> {
        self.get_collection(&format!("ontology/{}/term.json", ontology_id))
            .await
    }

    async fn create_term(
        &self,
        name: &str,
        ontology_id: i64,
        color: &str,
    ) -> Result<Term, CatalogError> {
        self.save(
            reqwest::Method::POST,
            "term.json",
            &json!({ "name": name, "ontology": ontology_id, "color": color }),
            "term",
        )
        .await
    }

    async fn fetch_image_instances(
        &self,
        project_id: i64,
    ) -> Result<Vec<ImageInstance>, CatalogError> {
        self.get_collection(&format!("project/{}/imageinstance.json", project_id))
            .await
    }

    async fn save_annotation(
        &self,
        location_wkt: &str,
        image_id: i64,
    ) -> Result<Annotation, CatalogError> {
        self.save(
            reqwest::Method::POST,
            "annotation.json",
            &json!({ "location": location_wkt, "image": image_id }),
            "annotation",
        )
        .await
    }

    async fn link_annotation_term(
        &self,
        annotation_id: i64,
        term_id: i64,
    ) -> Result<(), CatalogError> {
        self.send(
            self.request(reqwest::Method::POST, "annotationterm.json")
                .json(&json!({ "userannotation": annotation_id, "term": term_id })),
            "annotationterm.json",
        )
        .await?;
        Ok(())
    }

    async fn save_uploaded_file(
        &self,
        upload: &UploadedFile,
    ) -> Result<UploadedFile, CatalogError> {
        self.save(
            reqwest::Method::POST,
            "uploadedfile.json",
            upload,
            "uploadedfile",
        )
        .await
    }
}

/// Connector creating [`HttpCatalogClient`]s for the configured host
#[derive(Debug, Clone)]
pub struct HttpCatalogConnector {
    host: String,
    timeout: Duration,
}

impl HttpCatalogConnector {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.host.clone(), Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl CatalogConnector for HttpCatalogConnector {
    async fn connect(&self, keys: &ApiKeys) -> Result<CatalogSession, CatalogError> {
        let client = HttpCatalogClient::new(&self.host, keys.clone(), self.timeout)?;
        let user = client.current_user().await.map_err(|e| match e {
            CatalogError::NotFound(what) => CatalogError::Unauthorized(what),
            other => other,
        })?;

        tracing::debug!(user = %user.username, "Catalog session opened");
        Ok(CatalogSession {
            gateway: Arc::new(client),
            user,
        })
    }
}
