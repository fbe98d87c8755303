//! In-process catalog platform
//!
//! Records every write so tests can assert on what an import produced.
//! Uploads whose file name contains "corrupt" are rejected the way the
//! platform rejects undecodable images.

use async_trait::async_trait;
use bpi_ingest::models::{
    Annotation, ApiKeys, ImageInstance, Ontology, Project, Storage, Term, UploadedFile, User,
};
use bpi_ingest::services::{CatalogConnector, CatalogError, CatalogGateway, CatalogSession};
use std::sync::{Arc, Mutex, MutexGuard};

pub const SERVICE_PUBLIC_KEY: &str = "service-pub";
pub const SERVICE_PRIVATE_KEY: &str = "service-priv";
pub const USER_PUBLIC_KEY: &str = "user-pub";
pub const USER_PRIVATE_KEY: &str = "user-priv";
pub const SERVICE_USER_ID: i64 = 1;
pub const USER_ID: i64 = 42;
pub const STORAGE_ID: i64 = 7;
/// Height of every image the fake registers
pub const IMAGE_HEIGHT: f64 = 100.0;

#[derive(Default)]
struct CatalogState {
    next_id: i64,
    accounts: Vec<(ApiKeys, User)>,
    storages: Vec<Storage>,
    projects: Vec<Project>,
    ontologies: Vec<Ontology>,
    terms: Vec<Term>,
    images: Vec<(i64, ImageInstance)>,
    annotations: Vec<Annotation>,
    term_links: Vec<(i64, i64)>,
    uploads: Vec<UploadedFile>,
    /// Storage listings still to fail before answering normally
    storage_failures: usize,
}

impl CatalogState {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    /// Service account, one user account and one storage
    pub fn new() -> Arc<Self> {
        let state = CatalogState {
            next_id: 100,
            accounts: vec![
                (
                    ApiKeys::new(SERVICE_PUBLIC_KEY, SERVICE_PRIVATE_KEY),
                    User {
                        id: SERVICE_USER_ID,
                        username: "service".to_string(),
                    },
                ),
                (
                    ApiKeys::new(USER_PUBLIC_KEY, USER_PRIVATE_KEY),
                    User {
                        id: USER_ID,
                        username: "alice".to_string(),
                    },
                ),
            ],
            storages: vec![Storage {
                id: STORAGE_ID,
                name: "service storage".to_string(),
                user: Some(SERVICE_USER_ID),
            }],
            ..Default::default()
        };
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap()
    }

    pub fn remove_storages(&self) {
        self.state().storages.clear();
    }

    /// Make the next `count` storage listings fail with a server error
    pub fn fail_storage_fetches(&self, count: usize) {
        self.state().storage_failures = count;
    }

    /// Existing ontology holding the given `(name, color)` terms
    pub fn seed_ontology(&self, name: &str, terms: &[(&str, &str)]) -> Ontology {
        let mut state = self.state();
        let ontology = Ontology {
            id: state.id(),
            name: name.to_string(),
        };
        state.ontologies.push(ontology.clone());
        for (term, color) in terms {
            let term = Term {
                id: state.id(),
                name: term.to_string(),
                ontology: ontology.id,
                color: color.to_string(),
            };
            state.terms.push(term);
        }
        ontology
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state().projects.clone()
    }

    pub fn project(&self, name: &str) -> Option<Project> {
        self.state().projects.iter().find(|p| p.name == name).cloned()
    }

    pub fn ontologies(&self) -> Vec<Ontology> {
        self.state().ontologies.clone()
    }

    pub fn terms(&self) -> Vec<Term> {
        self.state().terms.clone()
    }

    pub fn uploads(&self) -> Vec<UploadedFile> {
        self.state().uploads.clone()
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.state().annotations.clone()
    }

    pub fn term_links(&self) -> Vec<(i64, i64)> {
        self.state().term_links.clone()
    }
}

#[async_trait]
impl CatalogGateway for FakeCatalog {
    async fn current_user(&self) -> Result<User, CatalogError> {
        Ok(self.state().accounts[0].1.clone())
    }

    async fn fetch_user_keys(&self, public_key: &str) -> Result<ApiKeys, CatalogError> {
        self.state()
            .accounts
            .iter()
            .find(|(keys, _)| keys.public_key == public_key)
            .map(|(keys, _)| keys.clone())
            .ok_or_else(|| CatalogError::NotFound(format!("userkey/{}", public_key)))
    }

    async fn fetch_storage(&self, id: i64) -> Result<Option<Storage>, CatalogError> {
        Ok(self.state().storages.iter().find(|s| s.id == id).cloned())
    }

    async fn fetch_storage_collection(&self) -> Result<Vec<Storage>, CatalogError> {
        let mut state = self.state();
        if state.storage_failures > 0 {
            state.storage_failures -= 1;
            return Err(CatalogError::Api(503, "storage service unavailable".to_string()));
        }
        Ok(state.storages.clone())
    }

    async fn fetch_project_collection(&self) -> Result<Vec<Project>, CatalogError> {
        Ok(self.projects())
    }

    async fn create_project(&self, name: &str) -> Result<Project, CatalogError> {
        let mut state = self.state();
        let project = Project {
            id: state.id(),
            name: name.to_string(),
            ontology: None,
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, project: &Project) -> Result<Project, CatalogError> {
        let mut state = self.state();
        let stored = state
            .projects
            .iter_mut()
            .find(|p| p.id == project.id)
            .ok_or_else(|| CatalogError::NotFound(format!("project/{}", project.id)))?;
        *stored = project.clone();
        Ok(project.clone())
    }

    async fn fetch_ontology_collection(&self) -> Result<Vec<Ontology>, CatalogError> {
        Ok(self.ontologies())
    }

    async fn create_ontology(&self, name: &str) -> Result<Ontology, CatalogError> {
        let mut state = self.state();
        let ontology = Ontology {
            id: state.id(),
            name: name.to_string(),
        };
        state.ontologies.push(ontology.clone());
        Ok(ontology)
    }

    async fn fetch_terms(&self, ontology_id: i64) -> Result<Vec<Term>, CatalogError> {
        Ok(self
            .state()
            .terms
            .iter()
            .filter(|t| t.ontology == ontology_id)
            .cloned()
            .collect())
    }

    async fn create_term(
        &self,
        name: &str,
        ontology_id: i64,
        color: &str,
    ) -> Result<Term, CatalogError> {
        let mut state = self.state();
        let term = Term {
            id: state.id(),
            name: name.to_string(),
            ontology: ontology_id,
            color: color.to_string(),
        };
        state.terms.push(term.clone());
        Ok(term)
    }

    async fn fetch_image_instances(
        &self,
        project_id: i64,
    ) -> Result<Vec<ImageInstance>, CatalogError> {
        Ok(self
            .state()
            .images
            .iter()
            .filter(|(project, _)| *project == project_id)
            .map(|(_, image)| image.clone())
            .collect())
    }

    async fn save_annotation(
        &self,
        location_wkt: &str,
        image_id: i64,
    ) -> Result<Annotation, CatalogError> {
        let mut state = self.state();
        let annotation = Annotation {
            id: state.id(),
            location: location_wkt.to_string(),
            image: image_id,
        };
        state.annotations.push(annotation.clone());
        Ok(annotation)
    }

    async fn link_annotation_term(
        &self,
        annotation_id: i64,
        term_id: i64,
    ) -> Result<(), CatalogError> {
        self.state().term_links.push((annotation_id, term_id));
        Ok(())
    }

    async fn save_uploaded_file(
        &self,
        upload: &UploadedFile,
    ) -> Result<UploadedFile, CatalogError> {
        if upload.original_filename.contains("corrupt") {
            return Err(CatalogError::Api(
                500,
                format!("cannot decode {}", upload.original_filename),
            ));
        }

        let mut state = self.state();
        let mut saved = upload.clone();
        saved.id = Some(state.id());
        for project in &upload.projects {
            let image = ImageInstance {
                id: state.id(),
                instance_filename: upload.original_filename.clone(),
                width: 200.0,
                height: IMAGE_HEIGHT,
            };
            state.images.push((*project, image));
        }
        state.uploads.push(saved.clone());
        Ok(saved)
    }
}

/// Accepts the key pairs the fake catalog knows
pub struct FakeConnector {
    catalog: Arc<FakeCatalog>,
}

impl FakeConnector {
    pub fn new(catalog: Arc<FakeCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CatalogConnector for FakeConnector {
    async fn connect(&self, keys: &ApiKeys) -> Result<CatalogSession, CatalogError> {
        let user = self
            .catalog
            .state()
            .accounts
            .iter()
            .find(|(known, _)| known == keys)
            .map(|(_, user)| user.clone())
            .ok_or_else(|| CatalogError::Unauthorized("invalid keys".to_string()))?;

        Ok(CatalogSession {
            gateway: self.catalog.clone(),
            user,
        })
    }
}
