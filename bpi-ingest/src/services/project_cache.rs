//! Name → project map for one run
//!
//! Loaded once from the catalog at the start of a batch or scan cycle so
//! repeated names resolve without a request and a missing project is created
//! only once. Never shared between runs.

use super::catalog_client::{CatalogError, CatalogGateway};
use crate::models::Project;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ProjectCache {
    projects: HashMap<String, Project>,
}

impl ProjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the full project list
    pub async fn load(gateway: &dyn CatalogGateway) -> Result<Self, CatalogError> {
        let cache: Self = gateway.fetch_project_collection().await?.into_iter().collect();
        info!("Found {} existing projects", cache.len());
        Ok(cache)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.name.clone(), project);
    }

    /// Project named `name`, created in the catalog on a miss
    pub async fn get_or_create(
        &mut self,
        gateway: &dyn CatalogGateway,
        name: &str,
    ) -> Result<Project, CatalogError> {
        if let Some(project) = self.projects.get(name) {
            return Ok(project.clone());
        }

        let project = gateway.create_project(name).await?;
        info!(project = %name, id = project.id, "Project created");
        self.insert(project.clone());
        Ok(project)
    }
}

impl FromIterator<Project> for ProjectCache {
    fn from_iter<I: IntoIterator<Item = Project>>(iter: I) -> Self {
        let mut cache = Self::new();
        for project in iter {
            cache.insert(project);
        }
        cache
    }
}
