use std::io;
use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ulid::Ulid;

use crate::error::AllocationError;
use crate::model::{Engineer, Project, ProjectStatus};

/// Read-only lookups of engineer and project records owned elsewhere
/// (onboarding, profile edits, project management).
pub trait Directory: Send + Sync + 'static {
    fn engineer(&self, id: &Ulid) -> Option<Engineer>;
    fn project(&self, id: &Ulid) -> Option<Project>;
    fn engineers(&self) -> Vec<Engineer>;
    fn projects(&self) -> Vec<Project>;
}

/// Directory writes the allocation core is allowed to gate: retiring an
/// engineer and moving a project through its lifecycle.
pub trait DirectoryAdmin: Directory {
    fn remove_engineer(&self, id: &Ulid) -> Option<Engineer>;
    fn set_project_status(
        &self,
        id: &Ulid,
        status: ProjectStatus,
    ) -> Result<Project, AllocationError>;
}

/// Seed file layout for [`InMemoryDirectory::load_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub engineers: Vec<Engineer>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

pub struct InMemoryDirectory {
    engineers: DashMap<Ulid, Engineer>,
    projects: DashMap<Ulid, Project>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            engineers: DashMap::new(),
            projects: DashMap::new(),
        }
    }

    pub fn from_seed(seed: DirectorySeed) -> Result<Self, AllocationError> {
        let dir = Self::new();
        for engineer in seed.engineers {
            dir.upsert_engineer(engineer)?;
        }
        for project in seed.projects {
            dir.upsert_project(project)?;
        }
        Ok(dir)
    }

    /// Load a JSON seed file. A missing file yields an empty directory.
    pub fn load_json(path: &Path) -> Result<Self, AllocationError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("directory seed {} not found, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let seed: DirectorySeed = serde_json::from_slice(&bytes)
            .map_err(|e| AllocationError::Persistence(format!("directory seed: {e}")))?;
        let dir = Self::from_seed(seed)?;
        info!(
            "directory loaded: {} engineers, {} projects",
            dir.engineers.len(),
            dir.projects.len()
        );
        Ok(dir)
    }

    pub fn upsert_engineer(&self, engineer: Engineer) -> Result<(), AllocationError> {
        if engineer.max_capacity == 0 {
            return Err(AllocationError::LimitExceeded("engineer max capacity must be positive"));
        }
        self.engineers.insert(engineer.id, engineer);
        Ok(())
    }

    pub fn upsert_project(&self, project: Project) -> Result<(), AllocationError> {
        if project.team_size == 0 {
            return Err(AllocationError::LimitExceeded("project team size must be positive"));
        }
        self.projects.insert(project.id, project);
        Ok(())
    }

    pub fn engineer_count(&self) -> usize {
        self.engineers.len()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

impl Directory for InMemoryDirectory {
    fn engineer(&self, id: &Ulid) -> Option<Engineer> {
        self.engineers.get(id).map(|e| e.value().clone())
    }

    fn project(&self, id: &Ulid) -> Option<Project> {
        self.projects.get(id).map(|p| p.value().clone())
    }

    fn engineers(&self) -> Vec<Engineer> {
        let mut all: Vec<Engineer> = self.engineers.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.id);
        all
    }

    fn projects(&self) -> Vec<Project> {
        let mut all: Vec<Project> = self.projects.iter().map(|p| p.value().clone()).collect();
        all.sort_by_key(|p| p.id);
        all
    }
}

impl DirectoryAdmin for InMemoryDirectory {
    fn remove_engineer(&self, id: &Ulid) -> Option<Engineer> {
        self.engineers.remove(id).map(|(_, e)| e)
    }

    fn set_project_status(
        &self,
        id: &Ulid,
        status: ProjectStatus,
    ) -> Result<Project, AllocationError> {
        let mut project = self
            .projects
            .get_mut(id)
            .ok_or(AllocationError::project_not_found(*id))?;
        project.status = project.status.advance_to(status)?;
        Ok(project.clone())
    }
}
