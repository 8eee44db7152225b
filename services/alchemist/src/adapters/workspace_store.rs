//! services/alchemist/src/adapters/workspace_store.rs
//!
//! This module contains the workspace store: the application-state container
//! that holds every project, the active project id and the API configuration.
//! It implements the `ProjectStore` port from the `core` crate.
//!
//! State is read once at start-up from three JSON files in the data directory.
//! Whenever one of the three records changes it is rewritten in full.

use async_trait::async_trait;
use book_alchemist_core::{
    domain::{ApiConfig, BookData, Project, WizardStep},
    ports::{PortError, PortResult, ProjectStore},
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;

const PROJECTS_FILE: &str = "projects.json";
const ACTIVE_PROJECT_FILE: &str = "active_project.json";
const API_CONFIG_FILE: &str = "api_config.json";

/// Everything that survives a restart.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub projects: Vec<Project>,
    pub active_project_id: Option<Uuid>,
    pub api_config: Option<ApiConfig>,
}

impl Workspace {
    pub fn active_project(&self) -> Option<&Project> {
        let id = self.active_project_id?;
        self.projects.iter().find(|p| p.id == id)
    }

    fn project_mut(&mut self, id: Uuid) -> Result<&mut Project, AppError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::Port(PortError::NotFound(format!("project {}", id))))
    }

    fn active_mut(&mut self) -> Result<&mut Project, AppError> {
        let id = self
            .active_project_id
            .ok_or_else(|| AppError::Port(PortError::NotFound("active project".to_string())))?;
        self.project_mut(id)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct WorkspaceStore {
    dir: PathBuf,
    state: RwLock<Workspace>,
}

impl WorkspaceStore {
    /// Loads the workspace from `dir`, creating the directory when needed.
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut projects: Vec<Project> = read_record(&dir.join(PROJECTS_FILE)).await?.unwrap_or_default();
        let active_project_id: Option<Uuid> = read_record(&dir.join(ACTIVE_PROJECT_FILE)).await?;
        let api_config: Option<ApiConfig> = read_record(&dir.join(API_CONFIG_FILE)).await?;

        // A run cannot survive a restart; park such projects on the summary.
        for project in projects
            .iter_mut()
            .filter(|p| p.current_step == WizardStep::MANIFESTING)
        {
            project.current_step = WizardStep::SUMMARY;
        }

        info!(
            projects = projects.len(),
            active = active_project_id.is_some(),
            configured = api_config.is_some(),
            "Workspace loaded from {}",
            dir.display()
        );
        Ok(Self {
            dir,
            state: RwLock::new(Workspace {
                projects,
                active_project_id,
                api_config,
            }),
        })
    }

    pub async fn snapshot(&self) -> Workspace {
        self.state.read().await.clone()
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.state.read().await.projects.clone()
    }

    pub async fn active(&self) -> Option<Project> {
        self.state.read().await.active_project().cloned()
    }

    pub async fn current_api_config(&self) -> Option<ApiConfig> {
        self.state.read().await.api_config.clone()
    }

    //=====================================================================================
    // Project Lifecycle
    //=====================================================================================

    /// Creates an empty project and makes it the active one.
    pub async fn start_new_project(&self) -> Result<Project, AppError> {
        let mut state = self.state.write().await;
        let project = Project::new();
        state.projects.push(project.clone());
        state.active_project_id = Some(project.id);
        self.save_projects(&state).await?;
        self.save_active(&state).await?;
        info!(project_id = %project.id, "New project started.");
        Ok(project)
    }

    pub async fn load_project(&self, id: Uuid) -> Result<Project, AppError> {
        let mut state = self.state.write().await;
        let project = state.project_mut(id)?.clone();
        state.active_project_id = Some(id);
        self.save_active(&state).await?;
        Ok(project)
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        if state.projects.len() == before {
            return Err(AppError::Port(PortError::NotFound(format!("project {}", id))));
        }
        self.save_projects(&state).await?;
        if state.active_project_id == Some(id) {
            state.active_project_id = None;
            self.save_active(&state).await?;
        }
        info!(project_id = %id, "Project deleted.");
        Ok(())
    }

    /// Leaves the active project; nothing is deleted.
    pub async fn exit_project(&self) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.active_project_id.take().is_some() {
            self.save_active(&state).await?;
        }
        Ok(())
    }

    //=====================================================================================
    // Wizard Mutations (on the active project)
    //=====================================================================================

    /// Edits the active project's form data. A non-empty title renames the project.
    pub async fn update_book_data(
        &self,
        edit: impl FnOnce(&mut BookData),
    ) -> Result<Project, AppError> {
        self.commit(|next| {
            let project = next.active_mut()?;
            edit(&mut project.data);
            let title = project.data.title.trim();
            if !title.is_empty() {
                project.name = title.to_string();
            }
            Ok(project.clone())
        })
        .await
    }

    pub async fn set_current_step(&self, step: u8) -> Result<Project, AppError> {
        self.change_step(|_| step).await
    }

    pub async fn next_step(&self) -> Result<Project, AppError> {
        self.change_step(|current| current.saturating_add(1)).await
    }

    pub async fn back_step(&self) -> Result<Project, AppError> {
        self.change_step(|current| current.saturating_sub(1)).await
    }

    async fn change_step(&self, to: impl FnOnce(u8) -> u8) -> Result<Project, AppError> {
        self.commit(|next| {
            let project = next.active_mut()?;
            project.current_step = WizardStep::clamp(to(project.current_step));
            Ok(project.clone())
        })
        .await
    }

    pub async fn set_api_config(&self, config: Option<ApiConfig>) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.api_config = config;
        write_record(&self.dir.join(API_CONFIG_FILE), state.api_config.as_ref()).await?;
        info!(provider = ?state.api_config.as_ref().map(|c| c.provider), "API configuration saved.");
        Ok(())
    }

    //=====================================================================================
    // Persistence
    //=====================================================================================

    /// Applies `edit` to a copy of the workspace, writes the projects and
    /// only then swaps the copy in. A failed write leaves memory untouched.
    async fn commit<T>(
        &self,
        edit: impl FnOnce(&mut Workspace) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let out = edit(&mut next)?;
        self.save_projects(&next).await?;
        *state = next;
        Ok(out)
    }

    async fn save_projects(&self, state: &Workspace) -> Result<(), AppError> {
        write_record(&self.dir.join(PROJECTS_FILE), Some(&state.projects)).await
    }

    async fn save_active(&self, state: &Workspace) -> Result<(), AppError> {
        write_record(&self.dir.join(ACTIVE_PROJECT_FILE), state.active_project_id.as_ref()).await
    }
}

async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rewrites a record in full, or removes its file when the record is absent.
async fn write_record<T: Serialize + ?Sized>(path: &Path, record: Option<&T>) -> Result<(), AppError> {
    let Some(record) = record else {
        return match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        };
    };
    let json = serde_json::to_vec_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), "Record written.");
    Ok(())
}

//=========================================================================================
// `ProjectStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProjectStore for WorkspaceStore {
    async fn active_project(&self) -> PortResult<Option<Project>> {
        Ok(self.active().await)
    }

    async fn api_config(&self) -> PortResult<Option<ApiConfig>> {
        Ok(self.current_api_config().await)
    }

    async fn reset_pages(&self, project_id: Uuid) -> PortResult<()> {
        self.commit(|next| {
            next.project_mut(project_id)?.pages = Vec::new();
            Ok(())
        })
        .await
        .map_err(PortError::from)
    }

    async fn append_pages(&self, project_id: Uuid, pages: &[String]) -> PortResult<()> {
        self.commit(|next| {
            let project = next.project_mut(project_id)?;
            // A new list, so earlier snapshots stay intact.
            let mut appended = Vec::with_capacity(project.pages.len() + pages.len());
            appended.extend_from_slice(&project.pages);
            appended.extend_from_slice(pages);
            project.pages = appended;
            Ok(())
        })
        .await
        .map_err(PortError::from)
    }

    async fn set_step(&self, project_id: Uuid, step: u8) -> PortResult<()> {
        self.commit(|next| {
            next.project_mut(project_id)?.current_step = WizardStep::clamp(step);
            Ok(())
        })
        .await
        .map_err(PortError::from)
    }

    async fn is_active(&self, project_id: Uuid) -> PortResult<bool> {
        Ok(self.state.read().await.active_project_id == Some(project_id))
    }
}
