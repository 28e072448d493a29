//! Build Completion Pipeline
//!
//! Deploys a successful build reported by the worker:
//! 1. pull every built image, each bounded by the pull timeout
//! 2. fast-forward the project checkout
//! 3. compose-up the project
//! 4. record the new metadata in the registry
//!
//! Any failure ends the run. Nothing is retried and the registry is only
//! touched once every step has succeeded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::info;
use wharf_core::domain::outcome::BuildOutcome;

use super::registry::ProjectRegistry;
use crate::deploy::{ComposeRunner, DeployError, ImagePuller, RepositorySync};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pull of {image} timed out after {}s", .timeout.as_secs())]
    PullTimeout { image: String, timeout: Duration },

    #[error("pull of {image} failed: {source}")]
    Pull {
        image: String,
        #[source]
        source: DeployError,
    },

    #[error("pull task for {image} did not complete: {source}")]
    Join {
        image: String,
        #[source]
        source: JoinError,
    },

    #[error("invalid project name {0:?}")]
    InvalidProject(String),

    #[error("repository sync failed for {project}: {source}")]
    Sync {
        project: String,
        #[source]
        source: DeployError,
    },

    #[error("compose up failed for {project}: {source}")]
    Compose {
        project: String,
        #[source]
        source: DeployError,
    },
}

impl PipelineError {
    /// Pipeline step the error occurred in
    pub fn step(&self) -> &'static str {
        match self {
            PipelineError::PullTimeout { .. }
            | PipelineError::Pull { .. }
            | PipelineError::Join { .. } => "pull",
            PipelineError::InvalidProject(_) => "workdir",
            PipelineError::Sync { .. } => "sync",
            PipelineError::Compose { .. } => "compose",
        }
    }
}

/// Where projects live and how their images are fetched
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory holding one checkout per project
    pub apps_dir: PathBuf,

    /// Registry namespace the worker pushes to
    pub image_namespace: String,

    /// Bound on each individual image pull
    pub pull_timeout: Duration,
}

pub struct BuildPipeline {
    settings: PipelineSettings,
    puller: Arc<dyn ImagePuller>,
    git: Arc<dyn RepositorySync>,
    compose: Arc<dyn ComposeRunner>,
    registry: Arc<ProjectRegistry>,
}

impl BuildPipeline {
    pub fn new(
        settings: PipelineSettings,
        puller: Arc<dyn ImagePuller>,
        git: Arc<dyn RepositorySync>,
        compose: Arc<dyn ComposeRunner>,
        registry: Arc<ProjectRegistry>,
    ) -> Self {
        Self {
            settings,
            puller,
            git,
            compose,
            registry,
        }
    }

    /// Deploys the images of a successful build
    pub async fn run(&self, outcome: &BuildOutcome) -> Result<(), PipelineError> {
        let project = outcome.project_name().to_string();
        info!(project = %project, "Deploying build");

        // Reject names that would escape the apps directory before any tool runs
        let dir = self.project_dir(&project)?;

        for build in &outcome.project_metadata.builds {
            let image = build.image_reference(&self.settings.image_namespace, &project);
            self.pull(image).await?;
        }

        self.git
            .sync(&dir)
            .await
            .map_err(|source| PipelineError::Sync {
                project: project.clone(),
                source,
            })?;
        info!(project = %project, "Checkout synchronized");

        self.compose
            .up(&dir)
            .await
            .map_err(|source| PipelineError::Compose {
                project: project.clone(),
                source,
            })?;

        let mut metadata = outcome.project_metadata.clone();
        if metadata.project_name.is_empty() {
            metadata.project_name = project.clone();
        }
        self.registry.update(metadata);

        info!(project = %project, "Deployment complete");
        Ok(())
    }

    /// Pulls one image on its own task, abandoning it once the timeout fires
    async fn pull(&self, image: String) -> Result<(), PipelineError> {
        let timeout = self.settings.pull_timeout;
        let puller = Arc::clone(&self.puller);
        let target = image.clone();
        let mut task = tokio::spawn(async move { puller.pull(&target).await });

        tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(())) => {
                    info!(image = %image, "Image pulled");
                    Ok(())
                }
                Ok(Err(source)) => Err(PipelineError::Pull { image, source }),
                Err(source) => Err(PipelineError::Join { image, source }),
            },
            _ = tokio::time::sleep(timeout) => {
                task.abort();
                Err(PipelineError::PullTimeout { image, timeout })
            }
        }
    }

    fn project_dir(&self, project: &str) -> Result<PathBuf, PipelineError> {
        let valid = !project.is_empty()
            && project != "."
            && project != ".."
            && !project.contains(['/', '\\']);

        if !valid {
            return Err(PipelineError::InvalidProject(project.to_string()));
        }

        Ok(self.settings.apps_dir.join(project))
    }
}
