//! Docker adapters
//!
//! Image pulls and compose-up are delegated to the docker CLI and the compose
//! tool installed on the host.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::process::run;
use super::{ComposeRunner, DeployError, ImagePuller};

/// Pulls images with `docker pull`
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ImagePuller for DockerCli {
    async fn pull(&self, image: &str) -> Result<(), DeployError> {
        run(&self.program, &["pull", "--quiet", image], None, &[]).await?;
        info!(image, "Pulled image");
        Ok(())
    }
}

/// Brings projects up with `docker-compose up -d`
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
}

impl ComposeCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ComposeCli {
    fn default() -> Self {
        Self::new("docker-compose")
    }
}

#[async_trait]
impl ComposeRunner for ComposeCli {
    async fn up(&self, dir: &Path) -> Result<(), DeployError> {
        run(&self.program, &["up", "-d"], Some(dir), &[]).await?;
        Ok(())
    }
}
