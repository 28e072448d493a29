//! External tool adapters
//!
//! The controller drives three external tools when deploying a build:
//! - an image puller fetching the freshly built images
//! - a version control client refreshing the project checkout
//! - a compose tool (re)starting the project's containers
//!
//! Each tool sits behind a trait so the build pipeline can be exercised
//! without docker or git installed.

mod docker;
mod git;
mod process;

#[cfg(test)]
pub mod fake;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use docker::{ComposeCli, DockerCli};
pub use git::GitCli;

/// Errors raised by an external tool invocation
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },
}

/// Fetches container images from a registry
#[async_trait]
pub trait ImagePuller: Send + Sync {
    /// Pulls `image`, returning once it is available locally
    async fn pull(&self, image: &str) -> Result<(), DeployError>;
}

/// Refreshes a local checkout from its remote
#[async_trait]
pub trait RepositorySync: Send + Sync {
    /// Fast-forwards the checkout in `dir` to its remote branch
    async fn sync(&self, dir: &Path) -> Result<(), DeployError>;
}

/// Brings a compose project up
#[async_trait]
pub trait ComposeRunner: Send + Sync {
    /// (Re)starts the containers described by the manifest in `dir`
    async fn up(&self, dir: &Path) -> Result<(), DeployError>;
}
