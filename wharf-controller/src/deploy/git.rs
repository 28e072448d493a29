//! Git adapter

use std::path::Path;

use async_trait::async_trait;

use super::process::run;
use super::{DeployError, RepositorySync};

/// Refreshes checkouts with `git pull --ff-only`
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl RepositorySync for GitCli {
    async fn sync(&self, dir: &Path) -> Result<(), DeployError> {
        run(
            &self.program,
            &["pull", "--ff-only"],
            Some(dir),
            &[("GIT_TERMINAL_PROMPT", "0")],
        )
        .await?;
        Ok(())
    }
}
