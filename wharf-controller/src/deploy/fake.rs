//! In-memory tool adapters for tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ComposeRunner, DeployError, ImagePuller, RepositorySync};

fn failure(program: &str) -> DeployError {
    DeployError::Exit {
        program: program.to_string(),
        code: 1,
        stderr: format!("{} failed", program),
    }
}

/// Records pulls; each pull takes `delay` and fails when `fail` is set
#[derive(Clone, Default)]
pub struct FakePuller {
    pub delay: Duration,
    pub fail: bool,
    started: Arc<Mutex<Vec<String>>>,
    completed: Arc<Mutex<Vec<String>>>,
}

impl FakePuller {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Images whose pull was started
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Images whose pull ran to completion
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImagePuller for FakePuller {
    async fn pull(&self, image: &str) -> Result<(), DeployError> {
        self.started.lock().unwrap().push(image.to_string());
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(failure("docker"));
        }
        self.completed.lock().unwrap().push(image.to_string());
        Ok(())
    }
}

/// Records the directories a tool ran in
#[derive(Clone, Default)]
pub struct FakeTool {
    pub fail: bool,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeTool {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, program: &str, dir: &Path) -> Result<(), DeployError> {
        self.calls.lock().unwrap().push(dir.to_path_buf());
        if self.fail {
            return Err(failure(program));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositorySync for FakeTool {
    async fn sync(&self, dir: &Path) -> Result<(), DeployError> {
        self.record("git", dir)
    }
}

#[async_trait]
impl ComposeRunner for FakeTool {
    async fn up(&self, dir: &Path) -> Result<(), DeployError> {
        self.record("docker-compose", dir)
    }
}
