//! Build outcome domain type
//!
//! The result a worker reports once it has built (or failed to build) the
//! images for a push.

use serde::{Deserialize, Serialize};

use crate::domain::project::ProjectMetadata;
use crate::domain::push::PushEvent;

/// Result of a build performed by the worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    /// Non-empty when the build failed
    #[serde(default, alias = "err", alias = "Err")]
    pub error_message: String,

    /// The push event the build was requested for
    #[serde(default)]
    pub github_data: PushEvent,

    /// Metadata of the project as found in the freshly built revision
    #[serde(default)]
    pub project_metadata: ProjectMetadata,
}

impl BuildOutcome {
    /// Whether the worker reported a failed build
    pub fn is_failure(&self) -> bool {
        !self.error_message.is_empty()
    }

    /// Name the project is deployed under
    ///
    /// This is the pushed repository's name; outcomes that carry no push data
    /// fall back to the metadata's project name.
    pub fn project_name(&self) -> &str {
        if self.github_data.repository.name.is_empty() {
            &self.project_metadata.project_name
        } else {
            &self.github_data.repository.name
        }
    }
}
