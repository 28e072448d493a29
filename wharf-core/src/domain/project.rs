//! Project metadata domain types
//!
//! Describes a deployed project: the images it builds and the routes the edge
//! router should forward to it.

use serde::{Deserialize, Serialize};

/// Deployment metadata for a single project, keyed by `project_name`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// Unique project name (the project's directory under the apps directory)
    #[serde(default)]
    pub project_name: String,

    /// One entry per buildable image
    #[serde(default)]
    pub builds: Vec<BuildInfo>,

    /// Routes served by the project
    #[serde(default)]
    pub routes: Vec<RouteInfo>,
}

/// A buildable image of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildInfo {
    /// Build context relative to the project root
    pub context: String,
    pub dockerfile_path: String,
    /// Image suffix, combined with the repository name to form the image name
    pub name: String,
}

impl BuildInfo {
    /// Reference of the image the worker pushed for this build
    ///
    /// Images are named `<namespace>/<repository>_<build>:latest`.
    pub fn image_reference(&self, namespace: &str, repository: &str) -> String {
        format!(
            "{}/{}_{}:latest",
            namespace.trim_end_matches('/'),
            repository,
            self.name
        )
    }
}

/// A route the edge router forwards to a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteInfo {
    /// Upstream host (and port) requests are forwarded to
    pub forward_host: String,
    pub route_path: String,
    pub domain: String,
}
