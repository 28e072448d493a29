//! Compose manifest settings
//!
//! Each deployable project keeps a compose manifest in its directory. The
//! controller reads the `x-wharf` extension section of that manifest to learn
//! the project's builds and routes; everything else in the file belongs to the
//! compose tool.

use serde::{Deserialize, Serialize};

use crate::domain::project::{BuildInfo, ProjectMetadata, RouteInfo};

/// Key of the extension section inside a compose manifest
pub const EXTENSION_KEY: &str = "x-wharf";

/// The parts of a compose manifest the controller cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeManifest {
    #[serde(rename = "x-wharf", default)]
    pub settings: ComposeSettings,
}

/// Contents of the `x-wharf` extension section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    pub builds: Vec<BuildInfo>,
    pub routes: Vec<RouteInfo>,
}

impl ComposeManifest {
    /// Converts the manifest into project metadata for `project_name`
    pub fn into_metadata(self, project_name: impl Into<String>) -> ProjectMetadata {
        ProjectMetadata {
            project_name: project_name.into(),
            builds: self.settings.builds,
            routes: self.settings.routes,
        }
    }
}
