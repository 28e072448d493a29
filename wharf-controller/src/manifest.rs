//! Project manifest discovery
//!
//! At startup the controller scans the apps directory one level deep. Every
//! subdirectory holding a compose manifest is a deployable project; the
//! manifest's `x-wharf` section describes its builds and routes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use wharf_core::domain::manifest::{ComposeManifest, EXTENSION_KEY};
use wharf_core::domain::project::ProjectMetadata;

/// Manifest file read in production mode
pub const MANIFEST_FILE: &str = "docker-compose.yml";

/// Manifest file read in development mode
pub const DEV_MANIFEST_FILE: &str = "docker-compose.dev.yml";

/// Discovers all projects under `apps_dir`
///
/// Projects are returned sorted by name. Directories without a manifest are
/// skipped; a manifest that cannot be read or parsed is an error.
pub fn discover_projects(apps_dir: &Path, manifest_file: &str) -> Result<Vec<ProjectMetadata>> {
    if !apps_dir.is_dir() {
        anyhow::bail!("apps directory {} does not exist", apps_dir.display());
    }

    let mut projects = Vec::new();

    let entries = fs::read_dir(apps_dir)
        .with_context(|| format!("Failed to read apps directory {}", apps_dir.display()))?;

    for entry in entries {
        let entry = entry.context("Failed to read apps directory entry")?;
        let path = entry.path();

        if !path.is_dir() {
            continue;
        }

        let Some(project_name) = path.file_name().and_then(|name| name.to_str()) else {
            warn!("Skipping project directory with non UTF-8 name: {}", path.display());
            continue;
        };

        let manifest_path = path.join(manifest_file);
        if !manifest_path.is_file() {
            debug!("No {} in {}, skipping", manifest_file, path.display());
            continue;
        }

        let contents = fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

        let metadata = parse_manifest(&contents, project_name)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

        info!(
            project = %metadata.project_name,
            builds = metadata.builds.len(),
            routes = metadata.routes.len(),
            "Discovered project"
        );

        projects.push(metadata);
    }

    projects.sort_by(|a, b| a.project_name.cmp(&b.project_name));

    Ok(projects)
}

/// Parses a compose manifest into metadata for `project_name`
///
/// A manifest without an `x-wharf` section yields a project with no builds
/// and no routes.
pub fn parse_manifest(contents: &str, project_name: &str) -> Result<ProjectMetadata> {
    let manifest: ComposeManifest = serde_yaml::from_str(contents)?;

    if manifest.settings.builds.is_empty() && manifest.settings.routes.is_empty() {
        debug!("Manifest for {} has an empty {} section", project_name, EXTENSION_KEY);
    }

    Ok(manifest.into_metadata(project_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
version: "3"
services:
  api:
    image: docker.io/therileyjohnson/demo_api:latest
x-wharf:
  builds:
    - name: api
      context: ./api
      dockerfilePath: ./api/Dockerfile
  routes:
    - domain: demo.example.com
      routePath: /
      forwardHost: demo_api:8080
"#;

    #[test]
    fn test_parse_manifest() {
        let metadata = parse_manifest(MANIFEST, "demo").unwrap();

        assert_eq!(metadata.project_name, "demo");
        assert_eq!(metadata.builds.len(), 1);
        assert_eq!(metadata.builds[0].name, "api");
        assert_eq!(metadata.builds[0].dockerfile_path, "./api/Dockerfile");
        assert_eq!(metadata.routes[0].forward_host, "demo_api:8080");
    }

    #[test]
    fn test_parse_manifest_without_section() {
        let metadata = parse_manifest("services:\n  web:\n    image: nginx\n", "plain").unwrap();
        assert!(metadata.builds.is_empty());
        assert!(metadata.routes.is_empty());
    }

    #[test]
    fn test_discover_projects() {
        let apps = tempfile::tempdir().unwrap();

        fs::create_dir(apps.path().join("demo")).unwrap();
        fs::write(apps.path().join("demo").join(MANIFEST_FILE), MANIFEST).unwrap();

        fs::create_dir(apps.path().join("blog")).unwrap();
        fs::write(
            apps.path().join("blog").join(MANIFEST_FILE),
            "x-wharf:\n  routes:\n    - domain: blog.example.com\n",
        )
        .unwrap();

        // No manifest: not a project
        fs::create_dir(apps.path().join("scratch")).unwrap();
        // Loose files are ignored
        fs::write(apps.path().join("README.md"), "apps").unwrap();

        let projects = discover_projects(apps.path(), MANIFEST_FILE).unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.project_name.as_str()).collect();
        assert_eq!(names, vec!["blog", "demo"]);
    }

    #[test]
    fn test_discover_projects_development_manifest() {
        let apps = tempfile::tempdir().unwrap();
        fs::create_dir(apps.path().join("demo")).unwrap();
        fs::write(apps.path().join("demo").join(MANIFEST_FILE), MANIFEST).unwrap();

        let projects = discover_projects(apps.path(), DEV_MANIFEST_FILE).unwrap();
        assert!(projects.is_empty());
    }

    #[test]
    fn test_discover_projects_missing_dir() {
        let apps = tempfile::tempdir().unwrap();
        let missing = apps.path().join("nope");
        assert!(discover_projects(&missing, MANIFEST_FILE).is_err());
    }

    #[test]
    fn test_discover_projects_invalid_manifest() {
        let apps = tempfile::tempdir().unwrap();
        fs::create_dir(apps.path().join("broken")).unwrap();
        fs::write(
            apps.path().join("broken").join(MANIFEST_FILE),
            "x-wharf: [unterminated",
        )
        .unwrap();

        assert!(discover_projects(apps.path(), MANIFEST_FILE).is_err());
    }
}
