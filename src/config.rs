//! Harness configuration, built once from CLI flags and threaded explicitly
//! into the engine.

use std::path::PathBuf;

use crate::cli::ConfigArgs;
use crate::manifest::{ScenarioId, Track};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub scenarios_root: PathBuf,
    pub repo_dir: PathBuf,
    pub workspaces_root: PathBuf,
    pub host: String,
    pub k8s_port: u16,
    pub compose_port: u16,
    pub kube_context: Option<String>,
    pub suite_dir: PathBuf,
    pub suite_command: String,
    pub secrets_file: PathBuf,
    /// Subtree patches are allowed to touch, e.g. `app/`.
    pub patch_scope: String,
    /// Require the base revision to be an ancestor of HEAD.
    pub strict: bool,
}

impl HarnessConfig {
    pub fn from_args(args: &ConfigArgs) -> Self {
        Self {
            scenarios_root: args.scenarios_root.clone(),
            repo_dir: args.repo_dir.clone(),
            workspaces_root: args
                .workspaces_root
                .clone()
                .unwrap_or_else(default_workspaces_root),
            host: args.host.clone(),
            k8s_port: args.k8s_port,
            compose_port: args.compose_port,
            kube_context: args.kube_context.clone(),
            suite_dir: args.suite_dir.clone(),
            suite_command: args.suite_command.clone(),
            secrets_file: args.secrets_file.clone(),
            patch_scope: args.patch_scope.clone(),
            strict: args.strict,
        }
    }

    /// Application base URL for the track's published port.
    pub fn base_url(&self, track: Track) -> String {
        let port = match track {
            Track::K8s => self.k8s_port,
            Track::Compose => self.compose_port,
        };
        format!("http://{}:{}", self.host, port)
    }

    pub fn workspace_dir(&self, id: &ScenarioId) -> PathBuf {
        self.workspaces_root
            .join(id.track.as_str())
            .join(&id.slug)
    }

    #[cfg(test)]
    pub fn default_for_tests() -> Self {
        Self {
            scenarios_root: PathBuf::from("scenarios"),
            repo_dir: PathBuf::from("."),
            workspaces_root: PathBuf::from("/tmp/labctl-workspaces"),
            host: "localhost".to_string(),
            k8s_port: 30080,
            compose_port: 3000,
            kube_context: None,
            suite_dir: PathBuf::from("/no/such/suite"),
            suite_command: "npx playwright test".to_string(),
            secrets_file: PathBuf::from(".env"),
            patch_scope: "app/".to_string(),
            strict: false,
        }
    }
}

fn default_workspaces_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("labctl")
        .join("workspaces")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_the_track_port() {
        let config = HarnessConfig::default_for_tests();
        assert_eq!(config.base_url(Track::K8s), "http://localhost:30080");
        assert_eq!(config.base_url(Track::Compose), "http://localhost:3000");
    }

    #[test]
    fn workspace_dir_nests_track_and_slug() {
        let config = HarnessConfig::default_for_tests();
        let id: ScenarioId = "k8s/missing-index".parse().expect("id");
        assert_eq!(
            config.workspace_dir(&id),
            PathBuf::from("/tmp/labctl-workspaces/k8s/missing-index")
        );
    }
}
