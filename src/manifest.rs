//! Scenario manifest model: identity, stage-keyed check lists, and git patch
//! configuration.
//!
//! Manifests are pure data. They are reloaded from disk on every invocation
//! (never cached across process runs) and validated eagerly for configuration
//! errors; individual check parameters are validated lazily at execution
//! time because the `type` discriminator alone determines dispatch.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// The one supported `checks.version` value.
pub const CHECKS_SCHEMA_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "scenario.json";

/// Deployment track a scenario targets. The track picks the application port
/// and how the auth bypass key is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    K8s,
    Compose,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::K8s => "k8s",
            Track::Compose => "compose",
        }
    }

    pub const ALL: [Track; 2] = [Track::K8s, Track::Compose];
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "k8s" => Ok(Track::K8s),
            "compose" => Ok(Track::Compose),
            other => bail!("unknown track {other:?} (expected k8s or compose)"),
        }
    }
}

/// Scenario identity in `<track>/<slug>` form. The slug must be a DNS-label
/// safe string because the cluster namespace is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioId {
    pub track: Track,
    pub slug: String,
}

impl ScenarioId {
    /// Namespace every orchestrator invocation is scoped to.
    pub fn namespace(&self) -> String {
        format!("demo-{}", self.slug)
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.track, self.slug)
    }
}

impl FromStr for ScenarioId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (track, slug) = value
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid scenario id {value:?} (expected <track>/<slug>)"))?;
        let track: Track = track.parse()?;
        validate_slug(slug)?;
        Ok(ScenarioId {
            track,
            slug: slug.to_string(),
        })
    }
}

fn validate_slug(slug: &str) -> Result<()> {
    let label_safe = !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
    if !label_safe {
        bail!("invalid scenario slug {slug:?} (lowercase alphanumeric and '-', no leading or trailing '-')");
    }
    Ok(())
}

/// One scenario definition, loaded from `scenario.json`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub checks: Checks,
    /// Present only for patch-based scenarios.
    #[serde(default)]
    pub git: Option<GitConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Checks {
    pub version: u32,
    #[serde(default)]
    pub default_stage: Option<String>,
    #[serde(default)]
    pub stages: BTreeMap<String, Stage>,
}

/// Check lists for one named stage. Empty lists are valid and mean "no
/// checks of that kind".
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    #[serde(default)]
    pub verify: Vec<Check>,
    #[serde(default)]
    pub health: Vec<Check>,
}

/// Open check envelope: the discriminator and description are lifted out,
/// every remaining field is kept raw for the executor to parse.
#[derive(Debug, Clone, Deserialize)]
pub struct Check {
    #[serde(rename = "type")]
    pub check_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Check {
    /// Human label used in reports: the description, or the type when none
    /// was given.
    pub fn label(&self) -> &str {
        match &self.description {
            Some(description) if !description.is_empty() => description,
            _ => &self.check_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    /// Pinned base revision: a full content-addressed commit id, never a
    /// mutable name.
    pub base_ref: String,
    /// Local branch force-created at the base revision in the workspace.
    pub work_branch: String,
    /// Patch directories, relative to the scenario directory.
    pub broken_patches_dir: PathBuf,
    pub solved_patches_dir: PathBuf,
}

/// Directory holding a scenario's manifest and patch series.
pub fn scenario_dir(scenarios_root: &Path, id: &ScenarioId) -> PathBuf {
    scenarios_root.join(id.track.as_str()).join(&id.slug)
}

/// Load and validate one scenario manifest from disk.
pub fn load(scenarios_root: &Path, id: &ScenarioId) -> Result<Manifest> {
    let path = scenario_dir(scenarios_root, id).join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("read scenario manifest {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("parse scenario manifest {}", path.display()))?;
    validate(&manifest).with_context(|| format!("invalid scenario manifest {}", path.display()))?;
    Ok(manifest)
}

fn validate(manifest: &Manifest) -> Result<()> {
    let checks = &manifest.checks;
    if !checks.stages.is_empty() && checks.version != CHECKS_SCHEMA_VERSION {
        bail!(
            "unsupported checks version {} (supported: {})",
            checks.version,
            CHECKS_SCHEMA_VERSION
        );
    }
    if let Some(default_stage) = &checks.default_stage {
        if !checks.stages.contains_key(default_stage) {
            bail!("default_stage {default_stage:?} is not a defined stage");
        }
    }
    for (stage_name, stage) in &checks.stages {
        for check in stage.verify.iter().chain(stage.health.iter()) {
            if check.check_type.is_empty() {
                bail!("stage {stage_name:?} contains a check with an empty type");
            }
        }
    }
    if let Some(git) = &manifest.git {
        validate_base_ref(&git.base_ref)?;
        if git.work_branch.is_empty() {
            bail!("git.work_branch must not be empty");
        }
        validate_patches_dir("broken_patches_dir", &git.broken_patches_dir)?;
        validate_patches_dir("solved_patches_dir", &git.solved_patches_dir)?;
    }
    Ok(())
}

fn validate_base_ref(base_ref: &str) -> Result<()> {
    let full_hex = matches!(base_ref.len(), 40 | 64)
        && base_ref
            .chars()
            .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
    if !full_hex {
        bail!("git.base_ref {base_ref:?} must be a full lowercase hex commit id, not a mutable name");
    }
    Ok(())
}

fn validate_patches_dir(field: &str, dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        bail!("git.{field} must not be empty");
    }
    let clean_relative = dir.components().all(|component| {
        matches!(component, Component::Normal(_) | Component::CurDir)
    });
    if !clean_relative {
        bail!(
            "git.{field} {} must be a clean relative path (no absolute or parent components)",
            dir.display()
        );
    }
    Ok(())
}

/// Scenario ids and declared stages, discovered under the scenarios root.
pub struct ScenarioEntry {
    pub id: ScenarioId,
    pub stages: Vec<String>,
}

/// Enumerate `<scenarios_root>/<track>/<slug>` directories that carry a
/// manifest. Unreadable manifests are logged and skipped so one bad entry
/// does not hide the rest.
pub fn list(scenarios_root: &Path) -> Result<Vec<ScenarioEntry>> {
    let mut entries = Vec::new();
    for track in Track::ALL {
        let track_dir = scenarios_root.join(track.as_str());
        if !track_dir.is_dir() {
            continue;
        }
        let mut slugs = Vec::new();
        for entry in std::fs::read_dir(&track_dir)
            .with_context(|| format!("read scenarios directory {}", track_dir.display()))?
        {
            let entry = entry?;
            if entry.path().join(MANIFEST_FILE).is_file() {
                slugs.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        slugs.sort();
        for slug in slugs {
            if validate_slug(&slug).is_err() {
                tracing::warn!(track = %track, slug = %slug, "skipping scenario with invalid slug");
                continue;
            }
            let id = ScenarioId {
                track,
                slug: slug.clone(),
            };
            match load(scenarios_root, &id) {
                Ok(manifest) => entries.push(ScenarioEntry {
                    id,
                    stages: manifest.checks.stages.keys().cloned().collect(),
                }),
                Err(err) => {
                    tracing::warn!(scenario = %id, error = %format!("{err:#}"), "skipping unreadable scenario");
                }
            }
        }
    }
    Ok(entries)
}
