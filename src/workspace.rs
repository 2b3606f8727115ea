//! Workspace (worktree) manager: an isolated working copy plus local branch
//! per scenario, created from the pinned base revision and moved between
//! stages by reapplying patch series.
//!
//! Lifecycle: absent -> created-at-base -> patched-to-stage. Resets are
//! intentionally destructive: tracked changes, untracked files, and ignored
//! files are all discarded. Any git-level error during init or reset is
//! fatal to that call; removal is best-effort and reports warnings instead.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::HarnessConfig;
use crate::exec::CommandRunner;
use crate::git::Git;
use crate::manifest::{self, GitConfig, ScenarioId};
use crate::patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStage {
    Broken,
    Solved,
}

impl fmt::Display for WorkspaceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkspaceStage::Broken => "broken",
            WorkspaceStage::Solved => "solved",
        };
        f.write_str(label)
    }
}

impl FromStr for WorkspaceStage {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "broken" => Ok(WorkspaceStage::Broken),
            "solved" => Ok(WorkspaceStage::Solved),
            other => bail!("unknown workspace stage {other:?} (expected broken or solved)"),
        }
    }
}

/// Non-fatal cleanup failure, surfaced so callers and tests can see what
/// teardown skipped instead of having errors silently discarded.
#[derive(Debug)]
pub struct CleanupWarning {
    pub operation: String,
    pub detail: String,
}

pub struct WorkspaceManager<'a> {
    runner: &'a dyn CommandRunner,
    repo_dir: PathBuf,
    workspace_dir: PathBuf,
    scenario_dir: PathBuf,
    git_config: GitConfig,
    patch_scope: String,
    strict: bool,
}

impl<'a> WorkspaceManager<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &HarnessConfig,
        id: &ScenarioId,
        git_config: GitConfig,
    ) -> Self {
        Self {
            runner,
            repo_dir: config.repo_dir.clone(),
            workspace_dir: config.workspace_dir(id),
            scenario_dir: manifest::scenario_dir(&config.scenarios_root, id),
            git_config,
            patch_scope: config.patch_scope.clone(),
            strict: config.strict,
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    fn repo_git(&self) -> Git<'a> {
        Git::new(self.runner, &self.repo_dir)
    }

    fn workspace_git(&self) -> Git<'a> {
        Git::new(self.runner, &self.workspace_dir)
    }

    /// Create the workspace at the base revision and apply the broken patch
    /// series. A workspace directory that already exists is a no-op, not an
    /// error.
    pub fn init(&self) -> Result<()> {
        self.ensure_base_ref()?;
        if self.workspace_dir.exists() {
            tracing::info!(
                workspace = %self.workspace_dir.display(),
                "workspace already exists, leaving it untouched"
            );
            return Ok(());
        }
        if let Some(parent) = self.workspace_dir.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create workspaces directory {}", parent.display()))?;
        }
        let base_ref = &self.git_config.base_ref;
        self.repo_git()
            .worktree_add_detached(&self.workspace_dir, base_ref)?;
        self.workspace_git()
            .switch_create(&self.git_config.work_branch, base_ref)?;
        self.apply_stage(WorkspaceStage::Broken)?;
        tracing::info!(
            workspace = %self.workspace_dir.display(),
            base_ref = %base_ref,
            "workspace initialized at the broken stage"
        );
        Ok(())
    }

    /// Discard every local change and reapply the requested stage's series.
    /// Fails loudly if the workspace is dirty afterwards, which indicates a
    /// non-idempotent patch series.
    pub fn reset(&self, stage: WorkspaceStage) -> Result<()> {
        self.ensure_base_ref()?;
        if !self.workspace_dir.exists() {
            bail!(
                "workspace {} does not exist; run workspace init first",
                self.workspace_dir.display()
            );
        }
        let ws = self.workspace_git();
        // There may be no import session in progress.
        if ws.am_abort().is_err() {
            tracing::debug!("no patch import session to abort");
        }
        let base_ref = &self.git_config.base_ref;
        ws.reset_hard(base_ref)?;
        ws.clean_all()?;
        ws.switch_create(&self.git_config.work_branch, base_ref)?;
        self.apply_stage(stage)?;
        let pending = ws.status_porcelain()?;
        if !pending.trim().is_empty() {
            bail!(
                "workspace {} is not clean after applying the {stage} series (non-idempotent patches?):\n{}",
                self.workspace_dir.display(),
                pending.trim_end()
            );
        }
        tracing::info!(
            workspace = %self.workspace_dir.display(),
            stage = %stage,
            "workspace reset"
        );
        Ok(())
    }

    /// Remove the workspace. Teardown never fails: each failed step is
    /// logged and returned as a warning so cleanup of everything else can
    /// proceed.
    pub fn remove(&self) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();
        let git = self.repo_git();
        if self.workspace_dir.exists() {
            if let Err(err) = git.worktree_remove(&self.workspace_dir) {
                push_warning(&mut warnings, "worktree remove", &err);
                if let Err(err) = std::fs::remove_dir_all(&self.workspace_dir) {
                    push_warning(&mut warnings, "remove workspace directory", &err.into());
                }
            }
        }
        if let Err(err) = git.worktree_prune() {
            push_warning(&mut warnings, "worktree prune", &err);
        }
        if warnings.is_empty() {
            tracing::info!(workspace = %self.workspace_dir.display(), "workspace removed");
        }
        warnings
    }

    /// The base revision must resolve locally (with one fetch retry) and, in
    /// strict mode, be an ancestor of the repository's current HEAD.
    fn ensure_base_ref(&self) -> Result<()> {
        let git = self.repo_git();
        let base_ref = &self.git_config.base_ref;
        if !git.rev_exists(base_ref)? {
            tracing::info!(base_ref = %base_ref, "base revision not found locally, fetching");
            if let Err(err) = git.fetch() {
                tracing::warn!(
                    error = %format!("{err:#}"),
                    "fetch failed while resolving the base revision"
                );
            }
        }
        if !git.rev_exists(base_ref)? {
            bail!(
                "base revision {base_ref} is not present in {}; is the workshop repository up to date?",
                self.repo_dir.display()
            );
        }
        if self.strict && !git.is_ancestor_of_head(base_ref)? {
            bail!("base revision {base_ref} is not an ancestor of HEAD (strict mode)");
        }
        Ok(())
    }

    /// The solved stage is the broken series plus the solved series: solved
    /// patches are produced on top of the broken ones.
    fn stage_series(&self, stage: WorkspaceStage) -> Result<Vec<PathBuf>> {
        let broken_dir = self.scenario_dir.join(&self.git_config.broken_patches_dir);
        let mut series = patch::collect_series(&broken_dir)?;
        if stage == WorkspaceStage::Solved {
            let solved_dir = self.scenario_dir.join(&self.git_config.solved_patches_dir);
            series.extend(patch::collect_series(&solved_dir)?);
        }
        Ok(series)
    }

    fn apply_stage(&self, stage: WorkspaceStage) -> Result<()> {
        let series = self.stage_series(stage)?;
        let ws = self.workspace_git();
        for patch_file in &series {
            patch::validate_scope(&ws, patch_file, &self.patch_scope)?;
        }
        patch::apply_series(&ws, &series)
    }
}

fn push_warning(warnings: &mut Vec<CleanupWarning>, operation: &str, err: &anyhow::Error) {
    tracing::warn!(operation, error = %format!("{err:#}"), "workspace cleanup step failed");
    warnings.push(CleanupWarning {
        operation: operation.to_string(),
        detail: format!("{err:#}"),
    });
}
