//! CLI argument parsing for the scenario harness.
//!
//! The CLI is intentionally thin: it collects flags into a configuration
//! struct and routes to the engine, without embedding any policy of its own.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "labctl",
    version,
    about = "Scenario verification and workspace management for the demo harness",
    after_help = "Examples:\n  labctl list\n  labctl verify --scenario k8s/missing-index\n  labctl health --scenario k8s/missing-index --type k8s --json\n  labctl workspace init --scenario k8s/missing-index\n  labctl workspace reset --scenario k8s/missing-index --stage solved\n  labctl workspace remove --scenario k8s/missing-index",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Harness-wide flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Root directory holding scenario definitions
    #[arg(long, value_name = "DIR", default_value = "scenarios", global = true)]
    pub scenarios_root: PathBuf,

    /// Workshop source repository the workspaces are carved from
    #[arg(long = "repo", value_name = "DIR", default_value = ".", global = true)]
    pub repo_dir: PathBuf,

    /// Directory holding per-scenario workspaces (defaults under the
    /// platform data dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub workspaces_root: Option<PathBuf>,

    /// Host the deployed application is reachable on
    #[arg(long, value_name = "HOST", default_value = "localhost", global = true)]
    pub host: String,

    /// Published application port on the k8s track
    #[arg(long, value_name = "PORT", default_value_t = 30080, global = true)]
    pub k8s_port: u16,

    /// Published application port on the compose track
    #[arg(long, value_name = "PORT", default_value_t = 3000, global = true)]
    pub compose_port: u16,

    /// kubectl context to use (defaults to the current context)
    #[arg(long, value_name = "NAME", global = true)]
    pub kube_context: Option<String>,

    /// Directory holding the browser test suite
    #[arg(long, value_name = "DIR", default_value = "e2e", global = true)]
    pub suite_dir: PathBuf,

    /// Command line that runs the browser test suite
    #[arg(long, value_name = "CMD", default_value = "npx playwright test", global = true)]
    pub suite_command: String,

    /// Secrets env file used on the compose track
    #[arg(long, value_name = "PATH", default_value = ".env", global = true)]
    pub secrets_file: PathBuf,

    /// Subtree prefix scenario patches are allowed to touch
    #[arg(long, value_name = "PREFIX", default_value = "app/", global = true)]
    pub patch_scope: String,

    /// Require the base revision to be an ancestor of HEAD
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a stage's verification checks (fail-fast)
    Verify(CheckArgs),
    /// Run a stage's health checks (observational, always exits 0 on
    /// check failures)
    Health(CheckArgs),
    /// List scenarios under the scenarios root
    List(ListArgs),
    /// Manage per-scenario workspaces
    Workspace(WorkspaceArgs),
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Scenario identifier in <track>/<slug> form
    #[arg(long, value_name = "ID")]
    pub scenario: String,

    /// Stage to check (defaults to the manifest's stage resolution)
    #[arg(long, value_name = "NAME")]
    pub stage: Option<String>,

    /// Only run checks whose type (or type family) matches
    #[arg(long = "type", value_name = "FILTER")]
    pub type_filter: Option<String>,

    /// Emit the machine-readable JSON report
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub command: WorkspaceCommand,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Create the workspace at the base revision and apply the broken series
    Init(WorkspaceScenarioArgs),
    /// Discard all local changes and reapply a stage's patch series
    Reset(WorkspaceResetArgs),
    /// Remove the workspace and prune stale worktree metadata
    Remove(WorkspaceScenarioArgs),
}

#[derive(Parser, Debug)]
pub struct WorkspaceScenarioArgs {
    /// Scenario identifier in <track>/<slug> form
    #[arg(long, value_name = "ID")]
    pub scenario: String,
}

#[derive(Parser, Debug)]
pub struct WorkspaceResetArgs {
    /// Scenario identifier in <track>/<slug> form
    #[arg(long, value_name = "ID")]
    pub scenario: String,

    /// Stage to reset to: broken or solved
    #[arg(long, value_name = "STAGE")]
    pub stage: String,
}
