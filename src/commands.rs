//! Thin glue from parsed CLI arguments to engine calls, including
//! exit-code semantics.
//!
//! A verification run that fails, or any unsatisfiable precondition
//! (missing manifest, unresolvable stage or base revision), surfaces as an
//! error and therefore a non-zero exit. Health runs exit 0 regardless of
//! individual check failures.

use anyhow::{anyhow, bail, Result};

use crate::checks::{CheckKind, CheckRunner};
use crate::cli::{
    CheckArgs, Command, ListArgs, RootArgs, WorkspaceCommand, WorkspaceResetArgs,
    WorkspaceScenarioArgs,
};
use crate::config::HarnessConfig;
use crate::exec::SystemRunner;
use crate::manifest::{self, GitConfig, ScenarioId};
use crate::output;
use crate::workspace::{WorkspaceManager, WorkspaceStage};

pub fn run(root: RootArgs) -> Result<()> {
    let config = HarnessConfig::from_args(&root.config);
    match root.command {
        Command::Verify(args) => run_checks(&config, &args, CheckKind::Verify),
        Command::Health(args) => run_checks(&config, &args, CheckKind::Health),
        Command::List(args) => run_list(&config, &args),
        Command::Workspace(args) => match args.command {
            WorkspaceCommand::Init(args) => run_workspace_init(&config, &args),
            WorkspaceCommand::Reset(args) => run_workspace_reset(&config, &args),
            WorkspaceCommand::Remove(args) => run_workspace_remove(&config, &args),
        },
    }
}

fn run_checks(config: &HarnessConfig, args: &CheckArgs, kind: CheckKind) -> Result<()> {
    let id: ScenarioId = args.scenario.parse()?;
    let manifest = manifest::load(&config.scenarios_root, &id)?;
    let runner = SystemRunner;
    let check_runner = CheckRunner::new(config, &id, &runner);
    let result = check_runner.run(
        &manifest,
        kind,
        args.stage.as_deref(),
        args.type_filter.as_deref(),
    )?;
    output::print_run_result(&result, args.json)?;
    if kind == CheckKind::Verify && result.failed > 0 {
        bail!("{} verification check(s) failed for {id}", result.failed);
    }
    Ok(())
}

fn run_list(config: &HarnessConfig, args: &ListArgs) -> Result<()> {
    let entries = manifest::list(&config.scenarios_root)?;
    output::print_scenario_list(&entries, args.json)
}

fn load_git_config(config: &HarnessConfig, id: &ScenarioId) -> Result<GitConfig> {
    let manifest = manifest::load(&config.scenarios_root, id)?;
    manifest
        .git
        .ok_or_else(|| anyhow!("scenario {id} has no git configuration; nothing to set up"))
}

fn run_workspace_init(config: &HarnessConfig, args: &WorkspaceScenarioArgs) -> Result<()> {
    let id: ScenarioId = args.scenario.parse()?;
    let git_config = load_git_config(config, &id)?;
    let runner = SystemRunner;
    let manager = WorkspaceManager::new(&runner, config, &id, git_config);
    manager.init()?;
    println!("workspace ready at {}", manager.workspace_dir().display());
    Ok(())
}

fn run_workspace_reset(config: &HarnessConfig, args: &WorkspaceResetArgs) -> Result<()> {
    let id: ScenarioId = args.scenario.parse()?;
    let stage: WorkspaceStage = args.stage.parse()?;
    let git_config = load_git_config(config, &id)?;
    let runner = SystemRunner;
    let manager = WorkspaceManager::new(&runner, config, &id, git_config);
    manager.reset(stage)?;
    println!(
        "workspace {} reset to {stage}",
        manager.workspace_dir().display()
    );
    Ok(())
}

fn run_workspace_remove(config: &HarnessConfig, args: &WorkspaceScenarioArgs) -> Result<()> {
    let id: ScenarioId = args.scenario.parse()?;
    let git_config = load_git_config(config, &id)?;
    let runner = SystemRunner;
    let manager = WorkspaceManager::new(&runner, config, &id, git_config);
    let warnings = manager.remove();
    for warning in &warnings {
        eprintln!("warning: {}: {}", warning.operation, warning.detail);
    }
    println!("workspace {} removed", manager.workspace_dir().display());
    Ok(())
}
