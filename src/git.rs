//! Narrow wrapper over the `git` CLI contract the engine depends on.
//!
//! Every call goes through [`CommandRunner`] so workspace and patch logic can
//! be unit tested against a scripted runner.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::exec::{CommandOutput, CommandRequest, CommandRunner};
use crate::util::truncate_string;

const MAX_STDERR_BYTES: usize = 2048;

pub struct Git<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            dir: dir.into(),
        }
    }

    /// Same runner, different working directory. Worktree operations run in
    /// the source repository while patch operations run in the workspace.
    pub fn in_dir(&self, dir: impl Into<PathBuf>) -> Git<'a> {
        Git {
            runner: self.runner,
            dir: dir.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let request = CommandRequest::new(
            "git",
            args.iter().map(|arg| arg.to_string()),
        )
        .cwd(&self.dir);
        self.runner.run(&request)
    }

    /// Run and require exit code 0, folding stderr into the error.
    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if !output.success() {
            bail!(
                "git {} failed in {}: {}",
                args.first().copied().unwrap_or_default(),
                self.dir.display(),
                truncate_string(output.stderr.trim(), MAX_STDERR_BYTES)
            );
        }
        Ok(output)
    }

    /// Whether `rev` resolves to a commit in the local object store.
    pub fn rev_exists(&self, rev: &str) -> Result<bool> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.run(&["cat-file", "-e", &spec])?;
        Ok(output.success())
    }

    pub fn fetch(&self) -> Result<()> {
        self.run_checked(&["fetch", "--quiet"])?;
        Ok(())
    }

    /// Whether `rev` is an ancestor of the current history tip.
    pub fn is_ancestor_of_head(&self, rev: &str) -> Result<bool> {
        let output = self.run(&["merge-base", "--is-ancestor", rev, "HEAD"])?;
        Ok(output.success())
    }

    pub fn worktree_add_detached(&self, path: &Path, rev: &str) -> Result<()> {
        let path = path_str(path)?;
        self.run_checked(&["worktree", "add", "--detach", path, rev])?;
        Ok(())
    }

    pub fn worktree_remove(&self, path: &Path) -> Result<()> {
        let path = path_str(path)?;
        self.run_checked(&["worktree", "remove", "--force", path])?;
        Ok(())
    }

    pub fn worktree_prune(&self) -> Result<()> {
        self.run_checked(&["worktree", "prune"])?;
        Ok(())
    }

    /// Force-(re)create `branch` at `rev` and switch to it.
    pub fn switch_create(&self, branch: &str, rev: &str) -> Result<()> {
        self.run_checked(&["switch", "-C", branch, rev])?;
        Ok(())
    }

    pub fn reset_hard(&self, rev: &str) -> Result<()> {
        self.run_checked(&["reset", "--hard", rev])?;
        Ok(())
    }

    /// Remove untracked and ignored files. Intentionally destructive.
    pub fn clean_all(&self) -> Result<()> {
        self.run_checked(&["clean", "-fdx", "--quiet"])?;
        Ok(())
    }

    pub fn am(&self, patch: &Path) -> Result<()> {
        let patch = path_str(patch)?;
        self.run_checked(&["am", "--3way", "--keep-cr", "--quiet", patch])?;
        Ok(())
    }

    /// Abort an in-progress `am` session. Callers treat this as best-effort;
    /// there may be no session at all.
    pub fn am_abort(&self) -> Result<()> {
        self.run_checked(&["am", "--abort"])?;
        Ok(())
    }

    /// Machine-readable change summary of a patch, without applying it.
    pub fn apply_numstat(&self, patch: &Path) -> Result<String> {
        let patch = path_str(patch)?;
        let output = self.run_checked(&["apply", "--numstat", patch])?;
        Ok(output.stdout)
    }

    pub fn status_porcelain(&self) -> Result<String> {
        let output = self.run_checked(&["status", "--porcelain"])?;
        Ok(output.stdout)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("path {} is not valid UTF-8", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::FakeRunner;

    #[test]
    fn checked_failures_carry_stderr() {
        let runner = FakeRunner::new();
        runner.push_fail(128, "fatal: not a git repository");
        let git = Git::new(&runner, "/tmp/nowhere");
        let err = git.fetch().unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
        assert_eq!(runner.command_lines(), vec!["git fetch --quiet"]);
    }

    #[test]
    fn rev_exists_maps_exit_code_not_error() {
        let runner = FakeRunner::new();
        runner.push_fail(128, "");
        runner.push_ok("");
        let git = Git::new(&runner, "/tmp/repo");
        assert!(!git.rev_exists("deadbeef").expect("probe runs"));
        assert!(git.rev_exists("deadbeef").expect("probe runs"));
        assert!(runner.command_lines()[0].contains("cat-file -e"));
    }

    #[test]
    fn in_dir_switches_working_directory() {
        let runner = FakeRunner::new();
        runner.push_ok("");
        let git = Git::new(&runner, "/repo");
        let ws = git.in_dir("/workspaces/demo");
        ws.reset_hard("deadbeef").expect("reset");
        let call = &runner.calls.borrow()[0];
        assert_eq!(call.cwd.as_deref(), Some(Path::new("/workspaces/demo")));
    }
}
