//! Subprocess seam for every external tool the engine drives.
//!
//! Git, the orchestrator CLI, and the test-suite runner are all invoked
//! through [`CommandRunner`] so the engine's logic can be exercised against a
//! scripted runner without real binaries.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use crate::util::format_command_line;

/// A single subprocess invocation: program, argv, working directory, and
/// extra environment entries layered on top of the inherited environment.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn command_line(&self) -> String {
        format_command_line(&self.program, &self.args)
    }
}

/// Captured result of a completed subprocess. A `None` status means the
/// process was terminated by a signal.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Narrow interface over subprocess execution. An `Err` from `run` means the
/// process could not be spawned at all; a spawned process that exits non-zero
/// is an `Ok` with a non-zero status, and policy belongs to the caller.
pub trait CommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Production runner backed by `std::process::Command`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        tracing::debug!(command = %request.command_line(), "spawn");
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        let output = cmd
            .output()
            .with_context(|| format!("spawn {}", request.command_line()))?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted runner for unit tests. Responses are consumed in call order,
    //! which matches the engine's strictly sequential execution.

    use super::{CommandOutput, CommandRequest, CommandRunner};
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    pub enum FakeResponse {
        Output(CommandOutput),
        SpawnError(String),
    }

    #[derive(Default)]
    pub struct FakeRunner {
        responses: RefCell<VecDeque<FakeResponse>>,
        pub calls: RefCell<Vec<CommandRequest>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, stdout: &str) {
            self.responses
                .borrow_mut()
                .push_back(FakeResponse::Output(CommandOutput {
                    status: Some(0),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }));
        }

        pub fn push_fail(&self, status: i32, stderr: &str) {
            self.responses
                .borrow_mut()
                .push_back(FakeResponse::Output(CommandOutput {
                    status: Some(status),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                }));
        }

        pub fn push_spawn_error(&self, message: &str) {
            self.responses
                .borrow_mut()
                .push_back(FakeResponse::SpawnError(message.to_string()));
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        /// Command lines of every recorded invocation, for order assertions.
        pub fn command_lines(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|call| call.command_line())
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(request.clone());
            let response = self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted command: {}", request.command_line()));
            match response {
                FakeResponse::Output(output) => Ok(output),
                FakeResponse::SpawnError(message) => Err(anyhow!("{message}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_env_and_cwd() {
        let request = CommandRequest::new("git", vec!["status".to_string()])
            .cwd("/tmp/repo")
            .env("GIT_TERMINAL_PROMPT", "0");
        assert_eq!(request.cwd.as_deref(), Some(std::path::Path::new("/tmp/repo")));
        assert_eq!(
            request.env.get("GIT_TERMINAL_PROMPT").map(String::as_str),
            Some("0")
        );
        assert_eq!(request.command_line(), "git status");
    }

    #[test]
    fn system_runner_reports_missing_binary_as_spawn_error() {
        let runner = SystemRunner;
        let request = CommandRequest::new("labctl-no-such-binary", Vec::new());
        assert!(runner.run(&request).is_err());
    }
}
