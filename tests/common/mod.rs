//! Shared test infrastructure for integration tests: a throwaway workshop
//! git repository with exported patch series, scenario manifests on disk,
//! and a runner for the built `labctl` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Skip guard for tests that drive a real git repository.
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

pub struct Harness {
    pub temp: TempDir,
    pub scenarios_root: PathBuf,
    pub workspaces_root: PathBuf,
    pub repo_dir: PathBuf,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let scenarios_root = temp.path().join("scenarios");
        let workspaces_root = temp.path().join("workspaces");
        let repo_dir = temp.path().join("repo");
        std::fs::create_dir_all(&scenarios_root).expect("create scenarios root");
        Self {
            temp,
            scenarios_root,
            workspaces_root,
            repo_dir,
        }
    }

    /// Run the built binary with the harness roots preconfigured.
    pub fn labctl(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_labctl"))
            .arg("--scenarios-root")
            .arg(&self.scenarios_root)
            .arg("--repo")
            .arg(&self.repo_dir)
            .arg("--workspaces-root")
            .arg(&self.workspaces_root)
            .args(args)
            .output()
            .expect("spawn labctl")
    }

    pub fn scenario_dir(&self, id: &str) -> PathBuf {
        self.scenarios_root.join(id)
    }

    /// Write `scenario.json` for an id in `<track>/<slug>` form.
    pub fn write_manifest(&self, id: &str, json: &str) {
        let dir = self.scenario_dir(id);
        std::fs::create_dir_all(&dir).expect("create scenario dir");
        std::fs::write(dir.join("scenario.json"), json).expect("write manifest");
    }

    pub fn workspace_dir(&self, id: &str) -> PathBuf {
        self.workspaces_root.join(id)
    }

    fn git(&self, args: &[&str]) -> String {
        run_git(&self.repo_dir, args)
    }

    /// Initialize the workshop repository: a base commit holding `app/` and
    /// `other/` subtrees. Returns the base revision id.
    pub fn init_workshop_repo(&self) -> String {
        std::fs::create_dir_all(&self.repo_dir).expect("create repo dir");
        self.git(&["init", "-q", "-b", "main"]);
        self.git(&["config", "user.name", "Workshop Fixture"]);
        self.git(&["config", "user.email", "fixture@example.com"]);
        self.write_repo_file("app/greeting.txt", "hello from base\n");
        self.write_repo_file("other/readme.txt", "infrastructure\n");
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", "base"]);
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn write_repo_file(&self, rel: &str, content: &str) {
        let path = self.repo_dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, content).expect("write repo file");
    }

    /// Commit a change to one file and export it as a patch into `out_dir`.
    pub fn export_patch(&self, rel: &str, content: &str, message: &str, out_dir: &Path) {
        self.write_repo_file(rel, content);
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
        std::fs::create_dir_all(out_dir).expect("create patch dir");
        let out = out_dir.to_str().expect("utf-8 patch dir");
        self.git(&["format-patch", "-1", "HEAD", "-o", out]);
    }

    /// Full patch-based scenario: base commit, a broken patch flipping the
    /// greeting, a solved patch restoring it, and a manifest wiring them up.
    pub fn setup_patch_scenario(&self, id: &str) -> String {
        let base_ref = self.init_workshop_repo();
        let scenario_dir = self.scenario_dir(id);
        self.export_patch(
            "app/greeting.txt",
            "broken greeting\n",
            "break the greeting",
            &scenario_dir.join("patches/broken"),
        );
        self.export_patch(
            "app/greeting.txt",
            "solved greeting\n",
            "restore the greeting",
            &scenario_dir.join("patches/solved"),
        );
        self.write_manifest(id, &patch_scenario_manifest(&base_ref));
        base_ref
    }
}

pub fn patch_scenario_manifest(base_ref: &str) -> String {
    format!(
        r#"{{
          "checks": {{
            "version": 1,
            "stages": {{"broken": {{}}, "solved": {{}}}}
          }},
          "git": {{
            "base_ref": "{base_ref}",
            "work_branch": "workshop",
            "broken_patches_dir": "patches/broken",
            "solved_patches_dir": "patches/solved"
          }}
        }}"#
    )
}

/// A syntactically valid mailbox patch whose blob ids are unknown to the
/// repository, so `git am --3way` cannot reconstruct ancestors and fails.
pub fn conflicting_patch(rel_path: &str) -> String {
    format!(
        "From 1111111111111111111111111111111111111111 Mon Sep 17 00:00:00 2001\n\
         From: Workshop Fixture <fixture@example.com>\n\
         Date: Mon, 1 Jan 2024 00:00:00 +0000\n\
         Subject: [PATCH] conflicting change\n\
         \n\
         ---\n\
         \x20{rel_path} | 2 +-\n\
         \x201 file changed, 1 insertion(+), 1 deletion(-)\n\
         \n\
         diff --git a/{rel_path} b/{rel_path}\n\
         index 1111111..2222222 100644\n\
         --- a/{rel_path}\n\
         +++ b/{rel_path}\n\
         @@ -1 +1 @@\n\
         -content that was never there\n\
         +conflicting content\n\
         --\x20\n\
         2.43.0\n"
    )
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_str(&stdout_str(output)).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}
