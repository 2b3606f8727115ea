//! Patch series collection, scope validation, and transactional application.
//!
//! Patches are read-only inputs produced by `git format-patch`; lexical file
//! name order is the application order, so producers zero-pad sequence
//! prefixes. A series applies all-or-nothing: the first conflict aborts the
//! in-progress import session and surfaces an error naming the patch.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::git::Git;

/// Enumerate the `*.patch` files of a series directory in application order.
/// A missing directory is a configuration error; an empty series is valid.
pub fn collect_series(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read patch directory {}", dir.display()))?;
    let mut patches = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "patch") {
            patches.push(path);
        }
    }
    patches.sort();
    Ok(patches)
}

/// Reject a patch that touches any path outside `allowed_prefix`. Both sides
/// of a rename are checked; the `/dev/null` sentinel is ignored.
pub fn validate_scope(git: &Git<'_>, patch: &Path, allowed_prefix: &str) -> Result<()> {
    let numstat = git
        .apply_numstat(patch)
        .with_context(|| format!("summarize patch {}", patch.display()))?;
    for path in touched_paths(&numstat)? {
        if !path.starts_with(allowed_prefix) {
            bail!(
                "patch {} touches {path} outside the allowed prefix {allowed_prefix}",
                patch.display()
            );
        }
    }
    Ok(())
}

/// Apply a series in order. On the first failure the import session is
/// aborted (best effort) and the returned error names the failing patch;
/// the workspace must then be treated as indeterminate until reset.
pub fn apply_series(git: &Git<'_>, patches: &[PathBuf]) -> Result<()> {
    for patch in patches {
        if let Err(err) = git.am(patch) {
            if let Err(abort_err) = git.am_abort() {
                tracing::warn!(error = %format!("{abort_err:#}"), "abort of patch import session failed");
            }
            return Err(err).with_context(|| {
                format!(
                    "apply patch {}; the workspace is in an indeterminate state and requires a reset",
                    patch.display()
                )
            });
        }
        tracing::debug!(patch = %patch.display(), "applied patch");
    }
    Ok(())
}

/// Paths touched per `git apply --numstat` output: one
/// `added<TAB>deleted<TAB>name` line per file, `-` counts for binary diffs,
/// renames written as `old => new` or `prefix{old => new}suffix`.
fn touched_paths(numstat: &str) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for line in numstat.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, '\t');
        let (Some(_added), Some(_deleted), Some(name)) =
            (fields.next(), fields.next(), fields.next())
        else {
            bail!("malformed numstat line: {line:?}");
        };
        for path in expand_rename(name) {
            if path != "/dev/null" {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

fn expand_rename(name: &str) -> Vec<String> {
    // Brace form: common{old => new}suffix, where either side may be empty.
    if let (Some(open), Some(close)) = (name.find('{'), name.rfind('}')) {
        if open < close {
            let inner = &name[open + 1..close];
            if let Some((old, new)) = inner.split_once(" => ") {
                let prefix = &name[..open];
                let suffix = &name[close + 1..];
                return vec![
                    collapse_slashes(&format!("{prefix}{old}{suffix}")),
                    collapse_slashes(&format!("{prefix}{new}{suffix}")),
                ];
            }
        }
    }
    if let Some((old, new)) = name.split_once(" => ") {
        return vec![old.to_string(), new.to_string()];
    }
    vec![name.to_string()]
}

// An empty rename side leaves a double slash behind (dir/{ => sub}/a.txt).
fn collapse_slashes(path: &str) -> String {
    let mut collapsed = path.to_string();
    while collapsed.contains("//") {
        collapsed = collapsed.replace("//", "/");
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::FakeRunner;

    #[test]
    fn touched_paths_reads_plain_lines() {
        let paths = touched_paths("3\t1\tapp/views/home.html\n-\t-\tapp/logo.png\n").expect("parse");
        assert_eq!(paths, vec!["app/views/home.html", "app/logo.png"]);
    }

    #[test]
    fn touched_paths_expands_renames() {
        let paths = touched_paths("0\t0\tapp/a.go => other/b.go\n").expect("parse");
        assert_eq!(paths, vec!["app/a.go", "other/b.go"]);

        let paths = touched_paths("1\t1\tapp/{handlers => routes}/post.go\n").expect("parse");
        assert_eq!(paths, vec!["app/handlers/post.go", "app/routes/post.go"]);

        let paths = touched_paths("1\t1\tapp/{ => pkg}/util.go\n").expect("parse");
        assert_eq!(paths, vec!["app/util.go", "app/pkg/util.go"]);
    }

    #[test]
    fn touched_paths_rejects_garbage() {
        assert!(touched_paths("not a numstat line\n").is_err());
    }

    #[test]
    fn scope_validation_names_the_offending_path() {
        let runner = FakeRunner::new();
        runner.push_ok("1\t0\tother/file.txt\n");
        let git = Git::new(&runner, "/ws");
        let err = validate_scope(&git, Path::new("0001-change.patch"), "fider/").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("other/file.txt"), "{message}");
        assert!(message.contains("fider/"), "{message}");
    }

    #[test]
    fn scope_validation_checks_the_new_side_of_renames() {
        let runner = FakeRunner::new();
        runner.push_ok("0\t0\tfider/a.go => other/b.go\n");
        let git = Git::new(&runner, "/ws");
        let err = validate_scope(&git, Path::new("0001-move.patch"), "fider/").unwrap_err();
        assert!(format!("{err:#}").contains("other/b.go"));
    }

    #[test]
    fn scope_validation_accepts_in_prefix_changes() {
        let runner = FakeRunner::new();
        runner.push_ok("2\t2\tfider/app/models/post.go\n0\t0\tfider/{a => b}.go\n");
        let git = Git::new(&runner, "/ws");
        validate_scope(&git, Path::new("0001-ok.patch"), "fider/").expect("in scope");
    }

    #[test]
    fn series_failure_aborts_session_and_names_the_patch() {
        let runner = FakeRunner::new();
        runner.push_ok(""); // am 0001
        runner.push_fail(128, "error: patch failed"); // am 0002
        runner.push_ok(""); // am --abort
        let git = Git::new(&runner, "/ws");
        let patches = vec![
            PathBuf::from("0001-first.patch"),
            PathBuf::from("0002-second.patch"),
        ];
        let err = apply_series(&git, &patches).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("0002-second.patch"), "{message}");
        assert!(message.contains("requires a reset"), "{message}");
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("am --abort"), "{lines:?}");
    }

    #[test]
    fn abort_failure_does_not_mask_the_patch_error() {
        let runner = FakeRunner::new();
        runner.push_fail(128, "error: patch failed"); // am 0001
        runner.push_fail(128, "fatal: no session"); // am --abort
        let git = Git::new(&runner, "/ws");
        let err = apply_series(&git, &[PathBuf::from("0001-only.patch")]).unwrap_err();
        assert!(format!("{err:#}").contains("0001-only.patch"));
    }

    #[test]
    fn collect_series_sorts_and_filters() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["0002-b.patch", "0001-a.patch", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").expect("write");
        }
        let series = collect_series(dir.path()).expect("collect");
        let names: Vec<_> = series
            .iter()
            .map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                Some("0001-a.patch".to_string()),
                Some("0002-b.patch".to_string())
            ]
        );
    }

    #[test]
    fn collect_series_errors_on_missing_directory() {
        assert!(collect_series(Path::new("/no/such/dir")).is_err());
    }
}
