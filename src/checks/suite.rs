//! External test-suite executor: runs the browser-automation suite as a
//! subprocess and maps its exit code to pass/fail.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use super::types::Outcome;
use super::CheckContext;
use crate::exec::{CommandRequest, CommandRunner};
use crate::manifest::Track;
use crate::util::truncate_string;

const AUTH_BYPASS_KEY: &str = "AUTH_BYPASS_KEY";
const SECRETS_CONFIG_MAP: &str = "demo-secrets";
const MAX_STDERR_BYTES: usize = 2048;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteParams {
    /// Filter expression selecting the named suite.
    pub suite: String,
    #[serde(default)]
    pub headed: bool,
}

pub fn run(
    runner: &dyn CommandRunner,
    ctx: &CheckContext,
    params: &SuiteParams,
    stage: &str,
) -> Outcome {
    if !ctx.suite_dir.is_dir() {
        return Outcome::skip(format!(
            "suite directory {} is absent",
            ctx.suite_dir.display()
        ));
    }

    let bypass_key = match auth_bypass_key(runner, ctx) {
        Ok(key) => key,
        Err(err) => return Outcome::fail(format!("resolve auth bypass key: {err:#}")),
    };

    let argv = match shell_words::split(&ctx.suite_command) {
        Ok(argv) if !argv.is_empty() => argv,
        Ok(_) => return Outcome::fail("suite command is empty".to_string()),
        Err(err) => return Outcome::fail(format!("parse suite command: {err}")),
    };

    let mut args: Vec<String> = argv[1..].to_vec();
    args.push("--grep".to_string());
    args.push(params.suite.clone());
    if params.headed {
        args.push("--headed".to_string());
    }

    let request = CommandRequest::new(argv[0].clone(), args)
        .cwd(&ctx.suite_dir)
        .env("BASE_URL", &ctx.base_url)
        .env("SCENARIO_ID", &ctx.scenario_id)
        .env("SCENARIO_STAGE", stage)
        .env(AUTH_BYPASS_KEY, bypass_key);

    match runner.run(&request) {
        Ok(output) if output.success() => Outcome::pass(),
        Ok(output) => Outcome::fail(format!(
            "suite {:?} failed with status {}: {}",
            params.suite,
            output
                .status
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            truncate_string(output.stderr.trim(), MAX_STDERR_BYTES)
        )),
        Err(err) => Outcome::fail(format!("suite runner invocation failed: {err:#}")),
    }
}

/// The key that lets the suite log in without real credentials. Sourced from
/// the cluster's config map on the k8s track, from the local secrets env
/// file on the compose track.
fn auth_bypass_key(runner: &dyn CommandRunner, ctx: &CheckContext) -> Result<String> {
    match ctx.track {
        Track::K8s => {
            let args = vec![
                "get".to_string(),
                "configmap".to_string(),
                SECRETS_CONFIG_MAP.to_string(),
                "-o".to_string(),
                format!("jsonpath={{.data.{AUTH_BYPASS_KEY}}}"),
            ];
            let output = super::kube::kubectl(runner, ctx, &args)?;
            if !output.success() {
                bail!(
                    "read configmap {SECRETS_CONFIG_MAP}: {}",
                    output.stderr.trim()
                );
            }
            let key = output.stdout.trim();
            if key.is_empty() {
                bail!("configmap {SECRETS_CONFIG_MAP} has no {AUTH_BYPASS_KEY} entry");
            }
            Ok(key.to_string())
        }
        Track::Compose => {
            let content = std::fs::read_to_string(&ctx.secrets_file).with_context(|| {
                format!("read secrets file {}", ctx.secrets_file.display())
            })?;
            env_file_value(&content, AUTH_BYPASS_KEY).ok_or_else(|| {
                anyhow!(
                    "secrets file {} has no {AUTH_BYPASS_KEY} entry",
                    ctx.secrets_file.display()
                )
            })
        }
    }
}

fn env_file_value(content: &str, wanted: &str) -> Option<String> {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == wanted {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}
