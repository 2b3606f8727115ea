//! Resource assertions against the cluster orchestrator, scoped to the
//! scenario's namespace.
//!
//! Every variant shells out to `kubectl` through the command runner. A CLI
//! failure (spawn error or non-zero exit) is a check failure with the tool's
//! stderr in the message, never a crash of the runner.

use anyhow::Result;
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::types::Outcome;
use super::CheckContext;
use crate::exec::{CommandOutput, CommandRequest, CommandRunner};
use crate::util::truncate_string;

const MAX_STDERR_BYTES: usize = 1024;

fn default_since_seconds() -> u64 {
    300
}

fn default_available_kind() -> String {
    "deployment".to_string()
}

fn default_available_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    2
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonpathParams {
    pub kind: String,
    pub name: String,
    pub jsonpath: String,
    pub expect: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsParams {
    pub selector: String,
    pub contains: String,
    #[serde(default = "default_since_seconds")]
    pub since_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestartsParams {
    pub selector: String,
    pub min_restarts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerminationParams {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvailableParams {
    #[serde(default = "default_available_kind")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub pre_wait_seconds: u64,
    #[serde(default = "default_available_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExistsParams {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoPortParams {
    pub service: String,
    pub port: String,
}

/// Run `kubectl` in the scenario namespace; `Err` only on spawn failure.
pub fn kubectl(
    runner: &dyn CommandRunner,
    ctx: &CheckContext,
    args: &[String],
) -> Result<CommandOutput> {
    let mut full = vec!["-n".to_string(), ctx.namespace.clone()];
    if let Some(context) = &ctx.kube_context {
        full.push("--context".to_string());
        full.push(context.clone());
    }
    full.extend(args.iter().cloned());
    runner.run(&CommandRequest::new("kubectl", full))
}

/// `Ok(stdout)` for a zero exit, `Err(message)` folding in stderr otherwise.
/// The error side is data for a `fail` outcome, not an `anyhow` error.
fn kubectl_capture(
    runner: &dyn CommandRunner,
    ctx: &CheckContext,
    args: &[String],
) -> std::result::Result<String, String> {
    match kubectl(runner, ctx, args) {
        Ok(output) if output.success() => Ok(output.stdout),
        Ok(output) => Err(format!(
            "kubectl exited with status {}: {}",
            output.status.map_or_else(|| "signal".to_string(), |c| c.to_string()),
            truncate_string(output.stderr.trim(), MAX_STDERR_BYTES)
        )),
        Err(err) => Err(format!("kubectl invocation failed: {err:#}")),
    }
}

fn get_jsonpath(
    runner: &dyn CommandRunner,
    ctx: &CheckContext,
    kind: &str,
    name: &str,
    expression: &str,
) -> std::result::Result<String, String> {
    let args = vec![
        "get".to_string(),
        kind.to_string(),
        name.to_string(),
        "-o".to_string(),
        format!("jsonpath={{{expression}}}"),
    ];
    kubectl_capture(runner, ctx, &args)
}

/// Exact-value assertion via a jsonpath extraction expression.
pub fn jsonpath(runner: &dyn CommandRunner, ctx: &CheckContext, params: &JsonpathParams) -> Outcome {
    match get_jsonpath(runner, ctx, &params.kind, &params.name, &params.jsonpath) {
        Ok(stdout) => {
            let actual = stdout.trim();
            if actual == params.expect {
                Outcome::pass()
            } else {
                Outcome::fail(format!(
                    "{}/{} {}: expected {:?}, got {:?}",
                    params.kind, params.name, params.jsonpath, params.expect, actual
                ))
            }
        }
        Err(message) => Outcome::fail(message),
    }
}

/// Log-substring presence within a bounded recent window.
pub fn logs(runner: &dyn CommandRunner, ctx: &CheckContext, params: &LogsParams) -> Outcome {
    let args = vec![
        "logs".to_string(),
        "-l".to_string(),
        params.selector.clone(),
        format!("--since={}s", params.since_seconds),
    ];
    match kubectl_capture(runner, ctx, &args) {
        Ok(stdout) => {
            if stdout.contains(&params.contains) {
                Outcome::pass()
            } else {
                Outcome::fail(format!(
                    "logs for {} within {}s: expected substring {:?}, not found",
                    params.selector, params.since_seconds, params.contains
                ))
            }
        }
        Err(message) => Outcome::fail(message),
    }
}

fn container_statuses_jsonpath(field: &str) -> String {
    format!(".items[*].status.containerStatuses[*].{field}")
}

/// Maximum restart count across matched pods' containers must reach the
/// threshold.
pub fn restarts(runner: &dyn CommandRunner, ctx: &CheckContext, params: &RestartsParams) -> Outcome {
    let args = vec![
        "get".to_string(),
        "pods".to_string(),
        "-l".to_string(),
        params.selector.clone(),
        "-o".to_string(),
        format!("jsonpath={{{}}}", container_statuses_jsonpath("restartCount")),
    ];
    let stdout = match kubectl_capture(runner, ctx, &args) {
        Ok(stdout) => stdout,
        Err(message) => return Outcome::fail(message),
    };
    let mut max_restarts = 0u32;
    for token in stdout.split_whitespace() {
        match token.parse::<u32>() {
            Ok(count) => max_restarts = max_restarts.max(count),
            Err(_) => {
                return Outcome::fail(format!(
                    "unexpected restart count {token:?} for selector {}",
                    params.selector
                ))
            }
        }
    }
    if max_restarts >= params.min_restarts {
        Outcome::pass()
    } else {
        Outcome::fail(format!(
            "pods matching {}: expected at least {} restarts, observed {}",
            params.selector, params.min_restarts, max_restarts
        ))
    }
}

/// First non-empty last-termination reason across matched pods' containers,
/// "none" when absent, must equal the expected reason.
pub fn termination(
    runner: &dyn CommandRunner,
    ctx: &CheckContext,
    params: &TerminationParams,
) -> Outcome {
    let args = vec![
        "get".to_string(),
        "pods".to_string(),
        "-l".to_string(),
        params.selector.clone(),
        "-o".to_string(),
        format!(
            "jsonpath={{{}}}",
            container_statuses_jsonpath("lastState.terminated.reason")
        ),
    ];
    let stdout = match kubectl_capture(runner, ctx, &args) {
        Ok(stdout) => stdout,
        Err(message) => return Outcome::fail(message),
    };
    let observed = stdout
        .split_whitespace()
        .find(|token| !token.is_empty())
        .unwrap_or("none");
    if observed == params.reason {
        Outcome::pass()
    } else {
        Outcome::fail(format!(
            "pods matching {}: expected termination reason {:?}, observed {:?}",
            params.selector, params.reason, observed
        ))
    }
}

/// Wait a configurable pre-delay, then poll availability until the deadline.
pub fn available(
    runner: &dyn CommandRunner,
    ctx: &CheckContext,
    params: &AvailableParams,
) -> Outcome {
    if params.pre_wait_seconds > 0 {
        std::thread::sleep(Duration::from_secs(params.pre_wait_seconds));
    }
    let deadline = Instant::now() + Duration::from_secs(params.timeout_seconds);
    let interval = Duration::from_secs(params.interval_seconds.max(1));
    let mut last_observed = String::new();
    loop {
        match get_jsonpath(
            runner,
            ctx,
            &params.kind,
            &params.name,
            ".status.availableReplicas",
        ) {
            Ok(stdout) => {
                let trimmed = stdout.trim().to_string();
                if trimmed.parse::<u32>().map(|n| n >= 1).unwrap_or(false) {
                    return Outcome::pass();
                }
                last_observed = trimmed;
            }
            Err(message) => last_observed = message,
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(interval);
    }
    Outcome::fail(format!(
        "{}/{}: expected at least 1 available replica within {}s, last observed {:?}",
        params.kind, params.name, params.timeout_seconds, last_observed
    ))
}

/// Existence check: the namespaced get must succeed.
pub fn exists(runner: &dyn CommandRunner, ctx: &CheckContext, params: &ExistsParams) -> Outcome {
    let args = vec![
        "get".to_string(),
        params.kind.clone(),
        params.name.clone(),
        "-o".to_string(),
        "name".to_string(),
    ];
    match kubectl_capture(runner, ctx, &args) {
        Ok(_) => Outcome::pass(),
        Err(message) => Outcome::fail(format!(
            "expected {}/{} to exist in namespace {}: {message}",
            params.kind, params.name, ctx.namespace
        )),
    }
}

/// Negative existence: a named port must be absent from the service, for
/// verifying intentionally-broken configurations.
pub fn no_port(runner: &dyn CommandRunner, ctx: &CheckContext, params: &NoPortParams) -> Outcome {
    match get_jsonpath(
        runner,
        ctx,
        "service",
        &params.service,
        ".spec.ports[*].name",
    ) {
        Ok(stdout) => {
            let present = stdout.split_whitespace().any(|name| name == params.port);
            if present {
                Outcome::fail(format!(
                    "service {}: expected port {:?} to be absent, but it is defined",
                    params.service, params.port
                ))
            } else {
                Outcome::pass()
            }
        }
        Err(message) => Outcome::fail(message),
    }
}
