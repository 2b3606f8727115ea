//! Check runner: stage selection, typed dispatch, and fail-fast vs.
//! observational execution semantics.

pub mod http;
pub mod kube;
pub mod suite;
mod types;

pub use types::{CheckKind, CheckResult, CheckStatus, Outcome, RunResult};

use anyhow::{bail, Result};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::HarnessConfig;
use crate::exec::CommandRunner;
use crate::manifest::{Check, Checks, Manifest, ScenarioId, Track};

/// Explicit configuration threaded into every executor, instead of ambient
/// environment lookups scattered through call sites.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub scenario_id: String,
    pub track: Track,
    /// Orchestrator namespace, derived deterministically from the slug.
    pub namespace: String,
    pub base_url: String,
    pub kube_context: Option<String>,
    pub secrets_file: PathBuf,
    pub suite_dir: PathBuf,
    pub suite_command: String,
}

impl CheckContext {
    pub fn new(config: &HarnessConfig, id: &ScenarioId) -> Self {
        Self {
            scenario_id: id.to_string(),
            track: id.track,
            namespace: id.namespace(),
            base_url: config.base_url(id.track),
            kube_context: config.kube_context.clone(),
            secrets_file: config.secrets_file.clone(),
            suite_dir: config.suite_dir.clone(),
            suite_command: config.suite_command.clone(),
        }
    }
}

/// Closed set of check variants, resolved from the manifest's string
/// discriminator before execution. Unknown discriminators are the single
/// explicit default arm and always skip.
enum CheckSpec {
    Http(http::HttpParams),
    KubeJsonpath(kube::JsonpathParams),
    KubeLogs(kube::LogsParams),
    KubeRestarts(kube::RestartsParams),
    KubeTermination(kube::TerminationParams),
    KubeAvailable(kube::AvailableParams),
    KubeExists(kube::ExistsParams),
    KubeNoPort(kube::NoPortParams),
    Playwright(suite::SuiteParams),
    Unknown(String),
}

impl CheckSpec {
    /// Lazy parameter validation: the discriminator alone picks the variant,
    /// and a parameter error surfaces as a serde error for the runner to
    /// turn into a `fail` result.
    fn resolve(check: &Check) -> std::result::Result<Self, serde_json::Error> {
        let params = Value::Object(check.params.clone());
        let spec = match check.check_type.as_str() {
            "http" => CheckSpec::Http(serde_json::from_value(params)?),
            "k8s.jsonpath" => CheckSpec::KubeJsonpath(serde_json::from_value(params)?),
            "k8s.logs" => CheckSpec::KubeLogs(serde_json::from_value(params)?),
            "k8s.restarts" => CheckSpec::KubeRestarts(serde_json::from_value(params)?),
            "k8s.termination" => CheckSpec::KubeTermination(serde_json::from_value(params)?),
            "k8s.available" => CheckSpec::KubeAvailable(serde_json::from_value(params)?),
            "k8s.exists" => CheckSpec::KubeExists(serde_json::from_value(params)?),
            "k8s.no_port" => CheckSpec::KubeNoPort(serde_json::from_value(params)?),
            "playwright" => CheckSpec::Playwright(serde_json::from_value(params)?),
            other => CheckSpec::Unknown(other.to_string()),
        };
        Ok(spec)
    }
}

pub struct CheckRunner<'a> {
    context: CheckContext,
    runner: &'a dyn CommandRunner,
}

impl<'a> CheckRunner<'a> {
    pub fn new(config: &HarnessConfig, id: &ScenarioId, runner: &'a dyn CommandRunner) -> Self {
        Self {
            context: CheckContext::new(config, id),
            runner,
        }
    }

    /// Execute the `(stage, kind)` check list in declared order. Under
    /// verification semantics the first failure halts the run; under health
    /// semantics all checks run and failures are purely observational.
    pub fn run(
        &self,
        manifest: &Manifest,
        kind: CheckKind,
        stage: Option<&str>,
        type_filter: Option<&str>,
    ) -> Result<RunResult> {
        let stage = resolve_stage(&manifest.checks, stage)?;
        let mut result = RunResult::empty(&self.context.scenario_id, &stage, kind);
        let Some(stage_checks) = manifest.checks.stages.get(&stage) else {
            return Ok(result);
        };
        let list = match kind {
            CheckKind::Verify => &stage_checks.verify,
            CheckKind::Health => &stage_checks.health,
        };

        for check in list {
            if !filter_matches(type_filter, &check.check_type) {
                continue;
            }
            let outcome = self.execute(check, &stage);
            tracing::debug!(
                check = %check.check_type,
                status = %outcome.status,
                "check executed"
            );
            let failed = outcome.status == CheckStatus::Fail;
            result.record(CheckResult {
                check_type: check.check_type.clone(),
                description: check.label().to_string(),
                status: outcome.status,
                message: outcome.message,
            });
            if failed && kind == CheckKind::Verify {
                break;
            }
        }
        Ok(result)
    }

    fn execute(&self, check: &Check, stage: &str) -> Outcome {
        let spec = match CheckSpec::resolve(check) {
            Ok(spec) => spec,
            Err(err) => {
                return Outcome::fail(format!(
                    "invalid parameters for {} check: {err}",
                    check.check_type
                ))
            }
        };
        match spec {
            CheckSpec::Http(params) => http::run(&params),
            CheckSpec::KubeJsonpath(params) => kube::jsonpath(self.runner, &self.context, &params),
            CheckSpec::KubeLogs(params) => kube::logs(self.runner, &self.context, &params),
            CheckSpec::KubeRestarts(params) => kube::restarts(self.runner, &self.context, &params),
            CheckSpec::KubeTermination(params) => {
                kube::termination(self.runner, &self.context, &params)
            }
            CheckSpec::KubeAvailable(params) => {
                kube::available(self.runner, &self.context, &params)
            }
            CheckSpec::KubeExists(params) => kube::exists(self.runner, &self.context, &params),
            CheckSpec::KubeNoPort(params) => kube::no_port(self.runner, &self.context, &params),
            CheckSpec::Playwright(params) => suite::run(self.runner, &self.context, &params, stage),
            CheckSpec::Unknown(check_type) => {
                Outcome::skip(format!("unknown check type {check_type:?}"))
            }
        }
    }
}

/// Stage resolution priority when none is supplied explicitly: declared
/// default, then `"broken"`, then `"healthy"`, then the lexicographically
/// smallest name.
pub fn resolve_stage(checks: &Checks, requested: Option<&str>) -> Result<String> {
    if let Some(name) = requested {
        if !checks.stages.contains_key(name) {
            bail!("stage {name:?} is not defined in the scenario manifest");
        }
        return Ok(name.to_string());
    }
    if let Some(default_stage) = &checks.default_stage {
        return Ok(default_stage.clone());
    }
    for candidate in ["broken", "healthy"] {
        if checks.stages.contains_key(candidate) {
            return Ok(candidate.to_string());
        }
    }
    // BTreeMap iteration order makes this the lexicographically smallest.
    checks
        .stages
        .keys()
        .next()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no stages defined in the scenario manifest"))
}

/// A filter matches on the full discriminator or its leading dot-separated
/// segment, so `k8s` selects the whole orchestrator family.
fn filter_matches(filter: Option<&str>, check_type: &str) -> bool {
    match filter {
        None => true,
        Some(filter) => {
            check_type == filter || check_type.split('.').next() == Some(filter)
        }
    }
}
