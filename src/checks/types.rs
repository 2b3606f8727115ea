use serde::Serialize;
use std::fmt;

/// Which check list of a stage runs, and with which failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Fail-fast: the first failing check halts the run.
    Verify,
    /// Observational: failures are recorded, the run always completes.
    Health,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Verify => "verify",
            CheckKind::Health => "health",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Skip => "skip",
        };
        f.write_str(label)
    }
}

/// What one executor reports back, before the runner attaches the check's
/// type and description.
#[derive(Debug)]
pub struct Outcome {
    pub status: CheckStatus,
    pub message: Option<String>,
}

impl Outcome {
    pub fn pass() -> Self {
        Self {
            status: CheckStatus::Pass,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            message: Some(message.into()),
        }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Skip,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    #[serde(rename = "type")]
    pub check_type: String,
    pub description: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-invocation run report. Ephemeral, never persisted.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub scenario_id: String,
    pub stage: String,
    pub check_type: String,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub results: Vec<CheckResult>,
}

impl RunResult {
    pub fn empty(scenario_id: &str, stage: &str, kind: CheckKind) -> Self {
        Self {
            scenario_id: scenario_id.to_string(),
            stage: stage.to_string(),
            check_type: kind.as_str().to_string(),
            passed: 0,
            failed: 0,
            skipped: 0,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, result: CheckResult) {
        match result.status {
            CheckStatus::Pass => self.passed += 1,
            CheckStatus::Fail => self.failed += 1,
            CheckStatus::Skip => self.skipped += 1,
        }
        self.results.push(result);
    }
}
