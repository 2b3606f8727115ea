//! Network probe: poll an HTTP endpoint until its status satisfies the
//! allow/deny sets or the timeout elapses.

use serde::Deserialize;
use std::time::{Duration, Instant};

use super::types::Outcome;

fn default_timeout_seconds() -> u64 {
    30
}

fn default_interval_seconds() -> u64 {
    2
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpParams {
    pub url: String,
    /// Allow-set: when non-empty, the observed status must be a member.
    #[serde(default)]
    pub expect_status: Vec<u16>,
    /// Deny-set: the observed status must not be a member.
    #[serde(default)]
    pub exclude_status: Vec<u16>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

pub fn run(params: &HttpParams) -> Outcome {
    let interval = Duration::from_secs(params.interval_seconds.max(1));
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(interval))
        .build();
    let agent = ureq::Agent::new_with_config(config);
    poll(
        params,
        || fetch_status(&agent, &params.url),
        std::thread::sleep,
    )
}

/// A transport failure (refused connection, timeout, no response) is status
/// 0: a retryable observation, not a hard error.
fn fetch_status(agent: &ureq::Agent, url: &str) -> u16 {
    match agent.get(url).call() {
        Ok(response) => response.status().as_u16(),
        Err(_) => 0,
    }
}

/// Sleep-then-retry loop, bounded by the check's own timeout. This is the
/// only busy-wait in the engine and it blocks the calling thread.
fn poll(
    params: &HttpParams,
    mut attempt: impl FnMut() -> u16,
    mut sleep: impl FnMut(Duration),
) -> Outcome {
    let deadline = Instant::now() + Duration::from_secs(params.timeout_seconds);
    let interval = Duration::from_secs(params.interval_seconds.max(1));
    loop {
        let observed = attempt();
        if satisfies(observed, params) {
            return Outcome::pass();
        }
        if Instant::now() >= deadline {
            return Outcome::fail(describe_failure(observed, params));
        }
        sleep(interval);
    }
}

fn satisfies(observed: u16, params: &HttpParams) -> bool {
    if params.exclude_status.contains(&observed) {
        return false;
    }
    params.expect_status.is_empty() || params.expect_status.contains(&observed)
}

fn describe_failure(observed: u16, params: &HttpParams) -> String {
    if params.exclude_status.contains(&observed) {
        return format!(
            "GET {}: observed disallowed status {observed} (excluded: {:?}) after {}s",
            params.url, params.exclude_status, params.timeout_seconds
        );
    }
    format!(
        "GET {}: observed status {observed}, expected one of {:?} after {}s",
        params.url, params.expect_status, params.timeout_seconds
    )
}
