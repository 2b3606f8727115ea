//! Run-report rendering: human-readable lines on stdout, or the JSON report
//! schema with `--json`.

use anyhow::Result;

use crate::checks::{CheckStatus, RunResult};
use crate::manifest::ScenarioEntry;

pub fn print_run_result(result: &RunResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!(
        "{} [{}] {} checks:",
        result.scenario_id, result.stage, result.check_type
    );
    for check in &result.results {
        let marker = match check.status {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skip => "SKIP",
        };
        println!("  {marker}  {}  {}", check.check_type, check.description);
        if let Some(message) = &check.message {
            println!("        {message}");
        }
    }
    println!(
        "passed {}  failed {}  skipped {}",
        result.passed, result.failed, result.skipped
    );
    Ok(())
}

pub fn print_scenario_list(entries: &[ScenarioEntry], json: bool) -> Result<()> {
    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "scenario_id": entry.id.to_string(),
                    "stages": entry.stages,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("no scenarios found");
        return Ok(());
    }
    for entry in entries {
        println!("{}  stages: {}", entry.id, entry.stages.join(", "));
    }
    Ok(())
}
