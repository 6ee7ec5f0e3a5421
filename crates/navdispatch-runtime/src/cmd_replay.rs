//! `navdispatch replay`: run scenario files and report mismatches.

use anyhow::Context;
use navdispatch_core::scenario::{self, Scenario, StepOutcome};
use std::path::Path;

pub fn load(path: &Path) -> anyhow::Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
}

fn describe(outcome: &StepOutcome) -> String {
    let mark = if outcome.passed { "ok  " } else { "FAIL" };
    let mut line = format!(
        "  {mark} #{} {} expected={} got={}",
        outcome.index,
        outcome.url,
        outcome.expected,
        outcome.decision.kind()
    );
    if let Some(target) = &outcome.target {
        line.push_str(&format!(" target={target}"));
    }
    if let Some(stay) = outcome.dispatch.stay {
        line.push_str(&format!(" rule={}", stay.as_str()));
    }
    line
}

/// Replay every file; returns the number of failed steps.
pub fn run(files: &[impl AsRef<Path>], all: bool) -> anyhow::Result<usize> {
    let mut failed = 0;
    let mut total = 0;
    for path in files {
        let path = path.as_ref();
        let scenario = load(path)?;
        let (outcomes, _host) = scenario::run(&scenario);
        let failures = outcomes.iter().filter(|o| !o.passed).count();
        println!(
            "{} ({}): {}/{} passed",
            scenario.name,
            path.display(),
            outcomes.len() - failures,
            outcomes.len()
        );
        for outcome in outcomes.iter().filter(|o| all || !o.passed) {
            println!("{}", describe(outcome));
        }
        failed += failures;
        total += outcomes.len();
    }
    if failed > 0 {
        tracing::warn!(failed, total, "scenario replay has mismatches");
    }
    Ok(failed)
}
