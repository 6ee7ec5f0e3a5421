//! Recorded navigation scenarios.
//!
//! A scenario is a host table plus an ordered list of navigation events, each
//! with an expected decision. [`run`] replays one through a fresh chain and
//! reports per-step outcomes.

use serde::{Deserialize, Serialize};

use crate::chain::Observation;
use crate::codec;
use crate::composer::{Composer, Dispatch};
use crate::config::DispatchConfig;
use crate::table::TableHost;
use crate::types::{Decision, DecisionKind, NavigationRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub host: TableHost,
    #[serde(default)]
    pub config: DispatchConfig,
    /// Descriptor URL that opened the tab from another application.
    #[serde(default)]
    pub origin: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub request: NavigationRequest,
    /// Gesture timestamp fed to the chain tracker.
    #[serde(default)]
    pub at_ms: i64,
    /// Feed the event to the chain tracker before deciding.
    #[serde(default = "default_observe")]
    pub observe: bool,
    pub expected: DecisionKind,
    /// Launched target URI or clobber URL, when checked.
    #[serde(default)]
    pub expected_target: Option<String>,
}

fn default_observe() -> bool {
    true
}

/// Result of replaying one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub url: String,
    pub expected: DecisionKind,
    pub dispatch: Dispatch,
    pub decision: Decision,
    pub target: Option<String>,
    pub passed: bool,
}

/// Target a decision points at: the launched URI or the clobber URL.
pub fn decision_target(decision: &Decision) -> Option<&str> {
    match decision {
        Decision::OverrideExternal { descriptor } => Some(descriptor.target_uri.as_str()),
        Decision::OverrideClobberTab { new_url, .. } => Some(new_url.as_str()),
        _ => None,
    }
}

/// Replay `scenario` against its own host table. The host's side-effect log
/// is returned alongside the outcomes.
pub fn run(scenario: &Scenario) -> (Vec<StepOutcome>, TableHost) {
    let composer = Composer::new(scenario.config.clone());
    let mut host = scenario.host.clone();
    let mut chain = composer.new_chain();
    if let Some(origin) = &scenario.origin {
        chain.begin_external_launch(codec::descriptor_for(origin));
    }

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        if step.observe {
            chain.observe(&Observation::from_request(&step.request, step.at_ms));
        }
        let dispatch = composer.decide(&host, &step.request, &mut chain);
        let decision = dispatch.clone().apply(&mut host);
        let target = decision_target(&decision).map(str::to_owned);
        let target_ok = step
            .expected_target
            .as_ref()
            .is_none_or(|want| target.as_ref() == Some(want));
        let passed = decision.kind() == step.expected && target_ok;
        if !passed {
            tracing::debug!(scenario = %scenario.name, index, "step did not match expectation");
        }
        outcomes.push(StepOutcome {
            index,
            url: step.request.url.clone(),
            expected: step.expected,
            dispatch,
            decision,
            target,
            passed,
        });
    }
    (outcomes, host)
}
