//! `navdispatch decide`: one navigation through a fresh chain.

use navdispatch_core::chain::Observation;
use navdispatch_core::codec;
use navdispatch_core::table::{SideEffectLog, TableHost};
use navdispatch_core::{
    Composer, Decision, Dispatch, DispatchConfig, NavigationRequest, TransitionFlags,
};
use serde::Serialize;

use crate::cli::DecideOpts;

#[derive(Debug, Serialize)]
pub struct DecideReport {
    pub dispatch: Dispatch,
    /// What the host ended up doing after the instruction was applied.
    pub decision: Decision,
    pub side_effects: SideEffectLog,
}

pub fn build_request(opts: &DecideOpts) -> anyhow::Result<NavigationRequest> {
    let transitions: TransitionFlags = opts.transition.parse()?;
    let mut request = NavigationRequest::new(&opts.url)
        .with_transitions(transitions)
        .with_redirect(opts.redirect)
        .with_user_gesture(opts.gesture)
        .with_incognito(opts.incognito)
        .with_background_tab(opts.background)
        .with_main_frame(!opts.subframe)
        .with_new_tab(opts.new_tab)
        .with_foreground_required(!opts.no_foreground_required);
    if let Some(referrer) = &opts.referrer {
        request = request.with_referrer(referrer);
    }
    if let Some(scope) = &opts.scope {
        request = request.with_scope(scope);
    }
    Ok(request)
}

pub fn run(
    opts: &DecideOpts,
    config: DispatchConfig,
    mut host: TableHost,
) -> anyhow::Result<DecideReport> {
    let request = build_request(opts)?;
    let gesture_at_ms = opts
        .gesture_at_ms
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let composer = Composer::new(config);
    let mut chain = composer.new_chain();
    if let Some(origin) = &opts.origin {
        chain.begin_external_launch(codec::descriptor_for(origin));
    }
    if !opts.untracked {
        chain.observe(&Observation::from_request(&request, gesture_at_ms));
    }

    let dispatch = composer.decide(&host, &request, &mut chain);
    let decision = dispatch.clone().apply(&mut host);
    tracing::debug!(kind = decision.kind().as_str(), url = %request.url, "decided");
    Ok(DecideReport {
        dispatch,
        decision,
        side_effects: host.log,
    })
}
