//! Redirect-chain tracker.
//!
//! One [`RedirectChainState`] lives per tab. Each navigation event is fed to
//! [`RedirectChainState::observe`] before the composer decides on it, so the
//! state records what kind of action started the current chain:
//!
//! - **New chain**: a fresh user gesture (outside the debounce window), a
//!   typed/reload/auto-toplevel load, back/forward, or a link opened from
//!   another application.
//! - **Continuation**: a server redirect, or a gesture-less link or form
//!   submission inside an existing chain (a client redirect).
//! - **Handoff latch**: once anything has been dispatched in the chain, no
//!   further handoff happens until a new gesture or an explicit reset.

use serde::{Deserialize, Serialize};

use crate::codec::LaunchDescriptor;
use crate::config::DEFAULT_GESTURE_DEBOUNCE_MS;
use crate::types::{NavigationRequest, TransitionFlags};

/// How the last observed event related to the chain before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPhase {
    Fresh,
    Redirected,
    UserReinitiated,
}

/// One navigation event as seen by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    pub transitions: TransitionFlags,
    pub is_redirect: bool,
    pub has_user_gesture: bool,
    pub gesture_timestamp_ms: i64,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            transitions: TransitionFlags::LINK,
            is_redirect: false,
            has_user_gesture: false,
            gesture_timestamp_ms: 0,
        }
    }
}

impl Observation {
    pub fn from_request(request: &NavigationRequest, gesture_timestamp_ms: i64) -> Self {
        Self {
            transitions: request.transitions,
            is_redirect: request.is_redirect,
            has_user_gesture: request.has_user_gesture,
            gesture_timestamp_ms,
        }
    }
}

/// Why the chain keeps a navigation in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainHold {
    ForwardBack,
    Reload,
    Typed,
    LinkWithoutGesture,
    OriginTargetsHost,
}

impl ChainHold {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForwardBack => "forward_back",
            Self::Reload => "reload",
            Self::Typed => "typed",
            Self::LinkWithoutGesture => "link_without_gesture",
            Self::OriginTargetsHost => "origin_targets_host",
        }
    }
}

/// Per-tab chain state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectChainState {
    /// Descriptor that opened this tab from another application, if any.
    origin_descriptor: Option<LaunchDescriptor>,
    last_user_gesture_timestamp_ms: i64,
    /// Number of continuation events since the chain started.
    chain_depth: u32,
    has_handed_off_in_this_chain: bool,
    phase: ChainPhase,
    /// Transitions of the event that started the chain. `None` until the
    /// first observation.
    initiator: Option<TransitionFlags>,
    initiated_with_gesture: bool,
    gesture_debounce_ms: i64,
}

impl Default for RedirectChainState {
    fn default() -> Self {
        Self::new(DEFAULT_GESTURE_DEBOUNCE_MS)
    }
}

impl RedirectChainState {
    pub fn new(gesture_debounce_ms: i64) -> Self {
        Self {
            origin_descriptor: None,
            last_user_gesture_timestamp_ms: i64::MIN,
            chain_depth: 0,
            has_handed_off_in_this_chain: false,
            phase: ChainPhase::Fresh,
            initiator: None,
            initiated_with_gesture: false,
            gesture_debounce_ms,
        }
    }

    pub fn origin_descriptor(&self) -> Option<&LaunchDescriptor> {
        self.origin_descriptor.as_ref()
    }

    pub fn last_user_gesture_timestamp_ms(&self) -> i64 {
        self.last_user_gesture_timestamp_ms
    }

    pub fn chain_depth(&self) -> u32 {
        self.chain_depth
    }

    pub fn phase(&self) -> ChainPhase {
        self.phase
    }

    pub fn has_handed_off(&self) -> bool {
        self.has_handed_off_in_this_chain
    }

    /// Record one navigation event. Call once per event, before deciding.
    pub fn observe(&mut self, obs: &Observation) -> ChainPhase {
        let fresh_gesture = obs.has_user_gesture
            && obs.gesture_timestamp_ms
                > self
                    .last_user_gesture_timestamp_ms
                    .saturating_add(self.gesture_debounce_ms);
        if fresh_gesture {
            self.last_user_gesture_timestamp_ms = obs.gesture_timestamp_ms;
            self.has_handed_off_in_this_chain = false;
        }

        let flags = obs.transitions;
        self.phase = if fresh_gesture {
            self.start_chain(obs);
            ChainPhase::UserReinitiated
        } else if flags.contains(TransitionFlags::FORWARD_BACK) {
            self.start_chain(obs);
            ChainPhase::Fresh
        } else if obs.is_redirect {
            self.continue_chain();
            ChainPhase::Redirected
        } else if !flags.intersects(TransitionFlags::CLICK_LIKE)
            || flags.contains(TransitionFlags::FROM_EXTERNAL_LAUNCH)
            || self.initiator.is_none()
        {
            self.start_chain(obs);
            ChainPhase::Fresh
        } else {
            // A gesture-less link inside a chain behaves like a client redirect.
            self.continue_chain();
            ChainPhase::Redirected
        };

        tracing::trace!(
            phase = ?self.phase,
            depth = self.chain_depth,
            handed_off = self.has_handed_off_in_this_chain,
            "chain observed"
        );
        self.phase
    }

    fn start_chain(&mut self, obs: &Observation) {
        self.initiator = Some(obs.transitions);
        self.initiated_with_gesture = obs.has_user_gesture;
        self.chain_depth = 0;
        if !obs.transitions.contains(TransitionFlags::FROM_EXTERNAL_LAUNCH) {
            self.origin_descriptor = None;
        }
    }

    fn continue_chain(&mut self) {
        self.chain_depth = self.chain_depth.saturating_add(1);
    }

    /// Whether another external handoff is allowed in this chain.
    pub fn may_hand_off(&self) -> bool {
        !self.has_handed_off_in_this_chain
    }

    pub fn mark_handed_off(&mut self) {
        self.has_handed_off_in_this_chain = true;
    }

    /// Start over: the next observation begins a new chain.
    pub fn reset(&mut self) {
        *self = Self {
            last_user_gesture_timestamp_ms: self.last_user_gesture_timestamp_ms,
            ..Self::new(self.gesture_debounce_ms)
        };
    }

    /// Record that this tab was opened by another application with
    /// `descriptor`. Resets the chain first.
    pub fn begin_external_launch(&mut self, descriptor: LaunchDescriptor) {
        self.reset();
        self.origin_descriptor = Some(descriptor);
    }

    /// Whether the current event is a redirect inside a chain that another
    /// application started.
    pub fn is_external_launch_redirect(&self, request: &NavigationRequest) -> bool {
        self.origin_descriptor.is_some()
            && (request.is_redirect || self.phase == ChainPhase::Redirected)
    }

    /// Whether the chain's initiator pins `request` to the host.
    ///
    /// `targets_external` is true when the destination is not something the
    /// host renders itself. Before the first observation only the origin
    /// descriptor can hold.
    pub fn hold(
        &self,
        request: &NavigationRequest,
        targets_external: bool,
        host_identity: &str,
    ) -> Option<ChainHold> {
        if let Some(initiator) = self.initiator {
            if initiator.contains(TransitionFlags::FORWARD_BACK) {
                return Some(ChainHold::ForwardBack);
            }
            if initiator.contains(TransitionFlags::RELOAD) {
                return Some(ChainHold::Reload);
            }
            if initiator.contains(TransitionFlags::TYPED) {
                let typed_redirect_out = request.is_redirect && targets_external;
                if !typed_redirect_out {
                    return Some(ChainHold::Typed);
                }
            }
            if initiator.intersects(TransitionFlags::CLICK_LIKE)
                && !initiator.contains(TransitionFlags::FROM_EXTERNAL_LAUNCH)
                && !self.initiated_with_gesture
            {
                return Some(ChainHold::LinkWithoutGesture);
            }
        }
        let origin_targets_host = self
            .origin_descriptor
            .as_ref()
            .and_then(|d| d.target_package_hint.as_deref())
            .is_some_and(|package| package == host_identity);
        if origin_targets_host && !targets_external {
            return Some(ChainHold::OriginTargetsHost);
        }
        None
    }
}

// ─── Tests ───────────────────────────────────────────────────────
