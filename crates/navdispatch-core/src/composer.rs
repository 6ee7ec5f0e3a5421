//! Decision composer.
//!
//! [`Composer::decide`] runs the ordered rule pipeline for one navigation and
//! returns a [`Dispatch`]: the decision plus the side effect that realizes it.
//! Deciding only queries the host. Side effects run in [`Dispatch::apply`].
//!
//! Rule order, first match wins:
//!
//! 1. Host not in foreground (when required), background tab, back/forward.
//! 2. File URLs needing a permission prompt.
//! 3. Static classification ([`classify`]).
//! 4. Chain suppression, depth guard, chain holds.
//! 5. Referrer and pairing rules, WTAI commands.
//! 6. Scoped-app resolution.
//! 7. Always-external schemes, then handler resolution.
//!
//! A fallback-eligible stay is finally offered to the fallback wrapper, which
//! replaces the tab with the descriptor's fallback URL when allowed.

use serde::{Deserialize, Serialize};

use crate::chain::{ChainHold, RedirectChainState};
use crate::classify::{self, Policy, ReferrerHold, Wtai};
use crate::codec::{
    self, CATEGORY_BROWSABLE, EXTRA_APPLICATION_ID, EXTRA_CREATE_NEW_TAB, EXTRA_REFERRER,
    LaunchDescriptor,
};
use crate::config::DispatchConfig;
use crate::resolution::{self, HostDelegate};
use crate::scope::{self, ScopeVerdict};
use crate::types::{AsyncActionKind, Decision, HandlerCandidate, NavigationRequest, TransitionFlags};

// ─── Output ──────────────────────────────────────────────────────

/// Side effect that realizes a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    StartExternal {
        descriptor: LaunchDescriptor,
    },
    StartIncognito {
        descriptor: LaunchDescriptor,
        referrer: Option<String>,
        fallback: Option<String>,
    },
    StartFileAccess {
        descriptor: LaunchDescriptor,
        referrer: Option<String>,
    },
    ClobberTab {
        url: String,
        referrer: Option<String>,
    },
}

/// Why a navigation stays in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StayReason {
    HostNotForeground,
    BackgroundTab,
    ForwardBack,
    /// Internal, script or relative URL.
    HostScheme,
    /// Typed, reload or form navigation that was not redirected.
    Transition,
    ChainSuppressed,
    ChainTooDeep,
    Chain(ChainHold),
    Referrer(ReferrerHold),
    Pairing,
    InScope,
    Unresolvable,
    NoSpecializedHandler,
    SameHostHandlers,
    NoNewHandler,
}

impl StayReason {
    /// Whether a fallback URL may replace the tab after this stay.
    pub fn allows_fallback(self) -> bool {
        !matches!(
            self,
            Self::HostNotForeground
                | Self::BackgroundTab
                | Self::ForwardBack
                | Self::HostScheme
                | Self::ChainSuppressed
                | Self::ChainTooDeep
                | Self::InScope
                | Self::Chain(ChainHold::ForwardBack)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostNotForeground => "host_not_foreground",
            Self::BackgroundTab => "background_tab",
            Self::ForwardBack => "forward_back",
            Self::HostScheme => "host_scheme",
            Self::Transition => "transition",
            Self::ChainSuppressed => "chain_suppressed",
            Self::ChainTooDeep => "chain_too_deep",
            Self::Chain(hold) => hold.as_str(),
            Self::Referrer(ReferrerHold::SameOrigin) => "same_origin",
            Self::Referrer(ReferrerHold::InternalReferrer) => "internal_referrer",
            Self::Pairing => "pairing",
            Self::InScope => "in_scope",
            Self::Unresolvable => "unresolvable",
            Self::NoSpecializedHandler => "no_specialized_handler",
            Self::SameHostHandlers => "same_host_handlers",
            Self::NoNewHandler => "no_new_handler",
        }
    }
}

/// A decision and the instruction that carries it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<Instruction>,
    /// Set when the decision is `NoOverride`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stay: Option<StayReason>,
}

impl Dispatch {
    fn stay(reason: StayReason) -> Self {
        Self {
            decision: Decision::NoOverride,
            instruction: None,
            stay: Some(reason),
        }
    }

    fn ignore() -> Self {
        Self {
            decision: Decision::Ignore,
            instruction: None,
            stay: None,
        }
    }

    fn external(descriptor: LaunchDescriptor) -> Self {
        Self {
            decision: Decision::OverrideExternal {
                descriptor: descriptor.clone(),
            },
            instruction: Some(Instruction::StartExternal { descriptor }),
            stay: None,
        }
    }

    fn async_action(action: AsyncActionKind, instruction: Instruction) -> Self {
        Self {
            decision: Decision::OverrideAsyncAction { action },
            instruction: Some(instruction),
            stay: None,
        }
    }

    fn clobber(url: String, referrer: Option<String>) -> Self {
        Self {
            decision: Decision::OverrideClobberTab {
                new_url: url.clone(),
                referrer_url: referrer.clone(),
            },
            instruction: Some(Instruction::ClobberTab { url, referrer }),
            stay: None,
        }
    }

    /// Run the instruction through `host` and return the final decision.
    pub fn apply<H: HostDelegate + ?Sized>(self, host: &mut H) -> Decision {
        match self.instruction {
            None => self.decision,
            Some(Instruction::StartExternal { descriptor }) => {
                host.start_external(&descriptor);
                self.decision
            }
            Some(Instruction::StartIncognito {
                descriptor,
                referrer,
                fallback,
            }) => {
                host.start_incognito(&descriptor, referrer.as_deref(), fallback.as_deref());
                self.decision
            }
            Some(Instruction::StartFileAccess {
                descriptor,
                referrer,
            }) => {
                host.start_file_access(&descriptor, referrer.as_deref());
                self.decision
            }
            Some(Instruction::ClobberTab { url, referrer }) => {
                host.clobber_current_tab(&url, referrer.as_deref())
            }
        }
    }
}

// ─── Composer ────────────────────────────────────────────────────

/// How a handoff descriptor is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Deferred through the incognito confirmation when the request is
    /// incognito.
    Standard,
    /// Started directly even in incognito.
    Direct,
}

#[derive(Debug, Clone)]
pub struct Composer {
    config: DispatchConfig,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl Composer {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Fresh chain state using this composer's debounce window.
    pub fn new_chain(&self) -> RedirectChainState {
        RedirectChainState::new(self.config.gesture_debounce_ms)
    }

    /// Decide one navigation. Feed the event to `chain` first; a chain that
    /// has observed nothing applies no chain holds.
    pub fn decide<H: HostDelegate + ?Sized>(
        &self,
        host: &H,
        request: &NavigationRequest,
        chain: &mut RedirectChainState,
    ) -> Dispatch {
        let descriptor = codec::descriptor_for(&request.url);
        let dispatch = self.evaluate(host, request, chain, &descriptor);

        let Some(reason) = dispatch.stay else {
            tracing::debug!(
                url = %request.url,
                decision = %dispatch.decision.kind(),
                "navigation overridden"
            );
            return dispatch;
        };
        if reason.allows_fallback() && chain.may_hand_off() {
            if let Some(fallback) = self.usable_fallback(request, &descriptor) {
                chain.mark_handed_off();
                tracing::debug!(url = %request.url, %fallback, "replacing tab with fallback url");
                return Dispatch::clobber(fallback, request.referrer_url.clone());
            }
        }
        tracing::debug!(url = %request.url, rule = reason.as_str(), "navigation stays in host");
        dispatch
    }

    /// Whether some external handler could take `url`.
    pub fn can_external_app_handle<H: HostDelegate + ?Sized>(&self, host: &H, url: &str) -> bool {
        if matches!(classify::parse_wtai(url), Some(Wtai::Dial(_))) {
            return true;
        }
        let descriptor = codec::descriptor_for(url);
        if descriptor.target_package_hint.is_some() {
            return true;
        }
        !resolution::query(host, descriptor.resolution_target()).is_empty()
    }

    fn evaluate<H: HostDelegate + ?Sized>(
        &self,
        host: &H,
        request: &NavigationRequest,
        chain: &mut RedirectChainState,
        descriptor: &LaunchDescriptor,
    ) -> Dispatch {
        if request.requires_host_foreground && !host.is_host_foreground() {
            return Dispatch::stay(StayReason::HostNotForeground);
        }
        if request.is_background_tab {
            return Dispatch::stay(StayReason::BackgroundTab);
        }
        if request.transitions.contains(TransitionFlags::FORWARD_BACK) {
            return Dispatch::stay(StayReason::ForwardBack);
        }
        if descriptor.target_scheme().as_deref() == Some("file")
            && host.should_request_file_access(&descriptor.target_uri)
        {
            return Dispatch::async_action(
                AsyncActionKind::FileAccess,
                Instruction::StartFileAccess {
                    descriptor: descriptor.sanitized(),
                    referrer: request.referrer_url.clone(),
                },
            );
        }

        if classify::is_host_only(&request.url, &self.config) {
            return Dispatch::stay(StayReason::HostScheme);
        }
        let policy = classify::classify(request, &self.config);
        tracing::trace!(url = %request.url, policy = policy.as_str(), "classified");
        if policy == Policy::NeverOverride {
            return Dispatch::stay(StayReason::Transition);
        }

        if !chain.may_hand_off() {
            return Dispatch::stay(StayReason::ChainSuppressed);
        }
        if chain.chain_depth() > self.config.max_chain_depth {
            tracing::warn!(
                url = %request.url,
                depth = chain.chain_depth(),
                "redirect chain too deep, refusing handoff"
            );
            return Dispatch::stay(StayReason::ChainTooDeep);
        }
        let external = classify::is_external_protocol(&request.url, &self.config);
        let identity = host.host_identity();
        if let Some(hold) = chain.hold(request, external, &identity) {
            return Dispatch::stay(StayReason::Chain(hold));
        }

        if let Some(hold) = classify::referrer_hold(request, &self.config) {
            return Dispatch::stay(StayReason::Referrer(hold));
        }
        if classify::is_pairing_url(&request.url, &self.config.pairing_rules) {
            return Dispatch::stay(StayReason::Pairing);
        }
        match classify::parse_wtai(&request.url) {
            Some(Wtai::Dial(tel)) => {
                let dial = LaunchDescriptor::view(tel);
                return self.hand_off(host, request, chain, &dial, &[], Delivery::Direct);
            }
            Some(Wtai::Unsupported) => {
                tracing::debug!(url = %request.url, "ignoring unsupported wtai command");
                return Dispatch::ignore();
            }
            None => {}
        }

        let candidates = resolution::query(host, descriptor.resolution_target());
        let specialized = host.count_specialized(&candidates);

        let mut target_app = None;
        if !external {
            let claim = host.find_associated_scope(&candidates);
            match scope::resolve(
                request.associated_scope_id.as_deref(),
                &request.url,
                claim.as_ref(),
                specialized,
                self.config.scoped_app_handoff,
            ) {
                ScopeVerdict::InScope => return Dispatch::stay(StayReason::InScope),
                ScopeVerdict::ReturnToHost => {
                    let mut back = descriptor.clone();
                    back.target_package_hint = Some(identity);
                    return self.hand_off(host, request, chain, &back, &candidates, Delivery::Direct);
                }
                ScopeVerdict::TargetApp(app) => target_app = Some(app),
                ScopeVerdict::Unassociated => {}
            }
        }

        if policy == Policy::AlwaysExternal {
            return self.hand_off(host, request, chain, descriptor, &candidates, Delivery::Standard);
        }

        let usable = if external { !candidates.is_empty() } else { specialized > 0 };
        if !usable {
            return self.unresolvable(host, request, chain, descriptor, candidates.is_empty());
        }

        if !external {
            if self.same_host_handlers(host, request, &candidates) {
                return Dispatch::stay(StayReason::SameHostHandlers);
            }
            if chain.is_external_launch_redirect(request) {
                let previous = chain
                    .origin_descriptor()
                    .map(|origin| resolution::query(host, origin.resolution_target()))
                    .unwrap_or_default();
                if !resolution::has_new_specialized(&candidates, &previous) {
                    return Dispatch::stay(StayReason::NoNewHandler);
                }
            }
        }

        match target_app {
            Some(app) => {
                let mut targeted = descriptor.clone();
                targeted.target_package_hint = Some(app);
                self.hand_off(host, request, chain, &targeted, &candidates, Delivery::Standard)
            }
            None => self.hand_off(host, request, chain, descriptor, &candidates, Delivery::Standard),
        }
    }

    /// No usable handler: the fallback wrapper gets the first chance, then a
    /// marketplace lookup when the descriptor names a package.
    fn unresolvable<H: HostDelegate + ?Sized>(
        &self,
        host: &H,
        request: &NavigationRequest,
        chain: &mut RedirectChainState,
        descriptor: &LaunchDescriptor,
        no_candidates: bool,
    ) -> Dispatch {
        let reason = if no_candidates {
            StayReason::Unresolvable
        } else {
            StayReason::NoSpecializedHandler
        };
        if self.usable_fallback(request, descriptor).is_some() {
            return Dispatch::stay(reason);
        }
        match self.marketplace_lookup(host, request, descriptor) {
            Some(lookup) => {
                tracing::debug!(url = %request.url, lookup = %lookup.target_uri, "sending to marketplace");
                self.hand_off(host, request, chain, &lookup, &[], Delivery::Direct)
            }
            None => Dispatch::stay(reason),
        }
    }

    fn marketplace_lookup<H: HostDelegate + ?Sized>(
        &self,
        host: &H,
        request: &NavigationRequest,
        descriptor: &LaunchDescriptor,
    ) -> Option<LaunchDescriptor> {
        let package = descriptor.target_package_hint.as_deref()?;
        let referrer = descriptor
            .market_referrer
            .clone()
            .unwrap_or_else(|| host.host_identity());
        let market = &self.config.marketplace;
        let mut lookup = LaunchDescriptor::view(format!(
            "{}?id={}&referrer={}",
            market.lookup_base,
            codec::encode_component(package),
            codec::encode_component(&referrer),
        ));
        lookup.categories.insert(CATEGORY_BROWSABLE.to_owned());
        lookup.target_package_hint = Some(market.store_package.clone());
        if let Some(referrer) = request.referrer() {
            lookup.extras.insert(EXTRA_REFERRER.to_owned(), referrer.to_owned());
        }
        Some(lookup)
    }

    /// LINK or FORM_SUBMIT redirects within one host stay when the referrer
    /// page already had every specialized handler the destination has.
    fn same_host_handlers<H: HostDelegate + ?Sized>(
        &self,
        host: &H,
        request: &NavigationRequest,
        candidates: &[HandlerCandidate],
    ) -> bool {
        if !request.is_redirect || !request.transitions.intersects(TransitionFlags::CLICK_LIKE) {
            return false;
        }
        let Some(referrer) = request.referrer() else {
            return false;
        };
        match (classify::host_of(&request.url), classify::host_of(referrer)) {
            (Some(dest), Some(from)) if dest == from => {
                let previous = resolution::query(host, &LaunchDescriptor::view(referrer));
                resolution::is_specialized_subset(candidates, &previous)
            }
            _ => false,
        }
    }

    /// The descriptor's fallback URL when it may replace the tab.
    ///
    /// Only main-frame requests qualify. The fallback must use an allowed,
    /// non-script scheme and must not itself carry a descriptor.
    fn usable_fallback(&self, request: &NavigationRequest, descriptor: &LaunchDescriptor) -> Option<String> {
        if !request.is_main_frame {
            return None;
        }
        let fallback = descriptor.fallback_url.as_deref()?;
        let scheme = codec::scheme_of(fallback)?;
        if !self.config.is_fallback_scheme(&scheme)
            || classify::is_script_scheme(&scheme)
            || codec::is_descriptor(fallback)
        {
            tracing::debug!(%fallback, "discarding fallback url");
            return None;
        }
        Some(fallback.to_owned())
    }

    fn hand_off<H: HostDelegate + ?Sized>(
        &self,
        host: &H,
        request: &NavigationRequest,
        chain: &mut RedirectChainState,
        descriptor: &LaunchDescriptor,
        candidates: &[HandlerCandidate],
        delivery: Delivery,
    ) -> Dispatch {
        let mut out = descriptor.sanitized();
        let is_messaging = out
            .target_scheme()
            .is_some_and(|s| classify::is_messaging_scheme(&s));
        if is_messaging && out.target_package_hint.is_none() {
            if let Some(handler) = host.default_messaging_handler() {
                if candidates.iter().any(|c| c.id == handler) {
                    out.target_package_hint = Some(handler);
                }
            }
        }
        out.extras
            .insert(EXTRA_APPLICATION_ID.to_owned(), host.host_identity());
        if let Some(referrer) = request.referrer() {
            out.extras.insert(EXTRA_REFERRER.to_owned(), referrer.to_owned());
        }
        if request.open_in_new_tab {
            out.extras.insert(EXTRA_CREATE_NEW_TAB.to_owned(), "true".to_owned());
        }
        chain.mark_handed_off();

        if request.is_incognito && delivery == Delivery::Standard {
            return Dispatch::async_action(
                AsyncActionKind::Incognito,
                Instruction::StartIncognito {
                    descriptor: out,
                    referrer: request.referrer_url.clone(),
                    fallback: self.usable_fallback(request, descriptor),
                },
            );
        }
        Dispatch::external(out)
    }
}

// ─── Tests ───────────────────────────────────────────────────────
