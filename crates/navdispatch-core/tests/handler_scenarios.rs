use navdispatch_core::codec::{CATEGORY_BROWSABLE, EXTRA_APPLICATION_ID, EXTRA_REFERRER};
use navdispatch_core::composer::StayReason;
use navdispatch_core::scope::{Credential, ScopeClaim};
use navdispatch_core::table::TableHost;
use navdispatch_core::{
    AsyncActionKind, Composer, Decision, DecisionKind, DispatchConfig, HandlerCandidate,
    Instruction, LaunchDescriptor, NavigationRequest, Observation, RedirectChainState,
    TransitionFlags,
};

const HOST_ID: &str = "org.navdispatch.host";
const SCOPED_APP: &str = "org.template.webapp";
const SCOPE_URL: &str = "https://www.template.com/";

fn host() -> TableHost {
    TableHost::new(HOST_ID)
        .with_rule("http", vec![HandlerCandidate::generic(HOST_ID)])
        .with_rule("tel:", vec![HandlerCandidate::generic("com.android.dialer")])
}

fn with_youtube(host: TableHost) -> TableHost {
    host.with_rule(
        "https://www.youtube.com/",
        vec![HandlerCandidate::specialized("com.google.android.youtube")],
    )
}

/// Drives one tab: every request is observed, decided and applied.
struct Tab {
    composer: Composer,
    chain: RedirectChainState,
    host: TableHost,
    clock_ms: i64,
}

impl Tab {
    fn new(host: TableHost) -> Self {
        Self::with_config(host, DispatchConfig::default())
    }

    fn with_config(host: TableHost, config: DispatchConfig) -> Self {
        let composer = Composer::new(config);
        let chain = composer.new_chain();
        Self {
            composer,
            chain,
            host,
            clock_ms: 0,
        }
    }

    /// A user tap far enough from the previous one to count as new.
    fn tap(&mut self, request: NavigationRequest) -> Decision {
        self.clock_ms += 10_000;
        self.navigate(request.with_user_gesture(true))
    }

    fn navigate(&mut self, request: NavigationRequest) -> Decision {
        self.chain
            .observe(&Observation::from_request(&request, self.clock_ms));
        let dispatch = self.composer.decide(&self.host, &request, &mut self.chain);
        dispatch.apply(&mut self.host)
    }

    fn stay_reason(&mut self, request: NavigationRequest) -> Option<StayReason> {
        self.clock_ms += 10_000;
        let request = request.with_user_gesture(true);
        self.chain
            .observe(&Observation::from_request(&request, self.clock_ms));
        self.composer.decide(&self.host, &request, &mut self.chain).stay
    }
}

fn launched(decision: &Decision) -> &LaunchDescriptor {
    match decision {
        Decision::OverrideExternal { descriptor } => descriptor,
        other => panic!("expected external launch, got {other:?}"),
    }
}

// ── 1. web links ──

#[test]
fn web_link_with_specialized_handler_goes_external() {
    let mut tab = Tab::new(with_youtube(host()));
    let d = tab.tap(
        NavigationRequest::new("https://www.youtube.com/watch?v=1")
            .with_referrer("https://news.example.com/"),
    );
    let descriptor = launched(&d);
    assert_eq!(descriptor.target_uri, "https://www.youtube.com/watch?v=1");
    assert!(descriptor.categories.contains(CATEGORY_BROWSABLE));
    assert_eq!(descriptor.extras[EXTRA_APPLICATION_ID], HOST_ID);
    assert_eq!(descriptor.extras[EXTRA_REFERRER], "https://news.example.com/");
    assert_eq!(tab.host.log.started.len(), 1);
}

#[test]
fn web_link_with_only_host_handler_stays() {
    let mut tab = Tab::new(host());
    let reason = tab.stay_reason(NavigationRequest::new("https://www.example.com/"));
    assert_eq!(reason, Some(StayReason::NoSpecializedHandler));
    assert!(tab.host.log.is_empty());
}

#[test]
fn same_origin_link_stays() {
    let mut tab = Tab::new(with_youtube(host()));
    let reason = tab.stay_reason(
        NavigationRequest::new("https://www.youtube.com/watch?v=2")
            .with_referrer("https://www.youtube.com/"),
    );
    assert!(matches!(reason, Some(StayReason::Referrer(_))));
}

#[test]
fn internal_page_referrer_keeps_web_destination() {
    let mut tab = Tab::new(with_youtube(host()));
    let reason = tab.stay_reason(
        NavigationRequest::new("https://www.youtube.com/watch?v=2").with_referrer("chrome://bookmarks"),
    );
    assert!(matches!(reason, Some(StayReason::Referrer(_))));
}

#[test]
fn pairing_url_stays_even_with_handler() {
    let mut tab = Tab::new(with_youtube(host()));
    let reason = tab.stay_reason(NavigationRequest::new("https://www.youtube.com/tv?pairingCode=123"));
    assert_eq!(reason, Some(StayReason::Pairing));
}

// ── 2. transitions ──

#[test]
fn typed_stays_until_redirect() {
    let mut tab = Tab::new(host());
    let typed = NavigationRequest::new("market://details?id=com.imdb.mobile")
        .with_transitions(TransitionFlags::TYPED);
    assert_eq!(tab.navigate(typed.clone()), Decision::NoOverride);
    let d = tab.navigate(typed.with_redirect(true));
    assert_eq!(d.kind(), DecisionKind::OverrideExternal);
}

#[test]
fn form_submit_needs_redirect() {
    let mut tab = Tab::new(with_youtube(host()));
    let form = NavigationRequest::new("https://www.youtube.com/results")
        .with_transitions(TransitionFlags::FORM_SUBMIT)
        .with_referrer("https://search.example.com/");
    assert_eq!(tab.tap(form.clone()), Decision::NoOverride);
    let d = tab.tap(form.with_redirect(true));
    assert_eq!(d.kind(), DecisionKind::OverrideExternal);
}

#[test]
fn gestureless_link_cannot_hand_off() {
    let mut tab = Tab::new(host());
    let d = tab.navigate(NavigationRequest::new("intent://scan/#Intent;scheme=zxing;end"));
    assert_eq!(d, Decision::NoOverride);
}

#[test]
fn plain_tel_link_hands_off_when_no_chain_is_tracked() {
    let composer = Composer::default();
    let mut chain = composer.new_chain();
    let request = NavigationRequest::new("tel:012345678");
    let d = composer.decide(&host(), &request, &mut chain);
    assert_eq!(launched(&d.decision).target_uri, "tel:012345678");

    let mut tab = Tab::new(host());
    assert_eq!(tab.navigate(request), Decision::NoOverride);
}

#[test]
fn gestureless_link_may_still_use_fallback() {
    let mut tab = Tab::new(host());
    let d = tab.navigate(NavigationRequest::new(
        "intent://scan/#Intent;scheme=zxing;S.browser_fallback_url=https%3A%2F%2Fzxing.example.com%2F;end",
    ));
    assert_eq!(d.kind(), DecisionKind::OverrideClobberTab);
}

#[test]
fn redirect_after_link_hands_off_once() {
    let mut tab = Tab::new(host());
    let d = tab.tap(NavigationRequest::new("https://short.example.com/x"));
    assert_eq!(d, Decision::NoOverride);
    let hop = NavigationRequest::new("tel:1").with_redirect(true);
    assert_eq!(tab.navigate(hop.clone()).kind(), DecisionKind::OverrideExternal);
    assert_eq!(tab.navigate(hop), Decision::NoOverride);
}

// ── 3. descriptors ──

#[test]
fn installed_descriptor_target_is_launched() {
    let host = host().with_rule("zxing:", vec![HandlerCandidate::specialized("com.google.zxing")]);
    let mut tab = Tab::new(host);
    let d = tab.tap(NavigationRequest::new(
        "intent://scan/#Intent;scheme=zxing;component=com.google.zxing/.Scan;\
         S.browser_fallback_url=https%3A%2F%2Fzxing.example.com%2F;end",
    ));
    let descriptor = launched(&d);
    assert_eq!(descriptor.target_uri, "zxing://scan/");
    assert!(descriptor.component.is_none());
    assert!(descriptor.fallback_url.is_none());
}

#[test]
fn generic_handler_is_enough_for_external_schemes() {
    let host = host().with_rule("zxing:", vec![HandlerCandidate::generic("com.catchall")]);
    let mut tab = Tab::new(host);
    let d = tab.tap(NavigationRequest::new("intent://scan/#Intent;scheme=zxing;end"));
    assert_eq!(d.kind(), DecisionKind::OverrideExternal);
}

#[test]
fn selector_drives_resolution() {
    let host = host().with_rule("market:", vec![HandlerCandidate::specialized("com.android.vending")]);
    let mut tab = Tab::new(host);
    let d = tab.tap(NavigationRequest::new(
        "intent://scan/#Intent;scheme=zxing;SEL;scheme=market;end",
    ));
    let descriptor = launched(&d);
    assert_eq!(descriptor.target_uri, "zxing://scan/");
    assert_eq!(descriptor.selector.as_deref().map(|s| s.target_uri.as_str()), Some("market:"));
}

#[test]
fn uninstalled_with_fallback_clobbers_without_starting() {
    let mut tab = Tab::new(host());
    let d = tab.tap(
        NavigationRequest::new(
            "intent://scan/#Intent;scheme=zxing;package=com.google.zxing;\
             S.browser_fallback_url=https%3A%2F%2Fzxing.example.com%2F;end",
        )
        .with_referrer("https://www.example.com/"),
    );
    assert_eq!(
        d,
        Decision::OverrideClobberTab {
            new_url: "https://zxing.example.com/".into(),
            referrer_url: Some("https://www.example.com/".into()),
        }
    );
    assert!(tab.host.log.started.is_empty());
    assert_eq!(tab.host.log.clobbered.len(), 1);
}

#[test]
fn script_fallback_is_discarded() {
    let mut tab = Tab::new(host());
    let d = tab.tap(NavigationRequest::new(
        "intent://scan/#Intent;scheme=zxing;package=com.google.zxing;\
         S.browser_fallback_url=javascript%3Aalert(1);end",
    ));
    // No usable fallback, so the package hint sends the user to the store.
    assert!(launched(&d).target_uri.starts_with("market://details?id=com.google.zxing"));
    assert!(tab.host.log.clobbered.is_empty());
}

#[test]
fn descriptor_fallback_cannot_chain() {
    let mut tab = Tab::new(host());
    let d = tab.tap(NavigationRequest::new(
        "intent://scan/#Intent;scheme=zxing;\
         S.browser_fallback_url=https%3A%2F%2Fx.com%2F%23Intent%3Bscheme%3Dfoo%3Bend;end",
    ));
    assert_eq!(d, Decision::NoOverride);
}

#[test]
fn subframe_never_clobbers() {
    let mut tab = Tab::new(host());
    let d = tab.tap(
        NavigationRequest::new(
            "intent://scan/#Intent;scheme=zxing;S.browser_fallback_url=https%3A%2F%2Fz.com%2F;end",
        )
        .with_main_frame(false),
    );
    assert_eq!(d, Decision::NoOverride);
}

#[test]
fn marketplace_lookup_carries_store_package_and_referrer() {
    let mut tab = Tab::new(host());
    let d = tab.tap(
        NavigationRequest::new("intent:///name/nm0000158#Intent;scheme=imdb;package=com.imdb.mobile;end")
            .with_referrer("https://www.imdb.com/"),
    );
    let descriptor = launched(&d);
    assert_eq!(
        descriptor.target_uri,
        format!("market://details?id=com.imdb.mobile&referrer={HOST_ID}")
    );
    assert_eq!(descriptor.target_package_hint.as_deref(), Some("com.android.vending"));
    assert_eq!(descriptor.extras[EXTRA_REFERRER], "https://www.imdb.com/");
}

// ── 4. incognito ──

#[test]
fn incognito_handoff_carries_fallback_to_prompt() {
    let host = host().with_rule("zxing:", vec![HandlerCandidate::specialized("com.google.zxing")]);
    let composer = Composer::default();
    let mut chain = composer.new_chain();
    let request = NavigationRequest::new(
        "intent://scan/#Intent;scheme=zxing;S.browser_fallback_url=https%3A%2F%2Fz.com%2F;end",
    )
    .with_incognito(true)
    .with_user_gesture(true)
    .with_referrer("https://r.com/");
    chain.observe(&Observation::from_request(&request, 1));
    let dispatch = composer.decide(&host, &request, &mut chain);
    assert_eq!(
        dispatch.decision,
        Decision::OverrideAsyncAction {
            action: AsyncActionKind::Incognito
        }
    );
    match dispatch.instruction {
        Some(Instruction::StartIncognito {
            descriptor,
            referrer,
            fallback,
        }) => {
            assert_eq!(descriptor.target_uri, "zxing://scan/");
            assert_eq!(referrer.as_deref(), Some("https://r.com/"));
            assert_eq!(fallback.as_deref(), Some("https://z.com/"));
        }
        other => panic!("expected incognito instruction, got {other:?}"),
    }
}

// ── 5. scoped apps ──

fn scoped_host(credential: Credential) -> TableHost {
    host()
        .with_rule(SCOPE_URL, vec![HandlerCandidate::specialized(SCOPED_APP)])
        .with_scope(ScopeClaim {
            scope_id: SCOPED_APP.into(),
            scope_url: SCOPE_URL.into(),
            credential,
        })
}

#[test]
fn navigation_inside_own_scope_stays() {
    let mut tab = Tab::new(scoped_host(Credential::Verified));
    let reason = tab.stay_reason(
        NavigationRequest::new("https://www.template.com/new.html")
            .with_scope(SCOPED_APP)
            .with_redirect(true),
    );
    assert_eq!(reason, Some(StayReason::InScope));
}

#[test]
fn another_scoped_app_is_targeted_directly() {
    let mut tab = Tab::new(scoped_host(Credential::Verified));
    let d = tab.tap(NavigationRequest::new("https://www.template.com/").with_scope("org.other.webapp"));
    assert_eq!(launched(&d).target_package_hint.as_deref(), Some(SCOPED_APP));
}

#[test]
fn targeting_switch_off_launches_generically() {
    let config = DispatchConfig {
        scoped_app_handoff: false,
        ..DispatchConfig::default()
    };
    let mut tab = Tab::with_config(scoped_host(Credential::Verified), config);
    let d = tab.tap(NavigationRequest::new("https://www.template.com/"));
    assert_eq!(launched(&d).target_package_hint, None);
}

#[test]
fn counterfeit_scope_is_not_targeted() {
    let mut tab = Tab::new(scoped_host(Credential::Unverified));
    let d = tab.tap(NavigationRequest::new("https://www.template.com/").with_scope(SCOPED_APP));
    assert_eq!(launched(&d).target_package_hint, None);
}

#[test]
fn two_specialized_handlers_launch_generically() {
    let host = scoped_host(Credential::Verified)
        .with_rule(SCOPE_URL, vec![HandlerCandidate::specialized("com.other.native")]);
    let mut tab = Tab::new(host);
    let d = tab.tap(NavigationRequest::new("https://www.template.com/"));
    assert_eq!(launched(&d).target_package_hint, None);
}

#[test]
fn leaving_scope_returns_to_host_even_in_incognito() {
    let mut tab = Tab::new(scoped_host(Credential::Verified));
    let d = tab.tap(
        NavigationRequest::new("https://www.google.com/search?q=x")
            .with_scope(SCOPED_APP)
            .with_incognito(true),
    );
    assert_eq!(launched(&d).target_package_hint.as_deref(), Some(HOST_ID));
}

// ── 6. chains opened by other apps ──

#[test]
fn external_launch_redirect_to_same_handlers_stays() {
    let host = host()
        .with_rule("https://a.example.com/", vec![HandlerCandidate::specialized("com.a")])
        .with_rule("https://b.example.com/", vec![HandlerCandidate::specialized("com.a")]);
    let mut tab = Tab::new(host);
    tab.chain
        .begin_external_launch(LaunchDescriptor::view("https://a.example.com/"));
    let flags = TransitionFlags::LINK | TransitionFlags::FROM_EXTERNAL_LAUNCH;
    assert_eq!(
        tab.navigate(NavigationRequest::new("https://a.example.com/").with_transitions(flags)),
        Decision::NoOverride
    );
    let d = tab.navigate(
        NavigationRequest::new("https://b.example.com/")
            .with_transitions(flags)
            .with_redirect(true),
    );
    assert_eq!(d, Decision::NoOverride);
}

#[test]
fn external_launch_targeting_host_keeps_web_pages() {
    let mut tab = Tab::new(with_youtube(host()));
    let mut origin = LaunchDescriptor::view("https://www.youtube.com/");
    origin.target_package_hint = Some(HOST_ID.into());
    tab.chain.begin_external_launch(origin);
    let flags = TransitionFlags::LINK | TransitionFlags::FROM_EXTERNAL_LAUNCH;
    tab.navigate(NavigationRequest::new("https://short.example.com/").with_transitions(flags));
    let d = tab.navigate(
        NavigationRequest::new("https://www.youtube.com/watch?v=1")
            .with_transitions(flags)
            .with_redirect(true),
    );
    assert_eq!(d, Decision::NoOverride);
}

#[test]
fn same_host_redirect_with_known_handlers_stays() {
    let host = host().with_rule("https://www.example.com/", vec![HandlerCandidate::specialized("com.example")]);
    let mut tab = Tab::new(host);
    let reason = tab.stay_reason(
        NavigationRequest::new("https://www.example.com/next")
            .with_referrer("https://www.example.com/start")
            .with_redirect(true),
    );
    assert_eq!(reason, Some(StayReason::SameHostHandlers));
}

// ── 7. messaging and registry failures ──

#[test]
fn sms_targets_default_messaging_handler() {
    let mut host = host().with_rule(
        "sms:",
        vec![
            HandlerCandidate::specialized("com.other.sms"),
            HandlerCandidate::specialized("com.default.sms"),
        ],
    );
    host.default_messaging_handler = Some("com.default.sms".into());
    let mut tab = Tab::new(host);
    let d = tab.tap(NavigationRequest::new("sms:012345678?body=hello%20there"));
    assert_eq!(launched(&d).target_package_hint.as_deref(), Some("com.default.sms"));
}

#[test]
fn default_messaging_handler_must_be_a_candidate() {
    let mut host = host().with_rule("sms:", vec![HandlerCandidate::specialized("com.other.sms")]);
    host.default_messaging_handler = Some("com.default.sms".into());
    let mut tab = Tab::new(host);
    let d = tab.tap(NavigationRequest::new("sms:1"));
    assert_eq!(launched(&d).target_package_hint, None);
}

#[test]
fn registry_failure_degrades_conservatively() {
    let mut host = with_youtube(host());
    host.failing_prefixes = vec!["https://www.youtube.com/".into(), "tel:".into()];
    let mut tab = Tab::new(host);
    assert_eq!(
        tab.tap(NavigationRequest::new("https://www.youtube.com/watch?v=1")),
        Decision::NoOverride
    );
    // External-only schemes are still dispatched best effort.
    assert_eq!(tab.tap(NavigationRequest::new("tel:1")).kind(), DecisionKind::OverrideExternal);
}

// ── 8. capability query ──

#[test]
fn can_external_app_handle() {
    let composer = Composer::default();
    let host = with_youtube(host());
    assert!(composer.can_external_app_handle(&host, "wtai://wp/mc;123"));
    assert!(composer.can_external_app_handle(&host, "intent://x#Intent;scheme=foo;package=com.foo;end"));
    assert!(composer.can_external_app_handle(&host, "tel:1"));
    assert!(composer.can_external_app_handle(&host, "https://www.youtube.com/"));
    assert!(!composer.can_external_app_handle(&host, "someapp://nothing"));
}
