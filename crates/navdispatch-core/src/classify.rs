//! Static URL and transition classification.
//!
//! Everything here is a pure function of the request and config. Chain state
//! and handler lookups happen later in the composer.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::codec::{self, DESCRIPTOR_SCHEME};
use crate::config::{DispatchConfig, PairingRule};
use crate::types::{NavigationRequest, TransitionFlags};

/// Schemes that run script or inline content. Never handed off, never used as
/// a fallback.
const SCRIPT_SCHEMES: [&str; 3] = ["javascript", "data", "blob"];

/// Schemes the host can render.
const WEB_SCHEMES: [&str; 3] = ["http", "https", "file"];

const WTAI_PREFIX: &str = "wtai://wp/";
const WTAI_MAKE_CALL: &str = "mc;";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// The host keeps the navigation regardless of installed handlers.
    NeverOverride,
    /// The host cannot render this; dispatch even with no known handler.
    AlwaysExternal,
    /// Dispatch only if a suitable handler exists.
    NeedsResolution,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverOverride => "never_override",
            Self::AlwaysExternal => "always_external",
            Self::NeedsResolution => "needs_resolution",
        }
    }
}

pub fn is_script_scheme(scheme: &str) -> bool {
    SCRIPT_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme))
}

/// Whether only the host may load `url`: relative, internal or script URLs.
pub fn is_host_only(url: &str, config: &DispatchConfig) -> bool {
    match codec::scheme_of(url) {
        Some(scheme) => config.is_internal_scheme(&scheme) || is_script_scheme(&scheme),
        None => true,
    }
}

/// Classify a navigation by its URL scheme and transition.
pub fn classify(request: &NavigationRequest, config: &DispatchConfig) -> Policy {
    if is_host_only(&request.url, config) {
        return Policy::NeverOverride;
    }
    let Some(scheme) = codec::scheme_of(&request.url) else {
        return Policy::NeverOverride;
    };

    let t = request.transitions;
    if t.contains(TransitionFlags::FORWARD_BACK) {
        return Policy::NeverOverride;
    }
    if !request.is_redirect
        && t.intersects(
            TransitionFlags::USER_NAVIGATION
                | TransitionFlags::FROM_EXTERNAL_LAUNCH
                | TransitionFlags::FORM_SUBMIT,
        )
    {
        return Policy::NeverOverride;
    }

    if WEB_SCHEMES.contains(&scheme.as_str()) || scheme == DESCRIPTOR_SCHEME {
        Policy::NeedsResolution
    } else {
        Policy::AlwaysExternal
    }
}

/// Whether `url` names something other than a page the host renders.
///
/// Descriptor URLs count as external whatever their outer scheme.
pub fn is_external_protocol(url: &str, config: &DispatchConfig) -> bool {
    if codec::is_descriptor(url) {
        return true;
    }
    match codec::scheme_of(url) {
        Some(scheme) => {
            !(WEB_SCHEMES.contains(&scheme.as_str())
                || is_script_scheme(&scheme)
                || config.is_internal_scheme(&scheme))
        }
        None => false,
    }
}

// ─── Referrer rules ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferrerHold {
    /// Same origin as the referrer and not a redirect.
    SameOrigin,
    /// An internal host page linking to a web page.
    InternalReferrer,
}

/// Rules that keep a navigation in the host because of where it came from.
pub fn referrer_hold(request: &NavigationRequest, config: &DispatchConfig) -> Option<ReferrerHold> {
    let referrer = request.referrer()?;
    if let Some(scheme) = codec::scheme_of(referrer) {
        let destination_is_web = matches!(
            codec::scheme_of(&request.url).as_deref(),
            Some("http") | Some("https")
        );
        if config.is_internal_scheme(&scheme) && destination_is_web {
            return Some(ReferrerHold::InternalReferrer);
        }
    }
    if !request.is_redirect && !codec::is_descriptor(&request.url) && same_origin(&request.url, referrer) {
        return Some(ReferrerHold::SameOrigin);
    }
    None
}

/// Tuple-origin equality. Opaque origins (`tel:`, `market:`) never match.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            let (a, b) = (a.origin(), b.origin());
            a.is_tuple() && a == b
        }
        _ => false,
    }
}

/// Host of `url`, lowercased, when it parses as a URL with a host.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_ascii_lowercase)
}

/// Whether `url` matches any device-pairing rule.
pub fn is_pairing_url(url: &str, rules: &[PairingRule]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    rules.iter().any(|rule| {
        let suffix = rule.host_suffix.to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        let host_matches = host == suffix || host.ends_with(&format!(".{suffix}"));
        host_matches && parsed.query_pairs().any(|(k, _)| k == rule.query_param.as_str())
    })
}

// ─── WTAI ────────────────────────────────────────────────────────

/// A wireless-telephony command URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wtai {
    /// `wtai://wp/mc;<number>`, rewritten as a `tel:` URL.
    Dial(String),
    /// Any other command.
    Unsupported,
}

pub fn parse_wtai(url: &str) -> Option<Wtai> {
    let prefix = url.get(..WTAI_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(WTAI_PREFIX) {
        return None;
    }
    let command = &url[WTAI_PREFIX.len()..];
    match command.strip_prefix(WTAI_MAKE_CALL) {
        Some(number) if !number.is_empty() => Some(Wtai::Dial(format!("tel:{number}"))),
        _ => Some(Wtai::Unsupported),
    }
}

/// Messaging schemes that prefer the default messaging handler.
pub fn is_messaging_scheme(scheme: &str) -> bool {
    matches!(scheme, "sms" | "smsto" | "mms" | "mmsto")
}

// ─── Tests ───────────────────────────────────────────────────────
