//! Launch descriptor codec.
//!
//! A descriptor URL carries a structured application-launch request in its
//! fragment:
//!
//! ```text
//! intent://path#Intent;scheme=imdb;package=com.imdb;S.key=value;end
//! ```
//!
//! Segments are `;`-separated `key=value` pairs with percent-encoded values.
//! `SEL;` opens a nested selector descriptor that runs to the terminator.
//! Decoding is lenient: unknown keys are skipped and a missing `end` is
//! tolerated.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DESCRIPTOR_SCHEME: &str = "intent";
pub const ACTION_VIEW: &str = "android.intent.action.VIEW";
pub const CATEGORY_BROWSABLE: &str = "android.intent.category.BROWSABLE";

pub const EXTRA_FALLBACK_URL: &str = "browser_fallback_url";
pub const EXTRA_MARKET_REFERRER: &str = "market_referrer";
pub const EXTRA_REFERRER: &str = "referrer";
pub const EXTRA_APPLICATION_ID: &str = "application_id";
pub const EXTRA_CREATE_NEW_TAB: &str = "create_new_tab";

const FRAGMENT_MARKER: &str = "#Intent;";
const END_TOKEN: &str = "end";
const SELECTOR_TOKEN: &str = "SEL";

/// Escapes everything except ASCII alphanumerics and `-_.!~*'()`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// ─── Descriptor ──────────────────────────────────────────────────

/// Structured request to launch an external application.
///
/// `action: None` means the implicit view action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchDescriptor {
    pub target_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub categories: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_package_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<Box<LaunchDescriptor>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_referrer: Option<String>,
}

impl LaunchDescriptor {
    /// Descriptor that simply views `url`.
    pub fn view(url: impl Into<String>) -> Self {
        Self {
            target_uri: url.into(),
            ..Self::default()
        }
    }

    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or(ACTION_VIEW)
    }

    /// Lowercased scheme of `target_uri`, if it has one.
    pub fn target_scheme(&self) -> Option<String> {
        scheme_of(&self.target_uri)
    }

    /// The descriptor handlers are resolved against: the selector when present.
    pub fn resolution_target(&self) -> &LaunchDescriptor {
        self.selector.as_deref().unwrap_or(self)
    }

    /// Copy that is safe to hand to another application: browsable only,
    /// no explicit component, no fallback.
    pub fn sanitized(&self) -> Self {
        let mut out = self.clone();
        out.categories.insert(CATEGORY_BROWSABLE.to_owned());
        out.component = None;
        out.fallback_url = None;
        if let Some(selector) = out.selector.as_mut() {
            selector.component = None;
        }
        out
    }
}

/// Lowercased scheme of `url`, or `None` when it has no valid one.
pub fn scheme_of(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

// ─── Decode ──────────────────────────────────────────────────────

/// Whether `url` carries a descriptor fragment.
pub fn is_descriptor(url: &str) -> bool {
    url.rfind('#')
        .is_some_and(|hash| url[hash..].starts_with(FRAGMENT_MARKER))
}

/// Decode a descriptor URL. Returns `None` when `url` has no descriptor
/// fragment.
pub fn decode(url: &str) -> Option<LaunchDescriptor> {
    let hash = url.rfind('#')?;
    if !url[hash..].starts_with(FRAGMENT_MARKER) {
        return None;
    }
    let data = &url[..hash];
    let mut segments = url[hash + FRAGMENT_MARKER.len()..].split(';');

    let mut outer = LaunchDescriptor::default();
    let mut scheme = None;
    parse_segments(&mut segments, &mut outer, &mut scheme, true);

    outer.target_uri = match data.strip_prefix("intent:") {
        Some(rest) => match scheme {
            Some(scheme) => format!("{scheme}:{rest}"),
            None => rest.to_owned(),
        },
        None => data.to_owned(),
    };
    outer.fallback_url = outer.extras.remove(EXTRA_FALLBACK_URL);
    outer.market_referrer = outer.extras.remove(EXTRA_MARKET_REFERRER);
    if outer.target_package_hint.is_some() {
        outer.selector = None;
    }
    Some(outer)
}

/// Decode `url`, or wrap it as a plain view descriptor when it is not one.
pub fn descriptor_for(url: &str) -> LaunchDescriptor {
    decode(url).unwrap_or_else(|| LaunchDescriptor::view(url))
}

fn parse_segments<'a>(
    segments: &mut impl Iterator<Item = &'a str>,
    target: &mut LaunchDescriptor,
    scheme: &mut Option<String>,
    allow_selector: bool,
) {
    while let Some(segment) = segments.next() {
        if segment == END_TOKEN {
            return;
        }
        if segment.is_empty() {
            continue;
        }
        if segment == SELECTOR_TOKEN {
            if allow_selector {
                let mut selector = LaunchDescriptor::default();
                let mut selector_scheme = None;
                parse_segments(segments, &mut selector, &mut selector_scheme, false);
                if let Some(s) = selector_scheme {
                    selector.target_uri = format!("{s}:");
                }
                target.selector = Some(Box::new(selector));
                return;
            }
            continue;
        }

        let (key, raw) = segment.split_once('=').unwrap_or((segment, ""));
        let value = decode_component(raw);
        match key {
            "action" => target.action = Some(value),
            "category" => {
                target.categories.insert(value);
            }
            "type" => target.mime_type = Some(value),
            "launchFlags" => {
                if let Some(flags) = parse_flags(&value) {
                    target.launch_flags = Some(flags);
                }
            }
            "package" => target.target_package_hint = Some(value),
            "component" => target.component = Some(value),
            "scheme" => *scheme = Some(value),
            _ => {
                if let Some(name) = key.strip_prefix("S.") {
                    target.extras.insert(decode_component(name), value);
                }
            }
        }
    }
}

fn parse_flags(value: &str) -> Option<u32> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Percent-encode one descriptor value or URL query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

// ─── Encode ──────────────────────────────────────────────────────

/// Encode a descriptor as a descriptor URL.
///
/// Keys are written in a fixed order so equal descriptors encode
/// identically.
pub fn encode(descriptor: &LaunchDescriptor) -> String {
    let target = descriptor.target_uri.as_str();
    let (scheme, rest) = match (scheme_of(target), target.split_once(':')) {
        (Some(scheme), Some((_, rest))) => (Some(scheme), rest),
        _ => (None, target),
    };

    let mut out = format!("{DESCRIPTOR_SCHEME}:{rest}{FRAGMENT_MARKER}");
    if let Some(scheme) = scheme {
        push_pair(&mut out, "scheme", &scheme);
    }
    push_fields(&mut out, descriptor);
    if let Some(value) = &descriptor.fallback_url {
        push_pair(&mut out, &format!("S.{EXTRA_FALLBACK_URL}"), value);
    }
    if let Some(value) = &descriptor.market_referrer {
        push_pair(&mut out, &format!("S.{EXTRA_MARKET_REFERRER}"), value);
    }
    if let Some(selector) = &descriptor.selector {
        out.push_str(SELECTOR_TOKEN);
        out.push(';');
        if let Some(scheme) = selector.target_uri.strip_suffix(':') {
            if !scheme.is_empty() {
                push_pair(&mut out, "scheme", scheme);
            }
        }
        push_fields(&mut out, selector);
    }
    out.push_str(END_TOKEN);
    out
}

fn push_fields(out: &mut String, d: &LaunchDescriptor) {
    if let Some(action) = &d.action {
        push_pair(out, "action", action);
    }
    for category in &d.categories {
        push_pair(out, "category", category);
    }
    if let Some(mime) = &d.mime_type {
        push_pair(out, "type", mime);
    }
    if let Some(flags) = d.launch_flags {
        out.push_str(&format!("launchFlags=0x{flags:x};"));
    }
    if let Some(package) = &d.target_package_hint {
        push_pair(out, "package", package);
    }
    if let Some(component) = &d.component {
        push_pair(out, "component", component);
    }
    for (key, value) in &d.extras {
        push_pair(out, &format!("S.{}", encode_component(key)), value);
    }
}

fn push_pair(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(&encode_component(value));
    out.push(';');
}

// ─── Tests ───────────────────────────────────────────────────────
